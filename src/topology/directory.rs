//! Link directory
//!
//! Maps every position in the line to its left and right neighbors.
//! Built once at setup and never mutated afterwards.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{Position, Side};

/// Directory errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    #[error("Line length must be at least 2, got {0}")]
    LineTooShort(usize),

    #[error("Position {position} is outside a line of {len}")]
    OutOfRange { position: Position, len: usize },

    #[error("Position {position} has an inconsistent {side} neighbor: expected {expected:?}, found {found:?}")]
    InconsistentNeighbor {
        position: Position,
        side: Side,
        expected: Option<Position>,
        found: Option<Position>,
    },
}

pub type DirectoryResult<T> = Result<T, DirectoryError>;

/// Neighbors of a single position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Links {
    pub left: Option<Position>,
    pub right: Option<Position>,
}

impl Links {
    pub fn new(left: Option<Position>, right: Option<Position>) -> Self {
        Self { left, right }
    }

    pub fn get(&self, side: Side) -> Option<Position> {
        match side {
            Side::Left => self.left,
            Side::Right => self.right,
        }
    }

    /// Which side `neighbor` is on, if it is a neighbor at all
    pub fn side_of(&self, neighbor: Position) -> Option<Side> {
        if self.left == Some(neighbor) {
            Some(Side::Left)
        } else if self.right == Some(neighbor) {
            Some(Side::Right)
        } else {
            None
        }
    }

    /// The only present side, when exactly one side is present
    pub fn sole_side(&self) -> Option<Side> {
        match (self.left, self.right) {
            (Some(_), None) => Some(Side::Left),
            (None, Some(_)) => Some(Side::Right),
            _ => None,
        }
    }
}

/// Static adjacency table for the line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkDirectory {
    entries: Vec<Links>,
}

impl LinkDirectory {
    /// Build the directory for positions `0..len`
    pub fn line(len: usize) -> DirectoryResult<Self> {
        if len < 2 {
            return Err(DirectoryError::LineTooShort(len));
        }

        let entries = (0..len).map(|p| expected_links(p, len)).collect();
        Ok(Self { entries })
    }

    /// Build a directory from explicit entries, checking the line invariants
    pub fn from_entries(entries: Vec<Links>) -> DirectoryResult<Self> {
        let directory = Self { entries };
        directory.validate()?;
        Ok(directory)
    }

    pub fn validate(&self) -> DirectoryResult<()> {
        let len = self.entries.len();
        if len < 2 {
            return Err(DirectoryError::LineTooShort(len));
        }

        for (index, links) in self.entries.iter().enumerate() {
            let expected = expected_links(index, len);
            for side in [Side::Left, Side::Right] {
                if links.get(side) != expected.get(side) {
                    return Err(DirectoryError::InconsistentNeighbor {
                        position: Position::new(index),
                        side,
                        expected: expected.get(side),
                        found: links.get(side),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn links(&self, position: Position) -> DirectoryResult<Links> {
        self.entries
            .get(position.index())
            .copied()
            .ok_or(DirectoryError::OutOfRange {
                position,
                len: self.entries.len(),
            })
    }

    pub fn neighbor(&self, position: Position, side: Side) -> DirectoryResult<Option<Position>> {
        Ok(self.links(position)?.get(side))
    }

    pub fn positions(&self) -> impl Iterator<Item = Position> + '_ {
        (0..self.entries.len()).map(Position::new)
    }

    pub fn last(&self) -> Position {
        Position::new(self.entries.len().saturating_sub(1))
    }

    pub fn is_endpoint(&self, position: Position) -> bool {
        position.is_origin() || position == self.last()
    }
}

/// Line invariant: left is `p-1`, right is `p+1`, when those exist
fn expected_links(index: usize, len: usize) -> Links {
    Links {
        left: index.checked_sub(1).map(Position::new),
        right: (index + 1 < len).then(|| Position::new(index + 1)),
    }
}
