//! Token sources
//!
//! Each agent owns its own source, so draws never depend on what other
//! agents did and seeded runs are reproducible.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::protocol::{Token, TokenRange};

/// Supplies fresh token values to an agent
pub trait TokenSource: Send {
    /// Draw a new token
    fn draw(&mut self) -> Token;

    /// Bounds every drawn token falls within
    fn range(&self) -> TokenRange;
}

/// Uniform random tokens within an inclusive range
pub struct RandomTokens {
    rng: StdRng,
    range: TokenRange,
}

impl RandomTokens {
    /// Deterministic source for reproducible runs
    pub fn seeded(seed: u64, range: TokenRange) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            range,
        }
    }

    /// Source seeded from operating system entropy
    pub fn from_entropy(range: TokenRange) -> Self {
        Self {
            rng: StdRng::from_os_rng(),
            range,
        }
    }
}

impl TokenSource for RandomTokens {
    fn draw(&mut self) -> Token {
        Token::new(self.rng.random_range(self.range.min..=self.range.max))
    }

    fn range(&self) -> TokenRange {
        self.range
    }
}

/// Replays a fixed list of values, then repeats the last one
#[cfg(test)]
pub struct ScriptedTokens {
    values: std::collections::VecDeque<i32>,
    last: i32,
}

#[cfg(test)]
impl ScriptedTokens {
    pub fn new(values: impl IntoIterator<Item = i32>) -> Self {
        Self {
            values: values.into_iter().collect(),
            last: 0,
        }
    }
}

#[cfg(test)]
impl TokenSource for ScriptedTokens {
    fn draw(&mut self) -> Token {
        if let Some(value) = self.values.pop_front() {
            self.last = value;
        }
        Token::new(self.last)
    }

    fn range(&self) -> TokenRange {
        TokenRange::new(i32::MIN, i32::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_draws_stay_in_range() {
        let range = TokenRange::new(0, 100);
        let mut source = RandomTokens::seeded(7, range);
        for _ in 0..1000 {
            assert!(range.contains(source.draw()));
        }
    }

    #[test]
    fn test_degenerate_range() {
        let mut source = RandomTokens::seeded(1, TokenRange::new(42, 42));
        assert_eq!(source.draw(), Token::new(42));
        assert_eq!(source.draw(), Token::new(42));
    }

    #[test]
    fn test_same_seed_same_sequence() {
        let mut a = RandomTokens::seeded(99, TokenRange::default());
        let mut b = RandomTokens::seeded(99, TokenRange::default());
        let left: Vec<Token> = (0..20).map(|_| a.draw()).collect();
        let right: Vec<Token> = (0..20).map(|_| b.draw()).collect();
        assert_eq!(left, right);
    }

    #[test]
    fn test_scripted_repeats_last() {
        let mut source = ScriptedTokens::new([3, 9]);
        assert_eq!(source.draw(), Token::new(3));
        assert_eq!(source.draw(), Token::new(9));
        assert_eq!(source.draw(), Token::new(9));
    }
}
