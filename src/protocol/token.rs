//! Token definitions
//!
//! The token is the only payload exchanged between agents.

use bytes::{BufMut, BytesMut};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::CodecError;

/// Size of an encoded token on the wire
pub const TOKEN_WIRE_SIZE: usize = 4;

/// Integer value relayed along the line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Token(i32);

impl Token {
    pub const fn new(value: i32) -> Self {
        Self(value)
    }

    pub fn value(&self) -> i32 {
        self.0
    }

    /// Append the wire form (network byte order) to `buf`
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_i32(self.0);
    }

    pub fn to_bytes(&self) -> [u8; TOKEN_WIRE_SIZE] {
        self.0.to_be_bytes()
    }

    /// Decode a payload that must be exactly one token long
    pub fn decode(payload: &[u8]) -> Result<Self, CodecError> {
        let bytes: [u8; TOKEN_WIRE_SIZE] = payload
            .try_into()
            .map_err(|_| CodecError::PayloadSize(payload.len()))?;
        Ok(Self(i32::from_be_bytes(bytes)))
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i32> for Token {
    fn from(value: i32) -> Self {
        Self(value)
    }
}

/// Inclusive bounds for generated token values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRange {
    pub min: i32,
    pub max: i32,
}

impl TokenRange {
    pub const fn new(min: i32, max: i32) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, token: Token) -> bool {
        (self.min..=self.max).contains(&token.value())
    }

    pub fn is_valid(&self) -> bool {
        self.min <= self.max
    }
}

impl Default for TokenRange {
    fn default() -> Self {
        Self::new(0, 100)
    }
}

impl fmt::Display for TokenRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.min, self.max)
    }
}
