//! Protocol module - Defines the token and its wire representation
//!
//! A token travels as a bare 4-byte big-endian integer. The live runtime
//! wraps that payload in a small frame so the receiver knows which agent
//! sent it:
//! - 4 bytes magic
//! - 4 bytes sender position (big-endian)
//! - 4 bytes payload length (big-endian)
//! - Variable length payload

mod codec;
mod token;

pub use codec::*;
pub use token::*;

/// Protocol version reported by `linerelay info`
pub const PROTOCOL_VERSION: u32 = 1;

/// Default base port for the live runtime; agent `p` listens on `base + p`
pub const DEFAULT_BASE_PORT: u16 = 28000;

/// Magic bytes for frame identification
pub const MAGIC_BYTES: [u8; 4] = [0x4C, 0x52, 0x4C, 0x59]; // "LRLY"
