//! Frame codec for the live runtime
//!
//! Handles framing of token payloads together with the sender position.

use bytes::{Buf, BufMut, BytesMut};
use std::io;
use thiserror::Error;

use super::{Token, MAGIC_BYTES, TOKEN_WIRE_SIZE};
use crate::topology::Position;

/// Maximum payload size accepted in a frame
pub const MAX_PAYLOAD_SIZE: usize = 64;

/// Header size: magic(4) + sender(4) + length(4) = 12 bytes
pub const HEADER_SIZE: usize = 12;

/// Codec errors
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Malformed token: expected {TOKEN_WIRE_SIZE} bytes, got {0}")]
    PayloadSize(usize),

    #[error("Invalid magic bytes")]
    InvalidMagic,

    #[error("Frame too large: {0} bytes (max: {1})")]
    FrameTooLarge(usize, usize),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Incomplete frame")]
    Incomplete,
}

/// A payload together with the position that sent it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub sender: Position,
    pub payload: BytesMut,
}

impl Frame {
    pub fn new(sender: Position, payload: BytesMut) -> Self {
        Self { sender, payload }
    }

    /// Build a frame carrying a single token
    pub fn token(sender: Position, token: Token) -> Self {
        let mut payload = BytesMut::with_capacity(TOKEN_WIRE_SIZE);
        token.encode(&mut payload);
        Self::new(sender, payload)
    }

    /// Decode the payload as a token
    pub fn to_token(&self) -> Result<Token, CodecError> {
        Token::decode(&self.payload)
    }
}

/// Encodes frames into the wire format
#[derive(Debug, Default)]
pub struct Encoder;

impl Encoder {
    pub fn new() -> Self {
        Self
    }

    pub fn encode(&mut self, frame: &Frame, buf: &mut BytesMut) -> Result<(), CodecError> {
        if frame.payload.len() > MAX_PAYLOAD_SIZE {
            return Err(CodecError::FrameTooLarge(frame.payload.len(), MAX_PAYLOAD_SIZE));
        }

        buf.reserve(HEADER_SIZE + frame.payload.len());
        buf.put_slice(&MAGIC_BYTES);
        buf.put_u32(frame.sender.index() as u32);
        buf.put_u32(frame.payload.len() as u32);
        buf.put_slice(&frame.payload);
        Ok(())
    }
}

/// Decodes frames from the wire format
pub struct Decoder {
    state: DecodeState,
}

#[derive(Default)]
enum DecodeState {
    #[default]
    Header,
    Payload {
        sender: Position,
        length: usize,
    },
}

impl Decoder {
    pub fn new() -> Self {
        Self {
            state: DecodeState::Header,
        }
    }

    /// Attempt to decode a frame from the buffer
    /// Returns Ok(None) if more data is needed
    pub fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Frame>, CodecError> {
        loop {
            match &self.state {
                DecodeState::Header => {
                    if buf.len() < HEADER_SIZE {
                        return Ok(None);
                    }

                    if buf[0..4] != MAGIC_BYTES {
                        return Err(CodecError::InvalidMagic);
                    }

                    let sender = u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]);
                    let length = u32::from_be_bytes([buf[8], buf[9], buf[10], buf[11]]) as usize;

                    if length > MAX_PAYLOAD_SIZE {
                        return Err(CodecError::FrameTooLarge(length, MAX_PAYLOAD_SIZE));
                    }

                    buf.advance(HEADER_SIZE);

                    self.state = DecodeState::Payload {
                        sender: Position::new(sender as usize),
                        length,
                    };
                }
                DecodeState::Payload { sender, length } => {
                    if buf.len() < *length {
                        return Ok(None);
                    }

                    let payload = buf.split_to(*length);
                    let sender = *sender;

                    self.state = DecodeState::Header;

                    return Ok(Some(Frame::new(sender, payload)));
                }
            }
        }
    }

    /// True while a header has been consumed but its payload is still missing
    pub fn is_mid_frame(&self) -> bool {
        matches!(self.state, DecodeState::Payload { .. })
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_frame_decodes() {
        let mut encoder = Encoder::new();
        let mut decoder = Decoder::new();
        let mut buf = BytesMut::new();

        encoder
            .encode(&Frame::token(Position::new(3), Token::new(77)), &mut buf)
            .unwrap();
        assert_eq!(buf.len(), HEADER_SIZE + TOKEN_WIRE_SIZE);

        let frame = decoder.decode(&mut buf).unwrap().unwrap();
        assert_eq!(frame.sender, Position::new(3));
        assert_eq!(frame.to_token().unwrap(), Token::new(77));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_partial_frame_waits_for_more_data() {
        let mut encoder = Encoder::new();
        let mut decoder = Decoder::new();
        let mut full = BytesMut::new();
        encoder
            .encode(&Frame::token(Position::new(1), Token::new(5)), &mut full)
            .unwrap();

        let mut buf = full.split_to(HEADER_SIZE + 2);
        assert!(decoder.decode(&mut buf).unwrap().is_none());
        assert!(decoder.is_mid_frame());

        buf.extend_from_slice(&full);
        let frame = decoder.decode(&mut buf).unwrap().unwrap();
        assert_eq!(frame.to_token().unwrap(), Token::new(5));
    }

    #[test]
    fn test_invalid_magic() {
        let mut decoder = Decoder::new();
        let mut buf = BytesMut::from(&b"NOPE\0\0\0\0\0\0\0\x04\0\0\0\x01"[..]);
        assert!(matches!(decoder.decode(&mut buf), Err(CodecError::InvalidMagic)));
    }

    #[test]
    fn test_oversized_payload_rejected() {
        let mut encoder = Encoder::new();
        let frame = Frame::new(Position::new(0), BytesMut::from(&[0u8; MAX_PAYLOAD_SIZE + 1][..]));
        let mut buf = BytesMut::new();
        assert!(matches!(
            encoder.encode(&frame, &mut buf),
            Err(CodecError::FrameTooLarge(_, MAX_PAYLOAD_SIZE))
        ));
    }

    #[test]
    fn test_wrong_payload_size_is_malformed() {
        let frame = Frame::new(Position::new(2), BytesMut::from(&[1u8, 2][..]));
        assert!(matches!(frame.to_token(), Err(CodecError::PayloadSize(2))));
    }
}
