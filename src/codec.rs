//! Byte-stream framer (C1): splits the inbound stream on the protocol terminator `\a\b`
//! and rejects a buffer that has grown too long for the current phase without one arriving.

use bytes::{Buf, BufMut, BytesMut};
use robot_proto::{
    framing::{find_terminator, TERMINATOR},
    message::{exceeded_max_length, ClientMessageSpec},
    server_message::ServerMessage,
};
use thiserror::Error;
use tokio_util::codec::{Decoder, Encoder};

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum RobotCodecError {
    #[error("message exceeded the maximum supported length for the current phase")]
    Overflow,
}

/// Frames on `\a\b`. The session tells the codec, via [`RobotCodec::set_supported`], which
/// message types the current phase accepts, so it can flag an overflow before a terminator
/// ever shows up instead of buffering forever.
#[derive(Debug, Clone, Default)]
pub struct RobotCodec {
    supported: &'static [&'static ClientMessageSpec],
}

impl RobotCodec {
    pub fn new() -> Self {
        Self { supported: &[] }
    }

    pub fn set_supported(&mut self, supported: &'static [&'static ClientMessageSpec]) {
        self.supported = supported;
    }
}

impl Decoder for RobotCodec {
    type Item = Vec<u8>;
    type Error = RobotCodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match find_terminator(src) {
            Some(end) => {
                let message = src[..end - TERMINATOR.len()].to_vec();
                src.advance(end);
                Ok(Some(message))
            }
            None if !self.supported.is_empty() && exceeded_max_length(src, self.supported) => {
                Err(RobotCodecError::Overflow)
            }
            None => Ok(None),
        }
    }
}

impl Encoder<&ServerMessage> for RobotCodec {
    type Error = std::io::Error;

    fn encode(&mut self, item: &ServerMessage, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let body = item.as_bytes();
        dst.reserve(body.len() + TERMINATOR.len());
        dst.put_slice(&body);
        dst.put_slice(TERMINATOR);
        Ok(())
    }
}
