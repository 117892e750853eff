// SPDX-License-Identifier: MIT OR Apache-2.0
//! Length-prefixed framing: a 4-byte big-endian length followed by a UTF-8
//! JSON body.

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::{AgentRequest, AgentResponse, ProtocolError, MAX_FRAME_LEN};

const LEN_PREFIX_BYTES: usize = 4;

/// Serialize `msg` to its on-wire frame: 4-byte big-endian length prefix
/// followed by the JSON body.
///
/// # Errors
///
/// Returns [`ProtocolError::Json`] if `msg` cannot be serialized.
pub fn encode(msg: &AgentRequest) -> Result<Vec<u8>, ProtocolError> {
    let body = serde_json::to_vec(msg)?;
    let mut out = Vec::with_capacity(LEN_PREFIX_BYTES + body.len());
    out.extend_from_slice(&(body.len() as u32).to_be_bytes());
    out.extend_from_slice(&body);
    Ok(out)
}

/// Parse a single complete frame (length prefix + body) into an
/// [`AgentResponse`].
///
/// # Errors
///
/// Returns [`ProtocolError::FrameTooLarge`] if the declared length exceeds
/// [`MAX_FRAME_LEN`], or [`ProtocolError::Json`] if the body does not parse.
pub fn decode(frame: &[u8]) -> Result<AgentResponse, ProtocolError> {
    if frame.len() < LEN_PREFIX_BYTES {
        return Err(ProtocolError::Io(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "frame shorter than the length prefix",
        )));
    }
    let len = u32::from_be_bytes(frame[..LEN_PREFIX_BYTES].try_into().unwrap());
    if len > MAX_FRAME_LEN {
        return Err(ProtocolError::FrameTooLarge { len });
    }
    let body = &frame[LEN_PREFIX_BYTES..];
    Ok(serde_json::from_slice(body)?)
}

/// [`tokio_util::codec::Encoder`]/[`tokio_util::codec::Decoder`] pair for
/// driving an [`AgentRequest`]/[`AgentResponse`] connection through
/// `tokio_util::codec::Framed` over a `UnixStream` or `TcpStream`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FramedCodec {
    state: DecodeState,
}

#[derive(Debug, Clone, Copy)]
enum DecodeState {
    ReadingLength,
    ReadingBody { len: u32 },
}

impl Default for DecodeState {
    fn default() -> Self {
        Self::ReadingLength
    }
}

impl Encoder<AgentRequest> for FramedCodec {
    type Error = ProtocolError;

    fn encode(&mut self, item: AgentRequest, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let body = serde_json::to_vec(&item)?;
        dst.reserve(LEN_PREFIX_BYTES + body.len());
        dst.put_u32(body.len() as u32);
        dst.put_slice(&body);
        Ok(())
    }
}

impl Decoder for FramedCodec {
    type Item = AgentResponse;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            match self.state {
                DecodeState::ReadingLength => {
                    if src.len() < LEN_PREFIX_BYTES {
                        return Ok(None);
                    }
                    let len = u32::from_be_bytes(src[..LEN_PREFIX_BYTES].try_into().unwrap());
                    if len > MAX_FRAME_LEN {
                        return Err(ProtocolError::FrameTooLarge { len });
                    }
                    src.advance(LEN_PREFIX_BYTES);
                    self.state = DecodeState::ReadingBody { len };
                }
                DecodeState::ReadingBody { len } => {
                    if (src.len() as u32) < len {
                        src.reserve((len as usize).saturating_sub(src.len()));
                        return Ok(None);
                    }
                    let body = src.split_to(len as usize);
                    self.state = DecodeState::ReadingLength;
                    let response = serde_json::from_slice(&body)?;
                    return Ok(Some(response));
                }
            }
        }
    }
}
