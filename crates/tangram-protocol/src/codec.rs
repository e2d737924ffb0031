//! Length-delimited JSON codec for QUIC streams.
//!
//! Wire format: 4-byte big-endian length prefix + serde JSON payload.
//! Generic over the framed type so the same codec frames both `Request`
//! and `Response` values on their respective ends of a bidirectional stream.

use std::marker::PhantomData;

use bytes::{Buf, BufMut, BytesMut};
use serde::{de::DeserializeOwned, Serialize};
use tokio_util::codec::{Decoder, Encoder};

use crate::era::CURRENT_ERA;
use crate::ProtocolError;

const LENGTH_PREFIX_SIZE: usize = 4;

/// Codec for framing a single serde-JSON value per message over a byte
/// stream. `T` is typically `Request` or `Response`.
pub struct MessageCodec<T> {
    max_message_bytes: usize,
    _marker: PhantomData<T>,
}

impl<T> Default for MessageCodec<T> {
    fn default() -> Self {
        MessageCodec {
            max_message_bytes: CURRENT_ERA.max_message_bytes,
            _marker: PhantomData,
        }
    }
}

impl<T> Decoder for MessageCodec<T>
where
    T: DeserializeOwned,
{
    type Item = T;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < LENGTH_PREFIX_SIZE {
            return Ok(None);
        }

        let length = u32::from_be_bytes([src[0], src[1], src[2], src[3]]) as usize;

        if length > self.max_message_bytes {
            return Err(ProtocolError::MessageTooLarge {
                size: length,
                max: self.max_message_bytes,
            });
        }

        let total = LENGTH_PREFIX_SIZE + length;
        if src.len() < total {
            src.reserve(total - src.len());
            return Ok(None);
        }

        src.advance(LENGTH_PREFIX_SIZE);
        let msg_bytes = src.split_to(length);

        let message: T = serde_json::from_slice(&msg_bytes)?;
        Ok(Some(message))
    }
}

impl<T> Encoder<T> for MessageCodec<T>
where
    T: Serialize,
{
    type Error = ProtocolError;

    fn encode(&mut self, item: T, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let payload = serde_json::to_vec(&item)?;

        if payload.len() > self.max_message_bytes {
            return Err(ProtocolError::MessageTooLarge {
                size: payload.len(),
                max: self.max_message_bytes,
            });
        }

        dst.reserve(LENGTH_PREFIX_SIZE + payload.len());
        dst.put_u32(payload.len() as u32);
        dst.extend_from_slice(&payload);

        Ok(())
    }
}
