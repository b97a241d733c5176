//! Length-prefixed frame protocol for the raw-TCP transport
//!
//! Frame format:
//! ```text
//! +---------+----------------+------------------+
//! | version | total length   | payload          |
//! | "v1"    | (2 bytes, BE)  | (length - 4)     |
//! +---------+----------------+------------------+
//! ```
//!
//! The length counts the whole frame, header included.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::io;
use tokio_util::codec::{Decoder, Encoder};

/// Version tag opening every frame
pub const VERSION_TAG: [u8; 2] = *b"v1";

/// Header size: 2 byte version + 2 byte length
pub const HEADER_SIZE: usize = 4;

/// Payload of the server heartbeat frame
pub const PING_PAYLOAD: &[u8] = b"ping msg";

/// Frame codec errors
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("Frame I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid frame version: {0:?}")]
    InvalidVersion([u8; 2]),

    /// Declared length does not even cover the header; the stream cannot be trusted after this
    #[error("Frame length {0} is shorter than the header")]
    LengthTooShort(usize),

    #[error("Frame length {len} exceeds maximum {max}")]
    FrameTooLarge { len: usize, max: usize },
}

/// Largest frame a `u16` length can describe
pub const fn max_encodable_frame() -> usize {
    u16::MAX as usize
}

/// Write one frame carrying `payload` into `dst`
pub fn pack(payload: &[u8], dst: &mut BytesMut, max_frame_size: usize) -> Result<(), FrameError> {
    let total = HEADER_SIZE + payload.len();
    let max = max_frame_size.min(max_encodable_frame());
    if total > max {
        return Err(FrameError::FrameTooLarge { len: total, max });
    }

    dst.reserve(total);
    dst.put_slice(&VERSION_TAG);
    dst.put_u16(total as u16);
    dst.put_slice(payload);
    Ok(())
}

/// Take one frame's payload off the front of `src`.
///
/// Returns `Ok(None)` when `src` does not yet hold a whole frame; nothing is
/// consumed in that case, and bytes past the frame are never touched.
pub fn unpack(src: &mut BytesMut, max_frame_size: usize) -> Result<Option<Bytes>, FrameError> {
    if src.len() < HEADER_SIZE {
        return Ok(None);
    }

    let version = [src[0], src[1]];
    if version != VERSION_TAG {
        return Err(FrameError::InvalidVersion(version));
    }

    let total = usize::from(u16::from_be_bytes([src[2], src[3]]));
    if total < HEADER_SIZE {
        return Err(FrameError::LengthTooShort(total));
    }
    if total > max_frame_size {
        return Err(FrameError::FrameTooLarge {
            len: total,
            max: max_frame_size,
        });
    }

    if src.len() < total {
        src.reserve(total - src.len());
        return Ok(None);
    }

    src.advance(HEADER_SIZE);
    Ok(Some(src.split_to(total - HEADER_SIZE).freeze()))
}

/// Drop leading bytes until `src` starts with the version tag (or could once more data arrives).
///
/// Returns the number of bytes discarded.
fn resync(src: &mut BytesMut) -> usize {
    if src.starts_with(&VERSION_TAG) || src.as_ref() == &VERSION_TAG[..1] {
        return 0;
    }

    let skip = match src.windows(VERSION_TAG.len()).position(|w| w == VERSION_TAG) {
        Some(pos) => pos,
        // Keep a trailing 'v' that may be the first half of the next tag
        None if src.last() == Some(&VERSION_TAG[0]) => src.len() - 1,
        None => src.len(),
    };
    src.advance(skip);
    skip
}

/// Frame encoder/decoder for streaming use
#[derive(Debug, Clone, Copy)]
pub struct FrameCodec {
    max_frame_size: usize,
}

impl FrameCodec {
    pub fn new(max_frame_size: usize) -> Self {
        Self {
            max_frame_size: max_frame_size.clamp(HEADER_SIZE, max_encodable_frame()),
        }
    }

    /// Largest payload a single frame may carry
    pub fn max_payload(&self) -> usize {
        self.max_frame_size - HEADER_SIZE
    }
}

impl Decoder for FrameCodec {
    type Item = Bytes;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let skipped = resync(src);
        if skipped > 0 {
            tracing::debug!(skipped, "Discarded bytes before frame version tag");
        }
        unpack(src, self.max_frame_size)
    }
}

impl Encoder<Bytes> for FrameCodec {
    type Error = FrameError;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<(), Self::Error> {
        pack(&item, dst, self.max_frame_size)
    }
}
