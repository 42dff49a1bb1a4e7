//! Capture leaves: dispatch nodes that keep the raw payload of one tag.
//!
//! A capture does no interpretation. Whoever reads it names the type the
//! payload is supposed to hold; the read copies the bytes into an owned
//! value of that type, or fails.
//!
//! Every stored payload carries the dispatch stamp it arrived with, so an
//! observer can tell a value decoded inside the chunk it is looking at from
//! one left over from an earlier chunk.

use bytes::Bytes;
use zerocopy::FromBytes;

use mocopi_core::Tag;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CaptureError {
    #[error("no data decoded yet for {0}")]
    NotDecoded(Tag),

    #[error("{tag} was last decoded at stamp {stamp}, not after {since}")]
    Stale { tag: Tag, stamp: u64, since: u64 },

    #[error("{tag} holds {actual} bytes, expected {expected}")]
    SizeMismatch {
        tag: Tag,
        expected: usize,
        actual: usize,
    },
}

#[derive(Debug, Clone)]
pub struct Capture {
    tag: Tag,
    payload: Option<Bytes>,
    stamp: u64,
}

impl Capture {
    pub fn new(tag: Tag) -> Self {
        Self {
            tag,
            payload: None,
            stamp: 0,
        }
    }

    pub fn tag(&self) -> Tag {
        self.tag
    }

    /// Replace the stored payload with a copy of `payload`.
    pub fn store(&mut self, payload: &[u8], stamp: u64) {
        self.payload = Some(Bytes::copy_from_slice(payload));
        self.stamp = stamp;
    }

    /// Forget the stored payload. Subsequent reads fail with `NotDecoded`.
    pub fn clear(&mut self) {
        self.payload = None;
        self.stamp = 0;
    }

    pub fn is_decoded(&self) -> bool {
        self.payload.is_some()
    }

    /// Dispatch stamp of the stored payload. Zero if nothing is stored.
    pub fn stamp(&self) -> u64 {
        self.stamp
    }

    pub fn bytes(&self) -> Result<&Bytes, CaptureError> {
        self.payload.as_ref().ok_or(CaptureError::NotDecoded(self.tag))
    }

    /// Copy the payload out as a `T`. The payload must be exactly `T`-sized.
    pub fn read<T: FromBytes>(&self) -> Result<T, CaptureError> {
        let bytes = self.bytes()?;
        T::read_from(&bytes[..]).ok_or(CaptureError::SizeMismatch {
            tag: self.tag,
            expected: std::mem::size_of::<T>(),
            actual: bytes.len(),
        })
    }

    /// Like `read`, but only if the payload was stored after stamp `since`.
    pub fn read_since<T: FromBytes>(&self, since: u64) -> Result<T, CaptureError> {
        if self.is_decoded() && self.stamp <= since {
            return Err(CaptureError::Stale {
                tag: self.tag,
                stamp: self.stamp,
                since,
            });
        }
        self.read()
    }

    /// Payload as text, cut at the first NUL.
    pub fn text(&self) -> Result<String, CaptureError> {
        let bytes = self.bytes()?;
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        Ok(String::from_utf8_lossy(&bytes[..end]).into_owned())
    }
}
