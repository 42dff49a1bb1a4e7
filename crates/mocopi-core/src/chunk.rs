//! Chunk framing: scanning, validation and writing of chunk sequences.
//!
//! `scan_chunks` is lenient: it yields chunks until the data runs out or a
//! zero-length terminator is seen, and silently stops at anything that does
//! not fit. `validate` is strict: a datagram is accepted only when its
//! chunks cover it exactly. The receiver validates first and only then
//! scans, so a bad datagram never reaches the dispatch tree.
//!
//! A terminator is not yielded as a chunk. `ChunkIter::terminator` reports
//! it once iteration has stopped, so scanning a well-formed buffer and
//! replaying both through `ChunkWriter` reproduces it byte for byte.

use zerocopy::AsBytes;

use crate::decode::{ByteReader, DecodeError};
use crate::wire::{ChunkHeader, Tag, WireError, CHUNK_HEADER_LEN, MAX_DATAGRAM};

// ── Chunk ─────────────────────────────────────────────────────────────────────

/// One chunk borrowed from a scanned buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk<'a> {
    pub tag: Tag,
    pub payload: &'a [u8],
}

impl Chunk<'_> {
    /// Bytes this chunk occupies on the wire, header included.
    pub fn encoded_len(&self) -> usize {
        CHUNK_HEADER_LEN + self.payload.len()
    }
}

// ── Scanning ──────────────────────────────────────────────────────────────────

/// Iterate over the chunks of one nesting level.
pub fn scan_chunks(buf: &[u8]) -> ChunkIter<'_> {
    ChunkIter {
        reader: ByteReader::new(buf),
        done: false,
        terminator: None,
    }
}

pub struct ChunkIter<'a> {
    reader: ByteReader<'a>,
    done: bool,
    terminator: Option<Tag>,
}

impl<'a> ChunkIter<'a> {
    /// Tag of the zero-length chunk that ended the scan, if one did.
    pub fn terminator(&self) -> Option<Tag> {
        self.terminator
    }

    fn next_chunk(&mut self) -> Result<Option<Chunk<'a>>, DecodeError> {
        if self.reader.remaining() < CHUNK_HEADER_LEN {
            return Ok(None);
        }
        let length = self.reader.read::<u32>()? as usize;
        let tag = self.reader.read_tag()?;
        if length == 0 {
            self.terminator = Some(tag);
            return Ok(None);
        }
        let payload = self.reader.take(length)?;
        Ok(Some(Chunk { tag, payload }))
    }
}

impl<'a> Iterator for ChunkIter<'a> {
    type Item = Chunk<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_chunk() {
            Ok(Some(chunk)) => Some(chunk),
            // terminator, short tail, or a length running past the end
            Ok(None) | Err(_) => {
                self.done = true;
                None
            }
        }
    }
}

// ── Validation ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    #[error("truncated chunk header at offset {offset}: {remaining} bytes left")]
    Truncated { offset: usize, remaining: usize },

    #[error("chunk {tag} at offset {offset} declares {length} bytes but only {remaining} remain")]
    Overrun {
        tag: Tag,
        offset: usize,
        length: usize,
        remaining: usize,
    },

    #[error("{count} trailing bytes after terminator at offset {offset}")]
    TrailingBytes { offset: usize, count: usize },

    #[error(transparent)]
    Decode(#[from] DecodeError),
}

/// Check that `buf` is exactly covered by well-formed chunks.
///
/// Returns the number of non-terminator chunks. An empty buffer is valid
/// and holds zero chunks. A zero-length chunk is accepted only as the last
/// eight bytes of the buffer.
pub fn validate(buf: &[u8]) -> Result<usize, FrameError> {
    let mut reader = ByteReader::new(buf);
    let mut count = 0;

    while !reader.is_empty() {
        let offset = reader.position();
        if reader.remaining() < CHUNK_HEADER_LEN {
            return Err(FrameError::Truncated {
                offset,
                remaining: reader.remaining(),
            });
        }
        let length = reader.read::<u32>()? as usize;
        let tag = reader.read_tag()?;

        if length == 0 {
            if !reader.is_empty() {
                return Err(FrameError::TrailingBytes {
                    offset: reader.position(),
                    count: reader.remaining(),
                });
            }
            break;
        }
        if length > reader.remaining() {
            return Err(FrameError::Overrun {
                tag,
                offset,
                length,
                remaining: reader.remaining(),
            });
        }
        reader.take(length)?;
        count += 1;
    }

    Ok(count)
}

pub fn is_well_formed(buf: &[u8]) -> bool {
    validate(buf).is_ok()
}

// ── Writing ───────────────────────────────────────────────────────────────────

/// Builds chunk sequences. The inverse of `scan_chunks`.
#[derive(Debug, Clone, Default)]
pub struct ChunkWriter {
    buf: Vec<u8>,
}

impl ChunkWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one chunk with a raw payload.
    pub fn chunk(&mut self, tag: Tag, payload: &[u8]) -> Result<&mut Self, WireError> {
        if payload.len() > MAX_DATAGRAM {
            return Err(WireError::PayloadTooLarge(payload.len()));
        }
        let header = ChunkHeader::new(tag, payload.len() as u32);
        self.buf.extend_from_slice(header.as_bytes());
        self.buf.extend_from_slice(payload);
        Ok(self)
    }

    /// Append one chunk whose payload is a wire struct.
    pub fn value<T: AsBytes>(&mut self, tag: Tag, value: &T) -> Result<&mut Self, WireError> {
        self.chunk(tag, value.as_bytes())
    }

    /// Append one container chunk whose payload is built by `build`.
    pub fn nested<F>(&mut self, tag: Tag, build: F) -> Result<&mut Self, WireError>
    where
        F: FnOnce(&mut ChunkWriter) -> Result<(), WireError>,
    {
        let mut inner = ChunkWriter::new();
        build(&mut inner)?;
        self.chunk(tag, &inner.buf)
    }

    /// Append a zero-length chunk, ending the sequence at this level.
    pub fn terminator(&mut self, tag: Tag) -> &mut Self {
        self.buf.extend_from_slice(ChunkHeader::new(tag, 0).as_bytes());
        self
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
