//! Primitive decoder: fixed-width integers and floats read from byte spans.
//!
//! Every read is bounds-checked and yields an owned value. A read that runs
//! past the end of the span is an error, never a short or garbage value.
//! The mocopi wire format is little-endian throughout; `ByteOrder` exists so
//! callers can invert it when a field is known to be stored the other way.

use crate::wire::Tag;

// ── Byte order ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ByteOrder {
    #[default]
    Little,
    Big,
}

impl ByteOrder {
    /// Byte order of every numeric field on the wire.
    pub const WIRE: ByteOrder = ByteOrder::Little;

    pub fn inverted(self) -> Self {
        match self {
            ByteOrder::Little => ByteOrder::Big,
            ByteOrder::Big => ByteOrder::Little,
        }
    }

    pub fn native() -> Self {
        if cfg!(target_endian = "little") {
            ByteOrder::Little
        } else {
            ByteOrder::Big
        }
    }
}

// ── Primitives ────────────────────────────────────────────────────────────────

/// A fixed-width value that can be decoded from exactly `WIDTH` bytes.
pub trait Primitive: Sized + Copy {
    const WIDTH: usize;

    /// Decode from a span of exactly `WIDTH` bytes. Returns None otherwise.
    fn decode(bytes: &[u8], order: ByteOrder) -> Option<Self>;
}

macro_rules! impl_primitive {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Primitive for $ty {
                const WIDTH: usize = std::mem::size_of::<$ty>();

                fn decode(bytes: &[u8], order: ByteOrder) -> Option<Self> {
                    let raw: [u8; std::mem::size_of::<$ty>()] = bytes.try_into().ok()?;
                    Some(match order {
                        ByteOrder::Little => <$ty>::from_le_bytes(raw),
                        ByteOrder::Big => <$ty>::from_be_bytes(raw),
                    })
                }
            }
        )*
    };
}

impl_primitive!(u8, i8, u16, i16, u32, i32, u64, i64, f32, f64);

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("read of {width} bytes at offset {offset} exceeds span of {len} bytes")]
    OutOfBounds {
        offset: usize,
        width: usize,
        len: usize,
    },
}

// ── Free functions ────────────────────────────────────────────────────────────

/// Read a `T` at `offset` in `buf` using `order`.
pub fn read<T: Primitive>(buf: &[u8], offset: usize, order: ByteOrder) -> Result<T, DecodeError> {
    let out_of_bounds = DecodeError::OutOfBounds {
        offset,
        width: T::WIDTH,
        len: buf.len(),
    };
    let end = match offset.checked_add(T::WIDTH) {
        Some(end) if end <= buf.len() => end,
        _ => return Err(out_of_bounds),
    };
    T::decode(&buf[offset..end], order).ok_or(out_of_bounds)
}

pub fn read_u16_le(buf: &[u8], offset: usize) -> Result<u16, DecodeError> {
    read(buf, offset, ByteOrder::Little)
}

pub fn read_u32_le(buf: &[u8], offset: usize) -> Result<u32, DecodeError> {
    read(buf, offset, ByteOrder::Little)
}

pub fn read_f32_le(buf: &[u8], offset: usize) -> Result<f32, DecodeError> {
    read(buf, offset, ByteOrder::Little)
}

// ── Cursor ────────────────────────────────────────────────────────────────────

/// Forward-only cursor over a byte span.
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
    order: ByteOrder,
}

impl<'a> ByteReader<'a> {
    /// Cursor using the wire byte order.
    pub fn new(buf: &'a [u8]) -> Self {
        Self::with_order(buf, ByteOrder::WIRE)
    }

    pub fn with_order(buf: &'a [u8], order: ByteOrder) -> Self {
        Self { buf, pos: 0, order }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub fn read<T: Primitive>(&mut self) -> Result<T, DecodeError> {
        let value = read(self.buf, self.pos, self.order)?;
        self.pos += T::WIDTH;
        Ok(value)
    }

    /// Read a four-character tag. Tags are raw bytes, not subject to byte order.
    pub fn read_tag(&mut self) -> Result<Tag, DecodeError> {
        let bytes = self.take(4)?;
        Ok(Tag([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Borrow the next `n` bytes and advance past them.
    pub fn take(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        let out_of_bounds = DecodeError::OutOfBounds {
            offset: self.pos,
            width: n,
            len: self.buf.len(),
        };
        let end = match self.pos.checked_add(n) {
            Some(end) if end <= self.buf.len() => end,
            _ => return Err(out_of_bounds),
        };
        let bytes = &self.buf[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
