//! mocopi wire format: on-wire types for the motion-capture stream.
//!
//! A datagram is a sequence of chunks: `length:u32 | tag:[u8; 4] | payload`.
//! `length` counts payload bytes only. Payloads are either raw fields or,
//! for container tags, another chunk sequence.
//!
//! Fixed-size payloads are modelled as `#[repr(C)]` structs built from
//! zerocopy's little-endian byte-order types, so they have alignment 1 and
//! can be copied out of any byte span without unsafe code.

use std::fmt;

use static_assertions::assert_eq_size;
use zerocopy::byteorder::{LittleEndian, F32, U16, U32};
use zerocopy::{AsBytes, FromBytes, FromZeroes, Unaligned};

// ── Tag ───────────────────────────────────────────────────────────────────────

/// Four-character chunk identifier. Opaque bytes, not necessarily ASCII.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, AsBytes, FromBytes, FromZeroes, Unaligned)]
#[repr(transparent)]
pub struct Tag(pub [u8; 4]);

impl Tag {
    pub const fn new(code: &[u8; 4]) -> Self {
        Tag(*code)
    }

    pub fn is_printable(&self) -> bool {
        self.0.iter().all(|b| b.is_ascii_graphic())
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_printable() {
            // printable implies ASCII, so each byte is one char
            for b in self.0 {
                write!(f, "{}", b as char)?;
            }
            Ok(())
        } else {
            write!(f, "0x{}", hex::encode(self.0))
        }
    }
}

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tag({self})")
    }
}

impl TryFrom<&[u8]> for Tag {
    type Error = WireError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        let code: [u8; 4] = value
            .try_into()
            .map_err(|_| WireError::TagLength(value.len()))?;
        Ok(Tag(code))
    }
}

impl std::str::FromStr for Tag {
    type Err = WireError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Tag::try_from(s.as_bytes())
    }
}

// ── Known tags ────────────────────────────────────────────────────────────────

/// Stream format identity. Contains FTYP and VRSN.
pub const HEAD: Tag = Tag::new(b"head");
/// Format name, variable-length text.
pub const FTYP: Tag = Tag::new(b"ftyp");
/// Format version, one byte.
pub const VRSN: Tag = Tag::new(b"vrsn");

/// Sender descriptor. Contains IPAD and RCVP.
pub const SNDF: Tag = Tag::new(b"sndf");
/// Sender IPv4 address, four bytes.
pub const IPAD: Tag = Tag::new(b"ipad");
/// Declared receive port, u16.
pub const RCVP: Tag = Tag::new(b"rcvp");

/// Skeleton definition. Contains BONS.
pub const SKDF: Tag = Tag::new(b"skdf");
/// Bone definition block. Contains BNDT entries.
pub const BONS: Tag = Tag::new(b"bons");
/// One bone definition entry. Contains BNID and PBID.
pub const BNDT: Tag = Tag::new(b"bndt");
/// Bone id, u16.
pub const BNID: Tag = Tag::new(b"bnid");
/// Parent bone id, u16.
pub const PBID: Tag = Tag::new(b"pbid");

/// Per-frame data. Contains FNUM, TIME and BTRS.
pub const FRAM: Tag = Tag::new(b"fram");
/// Frame counter, u32.
pub const FNUM: Tag = Tag::new(b"fnum");
/// Timestamp, u32.
pub const TIME: Tag = Tag::new(b"time");
/// Bone transform block. Contains BTDT entries.
pub const BTRS: Tag = Tag::new(b"btrs");
/// One bone transform entry. Contains BNID and TRAN.
pub const BTDT: Tag = Tag::new(b"btdt");
/// Bone transform, see `TransformWire`.
pub const TRAN: Tag = Tag::new(b"tran");

// ── Chunk header ──────────────────────────────────────────────────────────────

/// Header preceding every chunk payload.
///
/// Wire size: 8 bytes.
#[derive(Debug, Clone, Copy, AsBytes, FromBytes, FromZeroes, Unaligned)]
#[repr(C)]
pub struct ChunkHeader {
    /// Payload length in bytes, not including this header.
    /// Zero ends the chunk sequence at the current nesting level.
    pub length: U32<LittleEndian>,
    pub tag: Tag,
}

assert_eq_size!(ChunkHeader, [u8; 8]);

pub const CHUNK_HEADER_LEN: usize = std::mem::size_of::<ChunkHeader>();

impl ChunkHeader {
    pub fn new(tag: Tag, length: u32) -> Self {
        Self {
            length: U32::new(length),
            tag,
        }
    }
}

// ── Payload types ─────────────────────────────────────────────────────────────

/// Payload of BNID and PBID.
pub type BoneIdWire = U16<LittleEndian>;

/// Payload of RCVP.
pub type PortWire = U16<LittleEndian>;

/// Payload of FNUM and TIME.
pub type CounterWire = U32<LittleEndian>;

/// Payload of IPAD.
pub type Ipv4Wire = [u8; 4];

/// Payload of VRSN.
pub type VersionWire = u8;

/// Payload of TRAN: orientation quaternion then position.
///
/// The orientation is stored x, y, z, w. The trailing component is the
/// scalar part.
///
/// Wire size: 28 bytes.
#[derive(Debug, Clone, Copy, AsBytes, FromBytes, FromZeroes, Unaligned)]
#[repr(C)]
pub struct TransformWire {
    pub orientation: [F32<LittleEndian>; 4],
    pub position: [F32<LittleEndian>; 3],
}

assert_eq_size!(TransformWire, [u8; 28]);

impl TransformWire {
    pub fn new(orientation_xyzw: [f32; 4], position: [f32; 3]) -> Self {
        Self {
            orientation: orientation_xyzw.map(F32::new),
            position: position.map(F32::new),
        }
    }

    /// Orientation in wire order: x, y, z, w.
    pub fn orientation_xyzw(&self) -> [f32; 4] {
        self.orientation.map(|c| c.get())
    }

    pub fn position(&self) -> [f32; 3] {
        self.position.map(|c| c.get())
    }
}

// ── Constants ─────────────────────────────────────────────────────────────────

/// Default UDP port the sender streams to.
pub const DEFAULT_PORT: u16 = 12351;

/// Number of bone slots in the skeleton.
pub const NUM_BONES: usize = 27;

/// Multiplier from wire position units (metres) to scene units.
pub const SCENE_SCALE: f32 = 1000.0;

/// Largest UDP payload over IPv4. No datagram, and so no chunk, is larger.
pub const MAX_DATAGRAM: usize = 65507;

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    #[error("tag must be exactly 4 bytes, got {0}")]
    TagLength(usize),

    #[error("payload length {0} exceeds maximum {}", MAX_DATAGRAM)]
    PayloadTooLarge(usize),
}

// ── Tests ─────────────────────────────────────────────────────────────────────
