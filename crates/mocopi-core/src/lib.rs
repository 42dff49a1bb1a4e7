//! mocopi-core: wire format, primitive decoding and chunk framing.
//! The receiver, daemon and simulator crates all depend on this one.

pub mod chunk;
pub mod compose;
pub mod config;
pub mod decode;
pub mod wire;

pub use chunk::{is_well_formed, scan_chunks, validate, Chunk, ChunkWriter, FrameError};
pub use wire::Tag;
