//! Datagram builders for the mocopi chunk layout.
//!
//! A sender emits two kinds of datagram, both opening with `head` and
//! `sndf`: a skeleton definition (`skdf`) and per-frame data (`fram`).

use crate::chunk::ChunkWriter;
use crate::wire::{
    BoneIdWire, CounterWire, PortWire, TransformWire, WireError, BNDT, BNID, BONS, BTDT, BTRS,
    FNUM, FRAM, FTYP, HEAD, IPAD, PBID, RCVP, SKDF, SNDF, TIME, TRAN, VRSN,
};

/// Fields shared by every datagram from one sender.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamHeader {
    pub format: String,
    pub version: u8,
    pub sender_ip: [u8; 4],
    pub sender_port: u16,
}

impl Default for StreamHeader {
    fn default() -> Self {
        Self {
            format: "sony motion format".to_string(),
            version: 1,
            sender_ip: [127, 0, 0, 1],
            sender_port: crate::wire::DEFAULT_PORT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoneDefinition {
    pub id: u16,
    pub parent: u16,
}

#[derive(Debug, Clone, Copy)]
pub struct BoneTransform {
    pub id: u16,
    pub transform: TransformWire,
}

impl BoneTransform {
    pub fn new(id: u16, orientation_xyzw: [f32; 4], position: [f32; 3]) -> Self {
        Self {
            id,
            transform: TransformWire::new(orientation_xyzw, position),
        }
    }
}

// ── Blocks ────────────────────────────────────────────────────────────────────

pub fn write_head(w: &mut ChunkWriter, header: &StreamHeader) -> Result<(), WireError> {
    w.nested(HEAD, |w| {
        w.chunk(FTYP, header.format.as_bytes())?
            .chunk(VRSN, &[header.version])?;
        Ok(())
    })?;
    Ok(())
}

pub fn write_sender(w: &mut ChunkWriter, header: &StreamHeader) -> Result<(), WireError> {
    w.nested(SNDF, |w| {
        w.chunk(IPAD, &header.sender_ip)?
            .value(RCVP, &PortWire::new(header.sender_port))?;
        Ok(())
    })?;
    Ok(())
}

/// An empty bone list still produces a non-empty `bons` holding only a
/// terminator. A zero-length `bons` would end the scan of `skdf` and the
/// receiver would never see the block.
pub fn write_definition(w: &mut ChunkWriter, bones: &[BoneDefinition]) -> Result<(), WireError> {
    w.nested(SKDF, |w| {
        w.nested(BONS, |w| {
            for bone in bones {
                w.nested(BNDT, |w| {
                    w.value(BNID, &BoneIdWire::new(bone.id))?
                        .value(PBID, &BoneIdWire::new(bone.parent))?;
                    Ok(())
                })?;
            }
            if bones.is_empty() {
                w.terminator(BNDT);
            }
            Ok(())
        })?;
        Ok(())
    })?;
    Ok(())
}

pub fn write_frame(
    w: &mut ChunkWriter,
    frame_number: u32,
    timestamp: u32,
    bones: &[BoneTransform],
) -> Result<(), WireError> {
    w.nested(FRAM, |w| {
        w.value(FNUM, &CounterWire::new(frame_number))?
            .value(TIME, &CounterWire::new(timestamp))?
            .nested(BTRS, |w| {
                for bone in bones {
                    w.nested(BTDT, |w| {
                        w.value(BNID, &BoneIdWire::new(bone.id))?
                            .value(TRAN, &bone.transform)?;
                        Ok(())
                    })?;
                }
                Ok(())
            })?;
        Ok(())
    })?;
    Ok(())
}

// ── Datagrams ─────────────────────────────────────────────────────────────────

/// `head`, `sndf`, `skdf`.
pub fn definition_datagram(
    header: &StreamHeader,
    bones: &[BoneDefinition],
) -> Result<Vec<u8>, WireError> {
    let mut w = ChunkWriter::new();
    write_head(&mut w, header)?;
    write_sender(&mut w, header)?;
    write_definition(&mut w, bones)?;
    Ok(w.finish())
}

/// `head`, `sndf`, `fram`.
pub fn frame_datagram(
    header: &StreamHeader,
    frame_number: u32,
    timestamp: u32,
    bones: &[BoneTransform],
) -> Result<Vec<u8>, WireError> {
    let mut w = ChunkWriter::new();
    write_head(&mut w, header)?;
    write_sender(&mut w, header)?;
    write_frame(&mut w, frame_number, timestamp, bones)?;
    Ok(w.finish())
}

/// Parent links of the standard 27-bone mocopi body, as (child, parent).
/// Bone 0 is the root and has no entry.
pub fn standard_topology() -> Vec<BoneDefinition> {
    const CHAINS: [&[u16]; 5] = [
        &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10],
        &[6, 11, 12, 13, 14],
        &[6, 15, 16, 17, 18],
        &[0, 19, 20, 21, 22],
        &[0, 23, 24, 25, 26],
    ];
    CHAINS
        .iter()
        .flat_map(|chain| {
            chain.windows(2).map(|pair| BoneDefinition {
                id: pair[1],
                parent: pair[0],
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::{scan_chunks, validate};
    use crate::wire::{Tag, NUM_BONES};

    #[test]
    fn definition_datagram_layout() {
        let bytes = definition_datagram(
            &StreamHeader::default(),
            &[BoneDefinition { id: 1, parent: 0 }],
        )
        .unwrap();
        assert_eq!(validate(&bytes), Ok(3));

        let tags: Vec<Tag> = scan_chunks(&bytes).map(|c| c.tag).collect();
        assert_eq!(tags, vec![HEAD, SNDF, SKDF]);

        let skdf = scan_chunks(&bytes).nth(2).unwrap();
        let bons = scan_chunks(skdf.payload).next().unwrap();
        let bndt = scan_chunks(bons.payload).next().unwrap();
        let fields: Vec<(Tag, Vec<u8>)> = scan_chunks(bndt.payload)
            .map(|c| (c.tag, c.payload.to_vec()))
            .collect();
        assert_eq!(fields, vec![(BNID, vec![1, 0]), (PBID, vec![0, 0])]);
    }

    #[test]
    fn frame_datagram_layout() {
        let bytes = frame_datagram(
            &StreamHeader::default(),
            7,
            1234,
            &[BoneTransform::new(5, [0.0, 0.0, 0.0, 1.0], [1.0, 2.0, 0.5])],
        )
        .unwrap();
        let fram = scan_chunks(&bytes).nth(2).unwrap();
        assert_eq!(fram.tag, FRAM);
        let tags: Vec<Tag> = scan_chunks(fram.payload).map(|c| c.tag).collect();
        assert_eq!(tags, vec![FNUM, TIME, BTRS]);

        let btrs = scan_chunks(fram.payload).nth(2).unwrap();
        let btdt = scan_chunks(btrs.payload).next().unwrap();
        let tran = scan_chunks(btdt.payload).nth(1).unwrap();
        assert_eq!(tran.tag, TRAN);
        assert_eq!(tran.payload.len(), 28);
    }

    #[test]
    fn empty_definition_keeps_bons_visible() {
        let bytes = definition_datagram(&StreamHeader::default(), &[]).unwrap();
        assert_eq!(validate(&bytes), Ok(3));
        let skdf = scan_chunks(&bytes).nth(2).unwrap();
        let bons = scan_chunks(skdf.payload).next().unwrap();
        assert_eq!(bons.tag, BONS);
        assert_eq!(bons.payload.len(), 8);
        assert_eq!(scan_chunks(bons.payload).count(), 0);
    }

    #[test]
    fn standard_topology_covers_every_non_root_bone() {
        let topology = standard_topology();
        assert_eq!(topology.len(), NUM_BONES - 1);
        let mut children: Vec<u16> = topology.iter().map(|b| b.id).collect();
        children.sort_unstable();
        assert_eq!(children, (1..NUM_BONES as u16).collect::<Vec<_>>());
    }
}
