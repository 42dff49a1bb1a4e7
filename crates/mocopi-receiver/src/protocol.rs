//! The mocopi dispatch tree.
//!
//!   root ─ head ─ ftyp, vrsn
//!        ─ sndf ─ ipad, rcvp
//!        ─ skdf ─ bons ─ bndt ─ bnid, pbid
//!        ─ fram ─ fnum, time
//!               ─ btrs ─ btdt ─ bnid, tran
//!
//! The `bnid` capture is shared by `bndt` and `btdt`.
//!
//! Events carried by the tree are either skeleton events, which drive
//! reconstruction, or observer events, which the receiver routes to
//! callbacks registered by the host.

use std::fmt;

use mocopi_core::wire::{
    BNDT, BNID, BONS, BTDT, BTRS, FNUM, FRAM, FTYP, HEAD, IPAD, PBID, RCVP, SKDF, SNDF, TIME,
    TRAN, VRSN,
};

use crate::metadata::MetadataNodes;
use crate::skeleton::{BoneCaptures, SkeletonEvent};
use crate::tree::{DispatchTree, NodeId, Phase, TreeError};

/// Handle returned when an observer is registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverId(pub(crate) u64);

impl fmt::Display for ObserverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "observer#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEvent {
    Skeleton(SkeletonEvent),
    Observer(ObserverId),
}

/// Handles to the nodes observers read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolNodes {
    pub root: NodeId,
    pub metadata: MetadataNodes,
    pub bones: BoneCaptures,
}

pub fn build_tree() -> Result<(DispatchTree<StreamEvent>, ProtocolNodes), TreeError> {
    let mut tree = DispatchTree::new();

    let root = tree.add_router(&[HEAD, SNDF, SKDF, FRAM]);
    tree.set_root(root)?;

    // head
    let ftyp = tree.add_capture(FTYP);
    let vrsn = tree.add_capture(VRSN);
    tree.add_child(root, HEAD, ftyp)?;
    tree.add_child(root, HEAD, vrsn)?;

    // sndf
    let ipad = tree.add_capture(IPAD);
    let rcvp = tree.add_capture(RCVP);
    tree.add_child(root, SNDF, ipad)?;
    tree.add_child(root, SNDF, rcvp)?;

    // skdf
    let bons = tree.add_router(&[BONS]);
    let bndt = tree.add_router(&[BNDT]);
    let bnid = tree.add_capture(BNID);
    let pbid = tree.add_capture(PBID);
    tree.add_child(root, SKDF, bons)?;
    tree.add_child(bons, BONS, bndt)?;
    tree.add_child(bndt, BNDT, bnid)?;
    tree.add_child(bndt, BNDT, pbid)?;

    // fram
    let fnum = tree.add_capture(FNUM);
    let time = tree.add_capture(TIME);
    let btrs = tree.add_router(&[BTRS]);
    let btdt = tree.add_router(&[BTDT]);
    let tran = tree.add_capture(TRAN);
    tree.add_child(root, FRAM, fnum)?;
    tree.add_child(root, FRAM, time)?;
    tree.add_child(root, FRAM, btrs)?;
    tree.add_child(btrs, BTRS, btdt)?;
    tree.add_child(btdt, BTDT, bnid)?;
    tree.add_child(btdt, BTDT, tran)?;

    tree.subscribe(bons, Phase::Before, BONS, StreamEvent::Skeleton(SkeletonEvent::ResetTopology))?;
    tree.subscribe(bndt, Phase::Before, BNDT, StreamEvent::Skeleton(SkeletonEvent::BeginEntry))?;
    tree.subscribe(bndt, Phase::After, BNDT, StreamEvent::Skeleton(SkeletonEvent::LinkParent))?;
    tree.subscribe(btdt, Phase::Before, BTDT, StreamEvent::Skeleton(SkeletonEvent::BeginEntry))?;
    tree.subscribe(btdt, Phase::After, BTDT, StreamEvent::Skeleton(SkeletonEvent::ApplyTransform))?;

    let nodes = ProtocolNodes {
        root,
        metadata: MetadataNodes {
            format: ftyp,
            version: vrsn,
            sender_ip: ipad,
            sender_port: rcvp,
            frame_number: fnum,
            timestamp: time,
        },
        bones: BoneCaptures {
            bone_id: bnid,
            parent_id: pbid,
            transform: tran,
        },
    };
    Ok((tree, nodes))
}
