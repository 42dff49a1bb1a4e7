//! Stream metadata: header, sender and frame fields read from captures.

use std::fmt;
use std::net::Ipv4Addr;

use serde::Serialize;

use mocopi_core::wire::{CounterWire, Ipv4Wire, PortWire, VersionWire};

use crate::capture::CaptureError;
use crate::tree::{DispatchTree, NodeId};

/// Capture nodes holding the metadata fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetadataNodes {
    pub format: NodeId,
    pub version: NodeId,
    pub sender_ip: NodeId,
    pub sender_port: NodeId,
    pub frame_number: NodeId,
    pub timestamp: NodeId,
}

/// Latest decoded value of each metadata field. `None` until first seen.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StreamMetadata {
    pub format: Option<String>,
    pub version: Option<u8>,
    pub sender_ip: Option<Ipv4Addr>,
    pub sender_port: Option<u16>,
    pub frame_number: Option<u32>,
    pub timestamp: Option<u32>,
}

impl StreamMetadata {
    pub fn from_tree<E: Copy>(tree: &DispatchTree<E>, nodes: &MetadataNodes) -> Self {
        let format = tree
            .capture(nodes.format)
            .map(|c| c.text())
            .and_then(field);
        let version = read::<VersionWire, _>(tree, nodes.version);
        let sender_ip = read::<Ipv4Wire, _>(tree, nodes.sender_ip).map(Ipv4Addr::from);
        let sender_port = read::<PortWire, _>(tree, nodes.sender_port).map(|p| p.get());
        let frame_number = read::<CounterWire, _>(tree, nodes.frame_number).map(|n| n.get());
        let timestamp = read::<CounterWire, _>(tree, nodes.timestamp).map(|t| t.get());

        Self {
            format,
            version,
            sender_ip,
            sender_port,
            frame_number,
            timestamp,
        }
    }
}

fn read<T: zerocopy::FromBytes, E: Copy>(tree: &DispatchTree<E>, node: NodeId) -> Option<T> {
    tree.capture(node).map(|c| c.read::<T>()).and_then(field)
}

fn field<T>(result: Result<T, CaptureError>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(CaptureError::NotDecoded(_)) => None,
        Err(e) => {
            tracing::debug!(error = %e, "metadata field unreadable");
            None
        }
    }
}

impl fmt::Display for StreamMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn show<T: fmt::Display>(v: &Option<T>) -> String {
            v.as_ref().map_or_else(|| "-".to_string(), T::to_string)
        }
        write!(
            f,
            "ftyp={} vrsn={} ipad={} rcvp={} fnum={} time={}",
            show(&self.format),
            show(&self.version),
            show(&self.sender_ip),
            show(&self.sender_port),
            show(&self.frame_number),
            show(&self.timestamp),
        )
    }
}
