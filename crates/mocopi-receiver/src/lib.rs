//! mocopi-receiver: dispatch tree, skeleton reconstruction and the
//! non-blocking UDP ingestion loop.

pub mod capture;
pub mod metadata;
pub mod pose;
pub mod protocol;
pub mod receiver;
pub mod skeleton;
pub mod transport;
pub mod tree;

pub use capture::{Capture, CaptureError};
pub use metadata::StreamMetadata;
pub use pose::PoseNode;
pub use protocol::{ObserverId, ProtocolNodes, StreamEvent};
pub use receiver::{IngestError, Observer, Receiver, ReceiverSnapshot, ReceiverStats, TickStats};
pub use skeleton::{BoneId, Skeleton, SkeletonError, SkeletonEvent, SkeletonSnapshot};
pub use transport::{MemoryTransport, Transport, TransportError, UdpTransport};
pub use tree::{DispatchTree, NodeId, Phase, TreeError};
