//! Ingestion loop: bind, drain queued datagrams once per tick, dispatch.
//!
//! Nothing blocks. `update` is meant to be called once per frame of the
//! host loop; it drains whatever the transport has queued and returns.
//! A datagram is dispatched only if it passes whole-buffer validation,
//! down through every container the tree routes, so a corrupt datagram
//! never leaves a partial pose behind.
//!
//! Hosts can register observers on any routed tag. An observer runs inside
//! dispatch, after the skeleton has handled the same hook, and sees the
//! tree's captures as they are at that moment.

use serde::Serialize;

use mocopi_core::{validate, FrameError, Tag};

use crate::metadata::StreamMetadata;
use crate::pose::PoseNode;
use crate::protocol::{build_tree, ObserverId, ProtocolNodes, StreamEvent};
use crate::skeleton::{Skeleton, SkeletonSnapshot};
use crate::transport::{Transport, TransportError, UdpTransport};
use crate::tree::{DispatchTree, NodeId, Phase, TreeError};

/// Bytes of a rejected datagram included in the warning.
const LOG_PREFIX: usize = 16;

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("empty datagram")]
    Empty,

    #[error("malformed datagram: {0}")]
    Frame(#[from] FrameError),

    #[error(transparent)]
    Tree(#[from] TreeError),
}

/// Outcome of one `update` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TickStats {
    pub accepted: usize,
    pub rejected: usize,
    pub bytes: usize,
}

/// Running totals since the receiver was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReceiverStats {
    pub ticks: u64,
    pub accepted: u64,
    pub rejected: u64,
    pub bytes: u64,
}

impl ReceiverStats {
    fn record(&mut self, tick: &TickStats) {
        self.ticks += 1;
        self.accepted += tick.accepted as u64;
        self.rejected += tick.rejected as u64;
        self.bytes += tick.bytes as u64;
    }
}

/// Everything an observer needs, detached from the receiver.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReceiverSnapshot {
    pub port: Option<u16>,
    pub metadata: StreamMetadata,
    pub stats: ReceiverStats,
    pub skeleton: SkeletonSnapshot,
}

// ── Observers ─────────────────────────────────────────────────────────────────

/// Callback run when a watched hook fires. The skeleton already reflects
/// every skeleton event up to this point of the datagram.
pub type Observer = Box<dyn FnMut(&DispatchTree<StreamEvent>, &Skeleton) + Send>;

struct Registered {
    id: ObserverId,
    node: NodeId,
    callback: Observer,
}

// ── Stream state ──────────────────────────────────────────────────────────────

/// Dispatch tree plus the skeleton and observers it drives.
struct StreamState {
    tree: DispatchTree<StreamEvent>,
    nodes: ProtocolNodes,
    skeleton: Skeleton,
    observers: Vec<Registered>,
    next_observer: u64,
}

impl StreamState {
    fn new(scene_scale: f32) -> Result<Self, TreeError> {
        let (tree, nodes) = build_tree()?;
        Ok(Self {
            tree,
            nodes,
            skeleton: Skeleton::new(scene_scale),
            observers: Vec::new(),
            next_observer: 0,
        })
    }

    fn observe(&mut self, phase: Phase, tag: Tag, callback: Observer) -> Result<ObserverId, TreeError> {
        let node = self.tree.find(tag).ok_or(TreeError::Unrouted(tag))?;
        let id = ObserverId(self.next_observer);
        self.tree.subscribe(node, phase, tag, StreamEvent::Observer(id))?;
        self.next_observer += 1;
        self.observers.push(Registered { id, node, callback });
        tracing::debug!(observer = %id, %node, %tag, ?phase, "observer registered");
        Ok(id)
    }

    fn remove_observer(&mut self, id: ObserverId) -> bool {
        let Some(index) = self.observers.iter().position(|o| o.id == id) else {
            return false;
        };
        let registered = self.observers.remove(index);
        self.tree.unsubscribe(registered.node, StreamEvent::Observer(id));
        tracing::debug!(observer = %id, "observer removed");
        true
    }

    fn add_capture(&mut self, parent_tag: Tag, tag: Tag) -> Result<NodeId, TreeError> {
        let parent = self
            .tree
            .find(parent_tag)
            .ok_or(TreeError::Unrouted(parent_tag))?;
        let node = self.tree.add_capture(tag);
        self.tree.add_child(parent, parent_tag, node)?;
        tracing::debug!(%node, %parent_tag, %tag, "capture attached");
        Ok(node)
    }

    fn reset(&mut self) {
        self.tree.clear_captures();
        self.skeleton = Skeleton::new(self.skeleton.scene_scale());
    }

    fn ingest(&mut self, datagram: &[u8]) -> Result<usize, IngestError> {
        if datagram.is_empty() {
            return Err(IngestError::Empty);
        }
        validate(datagram)?;
        self.tree.validate_nested(datagram)?;

        let skeleton = &mut self.skeleton;
        let observers = &mut self.observers;
        let bones = self.nodes.bones;
        let visited = self.tree.dispatch(datagram, &mut |event, tree: &DispatchTree<StreamEvent>| match event {
            StreamEvent::Skeleton(event) => {
                if let Err(e) = skeleton.handle_event(event, tree, &bones) {
                    tracing::debug!(?event, error = %e, "skeleton event skipped");
                }
            }
            StreamEvent::Observer(id) => {
                if let Some(observer) = observers.iter_mut().find(|o| o.id == id) {
                    (observer.callback)(tree, &*skeleton);
                }
            }
        })?;
        Ok(visited)
    }
}

// ── Receiver ──────────────────────────────────────────────────────────────────

pub struct Receiver<T: Transport = UdpTransport> {
    transport: Option<T>,
    state: StreamState,
    buf: Vec<u8>,
    stats: ReceiverStats,
}

impl<T: Transport> Receiver<T> {
    /// An unbound receiver. Call `setup` to start listening.
    pub fn new(scene_scale: f32) -> Result<Self, TreeError> {
        Ok(Self {
            transport: None,
            state: StreamState::new(scene_scale)?,
            buf: Vec::new(),
            stats: ReceiverStats::default(),
        })
    }

    /// A receiver reading from an already bound transport.
    pub fn with_transport(scene_scale: f32, transport: T) -> Result<Self, TreeError> {
        let mut receiver = Self::new(scene_scale)?;
        receiver.transport = Some(transport);
        Ok(receiver)
    }

    /// Bind to `port`, closing any previous binding first. Decoded state
    /// from the previous stream is discarded. On failure the receiver is
    /// left unbound.
    pub fn setup(&mut self, port: u16) -> Result<(), TransportError> {
        self.close();
        self.state.reset();

        match T::bind(port) {
            Ok(transport) => {
                tracing::info!(port = transport.local_port(), "mocopi receiver bound");
                self.transport = Some(transport);
                Ok(())
            }
            Err(e) => {
                tracing::warn!(port, error = %e, "mocopi receiver bind failed");
                Err(e)
            }
        }
    }

    /// Release the transport. Returns whether one was bound.
    pub fn close(&mut self) -> bool {
        match self.transport.take() {
            Some(transport) => {
                tracing::debug!(port = transport.local_port(), "mocopi receiver closed");
                true
            }
            None => false,
        }
    }

    pub fn is_bound(&self) -> bool {
        self.transport.is_some()
    }

    /// The bound port, if any.
    pub fn port(&self) -> Option<u16> {
        self.transport.as_ref().map(T::local_port)
    }

    pub fn transport_mut(&mut self) -> Option<&mut T> {
        self.transport.as_mut()
    }

    /// Drain every queued datagram. Malformed or empty datagrams are logged
    /// and dropped; the rest of the backlog is still processed.
    pub fn update(&mut self) -> TickStats {
        let mut tick = TickStats::default();
        let Some(transport) = self.transport.as_mut() else {
            return tick;
        };

        loop {
            let available = match transport.available() {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) => {
                    tracing::warn!(error = %e, "transport query failed");
                    break;
                }
            };

            self.buf.resize(available, 0);
            let received = match transport.receive(&mut self.buf) {
                Ok(n) => n,
                Err(e) => {
                    tracing::warn!(error = %e, "receive failed");
                    break;
                }
            };

            let datagram = &self.buf[..received];
            match self.state.ingest(datagram) {
                Ok(visited) => {
                    tick.accepted += 1;
                    tick.bytes += received;
                    tracing::trace!(len = received, visited, "datagram dispatched");
                }
                Err(e) => {
                    tick.rejected += 1;
                    tracing::warn!(
                        announced = available,
                        received,
                        head = hex::encode(&datagram[..received.min(LOG_PREFIX)]),
                        error = %e,
                        "discarding datagram"
                    );
                }
            }
        }

        self.stats.record(&tick);
        tick
    }

    /// Validate and dispatch one datagram directly, bypassing the transport.
    pub fn ingest(&mut self, datagram: &[u8]) -> Result<(), IngestError> {
        self.state.ingest(datagram).map(|_| ())
    }

    /// Run `callback` whenever the node routing `tag` reaches `phase` for
    /// a `tag` chunk. Observers survive `setup` and fire in registration
    /// order after the skeleton's own handling of the same hook.
    pub fn on_event<F>(&mut self, phase: Phase, tag: Tag, callback: F) -> Result<ObserverId, TreeError>
    where
        F: FnMut(&DispatchTree<StreamEvent>, &Skeleton) + Send + 'static,
    {
        self.state.observe(phase, tag, Box::new(callback))
    }

    /// Returns whether `id` was registered.
    pub fn remove_observer(&mut self, id: ObserverId) -> bool {
        self.state.remove_observer(id)
    }

    /// Capture `tag` chunks nested inside `parent_tag` chunks. The tag may
    /// be one the protocol tree does not know; read it back through
    /// `tree().capture(node)` or from an observer.
    pub fn add_capture(&mut self, parent_tag: Tag, tag: Tag) -> Result<NodeId, TreeError> {
        self.state.add_capture(parent_tag, tag)
    }

    pub fn skeleton(&self) -> &Skeleton {
        &self.state.skeleton
    }

    pub fn bones(&self) -> &[PoseNode] {
        self.state.skeleton.bones()
    }

    pub fn tree(&self) -> &DispatchTree<StreamEvent> {
        &self.state.tree
    }

    pub fn nodes(&self) -> &ProtocolNodes {
        &self.state.nodes
    }

    pub fn metadata(&self) -> StreamMetadata {
        StreamMetadata::from_tree(&self.state.tree, &self.state.nodes.metadata)
    }

    pub fn stats(&self) -> ReceiverStats {
        self.stats
    }

    pub fn snapshot(&self) -> ReceiverSnapshot {
        ReceiverSnapshot {
            port: self.port(),
            metadata: self.metadata(),
            stats: self.stats,
            skeleton: self.state.skeleton.snapshot(),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
