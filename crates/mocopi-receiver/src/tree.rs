//! Hierarchical dispatch tree: routes nested chunks to handler nodes.
//!
//! Nodes live in an arena owned by the tree and refer to each other by
//! `NodeId`. A node accepts a fixed set of tags. When it accepts a chunk
//! it fires its `Before` subscriptions for that tag, decodes the payload,
//! rescans the payload as nested chunks for every child registered under
//! that tag, and finally fires its `After` subscriptions. Subscribers are
//! plain event values handed to the caller's handler, so the tree never
//! holds references into the state the events mutate.
//!
//! A node may be registered as a child of several parents. Registrations
//! that would make a node reachable from itself are refused, so dispatch
//! always terminates.
//!
//! Dispatch itself rescans nested payloads leniently. `validate_nested`
//! walks the same routes without side effects and rejects any container
//! payload that is not exactly covered by its chunks, so a caller can
//! refuse a datagram before any of it is applied.

use std::fmt;

use mocopi_core::{scan_chunks, validate, Chunk, FrameError, Tag};

use crate::capture::Capture;

// ── Identifiers ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

/// When a subscription fires relative to the chunk it watches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Before the chunk is decoded and before any nested chunk is visited.
    Before,
    /// After the chunk and everything nested inside it has been visited.
    After,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subscription<E> {
    pub phase: Phase,
    pub tag: Tag,
    pub event: E,
}

// ── Nodes ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub enum NodeKind {
    /// Decodes nothing; exists to route nested chunks to children.
    Router,
    /// Stores the payload of its tag.
    Capture(Capture),
}

#[derive(Debug, Clone)]
pub struct Node<E> {
    accept: Vec<Tag>,
    kind: NodeKind,
    children: Vec<(Tag, NodeId)>,
    subscriptions: Vec<Subscription<E>>,
}

impl<E> Node<E> {
    pub fn accepts(&self, tag: Tag) -> bool {
        self.accept.contains(&tag)
    }

    pub fn accepted_tags(&self) -> &[Tag] {
        &self.accept
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    /// Children registered under `tag`, in registration order.
    pub fn children_of(&self, tag: Tag) -> impl Iterator<Item = NodeId> + '_ {
        self.children
            .iter()
            .filter(move |(t, _)| *t == tag)
            .map(|(_, child)| *child)
    }

    pub fn subscriptions(&self) -> &[Subscription<E>] {
        &self.subscriptions
    }

    fn decode(&mut self, payload: &[u8], stamp: u64) {
        match &mut self.kind {
            NodeKind::Router => {}
            NodeKind::Capture(capture) => capture.store(payload, stamp),
        }
    }
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TreeError {
    #[error("{0} does not belong to this tree")]
    UnknownNode(NodeId),

    #[error("{node} does not accept {tag}")]
    NotAccepted { node: NodeId, tag: Tag },

    #[error("registering {child} under {parent} would create a cycle")]
    Cycle { parent: NodeId, child: NodeId },

    #[error("{child} is already registered under {parent} for {tag}")]
    Duplicate {
        parent: NodeId,
        tag: Tag,
        child: NodeId,
    },

    #[error("no root node set")]
    NoRoot,

    #[error("no node accepts {0}")]
    Unrouted(Tag),

    #[error("malformed {tag} payload: {source}")]
    Malformed { tag: Tag, source: FrameError },
}

// ── Tree ──────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct DispatchTree<E> {
    nodes: Vec<Node<E>>,
    root: Option<NodeId>,
    /// Incremented on every accepted chunk; stamps captured payloads.
    clock: u64,
}

impl<E> Default for DispatchTree<E> {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            root: None,
            clock: 0,
        }
    }
}

impl<E: Copy> DispatchTree<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Add a pass-through node accepting `accept`.
    pub fn add_router(&mut self, accept: &[Tag]) -> NodeId {
        self.push(accept.to_vec(), NodeKind::Router)
    }

    /// Add a capture leaf for `tag`.
    pub fn add_capture(&mut self, tag: Tag) -> NodeId {
        self.push(vec![tag], NodeKind::Capture(Capture::new(tag)))
    }

    fn push(&mut self, accept: Vec<Tag>, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            accept,
            kind,
            children: Vec::new(),
            subscriptions: Vec::new(),
        });
        id
    }

    pub fn set_root(&mut self, id: NodeId) -> Result<(), TreeError> {
        self.check(id)?;
        self.root = Some(id);
        Ok(())
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    /// Stamp of the most recently accepted chunk.
    ///
    /// Read from a `Before` handler, this is the stamp of the chunk being
    /// entered; every payload captured inside it carries a larger stamp.
    pub fn clock(&self) -> u64 {
        self.clock
    }

    pub fn node(&self, id: NodeId) -> Option<&Node<E>> {
        self.nodes.get(id.0)
    }

    pub fn capture(&self, id: NodeId) -> Option<&Capture> {
        match &self.node(id)?.kind {
            NodeKind::Capture(capture) => Some(capture),
            NodeKind::Router => None,
        }
    }

    fn check(&self, id: NodeId) -> Result<&Node<E>, TreeError> {
        self.nodes.get(id.0).ok_or(TreeError::UnknownNode(id))
    }

    /// Deliver the nested payload of every `parent_tag` chunk accepted by
    /// `parent` to `child`.
    pub fn add_child(&mut self, parent: NodeId, parent_tag: Tag, child: NodeId) -> Result<(), TreeError> {
        let parent_node = self.check(parent)?;
        self.check(child)?;
        if !parent_node.accepts(parent_tag) {
            return Err(TreeError::NotAccepted {
                node: parent,
                tag: parent_tag,
            });
        }
        if parent_node.children_of(parent_tag).any(|c| c == child) {
            return Err(TreeError::Duplicate {
                parent,
                tag: parent_tag,
                child,
            });
        }
        if child == parent || self.reaches(child, parent) {
            return Err(TreeError::Cycle { parent, child });
        }
        self.nodes[parent.0].children.push((parent_tag, child));
        Ok(())
    }

    /// True if `target` is a descendant of `from`.
    fn reaches(&self, from: NodeId, target: NodeId) -> bool {
        let mut stack = vec![from];
        let mut seen = vec![false; self.nodes.len()];
        while let Some(id) = stack.pop() {
            if std::mem::replace(&mut seen[id.0], true) {
                continue;
            }
            for &(_, child) in &self.nodes[id.0].children {
                if child == target {
                    return true;
                }
                stack.push(child);
            }
        }
        false
    }

    /// Emit `event` when `node` reaches `phase` for a `tag` chunk.
    /// Events for the same node, phase and tag fire in subscription order.
    pub fn subscribe(&mut self, node: NodeId, phase: Phase, tag: Tag, event: E) -> Result<(), TreeError> {
        if !self.check(node)?.accepts(tag) {
            return Err(TreeError::NotAccepted { node, tag });
        }
        self.nodes[node.0]
            .subscriptions
            .push(Subscription { phase, tag, event });
        Ok(())
    }

    /// Drop every subscription on `node` that emits `event`. Returns how
    /// many were removed.
    pub fn unsubscribe(&mut self, node: NodeId, event: E) -> usize
    where
        E: PartialEq,
    {
        let Some(node) = self.nodes.get_mut(node.0) else {
            return 0;
        };
        let before = node.subscriptions.len();
        node.subscriptions.retain(|sub| sub.event != event);
        before - node.subscriptions.len()
    }

    /// First node, in creation order, that accepts `tag`.
    pub fn find(&self, tag: Tag) -> Option<NodeId> {
        self.nodes
            .iter()
            .position(|node| node.accepts(tag))
            .map(NodeId)
    }

    /// Forget every captured payload.
    pub fn clear_captures(&mut self) {
        for node in &mut self.nodes {
            if let NodeKind::Capture(capture) = &mut node.kind {
                capture.clear();
            }
        }
    }

    /// Forget the payload held by one capture node.
    pub fn clear_capture(&mut self, id: NodeId) {
        if let Some(Node {
            kind: NodeKind::Capture(capture),
            ..
        }) = self.nodes.get_mut(id.0)
        {
            capture.clear();
        }
    }

    /// Dispatch every top-level chunk of `buf` to the root.
    ///
    /// Returns the number of top-level chunks the root accepted.
    pub fn dispatch<F>(&mut self, buf: &[u8], handler: &mut F) -> Result<usize, TreeError>
    where
        F: FnMut(E, &DispatchTree<E>),
    {
        let root = self.root.ok_or(TreeError::NoRoot)?;
        let mut accepted = 0;
        for chunk in scan_chunks(buf) {
            if self.visit(root, chunk, handler) {
                accepted += 1;
            }
        }
        Ok(accepted)
    }

    /// Check every container payload that `dispatch` would rescan.
    ///
    /// The top level of `buf` is not checked here; run `validate` on it
    /// first. Chunks no node accepts, and leaves with no children, are
    /// opaque and pass unchecked.
    pub fn validate_nested(&self, buf: &[u8]) -> Result<(), TreeError> {
        let root = self.root.ok_or(TreeError::NoRoot)?;
        for chunk in scan_chunks(buf) {
            self.validate_chunk(root, chunk)?;
        }
        Ok(())
    }

    fn validate_chunk(&self, id: NodeId, chunk: Chunk<'_>) -> Result<(), TreeError> {
        let node = &self.nodes[id.0];
        if !node.accepts(chunk.tag) {
            return Ok(());
        }
        let mut children = node.children_of(chunk.tag).peekable();
        if children.peek().is_none() {
            return Ok(());
        }
        validate(chunk.payload).map_err(|source| TreeError::Malformed {
            tag: chunk.tag,
            source,
        })?;
        for child in children {
            for nested in scan_chunks(chunk.payload) {
                self.validate_chunk(child, nested)?;
            }
        }
        Ok(())
    }

    fn visit<F>(&mut self, id: NodeId, chunk: Chunk<'_>, handler: &mut F) -> bool
    where
        F: FnMut(E, &DispatchTree<E>),
    {
        if !self.nodes[id.0].accepts(chunk.tag) {
            tracing::trace!(node = %id, tag = %chunk.tag, "tag not accepted, skipping");
            return false;
        }

        self.clock += 1;
        self.fire(id, Phase::Before, chunk.tag, handler);
        self.nodes[id.0].decode(chunk.payload, self.clock);

        let children: Vec<NodeId> = self.nodes[id.0].children_of(chunk.tag).collect();
        if !children.is_empty() {
            for nested in scan_chunks(chunk.payload) {
                for &child in &children {
                    self.visit(child, nested, handler);
                }
            }
        }

        self.fire(id, Phase::After, chunk.tag, handler);
        true
    }

    fn fire<F>(&self, id: NodeId, phase: Phase, tag: Tag, handler: &mut F)
    where
        F: FnMut(E, &DispatchTree<E>),
    {
        for sub in &self.nodes[id.0].subscriptions {
            if sub.phase == phase && sub.tag == tag {
                handler(sub.event, self);
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
