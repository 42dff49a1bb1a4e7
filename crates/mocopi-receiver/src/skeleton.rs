//! Skeleton reconstruction: bone topology and pose from streamed chunks.
//!
//! The skeleton never reads the wire itself. It reacts to `SkeletonEvent`s
//! fired by the dispatch tree and pulls what it needs out of capture nodes:
//!
//!   Before `bons`  → ResetTopology  (every bone loses its parent)
//!   Before `bndt`  → BeginEntry
//!   After  `bndt`  → LinkParent     (bnid's parent becomes pbid)
//!   Before `btdt`  → BeginEntry
//!   After  `btdt`  → ApplyTransform (bnid takes the pose in tran)
//!
//! BeginEntry records the dispatch stamp of the entry, and the After events
//! only accept captures stamped later, so an entry missing one of its
//! fields is skipped instead of reusing the previous entry's value.

use glam::{Affine3A, Quat, Vec3};
use serde::Serialize;

use mocopi_core::wire::{BoneIdWire, TransformWire, NUM_BONES, SCENE_SCALE};

use crate::capture::CaptureError;
use crate::pose::PoseNode;
use crate::tree::{DispatchTree, NodeId};

pub type BoneId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkeletonEvent {
    ResetTopology,
    BeginEntry,
    LinkParent,
    ApplyTransform,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SkeletonError {
    #[error("bone id {0} out of range 0..{NUM_BONES}")]
    OutOfRange(usize),

    #[error("parenting bone {child} to {parent} would create a cycle")]
    Cycle { child: BoneId, parent: BoneId },

    #[error("{0} is not a capture node")]
    NotACapture(NodeId),

    #[error(transparent)]
    Capture(#[from] CaptureError),
}

/// Capture nodes read when a definition or transform entry completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoneCaptures {
    pub bone_id: NodeId,
    pub parent_id: NodeId,
    pub transform: NodeId,
}

// ── Skeleton ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Skeleton {
    bones: [PoseNode; NUM_BONES],
    scene_scale: f32,
    entry_stamp: u64,
}

impl Default for Skeleton {
    fn default() -> Self {
        Self::new(SCENE_SCALE)
    }
}

impl Skeleton {
    pub fn new(scene_scale: f32) -> Self {
        Self {
            bones: [PoseNode::default(); NUM_BONES],
            scene_scale,
            entry_stamp: 0,
        }
    }

    pub fn scene_scale(&self) -> f32 {
        self.scene_scale
    }

    pub fn bones(&self) -> &[PoseNode] {
        &self.bones
    }

    pub fn bone(&self, id: BoneId) -> Option<&PoseNode> {
        self.bones.get(id)
    }

    fn check(id: usize) -> Result<BoneId, SkeletonError> {
        if id < NUM_BONES {
            Ok(id)
        } else {
            Err(SkeletonError::OutOfRange(id))
        }
    }

    /// Clear every parent link. Poses are kept.
    pub fn reset_topology(&mut self) {
        for bone in &mut self.bones {
            bone.clear_parent();
        }
    }

    /// Make `parent` the parent of `child`.
    ///
    /// Out-of-range ids and links that would close a loop leave the
    /// topology unchanged.
    pub fn set_parent(&mut self, child: usize, parent: usize) -> Result<(), SkeletonError> {
        let child = Self::check(child)?;
        let parent = Self::check(parent)?;
        if child == parent || self.parent_chain(parent).contains(&child) {
            return Err(SkeletonError::Cycle { child, parent });
        }
        self.bones[child].set_parent(parent);
        Ok(())
    }

    pub fn set_local_pose(&mut self, id: usize, position: Vec3, orientation: Quat) -> Result<(), SkeletonError> {
        let bone = &mut self.bones[Self::check(id)?];
        bone.set_position(position);
        bone.set_orientation(orientation);
        Ok(())
    }

    /// Pose bone `id` from a wire transform: position scaled into scene
    /// units, orientation reassembled with the trailing wire component as
    /// the scalar part and normalised.
    pub fn apply_transform(&mut self, id: usize, transform: &TransformWire) -> Result<(), SkeletonError> {
        let [x, y, z, w] = transform.orientation_xyzw();
        let position = Vec3::from_array(transform.position()) * self.scene_scale;
        self.set_local_pose(id, position, Quat::from_xyzw(x, y, z, w))
    }

    /// Ancestors of `id`, nearest first. Empty for a root or unknown bone.
    pub fn parent_chain(&self, id: BoneId) -> Vec<BoneId> {
        let mut chain = Vec::new();
        let mut current = self.bones.get(id).and_then(PoseNode::parent);
        // links are acyclic, the bound only guards against a broken invariant
        while let Some(parent) = current {
            if chain.len() == NUM_BONES {
                break;
            }
            chain.push(parent);
            current = self.bones[parent].parent();
        }
        chain
    }

    /// World transform of `id`: the root's local transform composed with
    /// each descendant's down to `id`.
    pub fn global_transform(&self, id: BoneId) -> Option<Affine3A> {
        let bone = self.bones.get(id)?;
        let parents = self
            .parent_chain(id)
            .iter()
            .rev()
            .fold(Affine3A::IDENTITY, |acc, &p| acc * self.bones[p].local_transform());
        Some(parents * bone.local_transform())
    }

    pub fn global_position(&self, id: BoneId) -> Option<Vec3> {
        self.global_transform(id).map(|t| Vec3::from(t.translation))
    }

    // ── Events ───────────────────────────────────────────────────────────────

    pub fn handle_event<E: Copy>(
        &mut self,
        event: SkeletonEvent,
        tree: &DispatchTree<E>,
        captures: &BoneCaptures,
    ) -> Result<(), SkeletonError> {
        match event {
            SkeletonEvent::ResetTopology => {
                self.reset_topology();
                Ok(())
            }
            SkeletonEvent::BeginEntry => {
                self.entry_stamp = tree.clock();
                Ok(())
            }
            SkeletonEvent::LinkParent => {
                let child = self.read_fresh::<BoneIdWire, _>(tree, captures.bone_id)?.get();
                let parent = self.read_fresh::<BoneIdWire, _>(tree, captures.parent_id)?.get();
                self.set_parent(child as usize, parent as usize)
            }
            SkeletonEvent::ApplyTransform => {
                let id = self.read_fresh::<BoneIdWire, _>(tree, captures.bone_id)?.get();
                let transform = self.read_fresh::<TransformWire, _>(tree, captures.transform)?;
                self.apply_transform(id as usize, &transform)
            }
        }
    }

    fn read_fresh<T: zerocopy::FromBytes, E: Copy>(
        &self,
        tree: &DispatchTree<E>,
        node: NodeId,
    ) -> Result<T, SkeletonError> {
        let capture = tree.capture(node).ok_or(SkeletonError::NotACapture(node))?;
        Ok(capture.read_since(self.entry_stamp)?)
    }

    // ── Snapshots ────────────────────────────────────────────────────────────

    /// Owned copy of the current pose, safe to hand to another thread.
    pub fn snapshot(&self) -> SkeletonSnapshot {
        let bones = self
            .bones
            .iter()
            .enumerate()
            .map(|(id, bone)| BoneSnapshot {
                id,
                parent: bone.parent(),
                position: bone.position().to_array(),
                orientation: bone.orientation().to_array(),
                global_position: self
                    .global_position(id)
                    .unwrap_or(Vec3::ZERO)
                    .to_array(),
            })
            .collect();
        SkeletonSnapshot { bones }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoneSnapshot {
    pub id: BoneId,
    pub parent: Option<BoneId>,
    pub position: [f32; 3],
    /// x, y, z, w. Unit length: the wire quaternion normalised, not the
    /// raw wire values.
    pub orientation: [f32; 4],
    pub global_position: [f32; 3],
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkeletonSnapshot {
    pub bones: Vec<BoneSnapshot>,
}

// ── Tests ─────────────────────────────────────────────────────────────────────
