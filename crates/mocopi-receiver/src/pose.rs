//! Pose node: local transform plus an optional parent reference.

use glam::{Affine3A, Quat, Vec3};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PoseNode {
    position: Vec3,
    orientation: Quat,
    parent: Option<usize>,
}

impl Default for PoseNode {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            orientation: Quat::IDENTITY,
            parent: None,
        }
    }
}

impl PoseNode {
    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn orientation(&self) -> Quat {
        self.orientation
    }

    pub fn parent(&self) -> Option<usize> {
        self.parent
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
    }

    /// Store `orientation` scaled to unit length, so `orientation()` may
    /// differ from the value passed in (and from the wire value it came
    /// from). A zero, infinite or NaN quaternion becomes the identity.
    pub fn set_orientation(&mut self, orientation: Quat) {
        let length = orientation.length();
        self.orientation = if length.is_finite() && length > f32::EPSILON {
            orientation.normalize()
        } else {
            Quat::IDENTITY
        };
    }

    pub fn set_parent(&mut self, parent: usize) {
        self.parent = Some(parent);
    }

    pub fn clear_parent(&mut self) {
        self.parent = None;
    }

    /// Translation after rotation, relative to the parent.
    pub fn local_transform(&self) -> Affine3A {
        Affine3A::from_rotation_translation(self.orientation, self.position)
    }
}
