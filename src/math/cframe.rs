use crate::math::{Rotation, Vec3};

#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};

/// A coordinate frame: a position and a rotation in 3D space
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct CFrame {
    /// Origin of the frame in the parent space
    pub position: Vec3,

    /// Orientation of the frame in the parent space
    pub rotation: Rotation,
}

impl Default for CFrame {
    fn default() -> Self {
        Self::identity()
    }
}

impl CFrame {
    /// Creates a new frame with the given position and rotation
    #[inline]
    pub fn new(position: Vec3, rotation: Rotation) -> Self {
        Self { position, rotation }
    }

    /// Creates the identity frame
    #[inline]
    pub fn identity() -> Self {
        Self {
            position: Vec3::zeros(),
            rotation: Rotation::identity(),
        }
    }

    /// Creates a frame at the given position with no rotation
    #[inline]
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            rotation: Rotation::identity(),
        }
    }

    /// Creates a frame at the origin with the given rotation
    #[inline]
    pub fn from_rotation(rotation: Rotation) -> Self {
        Self {
            position: Vec3::zeros(),
            rotation,
        }
    }

    /// Transforms a point from local space into the parent space
    #[inline]
    pub fn local_to_global(&self, local: &Vec3) -> Vec3 {
        self.position + self.rotation * local
    }

    /// Transforms a point from the parent space into local space
    #[inline]
    pub fn global_to_local(&self, global: &Vec3) -> Vec3 {
        self.rotation.inverse() * (global - self.position)
    }

    /// Rotates a local direction into the parent space (no translation)
    #[inline]
    pub fn local_to_relative(&self, local: &Vec3) -> Vec3 {
        self.rotation * local
    }

    /// Rotates a parent-space direction into local space (no translation)
    #[inline]
    pub fn relative_to_local(&self, relative: &Vec3) -> Vec3 {
        self.rotation.inverse() * relative
    }

    /// Composes a frame expressed in this frame's local space into the parent space
    #[inline]
    pub fn local_to_global_cframe(&self, local: &CFrame) -> CFrame {
        CFrame {
            position: self.local_to_global(&local.position),
            rotation: self.rotation * local.rotation,
        }
    }

    /// Expresses a parent-space frame in this frame's local space
    #[inline]
    pub fn global_to_local_cframe(&self, global: &CFrame) -> CFrame {
        let inv = self.rotation.inverse();
        CFrame {
            position: inv * (global.position - self.position),
            rotation: inv * global.rotation,
        }
    }

    /// Returns the inverse of this frame
    #[inline]
    pub fn inverse(&self) -> CFrame {
        let inv = self.rotation.inverse();
        CFrame {
            position: -(inv * self.position),
            rotation: inv,
        }
    }

    /// Moves the frame by `delta` in the parent space
    #[inline]
    pub fn translate(&mut self, delta: &Vec3) {
        self.position += delta;
    }

    /// Rotates the frame around `center` (parent space) by `rotation`
    #[inline]
    pub fn rotate_around(&mut self, center: &Vec3, rotation: &Rotation) {
        self.position = center + rotation * (self.position - center);
        self.rotation = rotation * self.rotation;
    }
}
