use crate::constraints::ball::push_ball_rows;
use crate::constraints::{ConstraintMatrixPack, PhysicalInfo, Side};
use crate::math::{orthogonal_basis, CFrame, Vec3};

#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};

/// A ball joint that also keeps the Z axes of both attachments parallel,
/// leaving rotation around that axis free
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct HingeConstraint {
    /// Attachment frame relative to A's reference frame
    pub attach_a: CFrame,

    /// Attachment frame relative to B's reference frame
    pub attach_b: CFrame,
}

impl HingeConstraint {
    pub const PARAMETER_COUNT: usize = 5;

    /// Creates a new hinge constraint
    pub fn new(attach_a: CFrame, attach_b: CFrame) -> Self {
        Self { attach_a, attach_b }
    }

    pub(crate) fn attachment_mut(&mut self, side: Side) -> &mut CFrame {
        match side {
            Side::A => &mut self.attach_a,
            Side::B => &mut self.attach_b,
        }
    }

    /// Three point equations plus two angular equations perpendicular to the hinge axis
    pub fn matrices(&self, a: &PhysicalInfo, b: &PhysicalInfo) -> ConstraintMatrixPack {
        let mut pack = ConstraintMatrixPack::new(Self::PARAMETER_COUNT);
        push_ball_rows(&mut pack, a, &self.attach_a.position, b, &self.attach_b.position);

        let axis_a = a.cframe.rotation * (self.attach_a.rotation * Vec3::z());
        let axis_b = b.cframe.rotation * (self.attach_b.rotation * Vec3::z());

        // Grows by one per radian A turns about u
        let misalignment = axis_b.cross(&axis_a);
        let relative_angular_velocity = a.motion.angular_velocity - b.motion.angular_velocity;

        let (u, v) = orthogonal_basis(&axis_a);
        for direction in [u, v] {
            pack.push_angular_row(
                a,
                b,
                &direction,
                [direction.dot(&misalignment), direction.dot(&relative_angular_velocity)],
            );
        }
        pack
    }
}
