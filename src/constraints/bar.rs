use crate::constraints::{ConstraintMatrixPack, PhysicalInfo, Side};
use crate::math::{Vec3, EPSILON};

#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};

/// Keeps two points at a fixed distance, like a rigid rod hinged at both ends
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct BarConstraint {
    /// Attachment point relative to A's reference frame
    pub attach_a: Vec3,

    /// Attachment point relative to B's reference frame
    pub attach_b: Vec3,

    /// Rest length of the bar
    pub length: f64,
}

impl BarConstraint {
    pub const PARAMETER_COUNT: usize = 1;

    /// Creates a new bar constraint
    pub fn new(attach_a: Vec3, attach_b: Vec3, length: f64) -> Self {
        Self {
            attach_a,
            attach_b,
            length: length.max(0.0),
        }
    }

    pub(crate) fn attachment_mut(&mut self, side: Side) -> &mut Vec3 {
        match side {
            Side::A => &mut self.attach_a,
            Side::B => &mut self.attach_b,
        }
    }

    /// One equation along the bar: length error and rate of stretching
    pub fn matrices(&self, a: &PhysicalInfo, b: &PhysicalInfo) -> ConstraintMatrixPack {
        let (point_a, offset_a) = a.attachment_point(&self.attach_a);
        let (point_b, offset_b) = b.attachment_point(&self.attach_b);
        let delta = point_a - point_b;
        let distance = delta.norm();

        // Coincident points have no bar direction; any axis keeps the system well formed
        let direction = if distance > EPSILON { delta / distance } else { Vec3::x() };
        let relative_velocity = a.velocity_of_point(&offset_a) - b.velocity_of_point(&offset_b);

        let mut pack = ConstraintMatrixPack::new(Self::PARAMETER_COUNT);
        pack.push_point_row(
            a,
            &offset_a,
            b,
            &offset_b,
            &direction,
            [distance - self.length, direction.dot(&relative_velocity)],
        );
        pack
    }
}
