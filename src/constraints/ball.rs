use crate::constraints::{ConstraintMatrixPack, PhysicalInfo, Side};
use crate::math::Vec3;

#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};

/// Holds a point on body A at a point on body B
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct BallConstraint {
    /// Attachment point relative to A's reference frame
    pub attach_a: Vec3,

    /// Attachment point relative to B's reference frame
    pub attach_b: Vec3,
}

impl BallConstraint {
    pub const PARAMETER_COUNT: usize = 3;

    /// Creates a new ball constraint
    pub fn new(attach_a: Vec3, attach_b: Vec3) -> Self {
        Self { attach_a, attach_b }
    }

    pub(crate) fn attachment_mut(&mut self, side: Side) -> &mut Vec3 {
        match side {
            Side::A => &mut self.attach_a,
            Side::B => &mut self.attach_b,
        }
    }

    /// One equation per world axis: the points' separation and relative velocity
    pub fn matrices(&self, a: &PhysicalInfo, b: &PhysicalInfo) -> ConstraintMatrixPack {
        let mut pack = ConstraintMatrixPack::new(Self::PARAMETER_COUNT);
        push_ball_rows(&mut pack, a, &self.attach_a, b, &self.attach_b);
        pack
    }
}

pub(crate) fn push_ball_rows(
    pack: &mut ConstraintMatrixPack,
    a: &PhysicalInfo,
    attach_a: &Vec3,
    b: &PhysicalInfo,
    attach_b: &Vec3,
) {
    let (point_a, offset_a) = a.attachment_point(attach_a);
    let (point_b, offset_b) = b.attachment_point(attach_b);
    let separation = point_a - point_b;
    let relative_velocity = a.velocity_of_point(&offset_a) - b.velocity_of_point(&offset_b);

    for axis in [Vec3::x(), Vec3::y(), Vec3::z()] {
        pack.push_point_row(
            a,
            &offset_a,
            b,
            &offset_b,
            &axis,
            [axis.dot(&separation), axis.dot(&relative_velocity)],
        );
    }
}
