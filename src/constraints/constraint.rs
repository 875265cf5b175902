use crate::bodies::MotorizedPhysical;
use crate::constraints::{
    BallConstraint, BarConstraint, ConstantSpeedProfile, HingeConstraint, MotorConstraint, SinusoidalProfile,
};
use crate::math::{CFrame, Mat3, Motion, Vec3};
use nalgebra::DMatrix;

#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};

/// Kinematic snapshot of one end of a constraint
#[derive(Debug, Clone, Copy)]
pub struct PhysicalInfo {
    /// Frame of the root main part, which attachments are relative to
    pub cframe: CFrame,

    /// Motion of the center of mass
    pub motion: Motion,

    /// Inverse mass, zero when anchored
    pub inverse_mass: f64,

    /// Inverse inertia in world orientation, zero when anchored
    pub inverse_inertia: Mat3,

    /// Center of mass in world space
    pub center_of_mass: Vec3,
}

impl PhysicalInfo {
    /// Takes a snapshot of a motorized physical
    pub fn of(physical: &MotorizedPhysical) -> Self {
        Self {
            cframe: *physical.cframe(),
            motion: *physical.motion(),
            inverse_mass: physical.inverse_mass(),
            inverse_inertia: physical.inverse_inertia(),
            center_of_mass: physical.center_of_mass(),
        }
    }

    /// Places a local attachment point in world space; returns the point and its offset from the center of mass
    pub fn attachment_point(&self, local: &Vec3) -> (Vec3, Vec3) {
        let point = self.cframe.local_to_global(local);
        (point, point - self.center_of_mass)
    }

    /// Velocity of the point at `offset` from the center of mass
    pub fn velocity_of_point(&self, offset: &Vec3) -> Vec3 {
        self.motion.velocity_of_point(offset)
    }
}

/// Matrices one constraint contributes to the group system.
///
/// Motion vectors are 6-DOF `[linear; angular]`. The parameter-to-motion
/// matrices are 6×k, the motion-to-equation matrices k×6, and the error is k×2
/// with the position error in column 0 and its derivative in column 1.
#[derive(Debug, Clone)]
pub struct ConstraintMatrixPack {
    /// Motion of body A caused by a unit of each parameter
    pub parameter_to_motion_a: DMatrix<f64>,

    /// Motion of body B caused by a unit of each parameter, before the sign flip
    pub parameter_to_motion_b: DMatrix<f64>,

    /// Rate of change of each equation per unit motion of body A
    pub motion_to_equation_a: DMatrix<f64>,

    /// Rate of change of each equation per unit motion of body B, before the sign flip
    pub motion_to_equation_b: DMatrix<f64>,

    /// Current violation and its time derivative
    pub error: DMatrix<f64>,

    filled: usize,
}

impl ConstraintMatrixPack {
    /// Creates a zeroed pack for `parameter_count` equations
    pub fn new(parameter_count: usize) -> Self {
        Self {
            parameter_to_motion_a: DMatrix::zeros(6, parameter_count),
            parameter_to_motion_b: DMatrix::zeros(6, parameter_count),
            motion_to_equation_a: DMatrix::zeros(parameter_count, 6),
            motion_to_equation_b: DMatrix::zeros(parameter_count, 6),
            error: DMatrix::zeros(parameter_count, 2),
            filled: 0,
        }
    }

    /// Number of equations in the pack
    pub fn parameter_count(&self) -> usize {
        self.error.nrows()
    }

    /// Adds an equation constraining the relative velocity of two points along `direction`.
    ///
    /// The parameter is an impulse along `direction` at the two points.
    pub(crate) fn push_point_row(
        &mut self,
        a: &PhysicalInfo,
        offset_a: &Vec3,
        b: &PhysicalInfo,
        offset_b: &Vec3,
        direction: &Vec3,
        error: [f64; 2],
    ) {
        let row = self.filled;
        let arm_a = offset_a.cross(direction);
        let arm_b = offset_b.cross(direction);
        let linear_a = direction * a.inverse_mass;
        let linear_b = direction * b.inverse_mass;
        let angular_a = a.inverse_inertia * arm_a;
        let angular_b = b.inverse_inertia * arm_b;

        for i in 0..3 {
            self.parameter_to_motion_a[(i, row)] = linear_a[i];
            self.parameter_to_motion_a[(i + 3, row)] = angular_a[i];
            self.parameter_to_motion_b[(i, row)] = linear_b[i];
            self.parameter_to_motion_b[(i + 3, row)] = angular_b[i];

            self.motion_to_equation_a[(row, i)] = direction[i];
            self.motion_to_equation_a[(row, i + 3)] = arm_a[i];
            self.motion_to_equation_b[(row, i)] = direction[i];
            self.motion_to_equation_b[(row, i + 3)] = arm_b[i];
        }
        self.set_error(row, error);
    }

    /// Adds an equation constraining the relative angular velocity around `axis`.
    ///
    /// The parameter is an angular impulse around `axis`.
    pub(crate) fn push_angular_row(&mut self, a: &PhysicalInfo, b: &PhysicalInfo, axis: &Vec3, error: [f64; 2]) {
        let row = self.filled;
        let angular_a = a.inverse_inertia * axis;
        let angular_b = b.inverse_inertia * axis;

        for i in 0..3 {
            self.parameter_to_motion_a[(i + 3, row)] = angular_a[i];
            self.parameter_to_motion_b[(i + 3, row)] = angular_b[i];
            self.motion_to_equation_a[(row, i + 3)] = axis[i];
            self.motion_to_equation_b[(row, i + 3)] = axis[i];
        }
        self.set_error(row, error);
    }

    fn set_error(&mut self, row: usize, error: [f64; 2]) {
        debug_assert!(row < self.parameter_count(), "too many rows pushed into constraint pack");
        self.error[(row, 0)] = error[0];
        self.error[(row, 1)] = error[1];
        self.filled += 1;
    }
}

/// Which end of a constraint an attachment belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    A,
    B,
}

/// A bilateral relationship between two attachment frames.
///
/// A constraint never knows which physicals it connects; that pairing lives in
/// the constraint group.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub enum Constraint {
    /// Two points held together
    Ball(BallConstraint),

    /// Two points held together and two axes held parallel
    Hinge(HingeConstraint),

    /// Two points held at a fixed distance
    Bar(BarConstraint),

    /// Relative rotation driven at a constant speed
    ConstantSpeedMotor(MotorConstraint<ConstantSpeedProfile>),

    /// Relative rotation driven along a sine wave
    SinusoidalMotor(MotorConstraint<SinusoidalProfile>),
}

impl Constraint {
    /// Returns the type name of the constraint
    pub fn constraint_type(&self) -> &'static str {
        match self {
            Constraint::Ball(_) => "ball",
            Constraint::Hinge(_) => "hinge",
            Constraint::Bar(_) => "bar",
            Constraint::ConstantSpeedMotor(_) => "constant_speed_motor",
            Constraint::SinusoidalMotor(_) => "sinusoidal_motor",
        }
    }

    /// Number of equations, and so free parameters, this constraint adds to a group
    pub fn max_number_of_parameters(&self) -> usize {
        match self {
            Constraint::Ball(_) => BallConstraint::PARAMETER_COUNT,
            Constraint::Hinge(_) => HingeConstraint::PARAMETER_COUNT,
            Constraint::Bar(_) => BarConstraint::PARAMETER_COUNT,
            Constraint::ConstantSpeedMotor(_) | Constraint::SinusoidalMotor(_) => 1,
        }
    }

    /// Builds the matrices for the current state of both ends
    pub fn matrices(&self, a: &PhysicalInfo, b: &PhysicalInfo) -> ConstraintMatrixPack {
        match self {
            Constraint::Ball(c) => c.matrices(a, b),
            Constraint::Hinge(c) => c.matrices(a, b),
            Constraint::Bar(c) => c.matrices(a, b),
            Constraint::ConstantSpeedMotor(c) => c.matrices(a, b),
            Constraint::SinusoidalMotor(c) => c.matrices(a, b),
        }
    }

    /// Advances any motor state by `dt`
    pub fn update(&mut self, dt: f64) {
        match self {
            Constraint::ConstantSpeedMotor(c) => c.update(dt),
            Constraint::SinusoidalMotor(c) => c.update(dt),
            Constraint::Ball(_) | Constraint::Hinge(_) | Constraint::Bar(_) => {}
        }
    }

    /// Re-expresses one attachment after its physical's reference frame changed.
    ///
    /// `offset` is the old reference frame expressed in the new one.
    pub fn transform_attachment(&mut self, side: Side, offset: &CFrame) {
        match self {
            Constraint::Ball(c) => {
                let point = c.attachment_mut(side);
                *point = offset.local_to_global(point);
            }
            Constraint::Bar(c) => {
                let point = c.attachment_mut(side);
                *point = offset.local_to_global(point);
            }
            Constraint::Hinge(c) => {
                let frame = c.attachment_mut(side);
                *frame = offset.local_to_global_cframe(frame);
            }
            Constraint::ConstantSpeedMotor(c) => {
                let frame = c.attachment_mut(side);
                *frame = offset.local_to_global_cframe(frame);
            }
            Constraint::SinusoidalMotor(c) => {
                let frame = c.attachment_mut(side);
                *frame = offset.local_to_global_cframe(frame);
            }
        }
    }
}

impl From<BallConstraint> for Constraint {
    fn from(c: BallConstraint) -> Self {
        Constraint::Ball(c)
    }
}

impl From<HingeConstraint> for Constraint {
    fn from(c: HingeConstraint) -> Self {
        Constraint::Hinge(c)
    }
}

impl From<BarConstraint> for Constraint {
    fn from(c: BarConstraint) -> Self {
        Constraint::Bar(c)
    }
}

impl From<MotorConstraint<ConstantSpeedProfile>> for Constraint {
    fn from(c: MotorConstraint<ConstantSpeedProfile>) -> Self {
        Constraint::ConstantSpeedMotor(c)
    }
}

impl From<MotorConstraint<SinusoidalProfile>> for Constraint {
    fn from(c: MotorConstraint<SinusoidalProfile>) -> Self {
        Constraint::SinusoidalMotor(c)
    }
}
