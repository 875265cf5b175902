use crate::constraints::{ConstraintMatrixPack, PhysicalInfo, Side};
use crate::math::{wrap_angle, CFrame, Vec3};
use std::f64::consts::TAU;

#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};

/// A value and its first two time derivatives
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TaylorExpansion {
    /// The value itself
    pub value: f64,

    /// First and second time derivative
    pub derivatives: [f64; 2],
}

/// Drives a motor's target value over time
pub trait MotorProfile {
    /// Advances the profile by `dt` seconds
    fn update(&mut self, dt: f64);

    /// Current target value
    fn value(&self) -> f64;

    /// Current target value with its derivatives
    fn full_taylor_expansion(&self) -> TaylorExpansion;
}

/// Rotates at a constant angular speed
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct ConstantSpeedProfile {
    /// Angular speed in radians per second
    pub speed: f64,

    /// Current angle, kept in (-PI, PI]
    pub angle: f64,
}

impl ConstantSpeedProfile {
    /// Creates a profile starting at angle zero
    pub fn new(speed: f64) -> Self {
        Self { speed, angle: 0.0 }
    }
}

impl MotorProfile for ConstantSpeedProfile {
    fn update(&mut self, dt: f64) {
        self.angle = wrap_angle(self.angle + self.speed * dt);
    }

    fn value(&self) -> f64 {
        self.angle
    }

    fn full_taylor_expansion(&self) -> TaylorExpansion {
        TaylorExpansion {
            value: self.angle,
            derivatives: [self.speed, 0.0],
        }
    }
}

/// Oscillates between two values along a sine wave
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct SinusoidalProfile {
    pub min_value: f64,
    pub max_value: f64,

    /// Duration of one full oscillation in seconds
    pub period: f64,

    /// Time into the current period
    pub current_time: f64,
}

impl SinusoidalProfile {
    /// Creates a profile at the start of its period
    pub fn new(min_value: f64, max_value: f64, period: f64) -> Self {
        Self {
            min_value,
            max_value,
            period,
            current_time: 0.0,
        }
    }

    fn amplitude(&self) -> f64 {
        (self.max_value - self.min_value) * 0.5
    }

    fn midpoint(&self) -> f64 {
        (self.max_value + self.min_value) * 0.5
    }

    fn angular_frequency(&self) -> f64 {
        if self.period > 0.0 {
            TAU / self.period
        } else {
            0.0
        }
    }
}

impl MotorProfile for SinusoidalProfile {
    fn update(&mut self, dt: f64) {
        self.current_time += dt;
        if self.period > 0.0 {
            self.current_time = self.current_time.rem_euclid(self.period);
        }
    }

    fn value(&self) -> f64 {
        self.midpoint() + self.amplitude() * (self.angular_frequency() * self.current_time).sin()
    }

    fn full_taylor_expansion(&self) -> TaylorExpansion {
        let w = self.angular_frequency();
        let phase = w * self.current_time;
        let amplitude = self.amplitude();
        TaylorExpansion {
            value: self.midpoint() + amplitude * phase.sin(),
            derivatives: [amplitude * w * phase.cos(), -amplitude * w * w * phase.sin()],
        }
    }
}

/// Drives the rotation of A relative to B around the Z axis of A's attachment.
///
/// The angle is measured between the X axes of both attachments.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct MotorConstraint<P> {
    /// Attachment frame relative to A's reference frame
    pub attach_a: CFrame,

    /// Attachment frame relative to B's reference frame
    pub attach_b: CFrame,

    /// Target angle over time
    pub profile: P,
}

impl<P: MotorProfile> MotorConstraint<P> {
    /// Creates a new motor constraint
    pub fn new(attach_a: CFrame, attach_b: CFrame, profile: P) -> Self {
        Self {
            attach_a,
            attach_b,
            profile,
        }
    }

    /// Current angle of A relative to B
    pub fn current_angle(&self, a: &PhysicalInfo, b: &PhysicalInfo) -> f64 {
        let rotation_a = a.cframe.rotation * self.attach_a.rotation;
        let rotation_b = b.cframe.rotation * self.attach_b.rotation;
        let axis = rotation_a * Vec3::z();
        let reference_a = rotation_a * Vec3::x();
        let reference_b = rotation_b * Vec3::x();
        axis.dot(&reference_b.cross(&reference_a)).atan2(reference_b.dot(&reference_a))
    }

    pub(crate) fn attachment_mut(&mut self, side: Side) -> &mut CFrame {
        match side {
            Side::A => &mut self.attach_a,
            Side::B => &mut self.attach_b,
        }
    }

    pub(crate) fn update(&mut self, dt: f64) {
        self.profile.update(dt);
    }

    /// One angular equation around the motor axis
    pub fn matrices(&self, a: &PhysicalInfo, b: &PhysicalInfo) -> ConstraintMatrixPack {
        let axis = a.cframe.rotation * (self.attach_a.rotation * Vec3::z());
        let target = self.profile.full_taylor_expansion();
        let angle_error = wrap_angle(self.current_angle(a, b) - target.value);
        let speed = axis.dot(&(a.motion.angular_velocity - b.motion.angular_velocity));

        let mut pack = ConstraintMatrixPack::new(1);
        pack.push_angular_row(a, b, &axis, [angle_error, speed - target.derivatives[0]]);
        pack
    }
}
