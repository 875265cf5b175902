use crate::bodies::{MotorizedPhysical, Part};
use crate::collision::Colission;
use crate::core::{Arena, PhysicalId, SimulationConfig};
use crate::math::{Vec3, EPSILON};
use crate::Result;
use log::trace;

/// Tuning of the collision response
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResponseParams {
    /// Contacts shallower than this fraction of the smaller part's radius are skipped
    pub epsilon_fraction: f64,

    /// Depth correction acceleration per meter of penetration
    pub depth_correction_stiffness: f64,

    /// Sliding speed at which dynamic friction reaches full strength
    pub dynamic_friction_ramp_speed: f64,
}

impl From<&SimulationConfig> for ResponseParams {
    fn from(config: &SimulationConfig) -> Self {
        Self {
            epsilon_fraction: config.collision_epsilon_fraction,
            depth_correction_stiffness: config.depth_correction_stiffness,
            dynamic_friction_ramp_speed: config.dynamic_friction_ramp_speed,
        }
    }
}

impl Default for ResponseParams {
    fn default() -> Self {
        Self::from(&SimulationConfig::default())
    }
}

/// What the response did for one contact
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ResponseOutcome {
    /// The contact was too shallow or touched no movable body
    pub skipped: bool,

    /// Magnitude of the impulse along the exit direction
    pub normal_impulse: f64,

    /// Magnitude of the static friction impulse
    pub friction_impulse: f64,

    /// Magnitude of the continuous depth correction force
    pub depth_force: f64,

    /// Magnitude of the continuous dynamic friction force
    pub dynamic_friction_force: f64,
}

impl ResponseOutcome {
    fn skipped() -> Self {
        Self {
            skipped: true,
            ..Self::default()
        }
    }
}

/// Contact-side view of one body
#[derive(Debug, Clone, Copy)]
struct ContactSide {
    physical: Option<PhysicalId>,
    offset: Vec3,
    surface_velocity: Vec3,
}

impl ContactSide {
    fn new(part: &Part, physicals: &Arena<MotorizedPhysical>, contact_point: &Vec3) -> Self {
        let conveyor = part.conveyor_velocity();
        match part.parent().and_then(|id| physicals.get(id).map(|p| (id, p))) {
            Some((id, physical)) if !physical.is_anchored() => {
                let offset = contact_point - physical.center_of_mass();
                Self {
                    physical: Some(id),
                    offset,
                    surface_velocity: physical.velocity_of_point(&offset) + conveyor,
                }
            }
            _ => Self {
                physical: None,
                offset: Vec3::zeros(),
                surface_velocity: conveyor,
            },
        }
    }

    fn inverse_mass_along(&self, physicals: &Arena<MotorizedPhysical>, direction: &Vec3) -> f64 {
        self.physical
            .and_then(|id| physicals.get(id))
            .map_or(0.0, |p| p.inverse_inertia_along(&self.offset, direction))
    }

    fn apply_impulse(&self, physicals: &mut Arena<MotorizedPhysical>, impulse: &Vec3) {
        if let Some(physical) = self.physical.and_then(|id| physicals.get_mut(id)) {
            physical.apply_impulse(&self.offset, impulse);
        }
    }

    fn apply_force(&self, physicals: &mut Arena<MotorizedPhysical>, force: &Vec3) {
        if let Some(physical) = self.physical.and_then(|id| physicals.get_mut(id)) {
            physical.apply_force(&self.offset, force);
        }
    }
}

/// Turns one confirmed contact into impulses and forces on the bodies involved.
///
/// Body A receives the negative and body B the positive share of every
/// impulse and force; the exit vector points from A toward B.
pub fn handle_colission(
    parts: &Arena<Part>,
    physicals: &mut Arena<MotorizedPhysical>,
    colission: &Colission,
    params: &ResponseParams,
) -> Result<ResponseOutcome> {
    let part_a = parts.get_checked(colission.part_a, "Colliding part")?;
    let part_b = parts.get_checked(colission.part_b, "Colliding part")?;

    let exit = colission.exit_vector;
    let depth = exit.norm();
    let size = part_a.max_radius().min(part_b.max_radius());
    if depth <= 0.0 || depth < params.epsilon_fraction * size {
        trace!("Skipping shallow colission {:?} - {:?}", colission.part_a, colission.part_b);
        return Ok(ResponseOutcome::skipped());
    }
    let normal = exit / depth;

    let a = ContactSide::new(part_a, physicals, &colission.contact_point);
    let b = ContactSide::new(part_b, physicals, &colission.contact_point);
    if a.physical.is_some() && a.physical == b.physical {
        return Ok(ResponseOutcome::skipped());
    }

    let combined_inverse_mass = a.inverse_mass_along(physicals, &normal) + b.inverse_mass_along(physicals, &normal);
    if combined_inverse_mass <= 0.0 {
        return Ok(ResponseOutcome::skipped());
    }

    let mut outcome = ResponseOutcome::default();

    let depth_force = exit * (params.depth_correction_stiffness / combined_inverse_mass);
    a.apply_force(physicals, &-depth_force);
    b.apply_force(physicals, &depth_force);
    outcome.depth_force = depth_force.norm();

    let relative_velocity = a.surface_velocity - b.surface_velocity;
    let closing_speed = relative_velocity.dot(&normal);
    if closing_speed > 0.0 {
        let restitution = part_a.properties.bounciness * part_b.properties.bounciness;
        let magnitude = closing_speed * (1.0 + restitution) / combined_inverse_mass;
        let impulse = normal * magnitude;
        a.apply_impulse(physicals, &-impulse);
        b.apply_impulse(physicals, &impulse);
        outcome.normal_impulse = magnitude;
    }

    let friction = part_a.properties.friction * part_b.properties.friction;
    let sliding = relative_velocity - normal * closing_speed;
    let sliding_speed = sliding.norm();
    if friction <= 0.0 || sliding_speed <= EPSILON {
        return Ok(outcome);
    }
    let tangent = sliding / sliding_speed;

    let mut residual_speed = sliding_speed;
    let tangent_inverse_mass =
        a.inverse_mass_along(physicals, &tangent) + b.inverse_mass_along(physicals, &tangent);
    if tangent_inverse_mass > 0.0 && outcome.normal_impulse > 0.0 {
        let wanted = sliding_speed / tangent_inverse_mass;
        let magnitude = wanted.min(friction * outcome.normal_impulse);
        let impulse = tangent * magnitude;
        a.apply_impulse(physicals, &-impulse);
        b.apply_impulse(physicals, &impulse);
        outcome.friction_impulse = magnitude;
        residual_speed = (sliding_speed - magnitude * tangent_inverse_mass).max(0.0);
    }

    let ramp = if params.dynamic_friction_ramp_speed > 0.0 {
        (residual_speed / params.dynamic_friction_ramp_speed).min(1.0)
    } else {
        1.0
    };
    let magnitude = friction * outcome.depth_force * ramp;
    if magnitude > 0.0 {
        let force = tangent * magnitude;
        a.apply_force(physicals, &-force);
        b.apply_force(physicals, &force);
        outcome.dynamic_friction_force = magnitude;
    }

    Ok(outcome)
}
