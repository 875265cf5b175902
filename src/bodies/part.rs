use crate::collision::LayerId;
use crate::core::PhysicalId;
use crate::math::{Aabb, CFrame, Mat3, Vec3};
use crate::shapes::Shape;

#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};

/// Surface and mass properties of a part
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct PartProperties {
    /// Mass per unit volume
    pub density: f64,

    /// Friction coefficient; combined with the other part's by multiplication
    pub friction: f64,

    /// Coefficient of restitution; combined with the other part's by multiplication
    pub bounciness: f64,

    /// Surface velocity in the part's local frame, as on a conveyor belt
    pub conveyor_effect: Vec3,
}

impl PartProperties {
    /// Creates new part properties with no conveyor effect
    pub fn new(density: f64, friction: f64, bounciness: f64) -> Self {
        Self {
            density,
            friction,
            bounciness,
            conveyor_effect: Vec3::zeros(),
        }
    }
}

impl Default for PartProperties {
    fn default() -> Self {
        Self {
            density: 1.0,
            friction: 0.5,
            bounciness: 0.0,
            conveyor_effect: Vec3::zeros(),
        }
    }
}

/// One collidable, shaped object with its own global pose
#[derive(Debug, Clone)]
pub struct Part {
    /// The part's geometry
    shape: Shape,

    /// The part's frame in world space
    cframe: CFrame,

    /// The part's surface and mass properties
    pub properties: PartProperties,

    /// The world layer whose tree currently holds this part
    pub(crate) layer: Option<LayerId>,

    /// The motorized physical this part belongs to, if any
    pub(crate) parent: Option<PhysicalId>,
}

impl Part {
    /// Creates a new part that is not yet in any layer or physical
    pub fn new(shape: Shape, cframe: CFrame, properties: PartProperties) -> Self {
        Self {
            shape,
            cframe,
            properties,
            layer: None,
            parent: None,
        }
    }

    /// Returns the part's shape
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Returns the part's frame in world space
    pub fn cframe(&self) -> &CFrame {
        &self.cframe
    }

    /// Returns the part's position in world space
    pub fn position(&self) -> Vec3 {
        self.cframe.position
    }

    pub(crate) fn set_cframe(&mut self, cframe: CFrame) {
        self.cframe = cframe;
    }

    /// Returns the mass of the part
    pub fn mass(&self) -> f64 {
        self.properties.density * self.shape.volume()
    }

    /// Returns the inertia tensor around the part's center in its local frame
    pub fn inertia(&self) -> Mat3 {
        self.shape.inertia() * self.properties.density
    }

    /// Returns the radius of the part's bounding sphere
    pub fn max_radius(&self) -> f64 {
        self.shape.max_radius()
    }

    /// Returns the world-space bounds of the part
    pub fn bounds(&self) -> Aabb {
        self.shape.world_bounds(&self.cframe)
    }

    /// Returns the conveyor surface velocity expressed in world space
    pub fn conveyor_velocity(&self) -> Vec3 {
        self.cframe.local_to_relative(&self.properties.conveyor_effect)
    }

    /// Returns the world layer currently holding this part
    pub fn layer(&self) -> Option<LayerId> {
        self.layer
    }

    /// Returns the motorized physical this part belongs to
    pub fn parent(&self) -> Option<PhysicalId> {
        self.parent
    }
}
