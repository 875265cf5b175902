use crate::math::{Aabb, CFrame, Mat3, Vec3};
use std::fmt::Debug;
use std::sync::Arc;

/// Geometry of a family of shapes, defined at unit scale.
///
/// Implementations are immutable and shared between every [`Shape`] that uses
/// them. The engine only consumes the bounding and mass queries; exact
/// intersection lives behind [`crate::collision::IntersectionTest`].
pub trait ShapeClass: Send + Sync + Debug + 'static {
    /// Returns the type name of the shape class
    fn name(&self) -> &'static str;

    /// Volume of the shape stretched by `scale`
    fn volume(&self, scale: &Vec3) -> f64;

    /// Inertia tensor around the center for unit density, stretched by `scale`
    fn inertia(&self, scale: &Vec3) -> Mat3;

    /// Distance from the center to the farthest point of the shape
    fn max_radius(&self, scale: &Vec3) -> f64;

    /// Furthest point of the scaled shape in the given local direction
    fn support(&self, direction: &Vec3, scale: &Vec3) -> Vec3;

    /// Returns the axis-aligned bounding box of the scaled shape in local space
    fn local_bounds(&self, scale: &Vec3) -> Aabb {
        let max = Vec3::new(
            self.support(&Vec3::x(), scale).x,
            self.support(&Vec3::y(), scale).y,
            self.support(&Vec3::z(), scale).z,
        );
        let min = Vec3::new(
            self.support(&-Vec3::x(), scale).x,
            self.support(&-Vec3::y(), scale).y,
            self.support(&-Vec3::z(), scale).z,
        );
        Aabb::new(min, max)
    }

    /// Returns the axis-aligned bounding box of the scaled shape placed at `cframe`
    fn world_bounds(&self, scale: &Vec3, cframe: &CFrame) -> Aabb {
        let mut min = Vec3::zeros();
        let mut max = Vec3::zeros();
        for axis in 0..3 {
            let mut world_dir = Vec3::zeros();
            world_dir[axis] = 1.0;
            let local_dir = cframe.relative_to_local(&world_dir);
            let far = cframe.local_to_global(&self.support(&local_dir, scale));
            let near = cframe.local_to_global(&self.support(&-local_dir, scale));
            max[axis] = far[axis];
            min[axis] = near[axis];
        }
        Aabb::new(min, max)
    }
}

/// A shape instance: a shared, immutable shape class stretched by a per-axis scale
#[derive(Debug, Clone)]
pub struct Shape {
    class: Arc<dyn ShapeClass>,
    scale: Vec3,
}

impl Shape {
    /// Creates a new shape from a class and a scale
    pub fn new(class: Arc<dyn ShapeClass>, scale: Vec3) -> Self {
        Self { class, scale }
    }

    /// Creates a sphere with the given radius
    pub fn sphere(radius: f64) -> Self {
        Self::new(super::sphere_class(), Vec3::repeat(radius))
    }

    /// Creates a box with the given full dimensions
    pub fn cuboid(width: f64, height: f64, depth: f64) -> Self {
        Self::new(super::box_class(), Vec3::new(width, height, depth) * 0.5)
    }

    /// Returns the shared shape class
    pub fn class(&self) -> &Arc<dyn ShapeClass> {
        &self.class
    }

    /// Returns the per-axis scale
    pub fn scale(&self) -> Vec3 {
        self.scale
    }

    /// Returns the name of the shape class
    pub fn name(&self) -> &'static str {
        self.class.name()
    }

    /// Returns the volume of the shape
    pub fn volume(&self) -> f64 {
        self.class.volume(&self.scale)
    }

    /// Returns the unit-density inertia tensor around the shape's center
    pub fn inertia(&self) -> Mat3 {
        self.class.inertia(&self.scale)
    }

    /// Returns the bounding sphere radius around the shape's center
    pub fn max_radius(&self) -> f64 {
        self.class.max_radius(&self.scale)
    }

    /// Returns the furthest point in the given local direction
    pub fn support(&self, direction: &Vec3) -> Vec3 {
        self.class.support(direction, &self.scale)
    }

    /// Returns the world-space bounds of the shape placed at `cframe`
    pub fn world_bounds(&self, cframe: &CFrame) -> Aabb {
        self.class.world_bounds(&self.scale, cframe)
    }
}
