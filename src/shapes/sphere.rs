use crate::math::{Mat3, Vec3, EPSILON};
use crate::shapes::ShapeClass;

/// The unit sphere. Non-uniform scales turn it into an ellipsoid.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sphere;

impl ShapeClass for Sphere {
    fn name(&self) -> &'static str {
        "Sphere"
    }

    fn volume(&self, scale: &Vec3) -> f64 {
        // Volume of an ellipsoid: (4/3) * π * a * b * c
        (4.0 / 3.0) * std::f64::consts::PI * scale.x * scale.y * scale.z
    }

    fn inertia(&self, scale: &Vec3) -> Mat3 {
        // I_xx = m/5 * (b² + c²) for an ellipsoid with semi-axes a, b, c
        let mass = self.volume(scale);
        let (a2, b2, c2) = (scale.x * scale.x, scale.y * scale.y, scale.z * scale.z);
        Mat3::from_diagonal(&Vec3::new(
            mass / 5.0 * (b2 + c2),
            mass / 5.0 * (a2 + c2),
            mass / 5.0 * (a2 + b2),
        ))
    }

    fn max_radius(&self, scale: &Vec3) -> f64 {
        scale.max()
    }

    fn support(&self, direction: &Vec3, scale: &Vec3) -> Vec3 {
        let stretched = direction.component_mul(scale);
        let length = stretched.norm();
        if length < EPSILON {
            return Vec3::zeros();
        }
        stretched.component_mul(scale) / length
    }
}
