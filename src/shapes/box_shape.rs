use crate::math::{Mat3, Vec3};
use crate::shapes::ShapeClass;

/// The box spanning [-1, 1] on every axis; the scale gives its half extents
#[derive(Debug, Clone, Copy, Default)]
pub struct BoxShape;

impl ShapeClass for BoxShape {
    fn name(&self) -> &'static str {
        "Box"
    }

    fn volume(&self, scale: &Vec3) -> f64 {
        8.0 * scale.x * scale.y * scale.z
    }

    fn inertia(&self, scale: &Vec3) -> Mat3 {
        // I_xx = m/3 * (hy² + hz²) with half extents hx, hy, hz
        let mass = self.volume(scale);
        let (x2, y2, z2) = (scale.x * scale.x, scale.y * scale.y, scale.z * scale.z);
        Mat3::from_diagonal(&Vec3::new(
            mass / 3.0 * (y2 + z2),
            mass / 3.0 * (x2 + z2),
            mass / 3.0 * (x2 + y2),
        ))
    }

    fn max_radius(&self, scale: &Vec3) -> f64 {
        scale.norm()
    }

    fn support(&self, direction: &Vec3, scale: &Vec3) -> Vec3 {
        Vec3::new(
            if direction.x >= 0.0 { scale.x } else { -scale.x },
            if direction.y >= 0.0 { scale.y } else { -scale.y },
            if direction.z >= 0.0 { scale.z } else { -scale.z },
        )
    }
}
