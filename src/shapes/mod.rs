mod shape;
mod sphere;
mod box_shape;

pub use self::shape::{Shape, ShapeClass};
pub use self::sphere::Sphere;
pub use self::box_shape::BoxShape;

use std::sync::{Arc, OnceLock};

/// Returns the shared built-in sphere class
pub fn sphere_class() -> Arc<dyn ShapeClass> {
    static CLASS: OnceLock<Arc<dyn ShapeClass>> = OnceLock::new();
    CLASS.get_or_init(|| Arc::new(Sphere)).clone()
}

/// Returns the shared built-in box class
pub fn box_class() -> Arc<dyn ShapeClass> {
    static CLASS: OnceLock<Arc<dyn ShapeClass>> = OnceLock::new();
    CLASS.get_or_init(|| Arc::new(BoxShape)).clone()
}
