use crate::math::{Mat3, Rotation, Vec3, EPSILON};

/// Exponential map from a rotation vector (axis scaled by angle) to a rotation
#[inline]
pub fn rotation_from_rotation_vec(rotation_vec: Vec3) -> Rotation {
    Rotation::new(rotation_vec)
}

/// The cross-product matrix of `v`, such that `skew(v) * w == v.cross(&w)`
#[inline]
#[rustfmt::skip]
pub fn skew(v: &Vec3) -> Mat3 {
    Mat3::new(
        0.0, -v.z, v.y,
        v.z, 0.0, -v.x,
        -v.y, v.x, 0.0,
    )
}

/// Expresses a body-frame inertia tensor in the frame rotated by `rotation`
#[inline]
pub fn rotate_inertia(inertia: &Mat3, rotation: &Rotation) -> Mat3 {
    let r = rotation.matrix();
    r * inertia * r.transpose()
}

/// Returns two unit vectors `(u, v)` such that `(u, v, axis)` is a right-handed orthonormal basis
pub fn orthogonal_basis(axis: &Vec3) -> (Vec3, Vec3) {
    let n = if axis.norm_squared() > EPSILON {
        axis.normalize()
    } else {
        Vec3::z()
    };

    // Pick the world axis least aligned with n to avoid a degenerate cross product
    let helper = if n.x.abs() < 0.57 {
        Vec3::x()
    } else if n.y.abs() < 0.57 {
        Vec3::y()
    } else {
        Vec3::z()
    };

    let u = helper.cross(&n).normalize();
    let v = n.cross(&u);
    (u, v)
}
