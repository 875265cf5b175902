use approx::assert_relative_eq;
use nalgebra::{DMatrix, DVector};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rigid_tick::math::linear_system::{is_finite, solve_in_place, solve_vector_in_place};
use rigid_tick::math::{orthogonal_basis, rotation_from_rotation_vec, skew, wrap_angle, Aabb, CFrame, Motion, Rotation, Vec3};
use std::f64::consts::PI;

fn random_system(rng: &mut StdRng, n: usize) -> DMatrix<f64> {
    let mut a = DMatrix::from_fn(n, n, |_, _| rng.gen_range(-1.0..1.0));
    // Diagonal dominance keeps the system well conditioned
    for i in 0..n {
        a[(i, i)] += n as f64;
    }
    a
}

#[test]
fn test_solver_recovers_known_solution() {
    let mut rng = StdRng::seed_from_u64(1);
    for n in [1, 2, 5, 12, 30] {
        let a = random_system(&mut rng, n);
        let x = DMatrix::from_fn(n, 2, |_, _| rng.gen_range(-10.0..10.0));
        let mut b = &a * &x;
        let mut work = a.clone();

        solve_in_place(&mut work, &mut b);

        assert!(is_finite(&b));
        assert_relative_eq!(b, x, epsilon = 1e-9);
    }
}

#[test]
fn test_solver_needs_pivoting() {
    // Zero on the first diagonal entry
    let mut a = DMatrix::from_row_slice(2, 2, &[0.0, 1.0, 1.0, 0.0]);
    let mut b = DVector::from_vec(vec![3.0, 4.0]);
    solve_vector_in_place(&mut a, &mut b);
    assert_relative_eq!(b, DVector::from_vec(vec![4.0, 3.0]));
}

#[test]
fn test_singular_system_is_not_finite() {
    let mut a = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 2.0, 4.0]);
    let mut b = DMatrix::from_row_slice(2, 1, &[1.0, 1.0]);
    solve_in_place(&mut a, &mut b);
    assert!(!is_finite(&b));
}

#[test]
fn test_cframe_round_trips() {
    let frame = CFrame::new(Vec3::new(1.0, -2.0, 3.0), Rotation::from_axis_angle(&Vec3::y_axis(), 0.7));
    let point = Vec3::new(0.3, 0.4, -5.0);

    assert_relative_eq!(frame.global_to_local(&frame.local_to_global(&point)), point, epsilon = 1e-12);
    let composed = frame.local_to_global_cframe(&frame.inverse());
    assert_relative_eq!(composed.position, Vec3::zeros(), epsilon = 1e-12);
    assert_relative_eq!(composed.rotation.angle(), 0.0, epsilon = 1e-12);

    let other = CFrame::new(Vec3::new(-4.0, 0.0, 1.0), Rotation::from_axis_angle(&Vec3::x_axis(), -1.1));
    let relative = frame.global_to_local_cframe(&other);
    let back = frame.local_to_global_cframe(&relative);
    assert_relative_eq!(back.position, other.position, epsilon = 1e-12);
    assert_relative_eq!(back.rotation.angle_to(&other.rotation), 0.0, epsilon = 1e-12);
}

#[test]
fn test_rotate_around_keeps_center() {
    let mut frame = CFrame::from_position(Vec3::new(2.0, 0.0, 0.0));
    frame.rotate_around(&Vec3::new(1.0, 0.0, 0.0), &Rotation::from_axis_angle(&Vec3::z_axis(), PI / 2.0));
    assert_relative_eq!(frame.position, Vec3::new(1.0, 1.0, 0.0), epsilon = 1e-12);
}

#[test]
fn test_rotation_helpers() {
    let v = Vec3::new(0.3, -1.2, 2.0);
    let w = Vec3::new(-0.5, 0.1, 0.4);
    assert_relative_eq!(skew(&v) * w, v.cross(&w), epsilon = 1e-12);

    let rotation = rotation_from_rotation_vec(Vec3::new(0.0, 0.0, PI / 2.0));
    assert_relative_eq!(rotation * Vec3::x(), Vec3::y(), epsilon = 1e-12);

    for axis in [Vec3::x(), Vec3::y(), Vec3::z(), Vec3::new(1.0, 1.0, 1.0).normalize()] {
        let (u, v) = orthogonal_basis(&axis);
        assert_relative_eq!(u.norm(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(u.dot(&axis), 0.0, epsilon = 1e-12);
        assert_relative_eq!(u.cross(&v), axis, epsilon = 1e-12);
    }
}

#[test]
fn test_wrap_angle() {
    assert_relative_eq!(wrap_angle(3.0 * PI / 2.0), -PI / 2.0, epsilon = 1e-12);
    assert_relative_eq!(wrap_angle(-PI), PI, epsilon = 1e-12);
    assert_relative_eq!(wrap_angle(0.25), 0.25);
}

#[test]
fn test_motion_velocity_of_point() {
    let motion = Motion::new(Vec3::new(1.0, 0.0, 0.0), Vec3::new(0.0, 0.0, 2.0));
    assert_relative_eq!(motion.velocity_of_point(&Vec3::new(1.0, 0.0, 0.0)), Vec3::new(1.0, 2.0, 0.0));
}

#[test]
fn test_aabb_overlap() {
    let a = Aabb::new(Vec3::zeros(), Vec3::new(1.0, 1.0, 1.0));
    let b = Aabb::new(Vec3::new(0.5, 0.5, 0.5), Vec3::new(2.0, 2.0, 2.0));
    let c = Aabb::new(Vec3::new(1.5, 0.0, 0.0), Vec3::new(2.0, 1.0, 1.0));

    assert!(a.intersects(&b));
    assert!(!a.intersects(&c));
    assert_relative_eq!(a.merged(&c).max, Vec3::new(2.0, 1.0, 1.0));
    assert!(a.expanded(0.6).intersects(&c));
}
