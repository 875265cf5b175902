use approx::assert_relative_eq;
use rigid_tick::constraints::{
    BallConstraint, BarConstraint, ConstantSpeedProfile, Constraint, ConstraintGroup, HingeConstraint,
    MotorConstraint, MotorProfile, SinusoidalProfile,
};
use rigid_tick::math::{CFrame, Rotation, Vec3};
use rigid_tick::{DebugChecks, Part, PartId, PartProperties, PhysicalId, Shape, SimulationConfig, World};

fn sphere_at(position: Vec3) -> Part {
    Part::new(Shape::sphere(0.5), CFrame::from_position(position), PartProperties::default())
}

fn constraint_world() -> World {
    World::with_config(SimulationConfig {
        worker_count: Some(0),
        debug_checks: DebugChecks::all(),
        ..SimulationConfig::default()
    })
}

fn distance(world: &World, a: PartId, b: PartId) -> f64 {
    (world.part(a).unwrap().position() - world.part(b).unwrap().position()).norm()
}

#[test]
fn test_bar_converges_with_collinear_attachments() {
    let mut world = constraint_world();
    let (a, part_a) = world.add_physical(sphere_at(Vec3::zeros()), 0).unwrap();
    let (b, part_b) = world.add_physical(sphere_at(Vec3::new(3.0, 0.0, 0.0)), 0).unwrap();

    let mut group = ConstraintGroup::new();
    group.add(a, b, BarConstraint::new(Vec3::zeros(), Vec3::zeros(), 2.0)).unwrap();
    world.add_constraint_group(group).unwrap();

    let mut error = (distance(&world, part_a, part_b) - 2.0).abs();
    let mut ticks = 0;
    while error >= 1e-9 {
        world.tick().unwrap();
        let next = (distance(&world, part_a, part_b) - 2.0).abs();
        assert!(next < error, "bar error did not shrink: {} -> {}", error, next);
        error = next;
        ticks += 1;
        assert!(ticks < 20, "bar did not converge");
    }

    // Equal masses meet halfway
    assert_relative_eq!(world.part(part_a).unwrap().position().x, 0.5, epsilon = 1e-9);
    assert_relative_eq!(world.part(part_b).unwrap().position().x, 2.5, epsilon = 1e-9);
    assert_eq!(world.last_tick_stats().non_finite_solutions, 0);
}

/// Two spheres on the x axis; the second one sits in a layer that does not collide with the first
fn separated_pair(separation: f64) -> (World, PartId, PartId, PhysicalId, PhysicalId) {
    let mut world = constraint_world();
    let apart = world.create_layer(false);
    let (a, part_a) = world.add_physical(sphere_at(Vec3::zeros()), 0).unwrap();
    let (b, part_b) = world.add_physical(sphere_at(Vec3::new(separation, 0.0, 0.0)), apart).unwrap();
    (world, part_a, part_b, a, b)
}

#[test]
fn test_bar_converges_from_short_and_long_separations() {
    for separation in [0.5, 1.0, 1.9, 2.1, 4.0, 8.0] {
        let (mut world, part_a, part_b, a, b) = separated_pair(separation);
        let mut group = ConstraintGroup::new();
        group.add(a, b, BarConstraint::new(Vec3::zeros(), Vec3::zeros(), 2.0)).unwrap();
        world.add_constraint_group(group).unwrap();

        let mut error = (distance(&world, part_a, part_b) - 2.0).abs();
        let mut ticks = 0;
        while error >= 1e-9 {
            world.tick().unwrap();
            let next = (distance(&world, part_a, part_b) - 2.0).abs();
            assert!(next < error, "separation {}: error did not shrink: {} -> {}", separation, error, next);
            error = next;
            ticks += 1;
            assert!(ticks < 20, "separation {}: bar did not converge", separation);
        }
        assert_eq!(world.last_tick_stats().non_finite_solutions, 0);
    }
}

#[test]
fn test_bar_pushes_coincident_points_apart() {
    let (mut world, part_a, part_b, a, b) = separated_pair(0.0);
    let mut group = ConstraintGroup::new();
    group.add(a, b, BarConstraint::new(Vec3::zeros(), Vec3::zeros(), 2.0)).unwrap();
    world.add_constraint_group(group).unwrap();

    for _ in 0..10 {
        world.tick().unwrap();
        assert_eq!(world.last_tick_stats().non_finite_solutions, 0);
    }

    assert_relative_eq!(distance(&world, part_a, part_b), 2.0, epsilon = 1e-9);
    let delta = world.part(part_a).unwrap().position() - world.part(part_b).unwrap().position();
    assert!(delta.iter().all(|c| c.is_finite()));
}

#[test]
fn test_coupled_bars_sharing_bodies() {
    let mut world = constraint_world();
    let apart = world.create_layer(false);
    let (a, part_a) = world.add_physical(sphere_at(Vec3::zeros()), 0).unwrap();
    let (b, part_b) = world.add_physical(sphere_at(Vec3::new(3.0, 0.0, 0.0)), apart).unwrap();
    let third = world.create_layer(false);
    let (c, part_c) = world.add_physical(sphere_at(Vec3::new(0.0, 3.0, 0.0)), third).unwrap();
    let fourth = world.create_layer(false);
    let (d, part_d) = world.add_physical(sphere_at(Vec3::new(10.0, 0.0, 0.0)), fourth).unwrap();
    let fifth = world.create_layer(false);
    let (e, part_e) = world.add_physical(sphere_at(Vec3::new(10.0, 4.0, 0.0)), fifth).unwrap();

    // A loop where every body is A of one bar and B of the next, plus a bar sharing nothing
    let mut group = ConstraintGroup::new();
    group.add(a, b, BarConstraint::new(Vec3::zeros(), Vec3::zeros(), 2.0)).unwrap();
    group.add(b, c, BarConstraint::new(Vec3::zeros(), Vec3::zeros(), 2.0)).unwrap();
    group.add(c, a, BarConstraint::new(Vec3::zeros(), Vec3::zeros(), 2.5)).unwrap();
    group.add(d, e, BarConstraint::new(Vec3::zeros(), Vec3::zeros(), 1.0)).unwrap();
    world.add_constraint_group(group).unwrap();

    for _ in 0..30 {
        world.tick().unwrap();
    }

    assert_relative_eq!(distance(&world, part_a, part_b), 2.0, epsilon = 1e-6);
    assert_relative_eq!(distance(&world, part_b, part_c), 2.0, epsilon = 1e-6);
    assert_relative_eq!(distance(&world, part_c, part_a), 2.5, epsilon = 1e-6);
    assert_relative_eq!(distance(&world, part_d, part_e), 1.0, epsilon = 1e-6);

    let stats = world.last_tick_stats();
    assert_eq!(stats.constraint_parameters, 4);
    assert_eq!(stats.non_finite_solutions, 0);

    // Equal masses: corrections come in opposite pairs
    let momentum: Vec3 = [a, b, c, d, e]
        .iter()
        .map(|&id| world.physical(id).unwrap().motion().velocity)
        .sum();
    assert_relative_eq!(momentum, Vec3::zeros(), epsilon = 1e-9);
}

/// Angle of `a` relative to `b` around the z axis of `a`
fn relative_angle(world: &World, a: PartId, b: PartId) -> f64 {
    let rotation_a = world.part(a).unwrap().cframe().rotation;
    let rotation_b = world.part(b).unwrap().cframe().rotation;
    let axis = rotation_a * Vec3::z();
    let reference_a = rotation_a * Vec3::x();
    let reference_b = rotation_b * Vec3::x();
    axis.dot(&reference_b.cross(&reference_a)).atan2(reference_b.dot(&reference_a))
}

#[test]
fn test_constant_speed_motor_constraint_tracks_profile() {
    let (mut world, part_a, part_b, a, b) = separated_pair(3.0);
    let mut group = ConstraintGroup::new();
    group
        .add(a, b, MotorConstraint::new(CFrame::identity(), CFrame::identity(), ConstantSpeedProfile::new(1.0)))
        .unwrap();
    world.add_constraint_group(group).unwrap();

    for _ in 0..50 {
        world.tick().unwrap();
    }

    // The target angle plus at most one integration step at 1 rad/s
    assert!((relative_angle(&world, part_a, part_b) - 0.5).abs() < 0.02);
    assert_relative_eq!(distance(&world, part_a, part_b), 3.0, epsilon = 1e-9);
    assert_eq!(world.last_tick_stats().constraint_parameters, 1);
}

#[test]
fn test_sinusoidal_motor_constraint_tracks_profile() {
    let (mut world, part_a, part_b, a, b) = separated_pair(3.0);
    let mut group = ConstraintGroup::new();
    group
        .add(a, b, MotorConstraint::new(CFrame::identity(), CFrame::identity(), SinusoidalProfile::new(-0.3, 0.3, 1.0)))
        .unwrap();
    world.add_constraint_group(group).unwrap();

    let mut expected = SinusoidalProfile::new(-0.3, 0.3, 1.0);
    let mut largest = 0.0f64;
    for _ in 0..150 {
        world.tick().unwrap();
        expected.update(0.01);
        largest = largest.max((relative_angle(&world, part_a, part_b) - expected.value()).abs());
    }

    assert!(largest < 0.03, "motor drifted {} from its profile", largest);
    assert_eq!(world.last_tick_stats().non_finite_solutions, 0);
}

#[test]
fn test_bar_at_rest_length_stays_put() {
    let mut world = constraint_world();
    let (a, part_a) = world.add_physical(sphere_at(Vec3::zeros()), 0).unwrap();
    let (b, part_b) = world.add_physical(sphere_at(Vec3::new(0.0, 2.0, 0.0)), 0).unwrap();

    let mut group = ConstraintGroup::new();
    group.add(a, b, BarConstraint::new(Vec3::zeros(), Vec3::zeros(), 2.0)).unwrap();
    world.add_constraint_group(group).unwrap();

    for _ in 0..10 {
        world.tick().unwrap();
        assert_relative_eq!(distance(&world, part_a, part_b), 2.0, epsilon = 1e-9);
    }
    assert_eq!(world.last_tick_stats().constraint_parameters, 1);
    assert_eq!(world.last_tick_stats().non_finite_solutions, 0);
}

#[test]
fn test_ball_joint_pulls_attachments_together() {
    let mut world = constraint_world();
    let (a, part_a) = world.add_physical(sphere_at(Vec3::zeros()), 0).unwrap();
    let (b, part_b) = world.add_physical(sphere_at(Vec3::new(2.5, 0.3, 0.0)), 0).unwrap();

    let attach_a = Vec3::new(1.0, 0.0, 0.0);
    let attach_b = Vec3::new(-1.0, 0.0, 0.0);
    let mut group = ConstraintGroup::new();
    group.add(a, b, BallConstraint::new(attach_a, attach_b)).unwrap();
    world.add_constraint_group(group).unwrap();

    let gap = |world: &World| {
        let point_a = world.part(part_a).unwrap().cframe().local_to_global(&attach_a);
        let point_b = world.part(part_b).unwrap().cframe().local_to_global(&attach_b);
        (point_a - point_b).norm()
    };
    let initial = gap(&world);

    for _ in 0..30 {
        world.tick().unwrap();
    }

    assert!(gap(&world) < initial * 1e-3);
    assert!(gap(&world) < 1e-6);
    assert_eq!(world.last_tick_stats().constraint_parameters, 3);
}

#[test]
fn test_hinge_aligns_axes() {
    let mut world = constraint_world();
    let (a, part_a) = world.add_physical(sphere_at(Vec3::zeros()), 0).unwrap();
    let (b, part_b) = world.add_physical(sphere_at(Vec3::new(2.0, 0.0, 0.0)), 0).unwrap();

    let attach_a = CFrame::from_position(Vec3::new(1.0, 0.0, 0.0));
    let attach_b = CFrame::new(Vec3::new(-1.0, 0.0, 0.0), Rotation::from_axis_angle(&Vec3::x_axis(), 0.2));
    let mut group = ConstraintGroup::new();
    group.add(a, b, HingeConstraint::new(attach_a, attach_b)).unwrap();
    world.add_constraint_group(group).unwrap();

    let axis = |world: &World, part: PartId, attach: &CFrame| {
        world.part(part).unwrap().cframe().local_to_global_cframe(attach).rotation * Vec3::z()
    };
    let misalignment = |world: &World| axis(world, part_a, &attach_a).cross(&axis(world, part_b, &attach_b)).norm();
    let initial = misalignment(&world);
    assert!(initial > 0.1);

    for _ in 0..30 {
        world.tick().unwrap();
    }

    assert!(misalignment(&world) < 1e-6);
    assert_eq!(world.last_tick_stats().constraint_parameters, 5);
}

#[test]
fn test_group_rejects_self_constraint() {
    let mut world = constraint_world();
    let (a, _) = world.add_physical(sphere_at(Vec3::zeros()), 0).unwrap();

    let mut group = ConstraintGroup::new();
    assert!(group.add(a, a, BallConstraint::new(Vec3::zeros(), Vec3::zeros())).is_err());
    assert!(group.is_empty());
}

#[test]
fn test_constraint_parameter_counts() {
    let ball: Constraint = BallConstraint::new(Vec3::zeros(), Vec3::zeros()).into();
    let hinge: Constraint = HingeConstraint::new(CFrame::identity(), CFrame::identity()).into();
    let bar: Constraint = BarConstraint::new(Vec3::zeros(), Vec3::zeros(), 1.0).into();

    assert_eq!(ball.max_number_of_parameters(), 3);
    assert_eq!(hinge.max_number_of_parameters(), 5);
    assert_eq!(bar.max_number_of_parameters(), 1);
    assert_eq!(bar.constraint_type(), "bar");
}

#[test]
fn test_constant_speed_profile_wraps() {
    let mut profile = ConstantSpeedProfile::new(std::f64::consts::PI);
    for _ in 0..150 {
        profile.update(0.01);
    }
    // 1.5 PI wraps to -0.5 PI
    assert_relative_eq!(profile.value(), -0.5 * std::f64::consts::PI, epsilon = 1e-9);
    assert_relative_eq!(profile.full_taylor_expansion().derivatives[0], std::f64::consts::PI);
}

#[test]
fn test_sinusoidal_profile_stays_in_range() {
    let mut profile = SinusoidalProfile::new(-0.5, 1.5, 2.0);
    assert_relative_eq!(profile.value(), 0.5);

    profile.update(0.5);
    assert_relative_eq!(profile.value(), 1.5, epsilon = 1e-12);

    for _ in 0..1000 {
        profile.update(0.013);
        let value = profile.value();
        assert!((-0.5 - 1e-12..=1.5 + 1e-12).contains(&value));
    }
}
