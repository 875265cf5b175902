use approx::assert_relative_eq;
use rigid_tick::bodies::HardConnection;
use rigid_tick::constraints::{BallConstraint, ConstantSpeedProfile, ConstraintGroup};
use rigid_tick::forces::DirectionalGravity;
use rigid_tick::math::{CFrame, Rotation, Vec3};
use rigid_tick::{DebugChecks, Part, PartProperties, Shape, SimulationConfig, World};

fn sphere_at(position: Vec3) -> Part {
    Part::new(Shape::sphere(0.5), CFrame::from_position(position), PartProperties::default())
}

fn quiet_world() -> World {
    World::with_config(SimulationConfig {
        worker_count: Some(0),
        debug_checks: DebugChecks::all(),
        ..SimulationConfig::default()
    })
}

#[test]
fn test_falling_part_reaches_expected_velocity() {
    let mut world = quiet_world();
    world.add_external_force(Box::new(DirectionalGravity::new(Vec3::new(0.0, -10.0, 0.0))));
    let (physical, part) = world.add_physical(sphere_at(Vec3::new(0.0, 100.0, 0.0)), 0).unwrap();

    for _ in 0..100 {
        world.tick().unwrap();
    }

    let velocity = world.physical(physical).unwrap().motion().velocity;
    assert_relative_eq!(velocity.y, -10.0, epsilon = 1e-9);
    assert_relative_eq!(velocity.x, 0.0);

    // Symplectic Euler: sum of v_i * dt for v_i = -0.1 * i
    let expected_drop = 0.01 * 0.1 * (1..=100).sum::<i32>() as f64;
    let position = world.part(part).unwrap().position();
    assert_relative_eq!(position.y, 100.0 - expected_drop, epsilon = 1e-9);

    let stats = world.last_tick_stats();
    assert_eq!(stats.candidate_count, 0);
    assert_eq!(stats.confirmed_colissions, 0);
    assert_eq!(stats.handled_colissions, 0);
    assert_eq!(world.age(), 100);
}

#[test]
fn test_anchored_physical_never_moves() {
    let mut world = quiet_world();
    world.add_external_force(Box::new(DirectionalGravity::earth()));
    let (physical, part) = world.add_physical(sphere_at(Vec3::new(1.0, 2.0, 3.0)), 0).unwrap();
    world.set_anchored(physical, true).unwrap();

    for _ in 0..20 {
        world.tick().unwrap();
    }

    assert_eq!(world.part(part).unwrap().position(), Vec3::new(1.0, 2.0, 3.0));
    assert_eq!(world.physical(physical).unwrap().inverse_mass(), 0.0);
    assert!(world.validate(DebugChecks::all()).is_ok());
}

#[test]
fn test_attached_parts_share_mass_properties() {
    let mut world = quiet_world();
    let (physical, first) = world.add_physical(sphere_at(Vec3::zeros()), 0).unwrap();
    let single_mass = world.physical(physical).unwrap().mass();

    let second = world
        .attach_part(first, sphere_at(Vec3::zeros()), CFrame::from_position(Vec3::new(2.0, 0.0, 0.0)))
        .unwrap();

    let body = world.physical(physical).unwrap();
    assert_relative_eq!(body.mass(), 2.0 * single_mass, epsilon = 1e-12);
    assert_relative_eq!(body.center_of_mass(), Vec3::new(1.0, 0.0, 0.0), epsilon = 1e-12);
    assert_eq!(world.part(second).unwrap().position(), Vec3::new(2.0, 0.0, 0.0));
    assert_eq!(world.part(second).unwrap().parent(), Some(physical));

    // Same physical, so the pair is never a candidate
    world.tick().unwrap();
    assert_eq!(world.last_tick_stats().candidate_count, 0);
}

#[test]
fn test_removing_last_part_destroys_physical_and_its_constraints() {
    let mut world = quiet_world();
    let (a, part_a) = world.add_physical(sphere_at(Vec3::zeros()), 0).unwrap();
    let (b, _) = world.add_physical(sphere_at(Vec3::new(3.0, 0.0, 0.0)), 0).unwrap();

    let mut group = ConstraintGroup::new();
    group
        .add(a, b, BallConstraint::new(Vec3::new(1.5, 0.0, 0.0), Vec3::new(-1.5, 0.0, 0.0)))
        .unwrap();
    world.add_constraint_group(group).unwrap();

    world.remove_part(part_a).unwrap();

    assert!(world.physical(a).is_err());
    assert!(world.part(part_a).is_err());
    assert!(world.constraint_groups()[0].is_empty());
    assert_eq!(world.physical_count(), 1);
    world.tick().unwrap();
}

#[test]
fn test_removing_part_keeps_velocity_of_remaining_material() {
    let mut world = quiet_world();
    let (physical, first) = world.add_physical(sphere_at(Vec3::zeros()), 0).unwrap();
    let second = world
        .attach_part(first, sphere_at(Vec3::zeros()), CFrame::from_position(Vec3::new(2.0, 0.0, 0.0)))
        .unwrap();
    {
        let body = world.physical_mut(physical).unwrap();
        body.set_velocity(Vec3::new(0.0, 0.0, 1.0));
        body.set_angular_velocity(Vec3::new(0.0, 1.0, 0.0));
    }

    let before = {
        let body = world.physical(physical).unwrap();
        body.velocity_of_point(&(Vec3::zeros() - body.center_of_mass()))
    };
    world.remove_part(second).unwrap();

    let body = world.physical(physical).unwrap();
    assert_relative_eq!(body.center_of_mass(), Vec3::zeros(), epsilon = 1e-12);
    assert_relative_eq!(body.motion().velocity, before, epsilon = 1e-12);
}

#[test]
fn test_merge_physicals_conserves_momentum() {
    let mut world = quiet_world();
    let (a, part_a) = world.add_physical(sphere_at(Vec3::zeros()), 0).unwrap();
    let (b, part_b) = world.add_physical(sphere_at(Vec3::new(5.0, 0.0, 0.0)), 0).unwrap();
    world.physical_mut(a).unwrap().set_velocity(Vec3::new(2.0, 0.0, 0.0));
    world.physical_mut(b).unwrap().set_velocity(Vec3::new(0.0, 4.0, 0.0));
    let mass = world.physical(a).unwrap().mass();

    world.merge_physicals(a, b).unwrap();

    assert!(world.physical(b).is_err());
    let merged = world.physical(a).unwrap();
    assert_relative_eq!(merged.mass(), 2.0 * mass, epsilon = 1e-12);
    assert_relative_eq!(merged.motion().velocity, Vec3::new(1.0, 2.0, 0.0), epsilon = 1e-12);
    assert_eq!(world.part(part_b).unwrap().parent(), Some(a));
    assert_eq!(world.part(part_b).unwrap().position(), Vec3::new(5.0, 0.0, 0.0));
    assert!(world.layer(0).unwrap().free().in_same_group(part_a, part_b));
    assert!(world.merge_physicals(a, a).is_err());
    assert!(world.validate(DebugChecks::all()).is_ok());
}

#[test]
fn test_detach_part_creates_new_physical() {
    let mut world = quiet_world();
    let (physical, first) = world.add_physical(sphere_at(Vec3::zeros()), 0).unwrap();
    let second = world
        .attach_part(first, sphere_at(Vec3::zeros()), CFrame::from_position(Vec3::new(3.0, 0.0, 0.0)))
        .unwrap();
    world.physical_mut(physical).unwrap().set_velocity(Vec3::new(1.0, 0.0, 0.0));

    let detached = world.detach_part(second).unwrap();

    assert_ne!(detached, physical);
    assert_eq!(world.physical_count(), 2);
    assert_relative_eq!(
        world.physical(detached).unwrap().motion().velocity,
        Vec3::new(1.0, 0.0, 0.0),
        epsilon = 1e-12
    );
    assert!(!world.layer(0).unwrap().free().in_same_group(first, second));
    assert!(world.validate(DebugChecks::all()).is_ok());
}

#[test]
fn test_motorized_connection_turns_child() {
    let mut world = quiet_world();
    let (_, base) = world.add_physical(sphere_at(Vec3::zeros()), 0).unwrap();
    let wheel = world
        .attach_physical(
            base,
            sphere_at(Vec3::zeros()),
            HardConnection::ConstantSpeedMotor(ConstantSpeedProfile::new(1.0)),
            CFrame::from_position(Vec3::new(2.0, 0.0, 0.0)),
            CFrame::identity(),
        )
        .unwrap();

    for _ in 0..50 {
        world.tick().unwrap();
    }

    let cframe = *world.part(wheel).unwrap().cframe();
    let expected = Rotation::from_axis_angle(&Vec3::z_axis(), 0.5);
    assert_relative_eq!(cframe.position, Vec3::new(2.0, 0.0, 0.0), epsilon = 1e-9);
    assert_relative_eq!(cframe.rotation.angle_to(&expected), 0.0, epsilon = 1e-9);
}

#[test]
fn test_set_part_cframe_moves_whole_physical() {
    let mut world = quiet_world();
    let (_, first) = world.add_physical(sphere_at(Vec3::zeros()), 0).unwrap();
    let second = world
        .attach_part(first, sphere_at(Vec3::zeros()), CFrame::from_position(Vec3::new(1.0, 0.0, 0.0)))
        .unwrap();

    world
        .set_part_cframe(second, CFrame::from_position(Vec3::new(10.0, 5.0, 0.0)))
        .unwrap();

    assert_relative_eq!(world.part(first).unwrap().position(), Vec3::new(9.0, 5.0, 0.0), epsilon = 1e-12);
    assert_relative_eq!(world.part(second).unwrap().position(), Vec3::new(10.0, 5.0, 0.0), epsilon = 1e-12);
}

#[test]
fn test_stale_handles_are_errors() {
    let mut world = quiet_world();
    let (physical, part) = world.add_physical(sphere_at(Vec3::zeros()), 0).unwrap();
    world.remove_part(part).unwrap();

    assert!(world.part(part).is_err());
    assert!(world.physical(physical).is_err());
    assert!(world.remove_part(part).is_err());
    assert!(world.add_physical(sphere_at(Vec3::zeros()), 7).is_err());
}

#[test]
fn test_moment_and_angular_impulse_spin_the_body() {
    let mut world = quiet_world();
    let (physical, _) = world.add_physical(sphere_at(Vec3::zeros()), 0).unwrap();
    let inverse_inertia = world.physical(physical).unwrap().inverse_inertia();

    let angular_impulse = Vec3::new(0.0, 0.0, 2.0);
    world.physical_mut(physical).unwrap().apply_angular_impulse(&angular_impulse);
    let spin = inverse_inertia * angular_impulse;
    assert_relative_eq!(world.physical(physical).unwrap().motion().angular_velocity, spin, epsilon = 1e-12);

    // A moment acts for one tick only
    let moment = Vec3::new(3.0, 0.0, 0.0);
    world.physical_mut(physical).unwrap().apply_moment(&moment);
    world.tick().unwrap();
    let expected = spin + inverse_inertia * moment * 0.01;
    assert_relative_eq!(world.physical(physical).unwrap().motion().angular_velocity, expected, epsilon = 1e-9);
    world.tick().unwrap();
    assert_relative_eq!(world.physical(physical).unwrap().motion().angular_velocity, expected, epsilon = 1e-9);

    world.set_anchored(physical, true).unwrap();
    let before = world.physical(physical).unwrap().motion().angular_velocity;
    world.physical_mut(physical).unwrap().apply_angular_impulse(&angular_impulse);
    world.physical_mut(physical).unwrap().apply_moment(&moment);
    assert_eq!(world.physical(physical).unwrap().motion().angular_velocity, before);
}

#[test]
fn test_world_debug_output_lists_storage() {
    let mut world = quiet_world();
    world.add_physical(sphere_at(Vec3::zeros()), 0).unwrap();
    let text = format!("{:?}", world);
    assert!(text.contains("Arena"));
    assert!(text.contains("len: 1"));
}
