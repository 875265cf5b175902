use approx::assert_relative_eq;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rigid_tick::bodies::Part;
use rigid_tick::collision::{Colission, Contact, IntersectionTest};
use rigid_tick::core::ThreadPool;
use rigid_tick::error::{IntersectionError, PhysicsError};
use rigid_tick::math::{CFrame, Vec3};
use rigid_tick::{DebugChecks, PartProperties, Shape, SimulationConfig, World};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

fn ball(position: Vec3, properties: PartProperties) -> Part {
    Part::new(Shape::sphere(0.5), CFrame::from_position(position), properties)
}

fn test_world() -> World {
    World::with_config(SimulationConfig {
        worker_count: Some(0),
        debug_checks: DebugChecks::all(),
        ..SimulationConfig::default()
    })
}

/// Reports every candidate pair as touching with a zero exit vector
#[derive(Debug)]
struct TouchingIntersection;

impl IntersectionTest for TouchingIntersection {
    fn intersects(&self, a: &Part, b: &Part) -> Result<Option<Contact>, IntersectionError> {
        Ok(Some(Contact {
            contact_point: (a.position() + b.position()) * 0.5,
            exit_vector: Vec3::zeros(),
        }))
    }
}

#[derive(Debug)]
struct FailingIntersection;

impl IntersectionTest for FailingIntersection {
    fn intersects(&self, _: &Part, _: &Part) -> Result<Option<Contact>, IntersectionError> {
        Err(IntersectionError::new("degenerate hull"))
    }
}

fn unique_temp_dir(name: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    std::env::temp_dir().join(format!("rigid_tick_{}_{}_{}", name, std::process::id(), nanos))
}

#[test]
fn test_elastic_head_on_colission_swaps_velocities() {
    let mut world = test_world();
    let bouncy = PartProperties::new(1.0, 0.0, 1.0);
    let (a, _) = world.add_physical(ball(Vec3::zeros(), bouncy), 0).unwrap();
    let (b, _) = world.add_physical(ball(Vec3::new(0.99, 0.0, 0.0), bouncy), 0).unwrap();
    world.physical_mut(a).unwrap().set_velocity(Vec3::new(1.0, 0.0, 0.0));
    world.physical_mut(b).unwrap().set_velocity(Vec3::new(-1.0, 0.0, 0.0));
    let energy_before = world.kinetic_energy();

    let buffer = world.detect_colissions().unwrap();
    assert_eq!(buffer.len(), 1);
    for colission in buffer.iter() {
        let outcome = world.handle_colission(colission).unwrap();
        assert!(!outcome.skipped);
    }

    assert_relative_eq!(world.kinetic_energy(), energy_before, epsilon = 1e-9);
    assert_relative_eq!(
        world.physical(a).unwrap().motion().velocity,
        Vec3::new(-1.0, 0.0, 0.0),
        epsilon = 1e-9
    );
    assert_relative_eq!(
        world.physical(b).unwrap().motion().velocity,
        Vec3::new(1.0, 0.0, 0.0),
        epsilon = 1e-9
    );
}

#[test]
fn test_static_friction_never_exceeds_coulomb_cap() {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    let mut world = test_world();
    let floor = world
        .add_terrain_part(
            Part::new(Shape::cuboid(20.0, 1.0, 20.0), CFrame::identity(), PartProperties::new(1.0, 1.0, 0.0)),
            0,
        )
        .unwrap();

    for _ in 0..200 {
        let friction = rng.gen_range(0.0..1.5);
        let (physical, part) = world
            .add_physical(ball(Vec3::new(0.0, 0.99, 0.0), PartProperties::new(1.0, friction, 0.3)), 0)
            .unwrap();
        let velocity = Vec3::new(rng.gen_range(-5.0..5.0), rng.gen_range(-5.0..-0.01), rng.gen_range(-5.0..5.0));
        world.physical_mut(physical).unwrap().set_velocity(velocity);

        let colission = Colission {
            part_a: floor,
            part_b: part,
            contact_point: Vec3::new(0.0, 0.5, 0.0),
            exit_vector: Vec3::new(0.0, 0.01, 0.0),
        };
        let outcome = world.handle_colission(&colission).unwrap();

        assert!(!outcome.skipped);
        assert!(outcome.normal_impulse > 0.0);
        assert!(outcome.friction_impulse <= friction * outcome.normal_impulse + 1e-12);
        assert!(world.physical(physical).unwrap().motion().velocity.y >= -1e-9);

        world.remove_part(part).unwrap();
    }
}

#[test]
fn test_zero_depth_contacts_are_skipped() {
    let mut world = test_world();
    world.set_intersection_test(Arc::new(TouchingIntersection));
    let (a, _) = world.add_physical(ball(Vec3::zeros(), PartProperties::default()), 0).unwrap();
    world.add_physical(ball(Vec3::new(0.9, 0.0, 0.0), PartProperties::default()), 0).unwrap();
    world.physical_mut(a).unwrap().set_velocity(Vec3::new(1.0, 0.0, 0.0));

    world.tick().unwrap();

    let stats = world.last_tick_stats();
    assert_eq!(stats.confirmed_colissions, 1);
    assert_eq!(stats.skipped_degenerate, 1);
    assert_eq!(stats.handled_colissions, 0);
    assert_relative_eq!(world.physical(a).unwrap().motion().velocity, Vec3::new(1.0, 0.0, 0.0));
}

#[test]
fn test_failing_intersection_writes_diagnostic_and_fails_tick() {
    let dir = unique_temp_dir("dump");
    let mut world = World::with_config(SimulationConfig {
        worker_count: Some(0),
        diagnostic_dir: dir.clone(),
        ..SimulationConfig::default()
    });
    world.set_intersection_test(Arc::new(FailingIntersection));
    world.add_physical(ball(Vec3::zeros(), PartProperties::default()), 0).unwrap();
    world.add_physical(ball(Vec3::new(0.5, 0.0, 0.0), PartProperties::default()), 0).unwrap();

    let result = world.tick();
    assert!(matches!(result, Err(PhysicsError::Intersection(_))));
    assert_eq!(world.age(), 0);

    let dumps: Vec<_> = fs::read_dir(&dir)
        .unwrap()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_name().to_string_lossy().starts_with("colission_dump_"))
        .collect();
    assert_eq!(dumps.len(), 1);
    assert_eq!(world.diagnostic_dump_count(), 1);
    let contents = fs::read_to_string(dumps[0].path()).unwrap();
    assert!(contents.contains("degenerate hull"));

    fs::remove_dir_all(&dir).unwrap();
}

fn failing_world(dir: &PathBuf) -> World {
    let mut world = World::with_config(SimulationConfig {
        worker_count: Some(0),
        diagnostic_dir: dir.clone(),
        ..SimulationConfig::default()
    });
    world.set_intersection_test(Arc::new(FailingIntersection));
    world.add_physical(ball(Vec3::zeros(), PartProperties::default()), 0).unwrap();
    world.add_physical(ball(Vec3::new(0.5, 0.0, 0.0), PartProperties::default()), 0).unwrap();
    world
}

#[test]
fn test_worlds_sharing_a_dump_dir_count_their_own_dumps() {
    let dir = unique_temp_dir("shared_dump");
    let mut first = failing_world(&dir);
    let mut second = failing_world(&dir);

    assert!(first.tick().is_err());
    assert!(first.tick().is_err());
    assert!(second.tick().is_err());

    assert_eq!(first.diagnostic_dump_count(), 2);
    assert_eq!(second.diagnostic_dump_count(), 1);

    // No dump overwrote another
    let dumps = fs::read_dir(&dir)
        .unwrap()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_name().to_string_lossy().starts_with("colission_dump_"))
        .count();
    assert_eq!(dumps, 3);

    fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_parallel_detection_matches_serial() {
    let mut rng = StdRng::seed_from_u64(42);
    let mut serial = test_world();
    let terrain_layer = serial.create_layer(false);
    serial.set_layers_collide(0, terrain_layer, true).unwrap();

    for _ in 0..80 {
        let position = Vec3::new(rng.gen_range(0.0..6.0), rng.gen_range(0.0..6.0), rng.gen_range(0.0..6.0));
        serial.add_physical(ball(position, PartProperties::default()), 0).unwrap();
    }
    for _ in 0..10 {
        let position = Vec3::new(rng.gen_range(0.0..6.0), rng.gen_range(0.0..6.0), rng.gen_range(0.0..6.0));
        serial
            .add_terrain_part(ball(position, PartProperties::default()), terrain_layer)
            .unwrap();
    }

    let expected = serial.detect_colissions().unwrap();
    assert!(!expected.is_empty());

    let mut parallel = serial;
    parallel.set_thread_pool(Some(Arc::new(ThreadPool::new(3).unwrap())));
    let actual = parallel.detect_colissions().unwrap();

    assert_eq!(actual.candidate_count, expected.candidate_count);
    assert_eq!(actual.free_colissions, expected.free_colissions);
    assert_eq!(actual.free_terrain_colissions, expected.free_terrain_colissions);
}

#[test]
fn test_layer_mask_controls_cross_layer_pairs() {
    let mut world = test_world();
    let other = world.create_layer(true);
    world.add_physical(ball(Vec3::zeros(), PartProperties::default()), 0).unwrap();
    world.add_physical(ball(Vec3::new(0.5, 0.0, 0.0), PartProperties::default()), other).unwrap();

    assert_eq!(world.detect_colissions().unwrap().candidate_count, 0);

    world.set_layers_collide(0, other, true).unwrap();
    assert_eq!(world.detect_colissions().unwrap().len(), 1);

    world.set_layers_collide(other, 0, false).unwrap();
    assert_eq!(world.detect_colissions().unwrap().candidate_count, 0);

    assert!(world.set_layers_collide(0, 0, true).is_err());
    assert!(world.set_layers_collide(0, 9, true).is_err());
}

#[test]
fn test_terrain_never_collides_with_terrain() {
    let mut world = test_world();
    world.add_terrain_part(ball(Vec3::zeros(), PartProperties::default()), 0).unwrap();
    world.add_terrain_part(ball(Vec3::new(0.2, 0.0, 0.0), PartProperties::default()), 0).unwrap();

    world.tick().unwrap();
    assert_eq!(world.last_tick_stats().candidate_count, 0);

    world.add_physical(ball(Vec3::new(0.1, 0.5, 0.0), PartProperties::default()), 0).unwrap();
    world.tick().unwrap();
    assert_eq!(world.last_tick_stats().candidate_count, 2);
    assert_eq!(world.last_tick_stats().handled_colissions, 2);
}

#[test]
fn test_internal_colissions_can_be_disabled() {
    let mut world = test_world();
    world.add_physical(ball(Vec3::zeros(), PartProperties::default()), 0).unwrap();
    world.add_physical(ball(Vec3::new(0.5, 0.0, 0.0), PartProperties::default()), 0).unwrap();
    assert_eq!(world.detect_colissions().unwrap().len(), 1);

    world.set_layer_collides_internally(0, false).unwrap();
    assert_eq!(world.detect_colissions().unwrap().candidate_count, 0);
}
