use crate::bodies::{ConnectedPhysical, HardConnection, MotorizedPhysical, NodeRemoval, Part, Physical, RigidBody};
use crate::collision::{
    find_colissions, find_colissions_parallel, handle_colission, BoundingSphereIntersection, Colission,
    ColissionBuffer, ColissionLayer, ColissionMask, DetectionContext, DumpTarget, IntersectionTest, LayerId,
    ResponseOutcome, ResponseParams, SubLayer,
};
use crate::constraints::ConstraintGroup;
use crate::core::{Arena, DebugChecks, PartId, PhysicalId, SimulationConfig, ThreadPool, TickStats};
use crate::error::PhysicsError;
use crate::forces::ExternalForce;
use crate::integration::{Integrator, SymplecticEuler};
use crate::math::{CFrame, Vec3};
use crate::Result;
use log::{debug, trace, warn};
use std::collections::HashSet;
use std::mem;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// The physics world: parts, physicals, layers, constraints and the tick pipeline
#[derive(Debug)]
pub struct World {
    /// Every part in the world
    parts: Arena<Part>,

    /// Every physical tree in the world
    physicals: Arena<MotorizedPhysical>,

    /// Collision layers, each with a free and a terrain half
    layers: Vec<ColissionLayer>,

    /// Which pairs of distinct layers collide
    colission_mask: ColissionMask,

    /// Constraint groups solved every tick
    constraint_groups: Vec<ConstraintGroup>,

    /// Force sources applied every tick
    external_forces: Vec<Box<dyn ExternalForce>>,

    /// Integrator used for every physical
    integrator: Box<dyn Integrator>,

    /// Exact intersection test of the narrow phase
    intersection: Arc<dyn IntersectionTest>,

    /// Workers for the narrow phase; detection runs on the calling thread without one
    pool: Option<Arc<ThreadPool>>,

    /// Configuration for the simulation
    config: SimulationConfig,

    /// Statistics of the last tick
    stats: TickStats,

    /// Number of completed ticks
    age: u64,

    /// Failed intersection pairs dumped by this world
    dumps_written: AtomicUsize,
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl World {
    /// Creates a new world with default settings
    pub fn new() -> Self {
        Self::with_config(SimulationConfig::default())
    }

    /// Creates a new world with the given configuration and one internally colliding layer
    pub fn with_config(config: SimulationConfig) -> Self {
        Self {
            parts: Arena::new(),
            physicals: Arena::new(),
            layers: vec![ColissionLayer::new(0, true)],
            colission_mask: ColissionMask::new(),
            constraint_groups: Vec::new(),
            external_forces: Vec::new(),
            integrator: Box::new(SymplecticEuler::new()),
            intersection: Arc::new(BoundingSphereIntersection),
            pool: None,
            config,
            stats: TickStats::default(),
            age: 0,
            dumps_written: AtomicUsize::new(0),
        }
    }

    /// Starts a thread pool sized by the configuration; detection runs in parallel afterwards
    pub fn start_thread_pool(&mut self) -> Result<()> {
        let workers = self.config.resolved_worker_count();
        self.pool = Some(Arc::new(ThreadPool::new(workers)?));
        Ok(())
    }

    /// Uses a shared thread pool for detection, or none
    pub fn set_thread_pool(&mut self, pool: Option<Arc<ThreadPool>>) {
        self.pool = pool;
    }

    /// Returns the thread pool, if any
    pub fn thread_pool(&self) -> Option<&Arc<ThreadPool>> {
        self.pool.as_ref()
    }

    /// Replaces the integrator
    pub fn set_integrator(&mut self, integrator: Box<dyn Integrator>) {
        self.integrator = integrator;
    }

    /// Replaces the exact intersection test
    pub fn set_intersection_test(&mut self, test: Arc<dyn IntersectionTest>) {
        self.intersection = test;
    }

    /// Returns a reference to the simulation configuration
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Returns a mutable reference to the simulation configuration
    pub fn config_mut(&mut self) -> &mut SimulationConfig {
        &mut self.config
    }

    /// Number of completed ticks
    pub fn age(&self) -> u64 {
        self.age
    }

    /// Number of failed intersection pairs this world has dumped
    pub fn diagnostic_dump_count(&self) -> usize {
        self.dumps_written.load(Ordering::Relaxed)
    }

    /// Simulated time elapsed
    pub fn time(&self) -> f64 {
        self.age as f64 * self.config.delta_t
    }

    /// Statistics of the last completed tick
    pub fn last_tick_stats(&self) -> &TickStats {
        &self.stats
    }

    // Layers

    /// Adds a collision layer and returns its index
    pub fn create_layer(&mut self, collides_internally: bool) -> usize {
        let index = self.layers.len();
        self.layers.push(ColissionLayer::new(index, collides_internally));
        index
    }

    /// Returns the number of collision layers
    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    /// Returns a collision layer
    pub fn layer(&self, index: usize) -> Result<&ColissionLayer> {
        self.layers
            .get(index)
            .ok_or_else(|| PhysicsError::ResourceNotFound(format!("Layer {} not found", index)))
    }

    /// Returns every collision layer
    pub fn layers(&self) -> &[ColissionLayer] {
        &self.layers
    }

    fn check_layer(&self, index: usize) -> Result<()> {
        self.layer(index).map(|_| ())
    }

    /// Sets whether two distinct layers collide with each other
    pub fn set_layers_collide(&mut self, i: usize, j: usize, collides: bool) -> Result<()> {
        self.check_layer(i)?;
        self.check_layer(j)?;
        if i == j {
            return Err(PhysicsError::InvalidParameter(
                "use set_layer_collides_internally for a single layer".to_string(),
            ));
        }
        self.colission_mask.set(i, j, collides);
        Ok(())
    }

    /// Sets whether the parts of one layer collide with each other
    pub fn set_layer_collides_internally(&mut self, index: usize, collides: bool) -> Result<()> {
        self.check_layer(index)?;
        self.layers[index].set_collides_internally(collides);
        Ok(())
    }

    /// Returns the layer collision mask
    pub fn colission_mask(&self) -> &ColissionMask {
        &self.colission_mask
    }

    /// Recomputes the bounds of every layer
    pub fn refresh_layers(&mut self) {
        for layer in &mut self.layers {
            layer.refresh(&self.parts);
        }
    }

    // Parts and physicals

    /// Returns a part
    pub fn part(&self, id: PartId) -> Result<&Part> {
        self.parts.get_checked(id, "Part")
    }

    /// Returns a part mutably; use [`World::set_part_cframe`] to move it
    pub fn part_mut(&mut self, id: PartId) -> Result<&mut Part> {
        self.parts.get_checked_mut(id, "Part")
    }

    /// Returns every part
    pub fn parts(&self) -> impl Iterator<Item = (PartId, &Part)> + '_ {
        self.parts.iter()
    }

    /// Returns the number of parts
    pub fn part_count(&self) -> usize {
        self.parts.len()
    }

    /// Returns a physical
    pub fn physical(&self, id: PhysicalId) -> Result<&MotorizedPhysical> {
        self.physicals.get_checked(id, "Physical")
    }

    /// Returns a physical mutably
    pub fn physical_mut(&mut self, id: PhysicalId) -> Result<&mut MotorizedPhysical> {
        self.physicals.get_checked_mut(id, "Physical")
    }

    /// Returns every physical
    pub fn physicals(&self) -> impl Iterator<Item = (PhysicalId, &MotorizedPhysical)> + '_ {
        self.physicals.iter()
    }

    /// Returns every physical mutably
    pub fn physicals_mut(&mut self) -> impl Iterator<Item = (PhysicalId, &mut MotorizedPhysical)> + '_ {
        self.physicals.iter_mut()
    }

    /// Returns the number of physicals
    pub fn physical_count(&self) -> usize {
        self.physicals.len()
    }

    /// Returns the physical a part belongs to
    pub fn physical_of(&self, part: PartId) -> Result<Option<PhysicalId>> {
        Ok(self.part(part)?.parent())
    }

    /// Adds a part as the only part of a new free physical in `layer`
    pub fn add_physical(&mut self, part: Part, layer: usize) -> Result<(PhysicalId, PartId)> {
        self.check_layer(layer)?;
        let cframe = *part.cframe();
        let part_id = self.parts.insert(part);
        let mut physical = MotorizedPhysical::new(Physical::new(RigidBody::new(part_id, cframe)));
        physical.recompute_mass(&mut self.parts);
        let physical_id = self.physicals.insert(physical);

        if let Some(entry) = self.parts.get_mut(part_id) {
            entry.parent = Some(physical_id);
        }
        self.layers[layer]
            .sub_mut(SubLayer::Free)
            .add_part(&mut self.parts, part_id)?;
        debug!("Added physical {:?} with part {:?} to layer {}", physical_id, part_id, layer);
        Ok((physical_id, part_id))
    }

    /// Adds a part that belongs to no physical; it never moves
    pub fn add_terrain_part(&mut self, part: Part, layer: usize) -> Result<PartId> {
        self.check_layer(layer)?;
        let part_id = self.parts.insert(part);
        self.layers[layer]
            .sub_mut(SubLayer::Terrain)
            .add_part(&mut self.parts, part_id)?;
        Ok(part_id)
    }

    fn parent_of(&self, part: PartId) -> Result<PhysicalId> {
        self.part(part)?.parent().ok_or_else(|| {
            PhysicsError::InvalidParameter(format!("part {:?} does not belong to a physical", part))
        })
    }

    fn layer_of(&self, part: PartId) -> Result<LayerId> {
        self.part(part)?
            .layer()
            .ok_or_else(|| PhysicsError::LayerMismatch(format!("part {:?} is in no layer", part)))
    }

    /// Rigidly attaches a new part to the rigid body holding `representative`.
    ///
    /// `attachment` is relative to the representative's frame.
    pub fn attach_part(&mut self, representative: PartId, part: Part, attachment: CFrame) -> Result<PartId> {
        let physical_id = self.parent_of(representative)?;
        let layer = self.layer_of(representative)?;
        let part_id = self.parts.insert(part);

        let physical = self.physicals.get_checked_mut(physical_id, "Physical")?;
        let Some(node) = physical.root_mut().node_containing_mut(representative) else {
            self.parts.remove(part_id);
            return Err(PhysicsError::InvariantViolation(format!(
                "part {:?} is not in its parent physical {:?}",
                representative, physical_id
            )));
        };
        let relative = node
            .rigid_body
            .attachment_of(representative)
            .unwrap_or_else(CFrame::identity)
            .local_to_global_cframe(&attachment);
        node.rigid_body.attach(part_id, relative);

        self.finish_attach(physical_id, part_id, representative, layer)?;
        Ok(part_id)
    }

    /// Attaches a new part as a child physical of the node holding `parent_part`.
    ///
    /// `attach_on_parent` is relative to the parent part's frame and
    /// `attach_on_child` to the new part's frame.
    pub fn attach_physical(
        &mut self,
        parent_part: PartId,
        part: Part,
        connection: HardConnection,
        attach_on_parent: CFrame,
        attach_on_child: CFrame,
    ) -> Result<PartId> {
        let physical_id = self.parent_of(parent_part)?;
        let layer = self.layer_of(parent_part)?;
        let cframe = *part.cframe();
        let part_id = self.parts.insert(part);

        let physical = self.physicals.get_checked_mut(physical_id, "Physical")?;
        let Some(node) = physical.root_mut().node_containing_mut(parent_part) else {
            self.parts.remove(part_id);
            return Err(PhysicsError::InvariantViolation(format!(
                "part {:?} is not in its parent physical {:?}",
                parent_part, physical_id
            )));
        };
        let on_parent = node
            .rigid_body
            .attachment_of(parent_part)
            .unwrap_or_else(CFrame::identity)
            .local_to_global_cframe(&attach_on_parent);
        node.children.push(ConnectedPhysical::new(
            Physical::new(RigidBody::new(part_id, cframe)),
            connection,
            on_parent,
            attach_on_child,
        ));

        self.finish_attach(physical_id, part_id, parent_part, layer)?;
        Ok(part_id)
    }

    fn finish_attach(&mut self, physical_id: PhysicalId, part_id: PartId, representative: PartId, layer: LayerId) -> Result<()> {
        let velocity_before = self.physical_motion_snapshot(physical_id)?;
        if let Some(entry) = self.parts.get_mut(part_id) {
            entry.parent = Some(physical_id);
        }
        let physical = self.physicals.get_checked_mut(physical_id, "Physical")?;
        physical.recompute_mass(&mut self.parts);
        restore_motion(physical, velocity_before);

        self.layers[layer.layer]
            .sub_mut(layer.sub)
            .add_into_group(&mut self.parts, part_id, representative)
    }

    fn physical_motion_snapshot(&self, id: PhysicalId) -> Result<(Vec3, Vec3, Vec3)> {
        let physical = self.physical(id)?;
        let motion = physical.motion();
        Ok((physical.center_of_mass(), motion.velocity, motion.angular_velocity))
    }

    /// Removes a part from the world and returns it.
    ///
    /// The part's physical is told about the removal; it is destroyed, along
    /// with its constraints, when its last part leaves.
    pub fn remove_part(&mut self, part_id: PartId) -> Result<Part> {
        let layer = self.part(part_id)?.layer();
        if let Some(layer) = layer {
            self.layers[layer.layer]
                .sub_mut(layer.sub)
                .remove_part(&mut self.parts, part_id)?;
        }
        if let Some(physical_id) = self.part(part_id)?.parent() {
            self.detach_from_physical(physical_id, part_id)?;
        }
        self.parts
            .remove(part_id)
            .ok_or_else(|| PhysicsError::ResourceNotFound(format!("Part with handle {:?} not found", part_id)))
    }

    fn detach_from_physical(&mut self, physical_id: PhysicalId, part_id: PartId) -> Result<()> {
        let physical = self.physicals.get_checked_mut(physical_id, "Physical")?;
        let old_frame = *physical.cframe();
        let motion_before = (
            physical.center_of_mass(),
            physical.motion().velocity,
            physical.motion().angular_velocity,
        );

        let removal = physical.root_mut().remove_part(part_id);
        if let Some(entry) = self.parts.get_mut(part_id) {
            entry.parent = None;
        }
        match removal {
            NodeRemoval::NotFound => Err(PhysicsError::InvariantViolation(format!(
                "part {:?} claims physical {:?} which does not hold it",
                part_id, physical_id
            ))),
            NodeRemoval::Emptied => {
                self.physicals.remove(physical_id);
                let dropped: usize = self
                    .constraint_groups
                    .iter_mut()
                    .map(|g| g.remove_involving(physical_id))
                    .sum();
                debug!("Physical {:?} emptied; dropped {} constraints", physical_id, dropped);
                Ok(())
            }
            NodeRemoval::Removed => {
                let physical = self.physicals.get_checked_mut(physical_id, "Physical")?;
                physical.recompute_mass(&mut self.parts);
                restore_motion(physical, motion_before);
                let new_frame = *physical.cframe();
                if new_frame != old_frame {
                    let offset = new_frame.global_to_local_cframe(&old_frame);
                    for group in &mut self.constraint_groups {
                        group.replace_physical(physical_id, physical_id, &offset);
                    }
                }
                Ok(())
            }
        }
    }

    /// Splits a part off its physical into a new physical of its own
    pub fn detach_part(&mut self, part_id: PartId) -> Result<PhysicalId> {
        let physical_id = self.parent_of(part_id)?;
        let physical = self.physical(physical_id)?;
        if physical.part_ids().len() == 1 {
            return Ok(physical_id);
        }
        let anchored = physical.is_anchored();
        let part_cframe = *self.part(part_id)?.cframe();
        let part_velocity = {
            let offset = part_cframe.position - physical.center_of_mass();
            (physical.velocity_of_point(&offset), physical.motion().angular_velocity)
        };

        self.detach_from_physical(physical_id, part_id)?;

        let mut new_physical = MotorizedPhysical::new(Physical::new(RigidBody::new(part_id, part_cframe)));
        new_physical.set_anchored(anchored);
        new_physical.recompute_mass(&mut self.parts);
        new_physical.set_velocity(part_velocity.0);
        new_physical.set_angular_velocity(part_velocity.1);
        let new_id = self.physicals.insert(new_physical);
        if let Some(entry) = self.parts.get_mut(part_id) {
            entry.parent = Some(new_id);
        }

        let layer = self.layer_of(part_id)?;
        self.layers[layer.layer]
            .sub_mut(layer.sub)
            .move_out_of_group(&self.parts, part_id)?;
        Ok(new_id)
    }

    /// Welds `other` onto `main`; `other` stops existing.
    ///
    /// Linear momentum is conserved and the layer groups of both are merged.
    /// Constraints on `other` move to `main`; constraints between the two are dropped.
    pub fn merge_physicals(&mut self, main: PhysicalId, other: PhysicalId) -> Result<()> {
        if main == other {
            return Err(PhysicsError::InvalidParameter(format!(
                "cannot merge physical {:?} with itself",
                main
            )));
        }
        let main_physical = self.physical(main)?;
        let other_physical = self.physical(other)?;
        let main_part = main_physical.root().rigid_body().main_part();
        let other_part = other_physical.root().rigid_body().main_part();
        let main_layer = self.layer_of(main_part)?;
        let other_layer = self.layer_of(other_part)?;
        if main_layer != other_layer {
            return Err(PhysicsError::LayerMismatch(format!(
                "cannot merge physicals in layers {:?} and {:?}",
                main_layer, other_layer
            )));
        }

        let momentum = main_physical.motion().velocity * main_physical.mass()
            + other_physical.motion().velocity * other_physical.mass();
        let total_mass = main_physical.mass() + other_physical.mass();
        let main_frame = *main_physical.cframe();
        let offset = main_frame.global_to_local_cframe(other_physical.cframe());
        let angular_velocity = main_physical.motion().angular_velocity;

        let Some(absorbed) = self.physicals.remove(other) else {
            return Err(PhysicsError::ResourceNotFound(format!("Physical with handle {:?} not found", other)));
        };
        let absorbed_parts = absorbed.part_ids();
        let root = absorbed.into_root();

        let physical = self.physicals.get_checked_mut(main, "Physical")?;
        physical
            .root_mut()
            .children
            .push(ConnectedPhysical::new(root, HardConnection::Fixed, offset, CFrame::identity()));
        for part in &absorbed_parts {
            if let Some(entry) = self.parts.get_mut(*part) {
                entry.parent = Some(main);
            }
        }
        physical.recompute_mass(&mut self.parts);
        if total_mass > 0.0 && !physical.is_anchored() {
            physical.set_velocity(momentum / total_mass);
            physical.set_angular_velocity(angular_velocity);
        }

        for group in &mut self.constraint_groups {
            group.replace_physical(other, main, &offset);
        }
        self.layers[main_layer.layer]
            .sub_mut(main_layer.sub)
            .merge_groups(&self.parts, main_part, other_part)?;
        debug!("Merged physical {:?} into {:?}", other, main);
        Ok(())
    }

    /// Anchors or frees a physical; its parts move between the free and terrain halves of their layers
    pub fn set_anchored(&mut self, physical_id: PhysicalId, anchored: bool) -> Result<()> {
        let physical = self.physical(physical_id)?;
        if physical.is_anchored() == anchored {
            return Ok(());
        }
        let parts = physical.part_ids();
        let target = if anchored { SubLayer::Terrain } else { SubLayer::Free };
        self.physicals
            .get_checked_mut(physical_id, "Physical")?
            .set_anchored(anchored);

        for part in parts {
            let layer = self.layer_of(part)?;
            self.relocate_part(part, layer, LayerId::new(layer.layer, target))?;
        }
        Ok(())
    }

    /// Moves a part to another collision layer, keeping its sublayer
    pub fn move_part_to_layer(&mut self, part: PartId, layer: usize) -> Result<()> {
        self.check_layer(layer)?;
        let current = self.layer_of(part)?;
        self.relocate_part(part, current, LayerId::new(layer, current.sub))
    }

    fn relocate_part(&mut self, part: PartId, from: LayerId, to: LayerId) -> Result<()> {
        if from == to {
            return Ok(());
        }
        self.layers[from.layer]
            .sub_mut(from.sub)
            .remove_part(&mut self.parts, part)?;

        // Join a sibling of the same physical already in the target, if any
        let sibling = self.part(part)?.parent().and_then(|pid| {
            let target = &self.layers[to.layer].sub(to.sub);
            self.physicals
                .get(pid)
                .and_then(|p| p.part_ids().into_iter().find(|&other| other != part && target.contains(other)))
        });
        let target = self.layers[to.layer].sub_mut(to.sub);
        match sibling {
            Some(representative) => target.add_into_group(&mut self.parts, part, representative),
            None => target.add_part(&mut self.parts, part),
        }
    }

    /// Places a part at `cframe`, moving the whole physical it belongs to
    pub fn set_part_cframe(&mut self, part_id: PartId, cframe: CFrame) -> Result<()> {
        let part = self.part(part_id)?;
        let current = *part.cframe();
        match part.parent() {
            Some(physical_id) => {
                let physical = self.physicals.get_checked_mut(physical_id, "Physical")?;
                let relative = physical.cframe().global_to_local_cframe(&current);
                let new_root = cframe.local_to_global_cframe(&relative.inverse());
                physical.set_root_cframe(new_root);
                physical.refresh(&mut self.parts);
                for part in physical.part_ids() {
                    let layer = self.layer_of(part)?;
                    self.layers[layer.layer]
                        .sub_mut(layer.sub)
                        .notify_part_moved(&self.parts, part)?;
                }
            }
            None => {
                self.parts.get_checked_mut(part_id, "Part")?.set_cframe(cframe);
                if let Some(layer) = self.part(part_id)?.layer() {
                    self.layers[layer.layer]
                        .sub_mut(layer.sub)
                        .notify_part_moved(&self.parts, part_id)?;
                }
            }
        }
        Ok(())
    }

    // Constraints and forces

    /// Adds a constraint group and returns its index
    pub fn add_constraint_group(&mut self, group: ConstraintGroup) -> Result<usize> {
        for pc in group.constraints() {
            self.physical(pc.physical_a)?;
            self.physical(pc.physical_b)?;
        }
        self.constraint_groups.push(group);
        Ok(self.constraint_groups.len() - 1)
    }

    /// Returns every constraint group
    pub fn constraint_groups(&self) -> &[ConstraintGroup] {
        &self.constraint_groups
    }

    /// Returns a constraint group mutably
    pub fn constraint_group_mut(&mut self, index: usize) -> Result<&mut ConstraintGroup> {
        self.constraint_groups
            .get_mut(index)
            .ok_or_else(|| PhysicsError::ResourceNotFound(format!("Constraint group {} not found", index)))
    }

    /// Registers a force source applied every tick
    pub fn add_external_force(&mut self, force: Box<dyn ExternalForce>) {
        self.external_forces.push(force);
    }

    /// Returns the registered force sources
    pub fn external_forces(&self) -> &[Box<dyn ExternalForce>] {
        &self.external_forces
    }

    // Tick

    /// Total kinetic energy of every physical
    pub fn kinetic_energy(&self) -> f64 {
        self.physicals.iter().map(|(_, p)| p.total_kinetic_energy()).sum()
    }

    /// Applies the response of one confirmed contact
    pub fn handle_colission(&mut self, colission: &Colission) -> Result<ResponseOutcome> {
        let params = ResponseParams::from(&self.config);
        handle_colission(&self.parts, &mut self.physicals, colission, &params)
    }

    /// Read-only detection phase: broad phase, then the narrow phase on the pool if there is one
    pub fn detect_colissions(&self) -> Result<ColissionBuffer> {
        let ctx = DetectionContext {
            layers: &self.layers,
            mask: &self.colission_mask,
            parts: &self.parts,
            test: self.intersection.as_ref(),
            dumps: DumpTarget {
                dir: &self.config.diagnostic_dir,
                counter: &self.dumps_written,
            },
        };
        match &self.pool {
            Some(pool) => find_colissions_parallel(pool, &ctx),
            None => find_colissions(&ctx),
        }
    }

    /// Mutating phases of a tick: forces, collision response, constraints, integration.
    ///
    /// Contacts whose parts were removed since detection are skipped.
    pub fn apply_tick(&mut self, buffer: ColissionBuffer) -> Result<()> {
        let dt = self.config.delta_t;
        self.stats.reset();
        self.stats.candidate_count = buffer.candidate_count;
        self.stats.confirmed_colissions = buffer.len();
        self.stats.detection_time = buffer.detection_time;

        let start = Instant::now();
        let forces = mem::take(&mut self.external_forces);
        for force in &forces {
            trace!("Applying external force {}", force.name());
            force.apply(self);
        }
        let added = mem::replace(&mut self.external_forces, forces);
        self.external_forces.extend(added);
        self.stats.external_force_time = start.elapsed();

        let start = Instant::now();
        let params = ResponseParams::from(&self.config);
        for colission in buffer.iter() {
            if !self.parts.contains(colission.part_a) || !self.parts.contains(colission.part_b) {
                trace!("Skipping stale colission {:?} - {:?}", colission.part_a, colission.part_b);
                continue;
            }
            let outcome = handle_colission(&self.parts, &mut self.physicals, colission, &params)?;
            if outcome.skipped {
                self.stats.skipped_degenerate += 1;
            } else {
                self.stats.handled_colissions += 1;
            }
        }
        self.stats.response_time = start.elapsed();

        let start = Instant::now();
        let check_finite = self.config.debug_checks.contains(DebugChecks::CHECK_FINITE);
        for group in &mut self.constraint_groups {
            group.update(dt);
            let report = group.apply(&mut self.physicals, check_finite)?;
            self.stats.constraint_parameters += report.parameter_count;
            if !report.finite {
                self.stats.non_finite_solutions += 1;
                if check_finite {
                    warn!(
                        "Dropped non-finite solution of a {}-parameter constraint system",
                        report.parameter_count
                    );
                }
            }
        }
        self.stats.constraint_time = start.elapsed();

        let start = Instant::now();
        for (_, physical) in self.physicals.iter_mut() {
            // Anchored trees sit in terrain trees, which are not refreshed per tick
            let anchored = physical.is_anchored();
            if !anchored {
                physical.update_connections(dt);
            }
            self.integrator.integrate(physical, dt);
            if !anchored {
                physical.refresh(&mut self.parts);
            }
        }
        for layer in &mut self.layers {
            layer.refresh_free(&self.parts);
        }
        self.stats.integration_time = start.elapsed();

        self.age += 1;
        debug!(
            "Tick {}: {} candidates, {} colissions, {} handled",
            self.age, self.stats.candidate_count, self.stats.confirmed_colissions, self.stats.handled_colissions
        );
        self.run_debug_checks();
        Ok(())
    }

    /// One full synchronous tick
    pub fn tick(&mut self) -> Result<()> {
        let buffer = self.detect_colissions()?;
        self.apply_tick(buffer)
    }

    fn run_debug_checks(&self) {
        let checks = self.config.debug_checks & (DebugChecks::VALIDATE_LAYERS | DebugChecks::VALIDATE_PHYSICALS);
        if checks.is_empty() {
            return;
        }
        if let Err(err) = self.validate(checks) {
            panic!("World invariant violated after tick {}: {}", self.age, err);
        }
    }

    /// Checks the bookkeeping between parts, layers and physicals
    pub fn validate(&self, checks: DebugChecks) -> Result<()> {
        if checks.contains(DebugChecks::VALIDATE_LAYERS) {
            self.validate_layers()?;
        }
        if checks.contains(DebugChecks::VALIDATE_PHYSICALS) {
            self.validate_physicals()?;
        }
        Ok(())
    }

    fn validate_layers(&self) -> Result<()> {
        let violation = |message: String| -> Result<()> { Err(PhysicsError::InvariantViolation(message)) };
        let mut hosted = HashSet::new();

        for layer in &self.layers {
            for sub in [SubLayer::Free, SubLayer::Terrain] {
                let world_layer = layer.sub(sub);
                for part_id in world_layer.parts() {
                    if !hosted.insert(part_id) {
                        return violation(format!("part {:?} is in more than one tree", part_id));
                    }
                    let Some(part) = self.parts.get(part_id) else {
                        return violation(format!("layer {:?} holds stale part {:?}", world_layer.id(), part_id));
                    };
                    if part.layer() != Some(world_layer.id()) {
                        return violation(format!(
                            "part {:?} is in layer {:?} but points at {:?}",
                            part_id,
                            world_layer.id(),
                            part.layer()
                        ));
                    }
                    let movable = part
                        .parent()
                        .and_then(|pid| self.physicals.get(pid))
                        .is_some_and(|p| !p.is_anchored());
                    if movable != (sub == SubLayer::Free) {
                        return violation(format!("part {:?} is in the wrong half of its layer", part_id));
                    }
                }
            }
        }

        for (part_id, part) in self.parts.iter() {
            if !hosted.contains(&part_id) {
                return violation(format!("part {:?} points at {:?} but no tree holds it", part_id, part.layer()));
            }
        }
        Ok(())
    }

    fn validate_physicals(&self) -> Result<()> {
        let violation = |message: String| -> Result<()> { Err(PhysicsError::InvariantViolation(message)) };

        for (physical_id, physical) in self.physicals.iter() {
            let part_ids = physical.part_ids();
            if part_ids.is_empty() {
                return violation(format!("physical {:?} is empty", physical_id));
            }
            for part_id in part_ids {
                match self.parts.get(part_id) {
                    Some(part) if part.parent() == Some(physical_id) => {}
                    Some(part) => {
                        return violation(format!(
                            "part {:?} is in physical {:?} but points at {:?}",
                            part_id,
                            physical_id,
                            part.parent()
                        ))
                    }
                    None => return violation(format!("physical {:?} holds stale part {:?}", physical_id, part_id)),
                }
            }
        }

        for (part_id, part) in self.parts.iter() {
            if let Some(physical_id) = part.parent() {
                let holds = self
                    .physicals
                    .get(physical_id)
                    .is_some_and(|p| p.contains_part(part_id));
                if !holds {
                    return violation(format!(
                        "part {:?} points at physical {:?} which does not hold it",
                        part_id, physical_id
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Keeps the motion of the material after the center of mass moved
fn restore_motion(physical: &mut MotorizedPhysical, (old_center, velocity, angular_velocity): (Vec3, Vec3, Vec3)) {
    let shift = physical.center_of_mass() - old_center;
    physical.set_velocity(velocity + angular_velocity.cross(&shift));
    physical.set_angular_velocity(angular_velocity);
}
