use crate::bodies::rigid_body::PartRemoval;
use crate::bodies::{Part, RigidBody};
use crate::constraints::{ConstantSpeedProfile, MotorProfile, SinusoidalProfile};
use crate::core::{Arena, PartId};
use crate::math::{rotate_inertia, CFrame, Mat3, Motion, Rotation, Vec3};

/// A hard connection baked into a physical tree.
///
/// Motorized variants rotate the child around the connection's local Z axis
/// by the angle their profile currently outputs.
#[derive(Debug, Clone)]
pub enum HardConnection {
    /// The child is welded to the parent
    Fixed,

    /// The child spins at a constant angular speed
    ConstantSpeedMotor(ConstantSpeedProfile),

    /// The child oscillates along a sinusoidal angle profile
    SinusoidalMotor(SinusoidalProfile),
}

impl HardConnection {
    /// Relative frame between the parent-side and child-side attachments
    pub fn relative_cframe(&self) -> CFrame {
        let angle = match self {
            HardConnection::Fixed => return CFrame::identity(),
            HardConnection::ConstantSpeedMotor(profile) => profile.value(),
            HardConnection::SinusoidalMotor(profile) => profile.value(),
        };
        CFrame::from_rotation(Rotation::from_axis_angle(&Vec3::z_axis(), angle))
    }

    /// Advances the motor profile by `dt`
    pub fn update(&mut self, dt: f64) {
        match self {
            HardConnection::Fixed => {}
            HardConnection::ConstantSpeedMotor(profile) => profile.update(dt),
            HardConnection::SinusoidalMotor(profile) => profile.update(dt),
        }
    }
}

/// A physical hanging below another one in a physical tree
#[derive(Debug, Clone)]
pub struct ConnectedPhysical {
    /// The child physical, owned exclusively by its parent
    pub(crate) physical: Physical,

    /// How the child is driven relative to the parent
    pub(crate) connection: HardConnection,

    /// Connection frame relative to the parent's main part
    pub(crate) attach_on_parent: CFrame,

    /// Connection frame relative to the child's main part
    pub(crate) attach_on_child: CFrame,
}

impl ConnectedPhysical {
    /// Creates a new connected physical
    pub fn new(physical: Physical, connection: HardConnection, attach_on_parent: CFrame, attach_on_child: CFrame) -> Self {
        Self {
            physical,
            connection,
            attach_on_parent,
            attach_on_child,
        }
    }

    /// Returns the child physical
    pub fn physical(&self) -> &Physical {
        &self.physical
    }

    /// Returns the hard connection to the parent
    pub fn connection(&self) -> &HardConnection {
        &self.connection
    }

    /// The child's main part frame relative to the parent's main part frame
    pub fn relative_to_parent(&self) -> CFrame {
        self.attach_on_parent
            .local_to_global_cframe(&self.connection.relative_cframe())
            .local_to_global_cframe(&self.attach_on_child.inverse())
    }
}

/// Outcome of removing a part from a physical subtree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum NodeRemoval {
    NotFound,
    Removed,
    Emptied,
}

/// One node of a tree of rigidly or jointedly connected parts
#[derive(Debug, Clone)]
pub struct Physical {
    pub(crate) rigid_body: RigidBody,
    pub(crate) children: Vec<ConnectedPhysical>,
}

impl Physical {
    /// Creates a physical with no children
    pub fn new(rigid_body: RigidBody) -> Self {
        Self {
            rigid_body,
            children: Vec::new(),
        }
    }

    /// Returns the physical's rigid body
    pub fn rigid_body(&self) -> &RigidBody {
        &self.rigid_body
    }

    /// Returns the physicals connected below this one
    pub fn children(&self) -> &[ConnectedPhysical] {
        &self.children
    }

    /// Calls `f` for the rigid body of this node and of every descendant
    pub fn for_each_rigid_body(&self, f: &mut dyn FnMut(&RigidBody)) {
        f(&self.rigid_body);
        for child in &self.children {
            child.physical.for_each_rigid_body(f);
        }
    }

    /// Appends every part of the subtree to `out`
    pub fn collect_part_ids(&self, out: &mut Vec<PartId>) {
        self.for_each_rigid_body(&mut |rb| out.extend(rb.part_ids()));
    }

    /// Returns the frame of `part` in world space if the subtree contains it
    pub fn part_cframe(&self, part: PartId) -> Option<CFrame> {
        if let Some(attachment) = self.rigid_body.attachment_of(part) {
            return Some(self.rigid_body.cframe().local_to_global_cframe(&attachment));
        }
        self.children.iter().find_map(|c| c.physical.part_cframe(part))
    }

    pub(crate) fn node_containing_mut(&mut self, part: PartId) -> Option<&mut Physical> {
        if self.rigid_body.contains(part) {
            return Some(self);
        }
        self.children
            .iter_mut()
            .find_map(|c| c.physical.node_containing_mut(part))
    }

    pub(crate) fn update_child_cframes(&mut self) {
        let frame = *self.rigid_body.cframe();
        for child in &mut self.children {
            let relative = child.relative_to_parent();
            *child.physical.rigid_body.cframe_mut() = frame.local_to_global_cframe(&relative);
            child.physical.update_child_cframes();
        }
    }

    pub(crate) fn refresh_part_cframes(&self, parts: &mut Arena<Part>) {
        self.rigid_body.refresh_part_cframes(parts);
        for child in &self.children {
            child.physical.refresh_part_cframes(parts);
        }
    }

    pub(crate) fn recompute_mass(&mut self, parts: &Arena<Part>) {
        self.rigid_body.recompute_mass(parts);
        for child in &mut self.children {
            child.physical.recompute_mass(parts);
        }
    }

    pub(crate) fn update_connections(&mut self, dt: f64) {
        for child in &mut self.children {
            child.connection.update(dt);
            child.physical.update_connections(dt);
        }
    }

    pub(crate) fn remove_part(&mut self, part: PartId) -> NodeRemoval {
        match self.rigid_body.remove_part(part) {
            PartRemoval::Removed { main_shift } => {
                if let Some(shift) = main_shift {
                    let shift_inverse = shift.inverse();
                    for child in &mut self.children {
                        child.attach_on_parent = shift_inverse.local_to_global_cframe(&child.attach_on_parent);
                    }
                }
                NodeRemoval::Removed
            }
            PartRemoval::Emptied => {
                if self.children.is_empty() {
                    return NodeRemoval::Emptied;
                }
                // The first child takes over this node; its siblings are re-attached to it
                let old_frame = *self.rigid_body.cframe();
                let first = self.children.remove(0);
                let new_frame = *first.physical.rigid_body.cframe();
                let mut promoted = first.physical;
                for mut sibling in self.children.drain(..) {
                    let global = old_frame.local_to_global_cframe(&sibling.attach_on_parent);
                    sibling.attach_on_parent = new_frame.global_to_local_cframe(&global);
                    promoted.children.push(sibling);
                }
                *self = promoted;
                NodeRemoval::Removed
            }
            PartRemoval::NotFound => {
                for index in 0..self.children.len() {
                    let child = &mut self.children[index];
                    let old_frame = *child.physical.rigid_body.cframe();
                    match child.physical.remove_part(part) {
                        NodeRemoval::NotFound => continue,
                        NodeRemoval::Removed => {
                            let new_frame = *child.physical.rigid_body.cframe();
                            if new_frame != old_frame {
                                let global = old_frame.local_to_global_cframe(&child.attach_on_child);
                                child.attach_on_child = new_frame.global_to_local_cframe(&global);
                            }
                            return NodeRemoval::Removed;
                        }
                        NodeRemoval::Emptied => {
                            self.children.remove(index);
                            return NodeRemoval::Removed;
                        }
                    }
                }
                NodeRemoval::NotFound
            }
        }
    }
}

/// The root of a physical tree; owns the aggregate mass, inertia and motion
#[derive(Debug, Clone)]
pub struct MotorizedPhysical {
    /// The root node of the tree
    root: Physical,

    /// Motion of the center of mass
    motion: Motion,

    /// Forces accumulated for the next integration step
    total_force: Vec3,

    /// Moments around the center of mass accumulated for the next integration step
    total_moment: Vec3,

    /// Mass of the whole tree
    total_mass: f64,

    /// Center of mass of the whole tree in world space
    center_of_mass: Vec3,

    /// Inertia of the whole tree around its center of mass, world orientation
    inertia: Mat3,

    /// Inverse of `inertia`
    inverse_inertia: Mat3,

    /// Anchored physicals have infinite mass and never move
    anchored: bool,
}

impl MotorizedPhysical {
    /// Creates a motorized physical rooted at `root`; call `refresh` before use
    pub fn new(root: Physical) -> Self {
        Self {
            root,
            motion: Motion::default(),
            total_force: Vec3::zeros(),
            total_moment: Vec3::zeros(),
            total_mass: 0.0,
            center_of_mass: Vec3::zeros(),
            inertia: Mat3::zeros(),
            inverse_inertia: Mat3::zeros(),
            anchored: false,
        }
    }

    /// Returns the root physical
    pub fn root(&self) -> &Physical {
        &self.root
    }

    pub(crate) fn root_mut(&mut self) -> &mut Physical {
        &mut self.root
    }

    pub(crate) fn into_root(self) -> Physical {
        self.root
    }

    /// Returns the frame of the root's main part
    pub fn cframe(&self) -> &CFrame {
        self.root.rigid_body.cframe()
    }

    /// Returns the motion of the center of mass
    pub fn motion(&self) -> &Motion {
        &self.motion
    }

    /// Returns a mutable reference to the motion of the center of mass
    pub fn motion_mut(&mut self) -> &mut Motion {
        &mut self.motion
    }

    /// Sets the linear velocity of the center of mass
    pub fn set_velocity(&mut self, velocity: Vec3) {
        if !self.anchored {
            self.motion.velocity = velocity;
        }
    }

    /// Sets the angular velocity around the center of mass
    pub fn set_angular_velocity(&mut self, angular_velocity: Vec3) {
        if !self.anchored {
            self.motion.angular_velocity = angular_velocity;
        }
    }

    /// Returns the mass of the whole tree
    pub fn mass(&self) -> f64 {
        self.total_mass
    }

    /// Returns the inverse mass, zero for anchored physicals
    pub fn inverse_mass(&self) -> f64 {
        if self.anchored || self.total_mass <= 0.0 {
            0.0
        } else {
            1.0 / self.total_mass
        }
    }

    /// Returns the center of mass in world space
    pub fn center_of_mass(&self) -> Vec3 {
        self.center_of_mass
    }

    /// Returns the inertia around the center of mass in world orientation
    pub fn inertia(&self) -> Mat3 {
        self.inertia
    }

    /// Returns the inverse inertia, zero for anchored physicals
    pub fn inverse_inertia(&self) -> Mat3 {
        if self.anchored {
            Mat3::zeros()
        } else {
            self.inverse_inertia
        }
    }

    /// Returns whether the physical is anchored in place
    pub fn is_anchored(&self) -> bool {
        self.anchored
    }

    pub(crate) fn set_anchored(&mut self, anchored: bool) {
        self.anchored = anchored;
        if anchored {
            self.motion = Motion::default();
            self.clear_forces();
        }
    }

    /// Returns every part of the tree, root main part first
    pub fn part_ids(&self) -> Vec<PartId> {
        let mut out = Vec::new();
        self.root.collect_part_ids(&mut out);
        out
    }

    /// Returns whether the tree contains the part
    pub fn contains_part(&self, part: PartId) -> bool {
        self.root.part_cframe(part).is_some()
    }

    pub(crate) fn set_root_cframe(&mut self, cframe: CFrame) {
        *self.root.rigid_body.cframe_mut() = cframe;
    }

    /// Places child bodies and parts from the root frame, then recomputes aggregates
    pub(crate) fn refresh(&mut self, parts: &mut Arena<Part>) {
        self.root.update_child_cframes();
        self.root.refresh_part_cframes(parts);
        self.recompute_aggregates();
    }

    /// Recomputes per-body mass properties after parts were added or removed
    pub(crate) fn recompute_mass(&mut self, parts: &mut Arena<Part>) {
        self.root.recompute_mass(parts);
        self.refresh(parts);
    }

    fn recompute_aggregates(&mut self) {
        let mut bodies = Vec::new();
        self.root.for_each_rigid_body(&mut |rb| {
            bodies.push((rb.mass(), rb.center_of_mass(), rb.global_inertia()));
        });

        let total_mass: f64 = bodies.iter().map(|(m, _, _)| m).sum();
        let center = if total_mass > 0.0 {
            bodies.iter().map(|(m, c, _)| c * *m).sum::<Vec3>() / total_mass
        } else {
            self.root.rigid_body.cframe().position
        };

        let mut inertia = Mat3::zeros();
        for (m, c, body_inertia) in &bodies {
            let d = c - center;
            inertia += body_inertia + (Mat3::identity() * d.norm_squared() - d * d.transpose()) * *m;
        }

        self.total_mass = total_mass;
        self.center_of_mass = center;
        self.inertia = inertia;
        self.inverse_inertia = inertia.try_inverse().unwrap_or_else(Mat3::zeros);
    }

    pub(crate) fn update_connections(&mut self, dt: f64) {
        self.root.update_connections(dt);
    }

    /// Applies a force at `offset` from the center of mass
    pub fn apply_force(&mut self, offset: &Vec3, force: &Vec3) {
        if self.anchored {
            return;
        }
        self.total_force += force;
        self.total_moment += offset.cross(force);
    }

    /// Applies a force at the center of mass
    pub fn apply_force_at_center_of_mass(&mut self, force: &Vec3) {
        if !self.anchored {
            self.total_force += force;
        }
    }

    /// Applies a moment around the center of mass
    pub fn apply_moment(&mut self, moment: &Vec3) {
        if !self.anchored {
            self.total_moment += moment;
        }
    }

    /// Applies an impulse at `offset` from the center of mass
    pub fn apply_impulse(&mut self, offset: &Vec3, impulse: &Vec3) {
        if self.anchored {
            return;
        }
        self.motion.velocity += impulse * self.inverse_mass();
        self.motion.angular_velocity += self.inverse_inertia * offset.cross(impulse);
    }

    /// Applies an angular impulse around the center of mass
    pub fn apply_angular_impulse(&mut self, angular_impulse: &Vec3) {
        if !self.anchored {
            self.motion.angular_velocity += self.inverse_inertia * angular_impulse;
        }
    }

    /// Velocity of the point at `offset` from the center of mass
    pub fn velocity_of_point(&self, offset: &Vec3) -> Vec3 {
        self.motion.velocity_of_point(offset)
    }

    /// Effective inverse mass felt by a unit impulse along `direction` at `offset`
    pub fn inverse_inertia_along(&self, offset: &Vec3, direction: &Vec3) -> f64 {
        if self.anchored {
            return 0.0;
        }
        let arm = offset.cross(direction);
        self.inverse_mass() * direction.norm_squared() + arm.dot(&(self.inverse_inertia * arm))
    }

    /// Returns the accumulated force
    pub fn total_force(&self) -> Vec3 {
        self.total_force
    }

    /// Returns the accumulated moment
    pub fn total_moment(&self) -> Vec3 {
        self.total_moment
    }

    /// Drops the accumulated force and moment
    pub fn clear_forces(&mut self) {
        self.total_force = Vec3::zeros();
        self.total_moment = Vec3::zeros();
    }

    /// Moves the whole tree by `delta`
    pub fn translate(&mut self, delta: &Vec3) {
        self.root.rigid_body.cframe_mut().translate(delta);
        self.center_of_mass += delta;
    }

    /// Rotates the whole tree around its center of mass
    pub fn rotate_around_center_of_mass(&mut self, rotation: &Rotation) {
        let center = self.center_of_mass;
        self.root.rigid_body.cframe_mut().rotate_around(&center, rotation);
        self.inertia = rotate_inertia(&self.inertia, rotation);
        self.inverse_inertia = rotate_inertia(&self.inverse_inertia, rotation);
    }

    /// Total kinetic energy, translational plus rotational
    pub fn total_kinetic_energy(&self) -> f64 {
        let v = &self.motion.velocity;
        let w = &self.motion.angular_velocity;
        0.5 * self.total_mass * v.norm_squared() + 0.5 * w.dot(&(self.inertia * w))
    }
}
