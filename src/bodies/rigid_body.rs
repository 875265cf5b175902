use crate::bodies::Part;
use crate::core::{Arena, PartId};
use crate::math::{rotate_inertia, CFrame, Mat3, Vec3};

/// A part rigidly attached to a rigid body's main part
#[derive(Debug, Clone, Copy)]
pub struct AttachedPart {
    /// The attached part
    pub part: PartId,

    /// The part's frame relative to the main part's frame
    pub attachment: CFrame,
}

/// Result of removing a part from a rigid body
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum PartRemoval {
    /// The part is not in this rigid body
    NotFound,

    /// The part was removed; if it was the main part, the new main part sits at
    /// `main_shift` relative to the old main part's frame
    Removed { main_shift: Option<CFrame> },

    /// The part was the last one; the rigid body is now empty
    Emptied,
}

/// A set of parts treated as one undeformable unit.
///
/// The main part's frame is authoritative: every other part is placed relative
/// to it, and mass properties are expressed in it.
#[derive(Debug, Clone)]
pub struct RigidBody {
    /// The part whose frame defines the body frame
    main_part: PartId,

    /// All other parts, relative to the main part
    parts: Vec<AttachedPart>,

    /// The main part's frame in world space
    cframe: CFrame,

    /// Total mass of all parts
    mass: f64,

    /// Center of mass in the body frame
    local_center_of_mass: Vec3,

    /// Inertia around the center of mass in the body frame
    inertia: Mat3,
}

impl RigidBody {
    /// Creates a rigid body made of a single main part placed at `cframe`
    pub fn new(main_part: PartId, cframe: CFrame) -> Self {
        Self {
            main_part,
            parts: Vec::new(),
            cframe,
            mass: 0.0,
            local_center_of_mass: Vec3::zeros(),
            inertia: Mat3::zeros(),
        }
    }

    /// Returns the main part
    pub fn main_part(&self) -> PartId {
        self.main_part
    }

    /// Returns the parts attached to the main part
    pub fn attached_parts(&self) -> &[AttachedPart] {
        &self.parts
    }

    /// Returns every part of the body, main part first
    pub fn part_ids(&self) -> impl Iterator<Item = PartId> + '_ {
        std::iter::once(self.main_part).chain(self.parts.iter().map(|p| p.part))
    }

    /// Returns the number of parts in the body
    pub fn part_count(&self) -> usize {
        self.parts.len() + 1
    }

    /// Returns whether the part belongs to this body
    pub fn contains(&self, part: PartId) -> bool {
        self.attachment_of(part).is_some()
    }

    /// Returns the part's frame relative to the main part
    pub fn attachment_of(&self, part: PartId) -> Option<CFrame> {
        if part == self.main_part {
            return Some(CFrame::identity());
        }
        self.parts.iter().find(|p| p.part == part).map(|p| p.attachment)
    }

    /// Returns the main part's frame in world space
    pub fn cframe(&self) -> &CFrame {
        &self.cframe
    }

    pub(crate) fn cframe_mut(&mut self) -> &mut CFrame {
        &mut self.cframe
    }

    /// Returns the total mass of the body
    pub fn mass(&self) -> f64 {
        self.mass
    }

    /// Returns the center of mass in the body frame
    pub fn local_center_of_mass(&self) -> Vec3 {
        self.local_center_of_mass
    }

    /// Returns the center of mass in world space
    pub fn center_of_mass(&self) -> Vec3 {
        self.cframe.local_to_global(&self.local_center_of_mass)
    }

    /// Returns the inertia around the center of mass in the body frame
    pub fn inertia(&self) -> Mat3 {
        self.inertia
    }

    /// Returns the inertia around the center of mass in world orientation
    pub fn global_inertia(&self) -> Mat3 {
        rotate_inertia(&self.inertia, &self.cframe.rotation)
    }

    pub(crate) fn attach(&mut self, part: PartId, attachment: CFrame) {
        self.parts.push(AttachedPart { part, attachment });
    }

    pub(crate) fn remove_part(&mut self, part: PartId) -> PartRemoval {
        if part == self.main_part {
            if self.parts.is_empty() {
                return PartRemoval::Emptied;
            }
            let promoted = self.parts.remove(0);
            let shift = promoted.attachment;
            let shift_inverse = shift.inverse();
            for other in &mut self.parts {
                other.attachment = shift_inverse.local_to_global_cframe(&other.attachment);
            }
            self.main_part = promoted.part;
            self.cframe = self.cframe.local_to_global_cframe(&shift);
            return PartRemoval::Removed { main_shift: Some(shift) };
        }

        match self.parts.iter().position(|p| p.part == part) {
            Some(index) => {
                self.parts.remove(index);
                PartRemoval::Removed { main_shift: None }
            }
            None => PartRemoval::NotFound,
        }
    }

    /// Recomputes mass, center of mass and inertia from the parts
    pub fn recompute_mass(&mut self, parts: &Arena<Part>) {
        let mut entries = Vec::with_capacity(self.part_count());
        for id in self.part_ids() {
            if let (Some(part), Some(attachment)) = (parts.get(id), self.attachment_of(id)) {
                entries.push((part.mass(), part.inertia(), attachment));
            }
        }

        let mass: f64 = entries.iter().map(|(m, _, _)| m).sum();
        let center = if mass > 0.0 {
            entries.iter().map(|(m, _, a)| a.position * *m).sum::<Vec3>() / mass
        } else {
            Vec3::zeros()
        };

        let mut inertia = Mat3::zeros();
        for (m, local_inertia, attachment) in &entries {
            let d = attachment.position - center;
            inertia += rotate_inertia(local_inertia, &attachment.rotation);
            inertia += (Mat3::identity() * d.norm_squared() - d * d.transpose()) * *m;
        }

        self.mass = mass;
        self.local_center_of_mass = center;
        self.inertia = inertia;
    }

    /// Writes the global frame of every part of the body into the part storage
    pub fn refresh_part_cframes(&self, parts: &mut Arena<Part>) {
        if let Some(main) = parts.get_mut(self.main_part) {
            main.set_cframe(self.cframe);
        }
        for attached in &self.parts {
            if let Some(part) = parts.get_mut(attached.part) {
                part.set_cframe(self.cframe.local_to_global_cframe(&attached.attachment));
            }
        }
    }
}
