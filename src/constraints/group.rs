use crate::bodies::MotorizedPhysical;
use crate::constraints::{Constraint, ConstraintMatrixPack, PhysicalInfo, Side};
use crate::core::{Arena, PhysicalId};
use crate::error::PhysicsError;
use crate::math::linear_system::{is_finite, solve_in_place};
use crate::math::{rotation_from_rotation_vec, CFrame, Vec3};
use crate::Result;
use log::trace;
use nalgebra::{DMatrix, Vector6};
use std::collections::BTreeMap;

/// A constraint paired with the two physicals it currently connects
#[derive(Debug, Clone)]
pub struct PhysicalConstraint {
    /// Body receiving the positive correction
    pub physical_a: PhysicalId,

    /// Body receiving the negative correction
    pub physical_b: PhysicalId,

    /// The relationship between them
    pub constraint: Constraint,
}

/// Outcome of one solve of a constraint group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SolveReport {
    /// Size of the block system
    pub parameter_count: usize,

    /// Whether every entry of the solution was finite
    pub finite: bool,

    /// Whether the corrections were written into the physicals
    pub applied: bool,
}

#[derive(Debug, Clone, Copy)]
struct Correction {
    position: Vector6<f64>,
    velocity: Vector6<f64>,
}

impl Default for Correction {
    fn default() -> Self {
        Self {
            position: Vector6::zeros(),
            velocity: Vector6::zeros(),
        }
    }
}

/// Constraints solved together in one linear system because they may share bodies
#[derive(Debug, Clone, Default)]
pub struct ConstraintGroup {
    constraints: Vec<PhysicalConstraint>,
}

impl ConstraintGroup {
    /// Creates an empty group
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a constraint between two distinct physicals
    pub fn add(&mut self, physical_a: PhysicalId, physical_b: PhysicalId, constraint: impl Into<Constraint>) -> Result<()> {
        if physical_a == physical_b {
            return Err(PhysicsError::InvalidParameter(format!(
                "constraint connects physical {:?} to itself",
                physical_a
            )));
        }
        self.constraints.push(PhysicalConstraint {
            physical_a,
            physical_b,
            constraint: constraint.into(),
        });
        Ok(())
    }

    /// Returns the constraints in the group
    pub fn constraints(&self) -> &[PhysicalConstraint] {
        &self.constraints
    }

    /// Returns the constraints in the group mutably
    pub fn constraints_mut(&mut self) -> &mut [PhysicalConstraint] {
        &mut self.constraints
    }

    /// Returns the number of constraints
    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    /// Returns whether the group holds no constraints
    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    /// Total number of parameters in the block system
    pub fn parameter_count(&self) -> usize {
        self.constraints.iter().map(|c| c.constraint.max_number_of_parameters()).sum()
    }

    /// Drops every constraint touching `physical`; returns how many were dropped
    pub fn remove_involving(&mut self, physical: PhysicalId) -> usize {
        let before = self.constraints.len();
        self.constraints
            .retain(|c| c.physical_a != physical && c.physical_b != physical);
        before - self.constraints.len()
    }

    /// Moves every constraint end on `old` over to `new`.
    ///
    /// `offset` is the old physical's reference frame expressed in the new one's.
    /// Constraints that would end up connecting a physical to itself are dropped.
    pub fn replace_physical(&mut self, old: PhysicalId, new: PhysicalId, offset: &CFrame) {
        for pc in &mut self.constraints {
            if pc.physical_a == old {
                pc.physical_a = new;
                pc.constraint.transform_attachment(Side::A, offset);
            }
            if pc.physical_b == old {
                pc.physical_b = new;
                pc.constraint.transform_attachment(Side::B, offset);
            }
        }
        self.constraints.retain(|c| c.physical_a != c.physical_b);
    }

    /// Advances the motor profiles of the group
    pub fn update(&mut self, dt: f64) {
        for pc in &mut self.constraints {
            pc.constraint.update(dt);
        }
    }

    /// Performs one correction pass over every constraint in the group.
    ///
    /// Positions and rotations of the touched physicals are corrected directly;
    /// velocities are corrected through their motion. With `check_finite` set a
    /// non-finite solution is reported and not applied.
    pub fn apply(&self, physicals: &mut Arena<MotorizedPhysical>, check_finite: bool) -> Result<SolveReport> {
        if self.constraints.is_empty() {
            return Ok(SolveReport {
                parameter_count: 0,
                finite: true,
                applied: false,
            });
        }

        let mut packs: Vec<ConstraintMatrixPack> = Vec::with_capacity(self.constraints.len());
        let mut offsets = Vec::with_capacity(self.constraints.len());
        let mut total = 0;
        for pc in &self.constraints {
            let a = PhysicalInfo::of(physicals.get_checked(pc.physical_a, "Constrained physical")?);
            let b = PhysicalInfo::of(physicals.get_checked(pc.physical_b, "Constrained physical")?);
            let pack = pc.constraint.matrices(&a, &b);
            offsets.push(total);
            total += pack.parameter_count();
            packs.push(pack);
        }

        let mut system = DMatrix::<f64>::zeros(total, total);
        let mut rhs = DMatrix::<f64>::zeros(total, 2);

        for (row, row_constraint) in self.constraints.iter().enumerate() {
            let row_pack = &packs[row];
            let row_offset = offsets[row];
            let row_count = row_pack.parameter_count();

            for (col, col_constraint) in self.constraints.iter().enumerate() {
                let col_pack = &packs[col];
                let col_count = col_pack.parameter_count();
                let mut block = system.view_mut((row_offset, offsets[col]), (row_count, col_count));

                if row_constraint.physical_a == col_constraint.physical_a {
                    block += &row_pack.motion_to_equation_a * &col_pack.parameter_to_motion_a;
                }
                if row_constraint.physical_a == col_constraint.physical_b {
                    block -= &row_pack.motion_to_equation_a * &col_pack.parameter_to_motion_b;
                }
                if row_constraint.physical_b == col_constraint.physical_a {
                    block -= &row_pack.motion_to_equation_b * &col_pack.parameter_to_motion_a;
                }
                if row_constraint.physical_b == col_constraint.physical_b {
                    block += &row_pack.motion_to_equation_b * &col_pack.parameter_to_motion_b;
                }
            }

            let mut target = rhs.rows_mut(row_offset, row_count);
            target -= &row_pack.error;
        }

        solve_in_place(&mut system, &mut rhs);

        let finite = is_finite(&rhs);
        if !finite && check_finite {
            return Ok(SolveReport {
                parameter_count: total,
                finite,
                applied: false,
            });
        }

        let mut corrections: BTreeMap<PhysicalId, Correction> = BTreeMap::new();
        for (index, pc) in self.constraints.iter().enumerate() {
            let pack = &packs[index];
            let parameters = rhs.rows(offsets[index], pack.parameter_count());
            let effect_a = &pack.parameter_to_motion_a * &parameters;
            let effect_b = &pack.parameter_to_motion_b * &parameters;

            let a = corrections.entry(pc.physical_a).or_default();
            for i in 0..6 {
                a.position[i] += effect_a[(i, 0)];
                a.velocity[i] += effect_a[(i, 1)];
            }
            let b = corrections.entry(pc.physical_b).or_default();
            for i in 0..6 {
                b.position[i] -= effect_b[(i, 0)];
                b.velocity[i] -= effect_b[(i, 1)];
            }
        }

        for (id, correction) in corrections {
            let physical = physicals.get_checked_mut(id, "Constrained physical")?;
            if physical.is_anchored() {
                continue;
            }
            let linear = Vec3::new(correction.position[0], correction.position[1], correction.position[2]);
            let angular = Vec3::new(correction.position[3], correction.position[4], correction.position[5]);
            physical.translate(&linear);
            physical.rotate_around_center_of_mass(&rotation_from_rotation_vec(angular));

            let linear_velocity = Vec3::new(correction.velocity[0], correction.velocity[1], correction.velocity[2]);
            let angular_velocity = Vec3::new(correction.velocity[3], correction.velocity[4], correction.velocity[5]);
            physical.motion_mut().add_velocity(&linear_velocity, &angular_velocity);
            trace!("Constraint correction on {:?}: shift {:?}", id, linear);
        }

        Ok(SolveReport {
            parameter_count: total,
            finite,
            applied: true,
        })
    }
}
