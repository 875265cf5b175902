use crate::bodies::{Part, PartProperties};
use crate::core::PartId;
use crate::error::{IntersectionError, PhysicsError};
use crate::math::{CFrame, Vec3, EPSILON};
use crate::Result;
use log::error;
use std::fmt::Debug;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

#[cfg(feature = "serialize")]
use serde::Serialize;

/// Contact data produced by an exact intersection test
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Contact {
    /// Contact point in world space
    pub contact_point: Vec3,

    /// Minimal translation of B that separates the parts; points from A toward B
    pub exit_vector: Vec3,
}

/// Exact narrow-phase intersection test between two parts.
///
/// Must be deterministic for a fixed pair of shapes and poses.
pub trait IntersectionTest: Send + Sync + Debug {
    /// Returns the contact if the parts intersect
    fn intersects(&self, a: &Part, b: &Part) -> std::result::Result<Option<Contact>, IntersectionError>;
}

/// Treats every part as its bounding sphere
#[derive(Debug, Clone, Copy, Default)]
pub struct BoundingSphereIntersection;

impl IntersectionTest for BoundingSphereIntersection {
    fn intersects(&self, a: &Part, b: &Part) -> std::result::Result<Option<Contact>, IntersectionError> {
        let center_a = a.position();
        let center_b = b.position();
        let radius_a = a.max_radius();
        let radius_b = b.max_radius();
        if !(radius_a.is_finite() && radius_b.is_finite()) {
            return Err(IntersectionError::new(format!(
                "non-finite radius between {} and {}",
                a.shape().name(),
                b.shape().name()
            )));
        }

        let delta = center_b - center_a;
        let distance = delta.norm();
        let overlap = radius_a + radius_b - distance;
        if overlap <= 0.0 {
            return Ok(None);
        }

        let normal = if distance > EPSILON { delta / distance } else { Vec3::y() };
        Ok(Some(Contact {
            contact_point: center_a + normal * (radius_a - overlap * 0.5),
            exit_vector: normal * overlap,
        }))
    }
}

#[derive(Debug)]
#[cfg_attr(feature = "serialize", derive(Serialize))]
struct PartSnapshot {
    id: String,
    shape: &'static str,
    scale: Vec3,
    cframe: CFrame,
    properties: PartProperties,
}

impl PartSnapshot {
    fn of(id: PartId, part: &Part) -> Self {
        Self {
            id: format!("{:?}", id),
            shape: part.shape().name(),
            scale: part.shape().scale(),
            cframe: *part.cframe(),
            properties: part.properties,
        }
    }
}

#[derive(Debug)]
#[cfg_attr(feature = "serialize", derive(Serialize))]
struct IntersectionDump {
    error: String,
    part_a: PartSnapshot,
    part_b: PartSnapshot,
}

/// Destination of diagnostic dumps and the owner's running dump count
#[derive(Debug, Clone, Copy)]
pub struct DumpTarget<'a> {
    pub dir: &'a Path,
    pub counter: &'a AtomicUsize,
}

impl DumpTarget<'_> {
    /// Claims the next file path; names stay unique across worlds sharing a directory
    fn next_path(&self, extension: &str) -> PathBuf {
        let index = self.counter.fetch_add(1, Ordering::Relaxed);
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        let owner = self.counter as *const AtomicUsize as usize;
        self.dir.join(format!(
            "colission_dump_{}_{}_{:x}_{}.{}",
            std::process::id(),
            millis,
            owner,
            index,
            extension
        ))
    }
}

#[cfg(feature = "serialize")]
fn write_dump(target: &DumpTarget<'_>, dump: &IntersectionDump) -> io::Result<PathBuf> {
    let path = target.next_path("json");
    let text = serde_json::to_string_pretty(dump)?;
    fs::create_dir_all(target.dir)?;
    fs::write(&path, text)?;
    Ok(path)
}

#[cfg(not(feature = "serialize"))]
fn write_dump(target: &DumpTarget<'_>, dump: &IntersectionDump) -> io::Result<PathBuf> {
    let path = target.next_path("txt");
    fs::create_dir_all(target.dir)?;
    fs::write(&path, format!("{:#?}\n", dump))?;
    Ok(path)
}

/// Runs the intersection test, turning a failure into a logged diagnostic dump and an error
pub fn safe_intersects(
    test: &dyn IntersectionTest,
    (id_a, a): (PartId, &Part),
    (id_b, b): (PartId, &Part),
    dumps: &DumpTarget<'_>,
) -> Result<Option<Contact>> {
    match test.intersects(a, b) {
        Ok(contact) => Ok(contact),
        Err(err) => {
            error!("Intersection test failed between {:?} and {:?}: {}", id_a, id_b, err);
            let dump = IntersectionDump {
                error: err.to_string(),
                part_a: PartSnapshot::of(id_a, a),
                part_b: PartSnapshot::of(id_b, b),
            };
            match write_dump(dumps, &dump) {
                Ok(path) => error!("Colission diagnostic written to {}", path.display()),
                Err(io_err) => error!("Could not write colission diagnostic: {}", io_err),
            }
            Err(PhysicsError::Intersection(err))
        }
    }
}
