use crate::core::PartId;
use crate::math::Vec3;
use std::time::Duration;

/// A candidate pair of parts from the broad phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CandidatePair {
    /// The first part; the free one for free-terrain pairs
    pub part_a: PartId,

    /// The second part
    pub part_b: PartId,
}

impl CandidatePair {
    /// Creates a new candidate pair
    pub fn new(part_a: PartId, part_b: PartId) -> Self {
        Self { part_a, part_b }
    }

    /// Checks if this pair contains the specified part
    pub fn contains(&self, part: PartId) -> bool {
        self.part_a == part || self.part_b == part
    }

    /// Returns the pair with both parts in handle order
    pub fn normalized(&self) -> Self {
        if self.part_a <= self.part_b {
            *self
        } else {
            Self::new(self.part_b, self.part_a)
        }
    }
}

/// A confirmed contact between two parts
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Colission {
    pub part_a: PartId,
    pub part_b: PartId,

    /// Contact point in world space
    pub contact_point: Vec3,

    /// Minimal translation of B that separates the parts; points from A toward B
    pub exit_vector: Vec3,
}

impl Colission {
    /// Returns the parts as a candidate pair
    pub fn pair(&self) -> CandidatePair {
        CandidatePair::new(self.part_a, self.part_b)
    }
}

/// Broad-phase candidates of one tick
#[derive(Debug, Clone, Default)]
pub struct Candidates {
    /// Pairs of two free parts
    pub free: Vec<CandidatePair>,

    /// Pairs of a free part (first) and a terrain part (second)
    pub free_terrain: Vec<CandidatePair>,
}

impl Candidates {
    /// Total number of candidates
    pub fn len(&self) -> usize {
        self.free.len() + self.free_terrain.len()
    }

    /// Returns whether there are no candidates
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Confirmed contacts of one tick, produced by detection and consumed by response
#[derive(Debug, Clone, Default)]
pub struct ColissionBuffer {
    /// Contacts between two free parts
    pub free_colissions: Vec<Colission>,

    /// Contacts between a free part and a terrain part
    pub free_terrain_colissions: Vec<Colission>,

    /// Number of broad-phase candidates examined
    pub candidate_count: usize,

    /// Time spent detecting
    pub detection_time: Duration,
}

impl ColissionBuffer {
    /// Total number of confirmed contacts
    pub fn len(&self) -> usize {
        self.free_colissions.len() + self.free_terrain_colissions.len()
    }

    /// Returns whether no contacts were confirmed
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterates over every contact, free pairs first
    pub fn iter(&self) -> impl Iterator<Item = &Colission> {
        self.free_colissions.iter().chain(self.free_terrain_colissions.iter())
    }
}
