use std::time::Duration;

/// Counters and timings of one tick.
///
/// Reset at the start of every tick and readable afterwards through
/// [`crate::core::World::last_tick_stats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TickStats {
    /// Broad-phase candidate pairs examined
    pub candidate_count: usize,

    /// Candidates confirmed by the narrow phase
    pub confirmed_colissions: usize,

    /// Confirmed contacts skipped as too shallow
    pub skipped_degenerate: usize,

    /// Contacts that produced impulses or forces
    pub handled_colissions: usize,

    /// Size of all constraint systems solved
    pub constraint_parameters: usize,

    /// Constraint groups whose solution was not finite
    pub non_finite_solutions: usize,

    pub detection_time: Duration,
    pub external_force_time: Duration,
    pub response_time: Duration,
    pub constraint_time: Duration,
    pub integration_time: Duration,
}

impl TickStats {
    /// Clears every counter and timing
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Total time spent in the tick
    pub fn total_time(&self) -> Duration {
        self.detection_time
            + self.external_force_time
            + self.response_time
            + self.constraint_time
            + self.integration_time
    }
}
