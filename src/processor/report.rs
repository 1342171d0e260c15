use serde::Serialize;

/// Outcome of one drain pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DrainReport {
    /// Operations applied remotely and removed from the queue
    pub synced: usize,
    /// Dispatch attempts that failed and consumed a retry
    pub failed: usize,
    /// Exhausted records left in place
    pub skipped_exhausted: usize,
    /// Exhausted records removed from the queue
    pub dropped_exhausted: usize,
    /// The pass stopped early on shutdown
    pub cancelled: bool,
}

impl DrainReport {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Label used for the drains counter.
    pub fn outcome(&self) -> &'static str {
        if self.cancelled {
            "cancelled"
        } else if self.failed > 0 {
            "partial"
        } else {
            "complete"
        }
    }
}
