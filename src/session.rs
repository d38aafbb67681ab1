use crate::aggregator::{TierAggregator, TierBreakdown};
use crate::orchestrator::BatchResult;

/// Holds the most recent batch for review and export. Owned by the caller;
/// a new run replaces the previous batch in full.
#[derive(Debug, Default)]
pub struct ReviewSession {
    latest: Option<BatchResult>,
}

impl ReviewSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs `batch` and hands back the one it supersedes.
    pub fn replace(&mut self, batch: BatchResult) -> Option<BatchResult> {
        self.latest.replace(batch)
    }

    pub fn latest(&self) -> Option<&BatchResult> {
        self.latest.as_ref()
    }

    pub fn breakdown(&self) -> Option<TierBreakdown<'_>> {
        self.latest.as_ref().map(TierAggregator::aggregate)
    }

    pub fn clear(&mut self) -> Option<BatchResult> {
        self.latest.take()
    }
}
