use std::collections::BTreeMap;

use crate::classifier::ClassificationTier;
use crate::orchestrator::{BatchResult, ClassifiedItem};

/// A batch partitioned by tier. Every tier is present, possibly empty, and
/// each bucket keeps the batch order.
#[derive(Debug, Clone, PartialEq)]
pub struct TierBreakdown<'a> {
    buckets: BTreeMap<ClassificationTier, Vec<&'a ClassifiedItem>>,
}

impl<'a> TierBreakdown<'a> {
    pub fn count(&self, tier: ClassificationTier) -> usize {
        self.items(tier).len()
    }

    pub fn items(&self, tier: ClassificationTier) -> &[&'a ClassifiedItem] {
        self.buckets.get(&tier).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Counts for all five tiers, in tier order.
    pub fn counts(&self) -> Vec<(ClassificationTier, usize)> {
        ClassificationTier::ALL
            .into_iter()
            .map(|tier| (tier, self.count(tier)))
            .collect()
    }

    pub fn total(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    /// Buckets in tier order.
    pub fn iter(&self) -> impl Iterator<Item = (ClassificationTier, &[&'a ClassifiedItem])> + '_ {
        self.buckets.iter().map(|(tier, items)| (*tier, items.as_slice()))
    }
}

pub struct TierAggregator;

impl TierAggregator {
    pub fn aggregate(batch: &BatchResult) -> TierBreakdown<'_> {
        let mut buckets: BTreeMap<ClassificationTier, Vec<&ClassifiedItem>> = ClassificationTier::ALL
            .into_iter()
            .map(|tier| (tier, Vec::new()))
            .collect();

        for item in batch.items() {
            buckets.entry(item.tier).or_default().push(item);
        }

        TierBreakdown { buckets }
    }
}
