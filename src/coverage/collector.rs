use std::collections::HashMap;

use crate::model::{ChromId, Feature, FeatureId, MappingBatch, Strand};

/// Parameters of the overlap scan.
#[derive(Debug, Clone, Copy)]
pub struct CollectorConfig {
    /// Bases the counting window extends upstream of the annotated start,
    /// tolerating 5' read bias.
    pub upstream_offset: u64,
    /// Bases the counting window extends downstream of the annotated stop,
    /// tolerating 3' read bias.
    pub downstream_offset: u64,
    /// Whether a mapping must lie on the feature's strand to count.
    pub require_strand_match: bool,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            upstream_offset: 0,
            downstream_offset: 0,
            require_strand_match: true,
        }
    }
}

/// One feature's precomputed counting window.
#[derive(Debug, Clone, Copy)]
struct FeatureSlot {
    id: FeatureId,
    eff_start: u64,
    eff_stop: u64,
    strand: Strand,
}

/// Per-track accumulator turning mapping batches into per-feature overlap
/// counts.
///
/// Features are grouped per chromosome and kept in ascending-start order;
/// each batch is sorted once and scanned with a monotonic cursor, so a batch
/// costs O(features + mappings + overlaps) rather than O(features ×
/// mappings). Every feature is seeded with an explicit zero at construction:
/// absence of overlap is still a recorded observation, which downstream
/// statistics require.
///
/// The collector holds no locks. It is single-writer while its job streams
/// into it and read-only afterwards; the orchestrator's completion barrier
/// enforces that handover.
#[derive(Debug)]
pub struct CoverageCollector {
    by_chrom: HashMap<ChromId, Vec<FeatureSlot>>,
    counts: HashMap<FeatureId, u64>,
    config: CollectorConfig,
}

impl CoverageCollector {
    /// Build a collector over the selected feature set.
    pub fn new(features: &[Feature], config: CollectorConfig) -> Self {
        let mut by_chrom: HashMap<ChromId, Vec<FeatureSlot>> = HashMap::new();
        let mut counts = HashMap::with_capacity(features.len());

        for feature in features {
            by_chrom.entry(feature.chrom).or_default().push(FeatureSlot {
                id: feature.id,
                eff_start: feature.start.saturating_sub(config.upstream_offset),
                eff_stop: feature.stop.saturating_add(config.downstream_offset),
                strand: feature.strand,
            });
            // Explicit zero up front; idempotent if a feature id repeats.
            counts.entry(feature.id).or_insert(0);
        }

        for slots in by_chrom.values_mut() {
            slots.sort_unstable_by_key(|slot| slot.eff_start);
        }

        Self {
            by_chrom,
            counts,
            config,
        }
    }

    /// Fold one mapping batch into the accumulated counts.
    pub fn accept(&mut self, mut batch: MappingBatch) {
        // No feature lives on this chromosome: the whole batch is skipped.
        let Some(slots) = self.by_chrom.get(&batch.chrom) else {
            return;
        };

        batch.mappings.sort_unstable_by_key(|m| m.start);
        let mappings = &batch.mappings;

        let mut cursor = 0;
        for slot in slots {
            // Mappings ending at or before this window can never overlap a
            // later feature either (windows are in ascending eff_start
            // order), so the cursor only moves forward.
            while cursor < mappings.len() && mappings[cursor].stop <= slot.eff_start {
                cursor += 1;
            }

            let mut gained = 0u64;
            for mapping in &mappings[cursor..] {
                if mapping.start >= slot.eff_stop {
                    // Sorted order guarantees no further overlap in this batch.
                    break;
                }
                if mapping.stop <= slot.eff_start {
                    continue;
                }
                if self.config.require_strand_match && mapping.strand != slot.strand {
                    continue;
                }
                gained += u64::from(mapping.replicates);
            }

            if gained > 0 {
                *self.counts.entry(slot.id).or_insert(0) += gained;
            }
        }
    }

    /// Number of features this collector tracks.
    pub fn feature_count(&self) -> usize {
        self.counts.len()
    }

    /// Accumulated counts. Only meaningful once all batches were delivered.
    pub fn counts(&self) -> &HashMap<FeatureId, u64> {
        &self.counts
    }

    /// Consume the collector, yielding the final per-feature count map.
    pub fn into_counts(self) -> HashMap<FeatureId, u64> {
        self.counts
    }
}
