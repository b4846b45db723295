use rayon::prelude::*;
use tracing::info;

use crate::error::Result;
use crate::monitor::{ClusterSnapshot, StatsAggregator, Verdict};
use crate::optimizer::rules::RuleSet;

/// Hotspot decision engine: aggregate, then run the rule set.
///
/// Holds one compiled rule set for its whole life. The detector never
/// mutates itself during evaluation, so it can be shared across threads;
/// each snapshot is borrowed mutably by exactly one evaluation.
pub struct HotspotDetector {
    aggregator: StatsAggregator,
    rules: RuleSet,
}

impl HotspotDetector {
    pub fn new(rules: RuleSet) -> Self {
        Self {
            aggregator: StatsAggregator::new(),
            rules,
        }
    }

    /// Evaluate one snapshot in place.
    ///
    /// The verdict is reset and statistics are recomputed from the current
    /// readings first, so repeated calls behave like a fresh evaluation.
    pub fn evaluate<'a>(&self, snapshot: &'a mut ClusterSnapshot) -> Result<&'a Verdict> {
        snapshot.verdict = Verdict::default();
        self.aggregator.apply(snapshot);
        self.rules.evaluate(snapshot)?;

        let verdict = &snapshot.verdict;
        if let Some(node) = snapshot.write_hotspot_node() {
            info!(
                node,
                ratio = verdict.write_hotspot_ratio,
                "write hotspot detected"
            );
        }
        if let Some(node) = snapshot.read_hotspot_node() {
            info!(
                node,
                ratio = verdict.read_hotspot_ratio,
                "read hotspot detected"
            );
        }
        if verdict.recommend_shard_bits {
            info!(
                bits = verdict.shard_row_id_bits,
                "recommending SHARD_ROW_ID_BITS"
            );
        }

        Ok(verdict)
    }

    /// Evaluate independent snapshots in parallel against the same rules.
    ///
    /// Every snapshot is evaluated even if another one faults; the first
    /// fault in input order is returned.
    pub fn evaluate_all(&self, snapshots: &mut [ClusterSnapshot]) -> Result<()> {
        let results: Vec<Result<()>> = snapshots
            .par_iter_mut()
            .map(|snapshot| self.evaluate(snapshot).map(|_| ()))
            .collect();
        results.into_iter().collect()
    }

    /// Human-readable findings for an evaluated snapshot
    pub fn analyze(&self, snapshot: &ClusterSnapshot, table: &str) -> Vec<String> {
        let verdict = &snapshot.verdict;
        let Some(stats) = &snapshot.stats else {
            return vec!["Snapshot has not been evaluated".to_string()];
        };

        let mut findings = Vec::new();
        if let Some(node) = snapshot.write_hotspot_node() {
            findings.push(format!(
                "Write hotspot on {}: raftstore CPU {:.2}% vs average {:.2}% ({:.2}x)",
                node, stats.write.max, stats.write.avg, verdict.write_hotspot_ratio
            ));
            if verdict.recommend_shard_bits {
                findings.push(format!(
                    "Non-clustered index write hotspot: set SHARD_ROW_ID_BITS={} to scatter row ids",
                    verdict.shard_row_id_bits
                ));
                findings.push(format!(
                    "ALTER TABLE {} SHARD_ROW_ID_BITS = {};",
                    table, verdict.shard_row_id_bits
                ));
            }
        } else if snapshot.check_write_hotspot {
            findings.push("No write hotspot".to_string());
        }

        if let Some(node) = snapshot.read_hotspot_node() {
            findings.push(format!(
                "Read hotspot on {}: coprocessor CPU {:.2}% vs average {:.2}% ({:.2}x)",
                node, stats.read.max, stats.read.avg, verdict.read_hotspot_ratio
            ));
        } else if snapshot.check_read_hotspot {
            findings.push("No read hotspot".to_string());
        }

        findings
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }
}
