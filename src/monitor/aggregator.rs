use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::monitor::{ClusterSnapshot, NodeReading};

/// Max / average / hottest node for one CPU dimension
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DimensionStats {
    pub max: f64,
    pub avg: f64,
    pub hottest_node: String,
}

impl DimensionStats {
    /// `max / avg`, or 0.0 when the average is not positive
    pub fn skew_ratio(&self) -> f64 {
        if self.avg > 0.0 {
            self.max / self.avg
        } else {
            0.0
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusterStats {
    pub node_count: usize,
    /// Raftstore CPU
    pub write: DimensionStats,
    /// Coprocessor CPU
    pub read: DimensionStats,
}

/// Reduces node readings into cluster-wide statistics
pub struct StatsAggregator;

impl StatsAggregator {
    pub fn new() -> Self {
        Self
    }

    /// Compute statistics for a set of readings.
    ///
    /// Ties go to the first node in list order. An empty list yields
    /// zeroed statistics with empty node ids.
    pub fn aggregate(&self, nodes: &[NodeReading]) -> ClusterStats {
        ClusterStats {
            node_count: nodes.len(),
            write: Self::dimension(nodes, |n| n.raftstore_cpu),
            read: Self::dimension(nodes, |n| n.coprocessor_cpu),
        }
    }

    /// Recompute `snapshot.stats` from its current readings
    pub fn apply(&self, snapshot: &mut ClusterSnapshot) {
        let stats = self.aggregate(&snapshot.nodes);
        debug!(
            nodes = stats.node_count,
            max_raftstore = stats.write.max,
            avg_raftstore = stats.write.avg,
            max_coprocessor = stats.read.max,
            avg_coprocessor = stats.read.avg,
            "aggregated cluster statistics"
        );
        snapshot.stats = Some(stats);
    }

    fn dimension(nodes: &[NodeReading], metric: impl Fn(&NodeReading) -> f64) -> DimensionStats {
        let Some(first) = nodes.first() else {
            return DimensionStats::default();
        };

        let mut max = metric(first);
        let mut hottest = first;
        let mut total = 0.0;
        for node in nodes {
            let value = metric(node);
            total += value;
            if value > max {
                max = value;
                hottest = node;
            }
        }

        DimensionStats {
            max,
            avg: total / nodes.len() as f64,
            hottest_node: hottest.node_id.clone(),
        }
    }
}

impl Default for StatsAggregator {
    fn default() -> Self {
        Self::new()
    }
}
