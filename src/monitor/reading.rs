use serde::{Deserialize, Serialize};

use crate::monitor::aggregator::ClusterStats;

/// CPU readings for one storage node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeReading {
    pub node_id: String,
    /// Write path (raftstore) CPU, percent
    pub raftstore_cpu: f64,
    /// Read path (coprocessor) CPU, percent
    pub coprocessor_cpu: f64,
}

impl NodeReading {
    pub fn new(node_id: impl Into<String>, raftstore_cpu: f64, coprocessor_cpu: f64) -> Self {
        Self {
            node_id: node_id.into(),
            raftstore_cpu,
            coprocessor_cpu,
        }
    }
}

/// Parse `id:raftstore:coprocessor` (e.g., "tikv-3:85.2:22.1")
impl std::str::FromStr for NodeReading {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split(':').collect();
        if parts.len() != 3 || parts[0].is_empty() {
            return Err(anyhow::anyhow!(
                "Invalid node reading: {}. Expected id:raftstore_cpu:coprocessor_cpu",
                s
            ));
        }

        let raftstore_cpu: f64 = parts[1]
            .parse()
            .map_err(|_| anyhow::anyhow!("Invalid raftstore CPU in node reading: {}", s))?;
        let coprocessor_cpu: f64 = parts[2]
            .parse()
            .map_err(|_| anyhow::anyhow!("Invalid coprocessor CPU in node reading: {}", s))?;

        Ok(NodeReading::new(parts[0], raftstore_cpu, coprocessor_cpu))
    }
}

/// Outcome of one evaluation cycle. Reset before every cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub write_hotspot_detected: bool,
    pub write_hotspot_ratio: f64,
    pub read_hotspot_detected: bool,
    pub read_hotspot_ratio: f64,
    pub recommend_shard_bits: bool,
    /// Suggested SHARD_ROW_ID_BITS, 0-15
    pub shard_row_id_bits: u8,
    /// Names of the rules that fired, in firing order
    pub fired: Vec<String>,
}

/// One observation window of the cluster: the fact store the rules read
/// and mutate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterSnapshot {
    pub nodes: Vec<NodeReading>,
    #[serde(default = "default_true")]
    pub check_write_hotspot: bool,
    #[serde(default = "default_true")]
    pub check_read_hotspot: bool,
    /// Caller-asserted: rows use an implicit, monotonically increasing id
    #[serde(default)]
    pub non_clustered_index: bool,
    #[serde(default, skip_deserializing)]
    pub stats: Option<ClusterStats>,
    #[serde(default, skip_deserializing)]
    pub verdict: Verdict,
}

fn default_true() -> bool {
    true
}

impl ClusterSnapshot {
    /// Snapshot with both hotspot checks enabled.
    pub fn new(nodes: Vec<NodeReading>) -> Self {
        Self {
            nodes,
            check_write_hotspot: true,
            check_read_hotspot: true,
            non_clustered_index: false,
            stats: None,
            verdict: Verdict::default(),
        }
    }

    pub fn with_checks(mut self, write: bool, read: bool) -> Self {
        self.check_write_hotspot = write;
        self.check_read_hotspot = read;
        self
    }

    pub fn with_non_clustered_index(mut self, non_clustered: bool) -> Self {
        self.non_clustered_index = non_clustered;
        self
    }

    /// Node carrying the write hotspot, if one was detected this cycle
    pub fn write_hotspot_node(&self) -> Option<&str> {
        if !self.verdict.write_hotspot_detected {
            return None;
        }
        self.stats.as_ref().map(|s| s.write.hottest_node.as_str())
    }

    /// Node carrying the read hotspot, if one was detected this cycle
    pub fn read_hotspot_node(&self) -> Option<&str> {
        if !self.verdict.read_hotspot_detected {
            return None;
        }
        self.stats.as_ref().map(|s| s.read.hottest_node.as_str())
    }
}
