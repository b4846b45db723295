//! CPU hotspot detection for distributed key-value clusters.
//!
//! Per-node raftstore (write) and coprocessor (read) CPU readings are
//! aggregated into cluster statistics, then a compiled [`RuleSet`] decides
//! whether a node is a hotspot and, for write hotspots caused by
//! non-clustered indexes, how many SHARD_ROW_ID_BITS to recommend.
//!
//! ```no_run
//! use hotspot_advisor::{ClusterSnapshot, HotspotDetector, NodeReading, RuleSet};
//!
//! let detector = HotspotDetector::new(RuleSet::builtin()?);
//! let mut snapshot = ClusterSnapshot::new(vec![
//!     NodeReading::new("tikv-1", 30.5, 25.3),
//!     NodeReading::new("tikv-2", 85.2, 22.1),
//! ]);
//! let verdict = detector.evaluate(&mut snapshot)?;
//! println!("write hotspot: {}", verdict.write_hotspot_detected);
//! # Ok::<(), hotspot_advisor::HotspotError>(())
//! ```

pub mod config;
pub mod error;
pub mod monitor;
pub mod optimizer;

pub use error::{HotspotError, Result};
pub use monitor::{ClusterSnapshot, ClusterStats, NodeReading, StatsAggregator, Verdict};
pub use optimizer::{HotspotDetector, RuleSet};
