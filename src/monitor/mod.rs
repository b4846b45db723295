pub mod aggregator;
pub mod reading;
pub mod simulate;
pub mod watch;

pub use aggregator::{ClusterStats, DimensionStats, StatsAggregator};
pub use reading::{ClusterSnapshot, NodeReading, Verdict};
pub use simulate::LoadSimulator;
pub use watch::watch;
