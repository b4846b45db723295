pub mod detector;
pub mod rules;
pub mod tuner;

pub use detector::HotspotDetector;
pub use rules::{Comparison, HotspotRule, RuleSet};
pub use tuner::{ShardBitsMapping, ShardBitsTuner};
