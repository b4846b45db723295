use serde::{Deserialize, Serialize};

/// Upper bound accepted for SHARD_ROW_ID_BITS
pub const MAX_SHARD_ROW_ID_BITS: u8 = 15;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShardBitsTier {
    pub min_ratio: f64,
    pub bits: u8,
}

/// How a write hotspot ratio maps to a shard bit width
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ShardBitsMapping {
    /// `ceil(log2(ratio))`
    #[default]
    Log2Ceil,
    /// Bits of the highest tier whose `min_ratio` the ratio reaches
    Tiers(Vec<ShardBitsTier>),
}

/// Picks SHARD_ROW_ID_BITS for a sequential-key write hotspot
#[derive(Debug, Clone, Default)]
pub struct ShardBitsTuner {
    mapping: ShardBitsMapping,
}

impl ShardBitsTuner {
    pub fn new(mapping: ShardBitsMapping) -> Self {
        Self { mapping }
    }

    /// Check that the mapping is monotonic and within bounds
    pub fn validate(&self) -> Result<(), String> {
        let ShardBitsMapping::Tiers(tiers) = &self.mapping else {
            return Ok(());
        };

        if tiers.is_empty() {
            return Err("tier table is empty".to_string());
        }
        for tier in tiers {
            if !tier.min_ratio.is_finite() || tier.min_ratio <= 0.0 {
                return Err(format!("tier min_ratio {} must be positive", tier.min_ratio));
            }
            if tier.bits > MAX_SHARD_ROW_ID_BITS {
                return Err(format!(
                    "tier bits {} exceed {}",
                    tier.bits, MAX_SHARD_ROW_ID_BITS
                ));
            }
        }
        for pair in tiers.windows(2) {
            if pair[1].min_ratio <= pair[0].min_ratio || pair[1].bits < pair[0].bits {
                return Err("tiers must be ordered by ratio with non-decreasing bits".to_string());
            }
        }
        Ok(())
    }

    /// Bit width for a write hotspot ratio, always in `0..=15`
    pub fn tune(&self, ratio: f64) -> u8 {
        if !(ratio > 1.0) {
            return 0;
        }

        let bits = match &self.mapping {
            ShardBitsMapping::Log2Ceil => {
                let bits = ratio.log2().ceil();
                if bits >= MAX_SHARD_ROW_ID_BITS as f64 {
                    MAX_SHARD_ROW_ID_BITS
                } else {
                    bits as u8
                }
            }
            ShardBitsMapping::Tiers(tiers) => tiers
                .iter()
                .take_while(|tier| ratio >= tier.min_ratio)
                .last()
                .map_or(0, |tier| tier.bits),
        };

        bits.min(MAX_SHARD_ROW_ID_BITS)
    }

    pub fn mapping(&self) -> &ShardBitsMapping {
        &self.mapping
    }
}
