use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::monitor::ClusterSnapshot;
use crate::optimizer::rules::BUILTIN_RULES;
use crate::optimizer::RuleSet;

pub const DEFAULT_RULE_SET_NAME: &str = "TiDBHotspot";
pub const DEFAULT_RULE_SET_VERSION: &str = "1.0.0";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Rule resources; the built-in rules are used when empty
    pub rule_files: Vec<PathBuf>,
    pub rule_set_name: String,
    pub rule_set_version: String,
    pub format: OutputFormat,
    /// Table named in the suggested ALTER TABLE statement
    pub table: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rule_files: Vec::new(),
            rule_set_name: DEFAULT_RULE_SET_NAME.to_string(),
            rule_set_version: DEFAULT_RULE_SET_VERSION.to_string(),
            format: OutputFormat::Text,
            table: "table_name".to_string(),
        }
    }
}

impl Config {
    /// Compile the configured rule set. Failure here is fatal for the process.
    pub fn load_rules(&self) -> anyhow::Result<RuleSet> {
        if self.rule_files.is_empty() {
            return RuleSet::compile(
                &self.rule_set_name,
                &self.rule_set_version,
                "builtin",
                BUILTIN_RULES,
            )
            .context("Failed to compile built-in rules");
        }

        RuleSet::from_files(
            &self.rule_files,
            &self.rule_set_name,
            &self.rule_set_version,
        )
        .with_context(|| format!("Failed to compile rule set {}", self.rule_set_name))
    }
}

/// Load a snapshot from a JSON file
pub fn load_snapshot(path: &Path) -> anyhow::Result<ClusterSnapshot> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read snapshot {}", path.display()))?;
    let snapshot: ClusterSnapshot = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse snapshot {}", path.display()))?;
    Ok(snapshot)
}

/// Parse a human-readable interval (e.g., "500ms", "2s", "1m")
pub fn parse_interval(s: &str) -> anyhow::Result<Duration> {
    let s = s.trim().to_lowercase();
    let (num_str, unit) = if let Some(n) = s.strip_suffix("ms") {
        (n, "ms")
    } else if let Some(n) = s.strip_suffix('s') {
        (n, "s")
    } else if let Some(n) = s.strip_suffix('m') {
        (n, "m")
    } else {
        // Assume milliseconds if no unit
        (s.as_str(), "ms")
    };

    let num: u64 = num_str
        .trim()
        .parse()
        .map_err(|_| anyhow::anyhow!("Invalid interval: {}", s))?;

    let duration = match unit {
        "ms" => Duration::from_millis(num),
        "s" => Duration::from_secs(num),
        "m" => num
            .checked_mul(60)
            .map(Duration::from_secs)
            .ok_or_else(|| anyhow::anyhow!("Interval out of range: {}", s))?,
        _ => return Err(anyhow::anyhow!("Invalid unit in interval: {}", s)),
    };

    if duration.is_zero() {
        return Err(anyhow::anyhow!("Interval must be greater than zero: {}", s));
    }

    Ok(duration)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(anyhow::anyhow!("Invalid format: {}. Valid options: text, json", s)),
        }
    }
}

/// Simulated monitoring ticks for `watch`
#[derive(Debug, Clone)]
pub struct WatchParams {
    pub ticks: usize,
    pub interval: Duration,
    /// Maximum relative change applied to each reading per tick, 0-100
    pub jitter_percent: f64,
    pub seed: u64,
}

impl Default for WatchParams {
    fn default() -> Self {
        Self {
            ticks: 5,
            interval: Duration::from_secs(1),
            jitter_percent: 10.0,
            seed: 42,
        }
    }
}
