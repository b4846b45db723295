//! Hotspot rule set.
//!
//! A rule set is compiled once from one or more TOML rule resources and is
//! immutable afterwards, so a single instance can be shared by any number of
//! concurrent evaluations. Each rule is a condition → action pair over the
//! snapshot's facts. Rules run in descending salience order, exactly once per
//! evaluation, and never re-trigger each other.
//!
//! ```toml
//! [[rule]]
//! kind = "detect-write-hotspot"
//! threshold = 1.5
//! comparison = "at-least"
//!
//! [[rule]]
//! kind = "detect-read-hotspot"
//!
//! [[rule]]
//! kind = "recommend-shard-bits"
//! mapping = "log2-ceil"
//! ```
//!
//! A tiered mapping lists the smallest ratio for each bit width, in
//! ascending order:
//!
//! ```toml
//! [[rule]]
//! kind = "recommend-shard-bits"
//! mapping = { tiers = [{ min_ratio = 2.0, bits = 4 }, { min_ratio = 3.0, bits = 6 }] }
//! ```

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{HotspotError, Result};
use crate::monitor::{ClusterSnapshot, ClusterStats, DimensionStats, Verdict};
use crate::optimizer::tuner::{ShardBitsMapping, ShardBitsTuner};

/// Default `max / avg` ratio at which a node counts as a hotspot
pub const DEFAULT_HOTSPOT_THRESHOLD: f64 = 1.5;

/// Rule resource shipped with the crate
pub const BUILTIN_RULES: &str = include_str!("../../rules/tidb_hotspot.toml");

const DETECT_WRITE: &str = "detect-write-hotspot";
const DETECT_READ: &str = "detect-read-hotspot";
const RECOMMEND_SHARD_BITS: &str = "recommend-shard-bits";

const DEFAULT_DETECT_SALIENCE: i32 = 10;
const DEFAULT_ADVICE_SALIENCE: i32 = 5;

/// How a skew ratio is compared against its threshold
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Comparison {
    /// `ratio >= threshold`
    #[default]
    AtLeast,
    /// `ratio > threshold`
    GreaterThan,
}

impl Comparison {
    pub fn passes(self, ratio: f64, threshold: f64) -> bool {
        match self {
            Comparison::AtLeast => ratio >= threshold,
            Comparison::GreaterThan => ratio > threshold,
        }
    }
}

/// CPU dimension a detection rule watches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimension {
    /// Raftstore CPU
    Write,
    /// Coprocessor CPU
    Read,
}

impl Dimension {
    fn enabled(self, snapshot: &ClusterSnapshot) -> bool {
        match self {
            Dimension::Write => snapshot.check_write_hotspot,
            Dimension::Read => snapshot.check_read_hotspot,
        }
    }

    fn stats(self, stats: &ClusterStats) -> &DimensionStats {
        match self {
            Dimension::Write => &stats.write,
            Dimension::Read => &stats.read,
        }
    }

    fn record(self, verdict: &mut Verdict, ratio: f64) {
        match self {
            Dimension::Write => {
                verdict.write_hotspot_detected = true;
                verdict.write_hotspot_ratio = ratio;
            }
            Dimension::Read => {
                verdict.read_hotspot_detected = true;
                verdict.read_hotspot_ratio = ratio;
            }
        }
    }

    fn rule_name(self) -> &'static str {
        match self {
            Dimension::Write => DETECT_WRITE,
            Dimension::Read => DETECT_READ,
        }
    }
}

/// A condition → action pair evaluated against a snapshot.
pub trait HotspotRule: fmt::Debug + Send + Sync {
    fn name(&self) -> &'static str;

    /// Higher salience runs first.
    fn salience(&self) -> i32;

    /// Apply the rule, returning whether it fired.
    fn evaluate(&self, snapshot: &mut ClusterSnapshot) -> Result<bool>;
}

/// Flags a node whose CPU exceeds the cluster average by the threshold ratio
#[derive(Debug, Clone)]
pub struct DetectHotspot {
    pub dimension: Dimension,
    pub threshold: f64,
    pub comparison: Comparison,
    pub salience: i32,
}

impl DetectHotspot {
    pub fn new(dimension: Dimension) -> Self {
        Self {
            dimension,
            threshold: DEFAULT_HOTSPOT_THRESHOLD,
            comparison: Comparison::default(),
            salience: DEFAULT_DETECT_SALIENCE,
        }
    }
}

impl HotspotRule for DetectHotspot {
    fn name(&self) -> &'static str {
        self.dimension.rule_name()
    }

    fn salience(&self) -> i32 {
        self.salience
    }

    fn evaluate(&self, snapshot: &mut ClusterSnapshot) -> Result<bool> {
        let stats = snapshot
            .stats
            .as_ref()
            .ok_or_else(|| HotspotError::EvaluationFault {
                rule: self.name().to_string(),
                reason: "cluster statistics were not computed".to_string(),
            })?;

        if !self.dimension.enabled(snapshot) {
            return Ok(false);
        }

        let dim = self.dimension.stats(stats);
        if dim.avg <= 0.0 {
            return Ok(false);
        }

        let ratio = dim.max / dim.avg;
        if !self.comparison.passes(ratio, self.threshold) {
            return Ok(false);
        }

        self.dimension.record(&mut snapshot.verdict, ratio);
        Ok(true)
    }
}

/// Suggests SHARD_ROW_ID_BITS when a write hotspot comes from a
/// non-clustered index (sequential implicit row ids)
#[derive(Debug, Clone)]
pub struct RecommendShardBits {
    pub tuner: ShardBitsTuner,
    pub salience: i32,
}

impl Default for RecommendShardBits {
    fn default() -> Self {
        Self {
            tuner: ShardBitsTuner::default(),
            salience: DEFAULT_ADVICE_SALIENCE,
        }
    }
}

impl HotspotRule for RecommendShardBits {
    fn name(&self) -> &'static str {
        RECOMMEND_SHARD_BITS
    }

    fn salience(&self) -> i32 {
        self.salience
    }

    fn evaluate(&self, snapshot: &mut ClusterSnapshot) -> Result<bool> {
        if !snapshot.verdict.write_hotspot_detected || !snapshot.non_clustered_index {
            return Ok(false);
        }

        let verdict = &mut snapshot.verdict;
        verdict.recommend_shard_bits = true;
        verdict.shard_row_id_bits = self.tuner.tune(verdict.write_hotspot_ratio);
        Ok(true)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RuleResource {
    #[serde(default, rename = "rule")]
    rules: Vec<RuleDef>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
enum RuleDef {
    DetectWriteHotspot(DetectDef),
    DetectReadHotspot(DetectDef),
    RecommendShardBits(AdviceDef),
}

impl RuleDef {
    fn name(&self) -> &'static str {
        match self {
            RuleDef::DetectWriteHotspot(_) => DETECT_WRITE,
            RuleDef::DetectReadHotspot(_) => DETECT_READ,
            RuleDef::RecommendShardBits(_) => RECOMMEND_SHARD_BITS,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct DetectDef {
    salience: Option<i32>,
    threshold: Option<f64>,
    comparison: Option<Comparison>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct AdviceDef {
    salience: Option<i32>,
    mapping: Option<ShardBitsMapping>,
}

/// Compiled, immutable set of hotspot rules
#[derive(Debug)]
pub struct RuleSet {
    name: String,
    version: String,
    rules: Vec<Box<dyn HotspotRule>>,
}

impl RuleSet {
    /// Compile a rule set from a single resource.
    ///
    /// `resource` labels the text in error messages (usually a file path).
    pub fn compile(name: &str, version: &str, resource: &str, text: &str) -> Result<Self> {
        Self::compile_all(name, version, &[(resource.to_string(), text.to_string())])
    }

    /// Compile the rule resource shipped with the crate
    pub fn builtin() -> Result<Self> {
        Self::compile("TiDBHotspot", "1.0.0", "builtin", BUILTIN_RULES)
    }

    pub fn from_file(path: impl AsRef<Path>, name: &str, version: &str) -> Result<Self> {
        Self::from_files(&[path], name, version)
    }

    /// Compile several rule files into one rule set
    pub fn from_files<P: AsRef<Path>>(paths: &[P], name: &str, version: &str) -> Result<Self> {
        if paths.is_empty() {
            return Err(HotspotError::NoRuleFiles);
        }

        let mut sources = Vec::with_capacity(paths.len());
        for path in paths {
            let path = path.as_ref();
            let text = std::fs::read_to_string(path).map_err(|source| HotspotError::Resource {
                path: path.to_path_buf(),
                source,
            })?;
            sources.push((path.display().to_string(), text));
        }

        Self::compile_all(name, version, &sources)
    }

    fn compile_all(name: &str, version: &str, sources: &[(String, String)]) -> Result<Self> {
        if sources.is_empty() {
            return Err(HotspotError::NoRuleFiles);
        }

        let mut rules: Vec<Box<dyn HotspotRule>> = Vec::new();
        for (resource, text) in sources {
            let parsed: RuleResource =
                toml::from_str(text).map_err(|source| HotspotError::Malformed {
                    resource: resource.clone(),
                    source,
                })?;

            for def in parsed.rules {
                let rule_name = def.name();
                if rules.iter().any(|r| r.name() == rule_name) {
                    return Err(invalid(resource, rule_name, "rule is defined more than once"));
                }
                rules.push(build_rule(resource, def)?);
            }
        }

        Self::assemble(name, version, &sources[0].0, rules)
    }

    /// Build a rule set from rules constructed in code.
    ///
    /// The same ordering checks apply as for compiled resources.
    pub fn from_rules(name: &str, version: &str, rules: Vec<Box<dyn HotspotRule>>) -> Result<Self> {
        for (i, rule) in rules.iter().enumerate() {
            if rules[..i].iter().any(|r| r.name() == rule.name()) {
                return Err(invalid("<code>", rule.name(), "rule is defined more than once"));
            }
        }
        Self::assemble(name, version, "<code>", rules)
    }

    fn assemble(
        name: &str,
        version: &str,
        resource: &str,
        mut rules: Vec<Box<dyn HotspotRule>>,
    ) -> Result<Self> {
        if rules.is_empty() {
            return Err(invalid(resource, "<none>", "rule resource defines no rules"));
        }

        // Stable, so equal salience keeps definition order.
        rules.sort_by_key(|r| std::cmp::Reverse(r.salience()));
        check_advice_order(resource, &rules)?;

        info!(
            rule_set = name,
            version,
            rules = rules.len(),
            "compiled hotspot rule set"
        );

        Ok(Self {
            name: name.to_string(),
            version: version.to_string(),
            rules,
        })
    }

    /// Run every rule once, in salience order.
    ///
    /// Fails only when a fact a rule needs is missing from the snapshot.
    pub fn evaluate(&self, snapshot: &mut ClusterSnapshot) -> Result<()> {
        for rule in &self.rules {
            if rule.evaluate(snapshot)? {
                debug!(rule_set = %self.name, rule = rule.name(), "rule fired");
                snapshot.verdict.fired.push(rule.name().to_string());
            }
        }
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Rules in evaluation order
    pub fn rules(&self) -> impl Iterator<Item = &dyn HotspotRule> {
        self.rules.iter().map(|r| r.as_ref())
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

fn invalid(resource: &str, rule: &str, reason: impl Into<String>) -> HotspotError {
    HotspotError::InvalidRule {
        resource: resource.to_string(),
        rule: rule.to_string(),
        reason: reason.into(),
    }
}

fn build_rule(resource: &str, def: RuleDef) -> Result<Box<dyn HotspotRule>> {
    let rule_name = def.name();
    match def {
        RuleDef::DetectWriteHotspot(d) => build_detect(resource, Dimension::Write, d),
        RuleDef::DetectReadHotspot(d) => build_detect(resource, Dimension::Read, d),
        RuleDef::RecommendShardBits(a) => {
            let tuner = ShardBitsTuner::new(a.mapping.unwrap_or_default());
            tuner
                .validate()
                .map_err(|reason| invalid(resource, rule_name, reason))?;
            Ok(Box::new(RecommendShardBits {
                tuner,
                salience: a.salience.unwrap_or(DEFAULT_ADVICE_SALIENCE),
            }))
        }
    }
}

fn build_detect(resource: &str, dimension: Dimension, def: DetectDef) -> Result<Box<dyn HotspotRule>> {
    let threshold = def.threshold.unwrap_or(DEFAULT_HOTSPOT_THRESHOLD);
    if !threshold.is_finite() || threshold <= 0.0 {
        return Err(invalid(
            resource,
            dimension.rule_name(),
            format!("threshold {} must be a positive number", threshold),
        ));
    }

    Ok(Box::new(DetectHotspot {
        dimension,
        threshold,
        comparison: def.comparison.unwrap_or_default(),
        salience: def.salience.unwrap_or(DEFAULT_DETECT_SALIENCE),
    }))
}

/// Shard-bit advice reads the write verdict, so it must run after write
/// detection within the same pass.
fn check_advice_order(resource: &str, rules: &[Box<dyn HotspotRule>]) -> Result<()> {
    let Some(advice) = rules.iter().position(|r| r.name() == RECOMMEND_SHARD_BITS) else {
        return Ok(());
    };

    match rules.iter().position(|r| r.name() == DETECT_WRITE) {
        Some(detect) if detect < advice => Ok(()),
        Some(_) => Err(invalid(
            resource,
            RECOMMEND_SHARD_BITS,
            "salience must be lower than detect-write-hotspot",
        )),
        None => Err(invalid(
            resource,
            RECOMMEND_SHARD_BITS,
            "requires a detect-write-hotspot rule",
        )),
    }
}
