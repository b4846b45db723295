//! Error types for rule compilation and hotspot evaluation.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while compiling a rule set or evaluating a snapshot.
#[derive(Debug, Error)]
pub enum HotspotError {
    #[error("at least one rule file is required")]
    NoRuleFiles,

    #[error("failed to read rule resource {path}: {source}")]
    Resource {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed rule resource {resource}: {source}")]
    Malformed {
        resource: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid rule {rule} in {resource}: {reason}")]
    InvalidRule {
        resource: String,
        rule: String,
        reason: String,
    },

    #[error("evaluation fault in rule {rule}: {reason}")]
    EvaluationFault { rule: String, reason: String },
}

impl HotspotError {
    /// True for errors caused by a missing or malformed rule resource.
    ///
    /// These are fatal at startup and retrying without fixing the resource
    /// cannot succeed.
    pub fn is_configuration(&self) -> bool {
        !matches!(self, HotspotError::EvaluationFault { .. })
    }
}

pub type Result<T> = std::result::Result<T, HotspotError>;
