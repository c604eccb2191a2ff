use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;

/// Errors surfaced by the simulator core.
///
/// Degenerate arithmetic (zero denominators) never errors — it is clamped to
/// documented sentinels so downstream formulas stay total. Absent IRR and
/// break-even are `None` in results, not errors.
#[derive(Debug, Error)]
pub enum SimError {
    /// A scenario field violates its declared range at construction time.
    #[error("invalid value for `{path}`: {value} (expected {constraint})")]
    Validation {
        path: String,
        value: String,
        constraint: String,
    },

    /// The caller cancelled a Monte-Carlo or sweep fan-out. No partial
    /// aggregates are emitted.
    #[error("evaluation cancelled")]
    Cancelled,

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("scenario file error: {0}")]
    ScenarioFile(#[from] toml::de::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("toml serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),
}

impl SimError {
    pub fn validation(path: &str, value: impl std::fmt::Display, constraint: &str) -> Self {
        SimError::Validation {
            path: path.to_string(),
            value: value.to_string(),
            constraint: constraint.to_string(),
        }
    }
}

/// Cooperative cancellation token shared with Monte-Carlo and sweep workers.
/// Workers check it between runs and abort cleanly.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
