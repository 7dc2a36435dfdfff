//! Flagwatch error taxonomy.
//!
//! Every failure mode in the subscription core maps to exactly one variant;
//! nothing here is allowed to crash the process. Lookup and delivery errors
//! are absorbed at their call sites, persistence errors abort the current
//! mutation cycle and leave the prior snapshot authoritative.

use thiserror::Error;

/// All errors produced by Flagwatch crates.
#[derive(Debug, Error)]
pub enum FlagwatchError {
    /// The directory has no event under this id (permanent, never retried).
    #[error("event not found in directory")]
    LookupNotFound,

    /// Directory lookup failed for a transient reason (network, timeout,
    /// upstream 5xx). Safe to retry on the next interaction; this core
    /// never retries it itself.
    #[error("directory lookup failed: {0}")]
    LookupTransient(String),

    /// A stored record is internally inconsistent (missing or unparsable
    /// start time). Purged on the next sweep, never surfaced to users.
    #[error("invalid stored record: {0}")]
    DataIntegrity(String),

    /// A direct or broadcast send failed. Logged and dropped; never aborts
    /// the enclosing state transition.
    #[error("delivery failed: {0}")]
    Delivery(String),

    /// The store could not be durably saved. The previous snapshot stays
    /// authoritative.
    #[error("persistence failed: {0}")]
    Persistence(String),

    /// Configuration file could not be read or parsed.
    #[error("config error: {0}")]
    Config(String),

    /// Chat platform plumbing failure (gateway connect, malformed frame).
    #[error("channel error: {0}")]
    Channel(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, FlagwatchError>;

impl FlagwatchError {
    /// Whether a retry on a later interaction could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::LookupTransient(_) | Self::Delivery(_) | Self::Persistence(_)
        )
    }
}
