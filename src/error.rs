use thiserror::Error;

use crate::driver::DriverError;

/// Error taxonomy for the exploration engine.
///
/// Only `Auth` and `Frontier` are fatal to a crawl; everything else is
/// recoverable at the granularity of a single interaction or page visit.
#[derive(Error, Debug)]
pub enum ScoutError {
    #[error(transparent)]
    Driver(#[from] DriverError),

    #[error("navigation failed for {url}: {reason}")]
    Navigation { url: String, reason: String },

    #[error("interaction '{label}' exhausted after {attempts} attempts: {source}")]
    InteractionExhausted {
        label: String,
        attempts: u32,
        source: DriverError,
    },

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("session lock conflict: another process holds the session lock")]
    SessionLockConflict,

    #[error("frontier corrupted: {0}")]
    Frontier(String),

    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl ScoutError {
    /// Whether the error should abort the whole crawl rather than just
    /// degrade the current page visit.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ScoutError::Auth(_) | ScoutError::Frontier(_))
    }
}
