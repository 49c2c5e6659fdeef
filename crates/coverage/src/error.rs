//! Error types for coverage collection
//!
//! Simple, flat error hierarchy. Source fetch failures never show up here:
//! they are logged and the affected file is left out of the report.

use cdp::CDPError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CoverageError>;

#[derive(Debug, Error)]
pub enum CoverageError {
    /// `start` while collecting, or `stop` while idle
    #[error("{0}")]
    InvalidState(&'static str),

    #[error(transparent)]
    Protocol(#[from] CDPError),

    #[error("Unexpected protocol payload: {0}")]
    Payload(#[from] serde_json::Error),
}
