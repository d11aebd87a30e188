//! Error types for the Tiergate service.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for Tiergate operations.
#[derive(Error, Debug)]
pub enum TierGateError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// A caller exhausted its rate limit window
    #[error(transparent)]
    RateLimitExceeded(#[from] RateLimitExceeded),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Rejection raised when a caller exceeds a tier's call ceiling.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("Too many requests. Please try again in {retry_after_seconds} seconds.")]
#[serde(rename_all = "camelCase")]
pub struct RateLimitExceeded {
    /// Whole seconds until the current window resets
    #[serde(rename = "retryAfter")]
    pub retry_after_seconds: u64,
    /// Calls allowed per window
    pub limit: u32,
    /// Always zero for a rejected call
    pub remaining: u32,
    /// Window reset time in epoch milliseconds
    pub reset: u64,
}

/// Result type alias for Tiergate operations.
pub type Result<T> = std::result::Result<T, TierGateError>;
