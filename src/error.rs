//! Structured error types for tree construction.

use thiserror::Error;

/// Unified error type for all fastnj operations.
#[derive(Debug, Error)]
pub enum FastNjError {
    /// Invalid input (too few sequences, unequal alignment lengths,
    /// characters outside the {A,C,G,T,-} alphabet).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Structural tree invariant violation (e.g. a join attempted on an
    /// inactive node). These indicate topology corruption and abort
    /// construction.
    #[error("topology error: {0}")]
    Topology(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, FastNjError>;
