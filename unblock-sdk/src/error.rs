//! Error types for the monitor.

use thiserror::Error;

/// Misuse of the scope API.
///
/// Both variants are programmer errors: scopes do not nest on one registry,
/// and scope-level settings need an enclosing scope.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScopeError {
    /// `begin` was called while another scope is bound to the registry.
    #[error("scope '{active}' is already active; use disable_during instead of nesting scopes")]
    AlreadyActive { active: String },

    /// A scope operation was called with no scope bound.
    #[error("no active scope; call begin() first")]
    NoActiveScope,
}

/// Failure of a result retrieval.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WaitError {
    /// The bounded wait elapsed before the result was ready.
    #[error("timed out waiting for result")]
    Timeout,

    /// The computation was cancelled.
    #[error("result was cancelled")]
    Cancelled,

    /// The producer went away without completing.
    #[error("result was abandoned before completion")]
    Abandoned,
}

/// Configuration could not be loaded.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}
