//! Error types for adapters.

use thiserror::Error;
use unblock_sdk::WaitError;

/// Errors surfaced by intercepted service calls.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AdapterError {
    /// The service rejected or failed the call.
    #[error("call to {call_site} failed: {message}")]
    Call { call_site: String, message: String },

    /// Waiting for the call's result failed.
    #[error(transparent)]
    Wait(#[from] WaitError),
}

impl AdapterError {
    /// A failed call to `call_site`.
    pub fn call(call_site: impl Into<String>, message: impl Into<String>) -> Self {
        AdapterError::Call {
            call_site: call_site.into(),
            message: message.into(),
        }
    }
}
