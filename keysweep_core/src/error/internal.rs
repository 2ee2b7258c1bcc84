//! Internal library error types

use thiserror::Error;

/// Internal errors for invariant violations inside the library
#[derive(Error, Debug)]
pub enum InternalError {
    /// An internal assertion failed
    #[error("Internal assertion failed: {message}")]
    Assertion { message: String },

    /// A bounded retry loop exhausted its attempts without a final error
    #[error("Retry loop exhausted after {attempts} attempt(s)")]
    RetriesExhausted { attempts: u32 },
}

impl InternalError {
    /// Create an assertion error
    pub fn assertion(message: impl Into<String>) -> Self {
        Self::Assertion {
            message: message.into(),
        }
    }

    /// Create a retries exhausted error
    pub fn retries_exhausted(attempts: u32) -> Self {
        Self::RetriesExhausted { attempts }
    }
}
