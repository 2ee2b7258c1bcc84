//! Error types for the keysweep core library
//!
//! This module contains all error types used throughout the library, organized
//! into logical categories for better maintainability and clarity.

use thiserror::Error;

pub mod aggregate;
pub mod internal;
pub mod remote;
pub mod validation;

pub use self::aggregate::AggregateFailure;
pub use self::remote::RemoteError;
pub use self::validation::ValidationError;
pub use internal::InternalError;

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the keysweep core library
///
/// Errors are categorized into four main types:
/// - Remote errors: query and write calls against the record store
/// - Validation errors: repair candidates or configuration with an unexpected shape
/// - Aggregate failures: a pool-draining run that finished with recorded errors
/// - Internal errors: library invariant violations
#[derive(Error, Debug)]
pub enum Error {
    /// Remote store related errors
    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// Validation related errors
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A worker pool run that completed with a non-empty error list
    #[error(transparent)]
    Aggregate(#[from] AggregateFailure),

    /// Internal library errors
    #[error(transparent)]
    Internal(#[from] InternalError),
}
