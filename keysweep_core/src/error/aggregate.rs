//! Aggregate failure for pool-draining runs

use thiserror::Error;

/// The error returned when a worker pool run completes with recorded errors.
///
/// Carries the entire ordered error list, never just the first. The display
/// form shows the count plus the first message so a log line stays readable;
/// callers that need every failure walk `errors`.
#[derive(Error, Debug)]
#[error("{} task(s) failed (first: {})", .errors.len(), first_message(.errors))]
pub struct AggregateFailure {
    /// Every error recorded during the run, in the order they were observed
    pub errors: Vec<crate::error::Error>,
}

impl AggregateFailure {
    /// Wrap a non-empty error list
    pub fn new(errors: Vec<crate::error::Error>) -> Self {
        Self { errors }
    }

    /// Render each underlying error on its own line
    pub fn messages(&self) -> Vec<String> {
        self.errors.iter().map(|e| e.to_string()).collect()
    }
}

fn first_message(errors: &[crate::error::Error]) -> String {
    errors
        .first()
        .map(|e| e.to_string())
        .unwrap_or_else(|| "no errors recorded".to_string())
}
