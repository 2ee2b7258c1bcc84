//! Test utilities for the keysweep deduplication core
//!
//! This crate provides mock implementations and fixtures for testing the
//! scan and repair pipeline without a real remote store.

pub mod mocks;

// Re-export commonly used types
pub use mocks::{MockRecordStore, SequentialIdGenerator};
