//! Mock implementations for testing

mod store;

pub use store::{MockRecordStore, SequentialIdGenerator};
