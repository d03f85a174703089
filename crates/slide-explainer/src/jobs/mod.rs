//! Job records and their persistent store.

pub mod model;
pub mod store;

pub use model::{format_timestamp, Job, JobStatus};
pub use store::{JobStore, StoreError};
