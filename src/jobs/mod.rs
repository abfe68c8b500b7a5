//! Job data model — records, statuses, patches, and update events.

pub mod model;

pub use model::{JobEvent, JobPatch, JobRecord, JobStatus, ProviderKind};
