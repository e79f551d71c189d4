//! Workflow entry points used by the binary
pub mod orchestration;
pub mod outputs;

pub use orchestration::{ReleaseOrchestrator, ReleaseOutcome, ReleaseRequest};
