pub mod boundary;
pub mod changelog;
pub mod classifier;
pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod git;
pub mod history;
pub mod host;
pub mod metadata;
pub mod publish;
pub mod resolver;
pub mod sync;
pub mod ui;

pub use error::{PolicyViolation, ReleaseError, Result};
