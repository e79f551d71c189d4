//! Step outputs: `key=value` lines for the calling workflow
//!
//! Written to the file named by `--outputs`, or to `$GITHUB_OUTPUT` when set.
//! The file is appended to so several steps can share it.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::cli::orchestration::ReleaseOutcome;
use crate::error::Result;

/// Environment variable naming the outputs file on GitHub Actions
pub const OUTPUTS_ENV: &str = "GITHUB_OUTPUT";

/// Ordered key/value pairs for an outcome; absent values are empty strings
pub fn pairs(outcome: &ReleaseOutcome) -> Vec<(&'static str, String)> {
    vec![
        (
            "version",
            outcome.version.as_ref().map(|v| v.to_string()).unwrap_or_default(),
        ),
        ("tag", outcome.tag.clone().unwrap_or_default()),
        ("preview", outcome.preview.to_string()),
        (
            "published",
            outcome.published.map(|p| p.to_string()).unwrap_or_default(),
        ),
    ]
}

pub fn render(outcome: &ReleaseOutcome) -> String {
    pairs(outcome)
        .into_iter()
        .map(|(key, value)| format!("{}={}\n", key, value))
        .collect()
}

/// Explicit path first, then the environment
pub fn output_path(explicit: Option<&str>) -> Option<PathBuf> {
    explicit
        .map(PathBuf::from)
        .or_else(|| std::env::var_os(OUTPUTS_ENV).map(PathBuf::from))
}

pub fn write_outputs(path: &Path, outcome: &ReleaseOutcome) -> Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(render(outcome).as_bytes())?;
    Ok(())
}
