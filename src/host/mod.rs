//! Repository host: comments and tracking issues
//!
//! The coordinator and orchestrator only see the [HostClient] trait. Two
//! implementations ship: [LocalHost] persists to a TOML file in the working
//! tree, [InMemoryHost] keeps everything in memory for tests.

pub mod local;
pub mod memory;

pub use local::LocalHost;
pub use memory::InMemoryHost;

use crate::error::Result;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// An issue opened when a propagation edge cannot be reconciled
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackingIssue {
    pub title: String,
    pub body: String,
    pub labels: Vec<String>,
}

impl TrackingIssue {
    /// Fixed title identifying an edge
    pub fn title_for(source_branch: &str, target_branch: &str) -> String {
        format!("Sync conflict: {} -> {}", source_branch, target_branch)
    }

    pub fn for_edge(
        source_branch: &str,
        target_branch: &str,
        version: &str,
        paths: &[String],
        at: DateTime<Utc>,
        labels: &[String],
    ) -> Self {
        let mut body = format!(
            "Propagating `{}` into `{}` hit conflicts that could not be reconciled.\n\n\
             - Source: `{}`\n\
             - Target: `{}`\n\
             - Attempted version: `{}`\n\
             - Time: {}\n",
            source_branch,
            target_branch,
            source_branch,
            target_branch,
            version,
            at.to_rfc3339_opts(SecondsFormat::Secs, true)
        );
        if !paths.is_empty() {
            body.push_str("\nConflicting paths:\n");
            for path in paths {
                body.push_str(&format!("- `{}`\n", path));
            }
        }
        body.push_str("\nClose this issue once the branches are reconciled by hand.\n");

        TrackingIssue {
            title: Self::title_for(source_branch, target_branch),
            body,
            labels: labels.to_vec(),
        }
    }
}

/// Operations release-ladder needs from the repository host
pub trait HostClient {
    /// Create or replace the comment identified by `marker`
    fn upsert_comment(&self, marker: &str, body: &str) -> Result<()>;

    /// Id of an open issue with exactly this title
    fn find_open_issue(&self, title: &str) -> Result<Option<u64>>;

    /// Open an issue, returning its id
    fn create_issue(&self, issue: &TrackingIssue) -> Result<u64>;

    fn comment_on_issue(&self, id: u64, body: &str) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct StoredComment {
    pub marker: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct StoredIssue {
    pub id: u64,
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub labels: Vec<String>,
    pub open: bool,
    #[serde(default)]
    pub comments: Vec<String>,
}

/// Host records shared by both implementations
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct HostState {
    #[serde(default)]
    pub next_id: u64,
    #[serde(default)]
    pub comments: Vec<StoredComment>,
    #[serde(default)]
    pub issues: Vec<StoredIssue>,
}

impl HostState {
    pub fn upsert_comment(&mut self, marker: &str, body: &str) {
        match self.comments.iter_mut().find(|c| c.marker == marker) {
            Some(existing) => existing.body = body.to_string(),
            None => self.comments.push(StoredComment {
                marker: marker.to_string(),
                body: body.to_string(),
            }),
        }
    }

    pub fn find_open_issue(&self, title: &str) -> Option<u64> {
        self.issues
            .iter()
            .find(|i| i.open && i.title == title)
            .map(|i| i.id)
    }

    pub fn create_issue(&mut self, issue: &TrackingIssue) -> u64 {
        self.next_id += 1;
        self.issues.push(StoredIssue {
            id: self.next_id,
            title: issue.title.clone(),
            body: issue.body.clone(),
            labels: issue.labels.clone(),
            open: true,
            comments: Vec::new(),
        });
        self.next_id
    }

    pub fn issue_mut(&mut self, id: u64) -> Option<&mut StoredIssue> {
        self.issues.iter_mut().find(|i| i.id == id)
    }
}
