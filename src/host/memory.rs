use super::{HostClient, HostState, TrackingIssue};
use crate::error::{ReleaseError, Result};
use std::sync::{Mutex, MutexGuard};

/// In-memory host for testing
#[derive(Debug, Default)]
pub struct InMemoryHost {
    state: Mutex<HostState>,
}

impl InMemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, HostState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Body of the comment identified by `marker`
    pub fn comment(&self, marker: &str) -> Option<String> {
        self.state()
            .comments
            .iter()
            .find(|c| c.marker == marker)
            .map(|c| c.body.clone())
    }

    pub fn comment_count(&self) -> usize {
        self.state().comments.len()
    }

    /// Titles of every issue ever opened
    pub fn issue_titles(&self) -> Vec<String> {
        self.state().issues.iter().map(|i| i.title.clone()).collect()
    }

    pub fn issue_body(&self, id: u64) -> Option<String> {
        self.state()
            .issues
            .iter()
            .find(|i| i.id == id)
            .map(|i| i.body.clone())
    }

    pub fn issue_comments(&self, id: u64) -> Vec<String> {
        self.state()
            .issues
            .iter()
            .find(|i| i.id == id)
            .map(|i| i.comments.clone())
            .unwrap_or_default()
    }

    pub fn close_issue(&self, id: u64) {
        if let Some(issue) = self.state().issue_mut(id) {
            issue.open = false;
        }
    }
}

impl HostClient for InMemoryHost {
    fn upsert_comment(&self, marker: &str, body: &str) -> Result<()> {
        self.state().upsert_comment(marker, body);
        Ok(())
    }

    fn find_open_issue(&self, title: &str) -> Result<Option<u64>> {
        Ok(self.state().find_open_issue(title))
    }

    fn create_issue(&self, issue: &TrackingIssue) -> Result<u64> {
        Ok(self.state().create_issue(issue))
    }

    fn comment_on_issue(&self, id: u64, body: &str) -> Result<()> {
        let mut state = self.state();
        let issue = state
            .issue_mut(id)
            .ok_or_else(|| ReleaseError::host(format!("no issue #{}", id)))?;
        issue.comments.push(body.to_string());
        Ok(())
    }
}
