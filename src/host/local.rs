use super::{HostClient, HostState, TrackingIssue};
use crate::error::{ReleaseError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Host records kept in a TOML file
///
/// Every operation reads the file, applies the change and writes it back, so
/// separate runs see each other's issues.
#[derive(Debug, Clone)]
pub struct LocalHost {
    path: PathBuf,
}

impl LocalHost {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        LocalHost { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<HostState> {
        if !self.path.exists() {
            return Ok(HostState::default());
        }
        let content = fs::read_to_string(&self.path).map_err(|e| {
            ReleaseError::host(format!("cannot read {}: {}", self.path.display(), e))
        })?;
        Ok(toml::from_str(&content)?)
    }

    fn save(&self, state: &HostState) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, toml::to_string_pretty(state)?)?;
        Ok(())
    }

    fn update<T>(&self, apply: impl FnOnce(&mut HostState) -> Result<T>) -> Result<T> {
        let mut state = self.load()?;
        let value = apply(&mut state)?;
        self.save(&state)?;
        Ok(value)
    }

    /// Mark an issue resolved
    pub fn close_issue(&self, id: u64) -> Result<()> {
        self.update(|state| {
            let issue = state
                .issue_mut(id)
                .ok_or_else(|| ReleaseError::host(format!("no issue #{}", id)))?;
            issue.open = false;
            Ok(())
        })
    }
}

impl HostClient for LocalHost {
    fn upsert_comment(&self, marker: &str, body: &str) -> Result<()> {
        self.update(|state| {
            state.upsert_comment(marker, body);
            Ok(())
        })
    }

    fn find_open_issue(&self, title: &str) -> Result<Option<u64>> {
        Ok(self.load()?.find_open_issue(title))
    }

    fn create_issue(&self, issue: &TrackingIssue) -> Result<u64> {
        let id = self.update(|state| Ok(state.create_issue(issue)))?;
        info!(id, title = %issue.title, file = %self.path.display(), "opened tracking issue");
        Ok(id)
    }

    fn comment_on_issue(&self, id: u64, body: &str) -> Result<()> {
        self.update(|state| {
            let issue = state
                .issue_mut(id)
                .ok_or_else(|| ReleaseError::host(format!("no issue #{}", id)))?;
            issue.comments.push(body.to_string());
            Ok(())
        })
    }
}
