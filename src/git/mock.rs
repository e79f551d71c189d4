//! In-memory repository for tests
//!
//! Models a single local repository plus one remote. Helpers such as
//! [MockRepository::commit_on] write history that is already published on
//! the remote; the trait methods then behave like a freshly fetched clone.

use crate::error::{ReleaseError, Result};
use crate::git::{
    Author, CommitInfo, ConflictPolicy, FileChange, IntegrationMode, IntegrationOutcome,
    PushOutcome, Repository, TagRef,
};
use crate::metadata;
use git2::Oid;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Clone)]
struct MockCommit {
    message: String,
    parents: Vec<Oid>,
    files: BTreeMap<String, String>,
}

/// A recorded call to [Repository::integrate]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntegrationCall {
    pub source: Oid,
    pub target: Oid,
    pub mode: IntegrationMode,
    pub policy: ConflictPolicy,
}

#[derive(Debug, Default)]
struct MockState {
    next_id: u32,
    commits: HashMap<Oid, MockCommit>,
    branches: HashMap<String, Oid>,
    remote_branches: HashMap<String, Oid>,
    tags: Vec<TagRef>,
    remote_tags: Vec<String>,
    conflicts: HashMap<(Oid, Oid), Vec<String>>,
    forced_rejections: usize,
    concurrent_updates: VecDeque<(String, Oid)>,
    fetch_error: Option<String>,
    tag_error: Option<String>,
    fetches: usize,
    list_tag_calls: usize,
    integrations: Vec<IntegrationCall>,
    pushes: Vec<(String, Oid)>,
}

impl MockState {
    fn allocate(&mut self) -> Oid {
        self.next_id += 1;
        let mut bytes = [0u8; 20];
        bytes[16..].copy_from_slice(&self.next_id.to_be_bytes());
        Oid::from_bytes(&bytes).unwrap_or_else(|_| Oid::zero())
    }

    fn insert(&mut self, commit: MockCommit) -> Oid {
        let oid = self.allocate();
        self.commits.insert(oid, commit);
        oid
    }

    fn commit(&self, oid: Oid) -> Result<&MockCommit> {
        self.commits
            .get(&oid)
            .ok_or_else(|| ReleaseError::backend(format!("Unknown commit {}", oid)))
    }

    fn reachable(&self, from: Oid) -> HashSet<Oid> {
        let mut seen = HashSet::new();
        let mut queue = vec![from];
        while let Some(oid) = queue.pop() {
            if seen.insert(oid) {
                if let Some(commit) = self.commits.get(&oid) {
                    queue.extend(commit.parents.iter().copied());
                }
            }
        }
        seen
    }
}

/// Mock repository for testing
#[derive(Debug, Default)]
pub struct MockRepository {
    state: Mutex<MockState>,
}

impl MockRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Add a commit to `branch` locally and on the remote
    pub fn commit_on(&self, branch: &str, message: &str, files: &[(&str, &str)]) -> Oid {
        let mut state = self.state();
        let parent = state.branches.get(branch).copied();
        let mut tree = parent
            .and_then(|p| state.commits.get(&p))
            .map(|c| c.files.clone())
            .unwrap_or_default();
        for (path, content) in files {
            tree.insert(path.to_string(), content.to_string());
        }

        let oid = state.insert(MockCommit {
            message: message.to_string(),
            parents: parent.into_iter().collect(),
            files: tree,
        });
        state.branches.insert(branch.to_string(), oid);
        state.remote_branches.insert(branch.to_string(), oid);
        oid
    }

    /// Create `branch` at `oid` locally and on the remote
    pub fn branch_from(&self, branch: &str, oid: Oid) {
        let mut state = self.state();
        state.branches.insert(branch.to_string(), oid);
        state.remote_branches.insert(branch.to_string(), oid);
    }

    /// Add a tag that already exists on the remote
    pub fn add_tag(&self, name: &str, target: Oid, created: i64) {
        let mut state = self.state();
        state.tags.push(TagRef {
            name: name.to_string(),
            target,
            created,
        });
        state.remote_tags.push(name.to_string());
    }

    /// Integrating `source` into `target` conflicts on `paths`
    pub fn add_conflict(&self, source: Oid, target: Oid, paths: &[&str]) {
        self.state()
            .conflicts
            .insert((source, target), paths.iter().map(|p| p.to_string()).collect());
    }

    /// Reject the next `count` pushes regardless of the lease
    pub fn reject_pushes(&self, count: usize) {
        self.state().forced_rejections = count;
    }

    /// Before the next push of `branch`, simulate another writer adding a commit
    /// on the remote
    pub fn race_next_push(&self, branch: &str, message: &str) {
        let mut state = self.state();
        let parent = state.remote_branches.get(branch).copied();
        let files = parent
            .and_then(|p| state.commits.get(&p))
            .map(|c| c.files.clone())
            .unwrap_or_default();
        let oid = state.insert(MockCommit {
            message: message.to_string(),
            parents: parent.into_iter().collect(),
            files,
        });
        state.concurrent_updates.push_back((branch.to_string(), oid));
    }

    pub fn fail_fetch(&self, reason: &str) {
        self.state().fetch_error = Some(reason.to_string());
    }

    pub fn fail_tagging(&self, reason: &str) {
        self.state().tag_error = Some(reason.to_string());
    }

    /// Files at a commit
    pub fn files_at(&self, oid: Oid) -> BTreeMap<String, String> {
        self.state()
            .commits
            .get(&oid)
            .map(|c| c.files.clone())
            .unwrap_or_default()
    }

    pub fn parents_of(&self, oid: Oid) -> Vec<Oid> {
        self.state()
            .commits
            .get(&oid)
            .map(|c| c.parents.clone())
            .unwrap_or_default()
    }

    pub fn remote_head(&self, branch: &str) -> Option<Oid> {
        self.state().remote_branches.get(branch).copied()
    }

    pub fn local_head(&self, branch: &str) -> Option<Oid> {
        self.state().branches.get(branch).copied()
    }

    pub fn tag_names(&self) -> Vec<String> {
        self.state().tags.iter().map(|t| t.name.clone()).collect()
    }

    pub fn tag_target(&self, name: &str) -> Option<Oid> {
        self.state()
            .tags
            .iter()
            .find(|t| t.name == name)
            .map(|t| t.target)
    }

    pub fn pushed_tags(&self) -> Vec<String> {
        self.state().remote_tags.clone()
    }

    pub fn pushes(&self) -> Vec<(String, Oid)> {
        self.state().pushes.clone()
    }

    pub fn integrations(&self) -> Vec<IntegrationCall> {
        self.state().integrations.clone()
    }

    pub fn fetch_count(&self) -> usize {
        self.state().fetches
    }

    pub fn list_tag_calls(&self) -> usize {
        self.state().list_tag_calls
    }
}

impl Repository for MockRepository {
    fn list_tags(&self) -> Result<Vec<TagRef>> {
        let mut state = self.state();
        state.list_tag_calls += 1;
        Ok(state.tags.clone())
    }

    fn fetch(&self, remote: &str) -> Result<()> {
        let mut state = self.state();
        state.fetches += 1;
        match &state.fetch_error {
            Some(reason) => Err(ReleaseError::backend(format!(
                "Failed to fetch from remote '{}': {}",
                remote, reason
            ))),
            None => Ok(()),
        }
    }

    fn branch_head(&self, branch: &str) -> Result<Oid> {
        self.state()
            .branches
            .get(branch)
            .copied()
            .ok_or_else(|| ReleaseError::backend(format!("Cannot find branch '{}'", branch)))
    }

    fn remote_branch_head(&self, _remote: &str, branch: &str) -> Result<Option<Oid>> {
        Ok(self.state().remote_branches.get(branch).copied())
    }

    fn commit_message(&self, oid: Oid) -> Result<String> {
        Ok(self.state().commit(oid)?.message.clone())
    }

    fn commits_between(&self, from: Option<Oid>, to: Oid) -> Result<Vec<CommitInfo>> {
        let state = self.state();
        let hidden = from.map(|f| state.reachable(f)).unwrap_or_default();

        // First-parent walk is enough for the linear histories tests build
        let mut commits = Vec::new();
        let mut cursor = Some(to);
        while let Some(oid) = cursor {
            if hidden.contains(&oid) {
                break;
            }
            let commit = state.commit(oid)?;
            commits.push(CommitInfo {
                message: commit.message.clone(),
            });
            cursor = commit.parents.first().copied();
        }

        commits.reverse();
        Ok(commits)
    }

    fn is_ancestor(&self, ancestor: Oid, descendant: Oid) -> Result<bool> {
        Ok(self.state().reachable(descendant).contains(&ancestor))
    }

    fn read_file(&self, commit: Oid, path: &str) -> Result<Option<String>> {
        Ok(self.state().commit(commit)?.files.get(path).cloned())
    }

    fn commit_files(
        &self,
        parent: Oid,
        changes: &[FileChange],
        message: &str,
        _author: &Author,
    ) -> Result<Oid> {
        let mut state = self.state();
        let mut files = state.commit(parent)?.files.clone();
        for change in changes {
            files.insert(change.path.clone(), change.content.clone());
        }

        Ok(state.insert(MockCommit {
            message: message.to_string(),
            parents: vec![parent],
            files,
        }))
    }

    fn integrate(
        &self,
        source: Oid,
        target: Oid,
        mode: IntegrationMode,
        policy: &ConflictPolicy,
        message: &str,
        _author: &Author,
    ) -> Result<IntegrationOutcome> {
        let mut state = self.state();
        state.integrations.push(IntegrationCall {
            source,
            target,
            mode,
            policy: policy.clone(),
        });

        if state.reachable(target).contains(&source) {
            return Ok(IntegrationOutcome::UpToDate);
        }
        if state.reachable(source).contains(&target) {
            return Ok(IntegrationOutcome::Integrated { head: source });
        }

        let source_files = state.commit(source)?.files.clone();
        let target_files = state.commit(target)?.files.clone();
        let conflicts = state
            .conflicts
            .get(&(source, target))
            .cloned()
            .unwrap_or_default();

        let mut files = target_files.clone();
        for (path, content) in &source_files {
            files.entry(path.clone()).or_insert_with(|| content.clone());
        }

        let mut unresolved = Vec::new();
        for path in conflicts {
            match policy {
                ConflictPolicy::PreferSource { path: meta } if *meta == path => {
                    match source_files.get(&path) {
                        Some(content) => {
                            files.insert(path, content.clone());
                        }
                        None => unresolved.push(path),
                    }
                }
                ConflictPolicy::PatchMetadata { path: meta, version } if *meta == path => {
                    let base = target_files.get(&path).or(source_files.get(&path));
                    match base.map(|content| metadata::write_version(&path, content, version)) {
                        Some(Ok(patched)) => {
                            files.insert(path, patched);
                        }
                        _ => unresolved.push(path),
                    }
                }
                _ => unresolved.push(path),
            }
        }

        if !unresolved.is_empty() {
            return Ok(IntegrationOutcome::Conflicted { paths: unresolved });
        }

        let (message, parents) = match mode {
            IntegrationMode::Merge => (message.to_string(), vec![target, source]),
            IntegrationMode::Rebase => (state.commit(target)?.message.clone(), vec![source]),
        };
        let head = state.insert(MockCommit {
            message,
            parents,
            files,
        });

        Ok(IntegrationOutcome::Integrated { head })
    }

    fn update_branch(&self, branch: &str, oid: Oid) -> Result<()> {
        self.state().branches.insert(branch.to_string(), oid);
        Ok(())
    }

    fn create_tag(
        &self,
        name: &str,
        target: Oid,
        _message: &str,
        _author: &Author,
        force: bool,
    ) -> Result<()> {
        let mut state = self.state();
        if let Some(reason) = &state.tag_error {
            return Err(ReleaseError::tag(format!(
                "Cannot create tag '{}': {}",
                name, reason
            )));
        }

        let existing = state.tags.iter().position(|t| t.name == name);
        match (existing, force) {
            (Some(_), false) => Err(ReleaseError::tag(format!("Tag '{}' already exists", name))),
            (Some(index), true) => {
                state.tags[index].target = target;
                Ok(())
            }
            (None, _) => {
                let created = state.tags.iter().map(|t| t.created).max().unwrap_or(0) + 1;
                state.tags.push(TagRef {
                    name: name.to_string(),
                    target,
                    created,
                });
                Ok(())
            }
        }
    }

    fn delete_tag(&self, name: &str) -> Result<()> {
        let mut state = self.state();
        let index = state
            .tags
            .iter()
            .position(|t| t.name == name)
            .ok_or_else(|| ReleaseError::tag(format!("No such tag '{}'", name)))?;
        state.tags.remove(index);
        Ok(())
    }

    fn push_branch(&self, _remote: &str, branch: &str, expected: Option<Oid>) -> Result<PushOutcome> {
        let mut state = self.state();

        if let Some(index) = state.concurrent_updates.iter().position(|(b, _)| b == branch) {
            if let Some((name, oid)) = state.concurrent_updates.remove(index) {
                state.remote_branches.insert(name, oid);
            }
        }

        if state.forced_rejections > 0 {
            state.forced_rejections -= 1;
            return Ok(PushOutcome::Rejected {
                reason: "remote refused the update".to_string(),
            });
        }

        let current = state.remote_branches.get(branch).copied();
        if current != expected {
            return Ok(PushOutcome::Rejected {
                reason: format!("{} moved on the remote", branch),
            });
        }

        let local = state
            .branches
            .get(branch)
            .copied()
            .ok_or_else(|| ReleaseError::remote(format!("Nothing to push for '{}'", branch)))?;
        state.remote_branches.insert(branch.to_string(), local);
        state.pushes.push((branch.to_string(), local));
        Ok(PushOutcome::Pushed)
    }

    fn push_tags(&self, _remote: &str, tags: &[&str]) -> Result<()> {
        let mut state = self.state();
        for tag in tags {
            if !state.tags.iter().any(|t| t.name == *tag) {
                return Err(ReleaseError::remote(format!("No such tag '{}'", tag)));
            }
            if !state.remote_tags.iter().any(|t| t == tag) {
                state.remote_tags.push(tag.to_string());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn author() -> Author {
        Author::new("bot", "bot@example.com")
    }

    #[test]
    fn test_commit_on_publishes_to_remote() {
        let repo = MockRepository::new();
        let oid = repo.commit_on("main", "init", &[("a.txt", "a")]);

        assert_eq!(repo.branch_head("main").unwrap(), oid);
        assert_eq!(repo.remote_branch_head("origin", "main").unwrap(), Some(oid));
        assert_eq!(repo.read_file(oid, "a.txt").unwrap().as_deref(), Some("a"));
    }

    #[test]
    fn test_push_lease_rejects_moved_remote() {
        let repo = MockRepository::new();
        let base = repo.commit_on("main", "init", &[]);
        let next = repo
            .commit_files(base, &[FileChange::new("b.txt", "b")], "next", &author())
            .unwrap();
        repo.update_branch("main", next).unwrap();
        repo.race_next_push("main", "someone else");

        let outcome = repo.push_branch("origin", "main", Some(base)).unwrap();
        assert!(matches!(outcome, PushOutcome::Rejected { .. }));
        assert_ne!(repo.remote_head("main"), Some(next));
    }

    #[test]
    fn test_merge_keeps_both_parents() {
        let repo = MockRepository::new();
        let base = repo.commit_on("beta", "init", &[]);
        repo.branch_from("alpha", base);
        let beta = repo.commit_on("beta", "fix: beta", &[("beta.txt", "b")]);
        let alpha = repo.commit_on("alpha", "feat: alpha", &[("alpha.txt", "a")]);

        let outcome = repo
            .integrate(beta, alpha, IntegrationMode::Merge, &ConflictPolicy::Abort, "merge", &author())
            .unwrap();
        let head = match outcome {
            IntegrationOutcome::Integrated { head } => head,
            other => panic!("unexpected outcome {:?}", other),
        };

        assert_eq!(repo.parents_of(head), vec![alpha, beta]);
        let files = repo.files_at(head);
        assert!(files.contains_key("alpha.txt"));
        assert!(files.contains_key("beta.txt"));
    }

    #[test]
    fn test_registered_conflict_respects_policy() {
        let repo = MockRepository::new();
        let base = repo.commit_on("beta", "init", &[("package.json", r#"{"version": "1.0.0"}"#)]);
        repo.branch_from("alpha", base);
        let beta = repo.commit_on("beta", "b", &[("package.json", r#"{"version": "1.1.0-beta.0"}"#)]);
        let alpha = repo.commit_on("alpha", "a", &[("package.json", r#"{"version": "1.1.0-alpha.3"}"#)]);
        repo.add_conflict(beta, alpha, &["package.json"]);

        let aborted = repo
            .integrate(beta, alpha, IntegrationMode::Merge, &ConflictPolicy::Abort, "m", &author())
            .unwrap();
        assert_eq!(
            aborted,
            IntegrationOutcome::Conflicted {
                paths: vec!["package.json".to_string()]
            }
        );

        let patched = repo
            .integrate(
                beta,
                alpha,
                IntegrationMode::Merge,
                &ConflictPolicy::PatchMetadata {
                    path: "package.json".to_string(),
                    version: "1.1.0-alpha.4".to_string(),
                },
                "m",
                &author(),
            )
            .unwrap();
        let head = match patched {
            IntegrationOutcome::Integrated { head } => head,
            other => panic!("unexpected outcome {:?}", other),
        };
        assert_eq!(
            repo.read_file(head, "package.json").unwrap().as_deref(),
            Some(r#"{"version": "1.1.0-alpha.4"}"#)
        );
    }
}
