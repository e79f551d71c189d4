//! Git operations abstraction layer
//!
//! This module provides a trait-based abstraction over Git operations,
//! allowing for multiple implementations including real Git repositories
//! and mock implementations for testing.
//!
//! # Overview
//!
//! The primary abstraction is the [Repository] trait, which defines the Git
//! operations release-ladder needs: reading tags, committing release metadata,
//! integrating one branch into another and pushing with a lease. The concrete
//! implementations are:
//!
//! - [repository::Git2Repository]: A real implementation using the `git2` crate
//! - [mock::MockRepository]: An in-memory implementation for testing
//!
//! Integration never moves a branch: it returns a candidate commit, and the
//! caller decides whether to adopt it with [Repository::update_branch].
//!
//! # Usage
//!
//! ```rust
//! # use release_ladder::git::Repository;
//! # fn example<R: Repository>(repo: &R) -> release_ladder::Result<()> {
//! let head = repo.branch_head("main")?;
//! let tags = repo.list_tags()?;
//! println!("{} tags, main at {}", tags.len(), head);
//! # Ok(())
//! # }
//! ```

pub mod mock;
pub mod repository;

pub use mock::MockRepository;
pub use repository::Git2Repository;

use crate::error::Result;
use git2::Oid;

/// Commit information for analysis
#[derive(Debug, Clone, PartialEq)]
pub struct CommitInfo {
    /// The full commit message
    pub message: String,
}

/// A tag as stored in the repository, before classification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagRef {
    pub name: String,
    /// Commit the tag points at
    pub target: Oid,
    /// Tagger time for annotated tags, commit time for lightweight tags
    pub created: i64,
}

/// Identity used for automated commits and tags
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Author {
    pub name: String,
    pub email: String,
}

impl Author {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Author {
            name: name.into(),
            email: email.into(),
        }
    }
}

/// A file to write in a new commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    pub path: String,
    pub content: String,
}

impl FileChange {
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        FileChange {
            path: path.into(),
            content: content.into(),
        }
    }
}

/// How a source branch is brought into a target branch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegrationMode {
    /// Replay the target's own commits on top of the source (linear history)
    Rebase,
    /// Create a merge commit with the target as first parent
    Merge,
}

/// What to do with conflicts found while integrating
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConflictPolicy {
    /// Any conflict fails the integration
    Abort,
    /// Conflicts on `path` take the source side; any other conflict fails
    PreferSource { path: String },
    /// Conflicts on `path` take the target side with its version field set to
    /// `version`; any other conflict fails
    PatchMetadata { path: String, version: String },
}

/// Result of an integration attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntegrationOutcome {
    /// The source is already contained in the target
    UpToDate,
    /// A candidate head for the target; no ref has been moved
    Integrated { head: Oid },
    /// Conflicts the policy could not resolve
    Conflicted { paths: Vec<String> },
}

/// Result of a leased push
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushOutcome {
    Pushed,
    /// The remote ref moved since it was last read, or the server refused the update
    Rejected { reason: String },
}

/// Common git operation trait for abstraction
///
/// ## Thread Safety
///
/// All implementors must be `Send + Sync` to allow safe sharing across threads.
///
/// ## Error Handling
///
/// All methods return [crate::error::Result<T>]. Implementations map transport
/// failures on reads to [crate::error::ReleaseError::BackendUnavailable] and
/// other failures to the matching [crate::error::ReleaseError] variant.
pub trait Repository: Send + Sync {
    /// List every tag in the repository in a single call
    fn list_tags(&self) -> Result<Vec<TagRef>>;

    /// Fetch all branches and tags from a remote
    fn fetch(&self, remote: &str) -> Result<()>;

    /// Get the OID of a local branch's HEAD
    fn branch_head(&self, branch: &str) -> Result<Oid>;

    /// Get the OID of a remote-tracking branch, `None` if the remote lacks it
    fn remote_branch_head(&self, remote: &str, branch: &str) -> Result<Option<Oid>>;

    /// Full message of a commit
    fn commit_message(&self, oid: Oid) -> Result<String>;

    /// Commits reachable from `to` but not from `from`, oldest first
    fn commits_between(&self, from: Option<Oid>, to: Oid) -> Result<Vec<CommitInfo>>;

    /// Whether `ancestor` is reachable from `descendant` (or equal to it)
    fn is_ancestor(&self, ancestor: Oid, descendant: Oid) -> Result<bool>;

    /// Content of a file at a commit, `None` if the file does not exist there
    fn read_file(&self, commit: Oid, path: &str) -> Result<Option<String>>;

    /// Create a commit on top of `parent` that writes the given files
    ///
    /// Does not move any branch.
    fn commit_files(
        &self,
        parent: Oid,
        changes: &[FileChange],
        message: &str,
        author: &Author,
    ) -> Result<Oid>;

    /// Bring `source` into `target` and return the candidate head
    ///
    /// `message` is used for merge commits; replayed commits keep their own.
    fn integrate(
        &self,
        source: Oid,
        target: Oid,
        mode: IntegrationMode,
        policy: &ConflictPolicy,
        message: &str,
        author: &Author,
    ) -> Result<IntegrationOutcome>;

    /// Point a local branch at `oid`, creating it if needed
    fn update_branch(&self, branch: &str, oid: Oid) -> Result<()>;

    /// Create an annotated tag; `force` replaces an existing tag of the same name
    fn create_tag(
        &self,
        name: &str,
        target: Oid,
        message: &str,
        author: &Author,
        force: bool,
    ) -> Result<()>;

    /// Delete a local tag
    fn delete_tag(&self, name: &str) -> Result<()>;

    /// Push a local branch, succeeding only if the remote ref still equals `expected`
    ///
    /// `expected = None` means the branch must not exist on the remote yet.
    fn push_branch(&self, remote: &str, branch: &str, expected: Option<Oid>)
        -> Result<PushOutcome>;

    /// Push tags to a remote
    fn push_tags(&self, remote: &str, tags: &[&str]) -> Result<()>;
}
