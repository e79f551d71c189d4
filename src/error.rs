use thiserror::Error;

use crate::domain::BranchRole;

/// Unified error type for release-ladder operations
#[derive(Error, Debug)]
pub enum ReleaseError {
    #[error("Git operation failed: {0}")]
    Git(#[from] git2::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Version parsing error: {0}")]
    Parse(String),

    #[error("Policy violation: {0}")]
    Policy(#[from] PolicyViolation),

    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Unresolved conflict while propagating '{source_branch}' into '{target_branch}'")]
    UnresolvedConflict {
        source_branch: String,
        target_branch: String,
    },

    #[error("Release commit {commit} was created but tag '{tag}' could not be created: {reason}")]
    TagAfterCommit {
        commit: String,
        tag: String,
        reason: String,
    },

    #[error("Tag error: {0}")]
    Tag(String),

    #[error("Remote operation failed: {0}")]
    Remote(String),

    #[error("Host operation failed: {0}")]
    Host(String),

    #[error("Publish failed: {0}")]
    Publish(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("TOML write error: {0}")]
    TomlSer(#[from] toml::ser::Error),
}

/// Convenience type alias for Results in release-ladder
pub type Result<T> = std::result::Result<T, ReleaseError>;

impl ReleaseError {
    /// Create a configuration error with context
    pub fn config(msg: impl Into<String>) -> Self {
        ReleaseError::Config(msg.into())
    }

    /// Create a version parsing error with context
    pub fn parse(msg: impl Into<String>) -> Self {
        ReleaseError::Parse(msg.into())
    }

    /// Create a backend-unavailable error with context
    pub fn backend(msg: impl Into<String>) -> Self {
        ReleaseError::BackendUnavailable(msg.into())
    }

    /// Create a tag error with context
    pub fn tag(msg: impl Into<String>) -> Self {
        ReleaseError::Tag(msg.into())
    }

    /// Create a remote error with context
    pub fn remote(msg: impl Into<String>) -> Self {
        ReleaseError::Remote(msg.into())
    }

    /// Create a host error with context
    pub fn host(msg: impl Into<String>) -> Self {
        ReleaseError::Host(msg.into())
    }

    /// Create a publish error with context
    pub fn publish(msg: impl Into<String>) -> Self {
        ReleaseError::Publish(msg.into())
    }

    /// Whether this error is a branch-hierarchy rule violation
    pub fn is_policy(&self) -> bool {
        matches!(self, ReleaseError::Policy(_))
    }
}

/// A branch-hierarchy rule that a resolution request broke.
///
/// Each variant renders the rule itself so the message can be shown to users unchanged.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PolicyViolation {
    #[error(
        "no functionality may enter Beta without first completing Alpha: \
         '{}' is not the Alpha branch and Beta has no open version line{}",
        .source_branch,
        .base.as_ref().map(|b| format!(" for {}", b)).unwrap_or_default()
    )]
    BetaRequiresAlpha {
        source_branch: String,
        base: Option<String>,
    },

    #[error("Main only accepts promotions from the Beta branch, got '{source_branch}'")]
    MainRequiresBeta { source_branch: String },

    #[error("nothing to promote into {target}: no {source_role} tag exists yet")]
    NothingToPromote {
        target: BranchRole,
        source_role: BranchRole,
    },

    #[error("{role} has no open version line: {version} has already been released on Main")]
    NoOpenLine { role: BranchRole, version: String },

    #[error("version {version} has already been released on Main")]
    AlreadyReleased { version: String },

    #[error("version {version} cannot be bumped any further: a component is at its maximum")]
    VersionOverflow { version: String },
}
