use std::fmt;

use crate::domain::BumpMagnitude;

/// Non-fatal conditions met while resolving or propagating a release.
/// These are reported to the user but never fail the run.
#[derive(Debug, Clone, PartialEq)]
pub enum BoundaryWarning {
    /// Tag exists but cannot be parsed as a tier version
    UnparsableTag { tag: String, reason: String },
    /// Lower-priority classification labels that lost to a higher one
    IgnoredSignals {
        winner: BumpMagnitude,
        ignored: Vec<BumpMagnitude>,
    },
    /// The target branch head was written by the automation itself
    SelfTriggered {
        branch: String,
        current_commit_hash: String,
    },
    /// A propagation edge already has an open tracking issue
    EscalationPending {
        source_branch: String,
        target_branch: String,
        issue: u64,
    },
    /// Both sides of an edge are pre-releases of the same base; the target kept its own
    SameBaseTieBreak { version: String, kept: String },
}

impl fmt::Display for BoundaryWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoundaryWarning::UnparsableTag { tag, reason } => {
                write!(f, "Cannot parse tag '{}': {}", tag, reason)
            }
            BoundaryWarning::IgnoredSignals { winner, ignored } => {
                let names: Vec<&str> = ignored.iter().map(|m| m.name()).collect();
                write!(
                    f,
                    "Label '{}' takes priority; ignored: {}",
                    winner,
                    names.join(", ")
                )
            }
            BoundaryWarning::SelfTriggered {
                branch,
                current_commit_hash,
            } => {
                let short_hash = if current_commit_hash.len() > 7 {
                    &current_commit_hash[..7]
                } else {
                    current_commit_hash.as_str()
                };
                write!(
                    f,
                    "Head of '{}' ({}) is an automated release commit, nothing to do",
                    branch, short_hash
                )
            }
            BoundaryWarning::EscalationPending {
                source_branch,
                target_branch,
                issue,
            } => {
                write!(
                    f,
                    "Sync {} -> {} is waiting on tracking issue #{}",
                    source_branch, target_branch, issue
                )
            }
            BoundaryWarning::SameBaseTieBreak { version, kept } => {
                write!(
                    f,
                    "{} and {} share a base; keeping the target's pre-release line",
                    version, kept
                )
            }
        }
    }
}
