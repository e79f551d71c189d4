//! Downstream branch synchronization
//!
//! After a release lands on a tier, [BranchSyncCoordinator] carries it into
//! the tiers below. Every edge climbs the same ladder and stops at the first
//! tier that produces an acceptable candidate:
//!
//! 1. Direct integration, any conflict fails
//! 2. Conflicts on the metadata file take the source side, accepted only if
//!    the result carries the reconciled version
//! 3. Conflicts on the metadata file take the target side with the
//!    reconciled version patched in
//! 4. Escalation: a tracking issue is opened and the edge is left alone
//!
//! An edge with an open tracking issue is not attempted again until the issue
//! is closed.

pub mod edge;
pub mod push;

pub use edge::PropagationEdge;
pub use push::{Attempt, PushRetrier, RecordingSleeper, RetryPolicy, Sleeper, ThreadSleeper};

use crate::boundary::BoundaryWarning;
use crate::config::Config;
use crate::domain::{BranchRole, VersionValue};
use crate::error::{ReleaseError, Result};
use crate::git::{
    Author, ConflictPolicy, IntegrationMode, IntegrationOutcome, PushOutcome, Repository,
};
use crate::history::TagSnapshot;
use crate::host::{HostClient, TrackingIssue};
use crate::metadata;
use crate::resolver;
use chrono::Utc;
use git2::Oid;
use std::fmt;
use tracing::{debug, info, warn};

/// Ladder tier that settled an edge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionTier {
    Direct,
    PreferSource,
    PatchMetadata,
    Escalated,
}

impl fmt::Display for ResolutionTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResolutionTier::Direct => "direct",
            ResolutionTier::PreferSource => "prefer-source",
            ResolutionTier::PatchMetadata => "patch-metadata",
            ResolutionTier::Escalated => "escalated",
        };
        f.write_str(name)
    }
}

/// Outcome of one propagation edge
#[derive(Debug, Clone, PartialEq)]
pub struct BranchSyncResult {
    pub edge: PropagationEdge,
    pub success: bool,
    /// Reconciled version carried by the target after integration
    pub resulting_version: Option<VersionValue>,
    pub error: Option<String>,
    pub unresolved_conflict: bool,
    /// `None` when the target already contained the source
    pub tier: Option<ResolutionTier>,
    pub warnings: Vec<BoundaryWarning>,
}

impl BranchSyncResult {
    fn up_to_date(edge: PropagationEdge) -> Self {
        BranchSyncResult {
            edge,
            success: true,
            resulting_version: None,
            error: None,
            unresolved_conflict: false,
            tier: None,
            warnings: Vec::new(),
        }
    }

    fn accepted(edge: PropagationEdge, version: Option<VersionValue>, tier: ResolutionTier) -> Self {
        BranchSyncResult {
            edge,
            success: true,
            resulting_version: version,
            error: None,
            unresolved_conflict: false,
            tier: Some(tier),
            warnings: Vec::new(),
        }
    }

    fn unresolved(edge: PropagationEdge, error: ReleaseError) -> Self {
        BranchSyncResult {
            edge,
            success: false,
            resulting_version: None,
            error: Some(error.to_string()),
            unresolved_conflict: true,
            tier: Some(ResolutionTier::Escalated),
            warnings: Vec::new(),
        }
    }

    fn with_warnings(mut self, warnings: impl IntoIterator<Item = BoundaryWarning>) -> Self {
        self.warnings.extend(warnings);
        self
    }

    fn failed(edge: PropagationEdge, error: ReleaseError) -> Self {
        BranchSyncResult {
            edge,
            success: false,
            resulting_version: None,
            error: Some(error.to_string()),
            unresolved_conflict: false,
            tier: None,
            warnings: Vec::new(),
        }
    }
}

enum Ladder {
    UpToDate,
    Accepted { head: Oid, tier: ResolutionTier },
    Conflicted { paths: Vec<String> },
}

enum EdgeOutcome {
    UpToDate,
    Accepted(ResolutionTier),
    Conflicted(Vec<String>),
}

/// Propagates releases downstream and escalates what it cannot reconcile
pub struct BranchSyncCoordinator<'a, R: Repository + ?Sized, H: HostClient + ?Sized> {
    repo: &'a R,
    host: &'a H,
    config: &'a Config,
    retrier: PushRetrier,
}

impl<'a, R: Repository + ?Sized, H: HostClient + ?Sized> BranchSyncCoordinator<'a, R, H> {
    pub fn new(repo: &'a R, host: &'a H, config: &'a Config) -> Self {
        BranchSyncCoordinator {
            repo,
            host,
            config,
            retrier: PushRetrier::new(RetryPolicy::from_config(&config.sync)),
        }
    }

    pub fn with_retrier(mut self, retrier: PushRetrier) -> Self {
        self.retrier = retrier;
        self
    }

    /// Propagate a change on `role` through every tier below it
    ///
    /// Edges run in order and a failed edge does not stop the next one.
    pub fn propagate_from(&self, role: BranchRole, snapshot: &TagSnapshot) -> Vec<BranchSyncResult> {
        PropagationEdge::downstream_of(role)
            .into_iter()
            .map(|edge| self.sync_edge(edge, snapshot))
            .collect()
    }

    /// Run the ladder for one edge
    pub fn sync_edge(&self, edge: PropagationEdge, snapshot: &TagSnapshot) -> BranchSyncResult {
        match self.try_sync_edge(edge, snapshot) {
            Ok(result) => result,
            Err(e) => {
                warn!(%edge, error = %e, "sync failed");
                BranchSyncResult::failed(edge, e)
            }
        }
    }

    fn author(&self) -> Author {
        Author::new(&self.config.author.name, &self.config.author.email)
    }

    fn try_sync_edge(&self, edge: PropagationEdge, snapshot: &TagSnapshot) -> Result<BranchSyncResult> {
        let branches = self.config.branch_map();
        let source_branch = branches.name_of(edge.source).to_string();
        let target_branch = branches.name_of(edge.target).to_string();
        let remote = &self.config.sync.remote;
        let conflict = || ReleaseError::UnresolvedConflict {
            source_branch: source_branch.clone(),
            target_branch: target_branch.clone(),
        };

        let title = TrackingIssue::title_for(&source_branch, &target_branch);
        if let Some(id) = self.host.find_open_issue(&title)? {
            warn!(%edge, issue = id, "edge is escalated, not retrying");
            self.host.comment_on_issue(
                id,
                &format!(
                    "Another release reached `{}` at {} while this conflict is open; `{}` was not updated.",
                    source_branch,
                    Utc::now().to_rfc3339(),
                    target_branch
                ),
            )?;
            let pending = BoundaryWarning::EscalationPending {
                source_branch: source_branch.clone(),
                target_branch: target_branch.clone(),
                issue: id,
            };
            return Ok(BranchSyncResult::unresolved(edge, conflict()).with_warnings([pending]));
        }

        let mut reconciled = None;
        let mut tie_break = None;
        let outcome = self.retrier.run(&target_branch, |attempt| {
            self.repo.fetch(remote)?;
            let source = self.remote_head(&source_branch)?;
            let target = self.remote_head(&target_branch)?;
            debug!(%edge, attempt, %source, %target, "integrating");

            let (version, tie) = self.edge_version(edge, source, target, snapshot)?;
            reconciled = version.clone();
            tie_break = tie;

            match self.climb(edge, source, target, version.as_ref())? {
                Ladder::UpToDate => Ok(Attempt::Done(EdgeOutcome::UpToDate)),
                Ladder::Conflicted { paths } => Ok(Attempt::Done(EdgeOutcome::Conflicted(paths))),
                Ladder::Accepted { head, tier } => {
                    let head = self.mark(edge, head)?;
                    self.repo.update_branch(&target_branch, head)?;
                    match self.repo.push_branch(remote, &target_branch, Some(target))? {
                        PushOutcome::Pushed => Ok(Attempt::Done(EdgeOutcome::Accepted(tier))),
                        PushOutcome::Rejected { reason } => Ok(Attempt::Rejected(reason)),
                    }
                }
            }
        })?;

        match outcome {
            EdgeOutcome::UpToDate => {
                debug!(%edge, "target already contains source");
                Ok(BranchSyncResult::up_to_date(edge))
            }
            EdgeOutcome::Accepted(tier) => {
                info!(%edge, %tier, "synchronized");
                Ok(BranchSyncResult::accepted(edge, reconciled, tier).with_warnings(tie_break))
            }
            EdgeOutcome::Conflicted(paths) => {
                let attempted = reconciled
                    .as_ref()
                    .map(|v| v.to_string())
                    .unwrap_or_else(|| "unknown".to_string());
                let issue = TrackingIssue::for_edge(
                    &source_branch,
                    &target_branch,
                    &attempted,
                    &paths,
                    Utc::now(),
                    &self.config.escalation.labels,
                );
                let id = self.host.create_issue(&issue)?;
                warn!(%edge, issue = id, ?paths, "escalated unresolved conflict");
                Ok(BranchSyncResult::unresolved(edge, conflict()).with_warnings(tie_break))
            }
        }
    }

    /// Replayed commits keep their own messages; a rebased head without the
    /// automation marker gets an empty marker commit on top so the push does
    /// not trigger another release
    fn mark(&self, edge: PropagationEdge, head: Oid) -> Result<Oid> {
        let marker = self.config.automation.marker.as_str();
        if edge.mode != IntegrationMode::Rebase || self.repo.commit_message(head)?.contains(marker) {
            return Ok(head);
        }

        let branches = self.config.branch_map();
        let message = format!(
            "chore(sync): rebase {} onto {} {}",
            branches.name_of(edge.target),
            branches.name_of(edge.source),
            marker
        );
        self.repo.commit_files(head, &[], &message, &self.author())
    }

    fn remote_head(&self, branch: &str) -> Result<Oid> {
        self.repo
            .remote_branch_head(&self.config.sync.remote, branch)?
            .ok_or_else(|| {
                ReleaseError::remote(format!(
                    "Branch '{}' does not exist on remote '{}'",
                    branch, self.config.sync.remote
                ))
            })
    }

    /// Version of a side: its metadata file, else the latest tag of its role
    fn side_version(&self, role: BranchRole, head: Oid, snapshot: &TagSnapshot) -> Result<Option<VersionValue>> {
        let path = &self.config.metadata.path;
        let from_file = self
            .repo
            .read_file(head, path)?
            .and_then(|content| metadata::read_version(path, &content).ok())
            .and_then(|raw| VersionValue::parse(&raw).ok());

        Ok(from_file.or_else(|| snapshot.latest(role).map(|t| t.version.clone())))
    }

    fn edge_version(
        &self,
        edge: PropagationEdge,
        source: Oid,
        target: Oid,
        snapshot: &TagSnapshot,
    ) -> Result<(Option<VersionValue>, Option<BoundaryWarning>)> {
        let source_version = self.side_version(edge.source, source, snapshot)?;
        let target_version = self.side_version(edge.target, target, snapshot)?;

        Ok(match (source_version, target_version) {
            (Some(s), Some(t)) => {
                let tie = (s.is_prerelease()
                    && t.is_prerelease()
                    && s.base_version() == t.base_version()
                    && s != t)
                    .then(|| BoundaryWarning::SameBaseTieBreak {
                        version: s.to_string(),
                        kept: t.to_string(),
                    });
                (Some(resolver::reconcile(&s, &t)), tie)
            }
            (Some(v), None) | (None, Some(v)) => (Some(v), None),
            (None, None) => (None, None),
        })
    }

    fn climb(
        &self,
        edge: PropagationEdge,
        source: Oid,
        target: Oid,
        version: Option<&VersionValue>,
    ) -> Result<Ladder> {
        let branches = self.config.branch_map();
        let message = format!(
            "chore(sync): merge {} into {} {}",
            branches.name_of(edge.source),
            branches.name_of(edge.target),
            self.config.automation.marker
        );
        let author = self.author();
        let integrate =
            |policy: &ConflictPolicy| self.repo.integrate(source, target, edge.mode, policy, &message, &author);

        let paths = match integrate(&ConflictPolicy::Abort)? {
            IntegrationOutcome::UpToDate => return Ok(Ladder::UpToDate),
            IntegrationOutcome::Integrated { head } => {
                return Ok(Ladder::Accepted {
                    head,
                    tier: ResolutionTier::Direct,
                })
            }
            IntegrationOutcome::Conflicted { paths } => paths,
        };
        debug!(%edge, ?paths, "direct integration conflicted");

        let version = match version {
            Some(version) => version,
            None => {
                warn!(%edge, "no version known for either side, cannot reconcile metadata");
                return Ok(Ladder::Conflicted { paths });
            }
        };
        let path = self.config.metadata.path.clone();

        let prefer_source = ConflictPolicy::PreferSource { path: path.clone() };
        if let IntegrationOutcome::Integrated { head } = integrate(&prefer_source)? {
            let resulting = self
                .repo
                .read_file(head, &path)?
                .and_then(|content| metadata::read_version(&path, &content).ok())
                .and_then(|raw| VersionValue::parse(&raw).ok());
            if resulting.as_ref() == Some(version) {
                return Ok(Ladder::Accepted {
                    head,
                    tier: ResolutionTier::PreferSource,
                });
            }
            debug!(%edge, expected = %version, "source metadata does not carry the reconciled version");
        }

        let patch = ConflictPolicy::PatchMetadata {
            path,
            version: version.to_string(),
        };
        Ok(match integrate(&patch)? {
            IntegrationOutcome::UpToDate => Ladder::UpToDate,
            IntegrationOutcome::Integrated { head } => Ladder::Accepted {
                head,
                tier: ResolutionTier::PatchMetadata,
            },
            IntegrationOutcome::Conflicted { paths } => Ladder::Conflicted { paths },
        })
    }
}
