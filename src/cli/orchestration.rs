//! Release workflow orchestration
//!
//! This module contains the release workflow the binary drives. It is kept
//! apart from argument parsing so the workflow can be called programmatically
//! without depending on clap, and tested against the mock repository and
//! in-memory host.

use chrono::Utc;
use git2::Oid;
use tracing::{debug, info, warn};

use crate::boundary::BoundaryWarning;
use crate::changelog;
use crate::classifier::{ReleaseClassifier, ReleaseSignal};
use crate::config::Config;
use crate::domain::{BranchRole, VersionValue};
use crate::error::{ReleaseError, Result};
use crate::git::{Author, ConflictPolicy, FileChange, IntegrationMode, IntegrationOutcome, PushOutcome, Repository};
use crate::history::{TagHistoryReader, TagSnapshot};
use crate::host::HostClient;
use crate::metadata;
use crate::publish::RegistryPublisher;
use crate::resolver::{Resolution, VersionPlan, VersionResolver};
use crate::sync::{Attempt, BranchSyncCoordinator, BranchSyncResult, PushRetrier, RetryPolicy};
use crate::ui;

/// A release trigger
///
/// Mirrors the CLI arguments in a form the workflow can use without clap.
#[derive(Debug, Clone, PartialEq)]
pub struct ReleaseRequest {
    /// Branch receiving the release
    pub target_branch: String,

    /// Branch the change came from
    pub source_branch: String,

    /// Classification labels attached to the change
    pub labels: Vec<String>,

    /// Preview mode - resolve and report, write nothing to the repository
    pub preview: bool,
}

/// What a run did, reported as process outputs
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReleaseOutcome {
    /// Released (or previewed) version
    pub version: Option<VersionValue>,

    /// Tag created (or that would be created)
    pub tag: Option<String>,

    pub preview: bool,

    /// `None` when publishing did not apply
    pub published: Option<bool>,

    pub sync: Vec<BranchSyncResult>,

    /// Why nothing was released, when nothing was
    pub skipped: Option<String>,

    /// Resolution error reported instead of failing (preview only)
    pub error: Option<String>,

    pub warnings: Vec<BoundaryWarning>,
}

type RetrierFactory<'a> = Box<dyn Fn() -> PushRetrier + 'a>;

/// Runs one release trigger end to end
///
/// 1. Fetch and skip runs triggered by the automation's own commits
/// 2. Read the tag history once
/// 3. Classify the trigger's labels (or commits)
/// 4. Resolve the next version
/// 5. Commit metadata and changelog, tag, push with retry
/// 6. Publish
/// 7. Propagate downstream
pub struct ReleaseOrchestrator<'a, R: Repository + ?Sized, H: HostClient + ?Sized> {
    repo: &'a R,
    host: &'a H,
    config: &'a Config,
    publisher: Option<&'a dyn RegistryPublisher>,
    retriers: RetrierFactory<'a>,
}

impl<'a, R: Repository + ?Sized, H: HostClient + ?Sized> ReleaseOrchestrator<'a, R, H> {
    pub fn new(repo: &'a R, host: &'a H, config: &'a Config) -> Self {
        let policy = RetryPolicy::from_config(&config.sync);
        ReleaseOrchestrator {
            repo,
            host,
            config,
            publisher: None,
            retriers: Box::new(move || PushRetrier::new(policy.clone())),
        }
    }

    pub fn with_publisher(mut self, publisher: Option<&'a dyn RegistryPublisher>) -> Self {
        self.publisher = publisher;
        self
    }

    /// Supply the retrier used for every push (release and sync)
    pub fn with_retriers(mut self, factory: impl Fn() -> PushRetrier + 'a) -> Self {
        self.retriers = Box::new(factory);
        self
    }

    fn author(&self) -> Author {
        Author::new(&self.config.author.name, &self.config.author.email)
    }

    fn remote(&self) -> &str {
        &self.config.sync.remote
    }

    /// Remote head of a branch, falling back to the local branch
    fn head_of(&self, branch: &str) -> Result<Oid> {
        match self.repo.remote_branch_head(self.remote(), branch)? {
            Some(oid) => Ok(oid),
            None => self.repo.branch_head(branch),
        }
    }

    pub fn run(&self, request: &ReleaseRequest) -> Result<ReleaseOutcome> {
        let branches = self.config.branch_map();
        let target = branches.role_of(&request.target_branch).ok_or_else(|| {
            ReleaseError::config(format!(
                "'{}' is not one of the release branches ({}, {}, {})",
                request.target_branch,
                branches.name_of(BranchRole::Alpha),
                branches.name_of(BranchRole::Beta),
                branches.name_of(BranchRole::Main)
            ))
        })?;
        let target_branch = branches.name_of(target).to_string();

        let mut outcome = ReleaseOutcome {
            preview: request.preview,
            ..Default::default()
        };

        self.repo.fetch(self.remote())?;
        let head = self.head_of(&target_branch)?;

        let head_message = self.repo.commit_message(head)?;
        if head_message.contains(&self.config.automation.marker) {
            let warning = BoundaryWarning::SelfTriggered {
                branch: target_branch,
                current_commit_hash: head.to_string(),
            };
            info!(%warning, "skipping");
            outcome.skipped = Some(warning.to_string());
            outcome.warnings.push(warning);
            return Ok(outcome);
        }

        let format = self.config.tag_format();
        let snapshot = TagHistoryReader::new(self.repo, &format).snapshot()?;
        outcome.warnings.extend(snapshot.warnings().iter().cloned());

        let signal = self.classify(request, target, head, &snapshot, &mut outcome)?;

        let resolver = VersionResolver::from_config(self.config);
        let resolution = match resolver.resolve(target, &request.source_branch, &signal, &snapshot) {
            Ok(resolution) => resolution,
            Err(e) if request.preview => {
                warn!(error = %e, "resolution failed in preview");
                self.host
                    .upsert_comment(ui::PREVIEW_MARKER, &ui::render_preview_error(&e))?;
                outcome.error = Some(e.to_string());
                return Ok(outcome);
            }
            Err(e) => return Err(e),
        };

        let plan = match resolution {
            Resolution::NoBump { reason } => {
                info!(%reason, "no release");
                if request.preview {
                    self.host
                        .upsert_comment(ui::PREVIEW_MARKER, &ui::render_preview_skip(&reason))?;
                }
                outcome.skipped = Some(reason);
                return Ok(outcome);
            }
            Resolution::Bump(plan) => plan,
        };

        let tag = format.format(&plan.next);
        outcome.version = Some(plan.next.clone());
        outcome.tag = Some(tag.clone());

        if request.preview {
            self.host.upsert_comment(
                ui::PREVIEW_MARKER,
                &ui::render_preview_plan(&target_branch, &plan, &tag),
            )?;
            return Ok(outcome);
        }

        self.release(&target_branch, head, &plan, &tag, &snapshot)?;
        outcome.published = self.publish(&plan);

        let refreshed = TagHistoryReader::new(self.repo, &format).snapshot()?;
        outcome.sync = BranchSyncCoordinator::new(self.repo, self.host, self.config)
            .with_retrier((self.retriers)())
            .propagate_from(target, &refreshed);
        outcome
            .warnings
            .extend(outcome.sync.iter().flat_map(|r| r.warnings.iter().cloned()));

        Ok(outcome)
    }

    fn classify(
        &self,
        request: &ReleaseRequest,
        target: BranchRole,
        head: Oid,
        snapshot: &TagSnapshot,
        outcome: &mut ReleaseOutcome,
    ) -> Result<ReleaseSignal> {
        let classifier = ReleaseClassifier::new(self.config.labels.clone());
        let mut signal = classifier.classify(&request.labels);

        if let (Some(winner), false) = (signal.magnitude, signal.ignored.is_empty()) {
            outcome.warnings.push(BoundaryWarning::IgnoredSignals {
                winner,
                ignored: signal.ignored.clone(),
            });
        }

        if !signal.is_present() && self.config.signals.scan_commits {
            let since = snapshot.latest(target).map(|t| t.target);
            let messages: Vec<String> = self
                .repo
                .commits_between(since, head)?
                .into_iter()
                .map(|c| c.message)
                .collect();
            signal = classifier.classify_commits(&messages);
            debug!(commits = messages.len(), magnitude = ?signal.magnitude, "scanned commits");
        }

        Ok(signal)
    }

    /// Files the release commit writes
    fn release_changes(&self, base: Oid, plan: &VersionPlan, snapshot: &TagSnapshot) -> Result<Vec<FileChange>> {
        let version = plan.next.to_string();
        let mut changes = Vec::new();

        let path = &self.config.metadata.path;
        match self.repo.read_file(base, path)? {
            Some(content) => changes.push(FileChange::new(
                path.as_str(),
                metadata::write_version(path, &content, &version)?,
            )),
            None => warn!(path = %path, "metadata file not found, releasing without it"),
        }

        if self.config.changelog.enabled {
            let since = snapshot.latest(plan.role).map(|t| t.target);
            let entries: Vec<String> = self
                .repo
                .commits_between(since, base)?
                .into_iter()
                .filter(|c| !c.message.contains(&self.config.automation.marker))
                .filter_map(|c| c.message.lines().next().map(str::to_string))
                .filter(|subject| !subject.trim().is_empty())
                .collect();
            let path = &self.config.changelog.path;
            let existing = self.repo.read_file(base, path)?.unwrap_or_default();
            changes.push(FileChange::new(
                path.as_str(),
                changelog::prepend_entry(&existing, &version, Utc::now().date_naive(), &entries),
            ));
        }

        Ok(changes)
    }

    /// Commit, tag and push one release
    ///
    /// The commit and tag are one unit: a tag failure after the commit is
    /// reported as `TagAfterCommit`. When the branch push fails the local tag
    /// is deleted and the local branch reset, so the next run resolves the
    /// same version again.
    fn release(
        &self,
        target_branch: &str,
        head: Oid,
        plan: &VersionPlan,
        tag: &str,
        snapshot: &TagSnapshot,
    ) -> Result<Oid> {
        let author = self.author();
        let changes = self.release_changes(head, plan, snapshot)?;
        let message = format!("chore(release): {} {}", tag, self.config.automation.marker);
        let tag_message = format!("Release {}", tag);

        let commit = self.repo.commit_files(head, &changes, &message, &author)?;
        info!(%commit, tag, "created release commit");

        if let Err(e) = self.repo.create_tag(tag, commit, &tag_message, &author, false) {
            return Err(ReleaseError::TagAfterCommit {
                commit: commit.to_string(),
                tag: tag.to_string(),
                reason: e.to_string(),
            });
        }

        let previous_local = self.repo.branch_head(target_branch).ok();
        let pushed = match self.push_release(target_branch, head, commit, plan, &message, &author) {
            Ok(pushed) => pushed,
            Err(e) => {
                self.roll_back(tag, target_branch, previous_local);
                return Err(e);
            }
        };

        if pushed != commit {
            debug!(from = %commit, to = %pushed, "release commit was replayed, moving tag");
            self.repo
                .create_tag(tag, pushed, &tag_message, &author, true)
                .map_err(|e| ReleaseError::TagAfterCommit {
                    commit: pushed.to_string(),
                    tag: tag.to_string(),
                    reason: e.to_string(),
                })?;
        }

        self.repo.push_tags(self.remote(), &[tag])?;
        info!(tag, branch = target_branch, "released");
        Ok(pushed)
    }

    /// Push the release commit, replaying it onto the remote head when the lease is stale
    fn push_release(
        &self,
        target_branch: &str,
        head: Oid,
        commit: Oid,
        plan: &VersionPlan,
        message: &str,
        author: &Author,
    ) -> Result<Oid> {
        let replay_policy = ConflictPolicy::PatchMetadata {
            path: self.config.metadata.path.clone(),
            version: plan.next.to_string(),
        };
        let mut candidate = commit;
        let mut expected = head;

        let retrier = (self.retriers)();
        retrier.run(target_branch, |attempt| {
            if attempt > 1 {
                self.repo.fetch(self.remote())?;
                let fresh = self.head_of(target_branch)?;
                if fresh != expected {
                    candidate = match self.repo.integrate(
                        fresh,
                        candidate,
                        IntegrationMode::Rebase,
                        &replay_policy,
                        message,
                        author,
                    )? {
                        IntegrationOutcome::Integrated { head } => head,
                        IntegrationOutcome::UpToDate => fresh,
                        IntegrationOutcome::Conflicted { paths } => {
                            return Err(ReleaseError::remote(format!(
                                "release commit cannot be replayed onto {}: conflicts in {}",
                                target_branch,
                                paths.join(", ")
                            )))
                        }
                    };
                    expected = fresh;
                }
            }

            self.repo.update_branch(target_branch, candidate)?;
            match self.repo.push_branch(self.remote(), target_branch, Some(expected))? {
                PushOutcome::Pushed => Ok(Attempt::Done(candidate)),
                PushOutcome::Rejected { reason } => Ok(Attempt::Rejected(reason)),
            }
        })
    }

    /// Undo the local effects of a release whose push failed
    fn roll_back(&self, tag: &str, branch: &str, previous: Option<Oid>) {
        if let Err(e) = self.repo.delete_tag(tag) {
            warn!(tag, error = %e, "cannot delete local release tag");
        }
        if let Some(oid) = previous {
            if let Err(e) = self.repo.update_branch(branch, oid) {
                warn!(branch, error = %e, "cannot reset local branch");
            }
        }
        info!(tag, branch, "rolled back local release after failed push");
    }

    fn publish(&self, plan: &VersionPlan) -> Option<bool> {
        let publisher = self.publisher?;
        let dist_tag = self.config.publish.dist_tag(plan.role);
        match publisher.publish(&plan.next, dist_tag) {
            Ok(()) => Some(true),
            Err(e) => {
                warn!(error = %e, version = %plan.next, "publish failed");
                Some(false)
            }
        }
    }
}
