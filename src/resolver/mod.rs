//! Version resolution
//!
//! [VersionResolver::resolve] answers two questions for a trigger: whether a
//! bump is warranted, and what the next version must be. Rules are kept in a
//! strategy table keyed by the target role (see [strategy::for_role]); every
//! strategy is a pure function of the context and the tag snapshot.
//!
//! Versions are monotonic per role: a resolution never yields a version at or
//! below a tag the role already has.

pub mod context;
pub mod strategy;

pub use context::VersionUpgradeContext;

use crate::classifier::ReleaseSignal;
use crate::config::Config;
use crate::domain::{BranchMap, BranchRole, TagFormat, VersionValue};
use crate::error::Result;
use crate::history::TagSnapshot;
use tracing::{debug, warn};

/// A decided version bump
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionPlan {
    pub role: BranchRole,
    /// Latest tag of the role before this release
    pub previous: Option<VersionValue>,
    pub next: VersionValue,
}

/// Outcome of a resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Nothing to release; not an error
    NoBump { reason: String },
    Bump(VersionPlan),
}

impl Resolution {
    pub fn next(&self) -> Option<&VersionValue> {
        match self {
            Resolution::NoBump { .. } => None,
            Resolution::Bump(plan) => Some(&plan.next),
        }
    }
}

/// Branch-aware next-version calculator
#[derive(Debug, Clone, Default)]
pub struct VersionResolver {
    branches: BranchMap,
    format: TagFormat,
}

impl VersionResolver {
    pub fn new(branches: BranchMap, format: TagFormat) -> Self {
        VersionResolver { branches, format }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.branch_map(), config.tag_format())
    }

    /// Resolve the next version for `target`
    ///
    /// # Returns
    /// * `Ok(Resolution::NoBump)` - No signal where one is required
    /// * `Ok(Resolution::Bump)` - The next version of the target role
    /// * `Err(ReleaseError::Policy)` - The request breaks a hierarchy rule
    pub fn resolve(
        &self,
        target: BranchRole,
        source_branch: &str,
        signal: &ReleaseSignal,
        snapshot: &TagSnapshot,
    ) -> Result<Resolution> {
        let ctx = VersionUpgradeContext::build(
            target,
            source_branch,
            &self.branches,
            signal,
            snapshot,
            &self.format,
        );
        debug!(
            %target,
            source_branch,
            source_role = ?ctx.source_role,
            current = ?ctx.current.as_ref().map(|v| v.to_string()),
            "resolving"
        );

        let mut resolution = strategy::for_role(target)(&ctx, snapshot)?;

        if let Resolution::Bump(plan) = &mut resolution {
            if let Some(highest) = snapshot.highest(target) {
                if plan.next <= highest.version && highest.version.is_prerelease() {
                    warn!(
                        computed = %plan.next,
                        highest = %highest.version,
                        "computed version does not advance the role, continuing its highest line"
                    );
                    plan.next = highest.version.next_prerelease()?;
                }
            }
        }

        Ok(resolution)
    }
}

/// Version a propagation edge dictates for the target's metadata
///
/// The higher base wins. On equal bases a released source beats a pre-release
/// target; when both are pre-releases the target keeps its own line.
pub fn reconcile(source: &VersionValue, target: &VersionValue) -> VersionValue {
    let source_base = source.base_version();
    let target_base = target.base_version();

    if source_base != target_base {
        return if source_base > target_base {
            source.clone()
        } else {
            target.clone()
        };
    }

    match (source.is_prerelease(), target.is_prerelease()) {
        (false, _) => source.clone(),
        (true, false) => target.clone(),
        (true, true) => {
            warn!(
                %source,
                %target,
                "both sides are pre-releases of the same base, keeping the target line"
            );
            target.clone()
        }
    }
}
