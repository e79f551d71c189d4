use crate::classifier::ReleaseSignal;
use crate::domain::{BranchMap, BranchRole, TagFormat, VersionValue};
use crate::history::TagSnapshot;

/// Everything a strategy needs to decide one resolution
#[derive(Debug, Clone)]
pub struct VersionUpgradeContext {
    /// Latest tag of the target role
    pub current: Option<VersionValue>,
    pub target: BranchRole,
    /// Branch the change comes from, as given by the trigger
    pub source_branch: String,
    /// Role of the source branch, `None` for branches outside the hierarchy
    pub source_role: Option<BranchRole>,
    pub signal: ReleaseSignal,
    pub format: TagFormat,
}

impl VersionUpgradeContext {
    pub fn build(
        target: BranchRole,
        source_branch: &str,
        branches: &BranchMap,
        signal: &ReleaseSignal,
        snapshot: &TagSnapshot,
        format: &TagFormat,
    ) -> Self {
        VersionUpgradeContext {
            current: snapshot.latest(target).map(|t| t.version.clone()),
            target,
            source_branch: source_branch.to_string(),
            source_role: branches.role_of(source_branch),
            signal: signal.clone(),
            format: format.clone(),
        }
    }

    /// Pre-release identifier of the target role
    pub fn identifier(&self) -> Option<&str> {
        self.format.identifier_for(self.target)
    }
}
