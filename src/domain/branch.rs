use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the three release tiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BranchRole {
    /// Pre-release tier
    Alpha,
    /// Staging pre-release tier
    Beta,
    /// Stable tier
    Main,
}

impl BranchRole {
    pub const ALL: [BranchRole; 3] = [BranchRole::Alpha, BranchRole::Beta, BranchRole::Main];

    /// The role name, independent of the configured branch name
    pub fn name(&self) -> &'static str {
        match self {
            BranchRole::Alpha => "alpha",
            BranchRole::Beta => "beta",
            BranchRole::Main => "main",
        }
    }

    /// The tier directly downstream of this one, if any
    pub fn downstream(&self) -> Option<BranchRole> {
        match self {
            BranchRole::Main => Some(BranchRole::Beta),
            BranchRole::Beta => Some(BranchRole::Alpha),
            BranchRole::Alpha => None,
        }
    }
}

impl fmt::Display for BranchRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BranchRole::Alpha => write!(f, "Alpha"),
            BranchRole::Beta => write!(f, "Beta"),
            BranchRole::Main => write!(f, "Main"),
        }
    }
}

/// Mapping of configured branch names onto tier roles
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchMap {
    alpha: String,
    beta: String,
    main: String,
}

impl BranchMap {
    /// Create a branch map
    pub fn new(
        alpha: impl Into<String>,
        beta: impl Into<String>,
        main: impl Into<String>,
    ) -> Self {
        BranchMap {
            alpha: alpha.into(),
            beta: beta.into(),
            main: main.into(),
        }
    }

    /// Configured branch name for a role
    pub fn name_of(&self, role: BranchRole) -> &str {
        match role {
            BranchRole::Alpha => &self.alpha,
            BranchRole::Beta => &self.beta,
            BranchRole::Main => &self.main,
        }
    }

    /// Role of a branch name; `None` for feature and fix branches
    ///
    /// Accepts `refs/heads/<name>` as well as the bare name.
    pub fn role_of(&self, branch: &str) -> Option<BranchRole> {
        let name = branch.strip_prefix("refs/heads/").unwrap_or(branch);
        BranchRole::ALL
            .into_iter()
            .find(|role| self.name_of(*role) == name)
    }
}

impl Default for BranchMap {
    fn default() -> Self {
        BranchMap::new("alpha", "beta", "main")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_branch_map() {
        let map = BranchMap::default();
        assert_eq!(map.role_of("main"), Some(BranchRole::Main));
        assert_eq!(map.role_of("beta"), Some(BranchRole::Beta));
        assert_eq!(map.role_of("alpha"), Some(BranchRole::Alpha));
    }

    #[test]
    fn test_custom_branch_names() {
        let map = BranchMap::new("develop", "staging", "master");
        assert_eq!(map.role_of("staging"), Some(BranchRole::Beta));
        assert_eq!(map.role_of("main"), None);
        assert_eq!(map.name_of(BranchRole::Main), "master");
    }

    #[test]
    fn test_fix_branch_has_no_role() {
        let map = BranchMap::default();
        assert_eq!(map.role_of("hotfix/x"), None);
    }

    #[test]
    fn test_full_ref_name() {
        let map = BranchMap::default();
        assert_eq!(map.role_of("refs/heads/beta"), Some(BranchRole::Beta));
    }

    #[test]
    fn test_downstream_chain() {
        assert_eq!(BranchRole::Main.downstream(), Some(BranchRole::Beta));
        assert_eq!(BranchRole::Beta.downstream(), Some(BranchRole::Alpha));
        assert_eq!(BranchRole::Alpha.downstream(), None);
    }
}
