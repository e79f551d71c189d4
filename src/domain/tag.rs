use crate::domain::{BranchRole, VersionValue};
use crate::error::{ReleaseError, Result};
use git2::Oid;

/// A classified release tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagRecord {
    pub name: String,
    pub version: VersionValue,
    pub role: BranchRole,
    /// Commit the tag points at
    pub target: Oid,
    /// Creation time in seconds since the epoch
    pub created: i64,
    /// Position in creation order across all classified tags (0 = oldest)
    pub creation_order: usize,
}

/// Tag naming scheme: `<prefix><major>.<minor>.<patch>[-<identifier>.<counter>]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagFormat {
    pub prefix: String,
    pub alpha_identifier: String,
    pub beta_identifier: String,
}

impl TagFormat {
    /// Create a new tag format
    pub fn new(
        prefix: impl Into<String>,
        alpha_identifier: impl Into<String>,
        beta_identifier: impl Into<String>,
    ) -> Self {
        TagFormat {
            prefix: prefix.into(),
            alpha_identifier: alpha_identifier.into(),
            beta_identifier: beta_identifier.into(),
        }
    }

    /// Pre-release identifier carried by a role's tags; Main tags carry none
    pub fn identifier_for(&self, role: BranchRole) -> Option<&str> {
        match role {
            BranchRole::Alpha => Some(&self.alpha_identifier),
            BranchRole::Beta => Some(&self.beta_identifier),
            BranchRole::Main => None,
        }
    }

    /// Format a version as a tag name
    /// Example: prefix="v", version="1.2.3-beta.0" -> "v1.2.3-beta.0"
    pub fn format(&self, version: &VersionValue) -> String {
        version.with_prefix(&self.prefix)
    }

    /// Role a version belongs to, judged by its pre-release identifier
    pub fn role_of(&self, version: &VersionValue) -> Option<BranchRole> {
        match version.identifier() {
            None => Some(BranchRole::Main),
            Some(id) if id == self.alpha_identifier => Some(BranchRole::Alpha),
            Some(id) if id == self.beta_identifier => Some(BranchRole::Beta),
            Some(_) => None,
        }
    }

    /// Parse and classify a tag name
    ///
    /// # Returns
    /// * `Ok((version, role))` - Tag belongs to one of the tiers
    /// * `Err` - Missing prefix, unparsable version or unknown identifier
    pub fn classify(&self, tag: &str) -> Result<(VersionValue, BranchRole)> {
        let version = VersionValue::parse_with_prefix(tag, &self.prefix)?;
        let role = self.role_of(&version).ok_or_else(|| {
            ReleaseError::tag(format!(
                "Tag '{}' has an unknown pre-release identifier '{}'",
                tag,
                version.identifier().unwrap_or_default()
            ))
        })?;
        Ok((version, role))
    }
}

impl Default for TagFormat {
    fn default() -> Self {
        TagFormat::new("v", "alpha", "beta")
    }
}
