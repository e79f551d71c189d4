//! Release history as recorded in tags
//!
//! The snapshot is the only persisted state the resolver consults. It is
//! read with a single tag listing and queried in memory afterwards.

use crate::boundary::BoundaryWarning;
use crate::domain::{BranchRole, TagFormat, TagRecord, VersionValue};
use crate::error::{ReleaseError, Result};
use crate::git::{Repository, TagRef};
use git2::Oid;
use tracing::debug;

/// Reads and classifies every tag of a repository
pub struct TagHistoryReader<'a, R: Repository + ?Sized> {
    repo: &'a R,
    format: &'a TagFormat,
}

impl<'a, R: Repository + ?Sized> TagHistoryReader<'a, R> {
    pub fn new(repo: &'a R, format: &'a TagFormat) -> Self {
        TagHistoryReader { repo, format }
    }

    /// List the tags once and build a snapshot
    ///
    /// Any failure of the listing is reported as `BackendUnavailable`.
    pub fn snapshot(&self) -> Result<TagSnapshot> {
        let tags = self.repo.list_tags().map_err(|e| match e {
            ReleaseError::BackendUnavailable(_) => e,
            other => ReleaseError::backend(format!("Cannot read tags: {}", other)),
        })?;
        Ok(TagSnapshot::from_tags(tags, self.format))
    }
}

/// Classified tags in creation order
#[derive(Debug, Clone, Default)]
pub struct TagSnapshot {
    records: Vec<TagRecord>,
    warnings: Vec<BoundaryWarning>,
}

impl TagSnapshot {
    /// Classify raw tags; tags that belong to no tier are skipped
    ///
    /// Creation order sorts by creation time, then by version precedence.
    pub fn from_tags(tags: Vec<TagRef>, format: &TagFormat) -> Self {
        let mut records = Vec::new();
        let mut warnings = Vec::new();

        for tag in tags {
            match format.classify(&tag.name) {
                Ok((version, role)) => records.push(TagRecord {
                    name: tag.name,
                    version,
                    role,
                    target: tag.target,
                    created: tag.created,
                    creation_order: 0,
                }),
                Err(e) => {
                    debug!(tag = %tag.name, reason = %e, "skipping tag");
                    // Tags without our prefix are someone else's, not worth a warning
                    if tag.name.starts_with(&format.prefix) {
                        warnings.push(BoundaryWarning::UnparsableTag {
                            tag: tag.name,
                            reason: e.to_string(),
                        });
                    }
                }
            }
        }

        records.sort_by(|a, b| a.created.cmp(&b.created).then_with(|| a.version.cmp(&b.version)));
        for (index, record) in records.iter_mut().enumerate() {
            record.creation_order = index;
        }

        TagSnapshot { records, warnings }
    }

    /// Build from tag names alone, created in the order given
    pub fn from_names(names: &[&str], format: &TagFormat) -> Self {
        let tags = names
            .iter()
            .enumerate()
            .map(|(index, name)| TagRef {
                name: name.to_string(),
                target: Oid::zero(),
                created: index as i64,
            })
            .collect();
        Self::from_tags(tags, format)
    }

    pub fn records(&self) -> &[TagRecord] {
        &self.records
    }

    /// Tags that looked like ours but could not be classified
    pub fn warnings(&self) -> &[BoundaryWarning] {
        &self.warnings
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn of_role(&self, role: BranchRole) -> impl Iterator<Item = &TagRecord> {
        self.records.iter().filter(move |r| r.role == role)
    }

    /// Most recently created tag of a role
    pub fn latest(&self, role: BranchRole) -> Option<&TagRecord> {
        self.of_role(role).max_by_key(|r| r.creation_order)
    }

    /// Most recently created tag of any role
    pub fn latest_created(&self) -> Option<&TagRecord> {
        self.records.last()
    }

    /// Highest version a role has ever been tagged with
    pub fn highest(&self, role: BranchRole) -> Option<&TagRecord> {
        self.of_role(role).max_by(|a, b| a.version.cmp(&b.version))
    }

    /// Highest tag of a role on one base version
    pub fn highest_on_base(&self, role: BranchRole, base: &VersionValue) -> Option<&TagRecord> {
        self.of_role(role)
            .filter(|r| r.version.base_version() == *base)
            .max_by(|a, b| a.version.cmp(&b.version))
    }

    /// Highest base version across every tag
    pub fn global_highest_base(&self) -> Option<VersionValue> {
        self.records.iter().map(|r| r.version.base_version()).max()
    }

    /// Highest base version across the tags of the given roles
    pub fn highest_base(&self, roles: &[BranchRole]) -> Option<VersionValue> {
        self.records
            .iter()
            .filter(|r| roles.contains(&r.role))
            .map(|r| r.version.base_version())
            .max()
    }

    /// Whether a role has any tag on `base`
    pub fn has_tag(&self, role: BranchRole, base: &VersionValue) -> bool {
        self.highest_on_base(role, base).is_some()
    }

    /// Whether a version line has been promoted past Alpha
    ///
    /// Sealed means a Beta or Main tag exists with a base at or above `base`.
    pub fn is_sealed(&self, base: &VersionValue) -> bool {
        self.records.iter().any(|r| {
            matches!(r.role, BranchRole::Beta | BranchRole::Main)
                && r.version.base_version() >= *base
        })
    }

    /// Whether Main already carries a release at or above `base`
    pub fn is_released(&self, base: &VersionValue) -> bool {
        self.of_role(BranchRole::Main)
            .any(|r| r.version.base_version() >= *base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::MockRepository;

    fn v(s: &str) -> VersionValue {
        VersionValue::parse(s).unwrap()
    }

    fn snapshot(names: &[&str]) -> TagSnapshot {
        TagSnapshot::from_names(names, &TagFormat::default())
    }

    #[test]
    fn test_classifies_roles() {
        let snap = snapshot(&["v1.0.0", "v1.1.0-alpha.0", "v1.1.0-beta.0", "release-2", "v2.0.0-rc.1"]);

        assert_eq!(snap.records().len(), 3);
        assert_eq!(snap.latest(BranchRole::Main).unwrap().name, "v1.0.0");
        assert_eq!(snap.latest(BranchRole::Alpha).unwrap().name, "v1.1.0-alpha.0");
        assert_eq!(snap.latest(BranchRole::Beta).unwrap().name, "v1.1.0-beta.0");
        // unknown identifier warns, foreign prefix does not
        assert_eq!(snap.warnings().len(), 1);
    }

    #[test]
    fn test_creation_order_breaks_ties_by_version() {
        let format = TagFormat::default();
        let tags = vec![
            TagRef {
                name: "v1.1.0-alpha.1".to_string(),
                target: Oid::zero(),
                created: 10,
            },
            TagRef {
                name: "v1.1.0-alpha.0".to_string(),
                target: Oid::zero(),
                created: 10,
            },
        ];
        let snap = TagSnapshot::from_tags(tags, &format);

        assert_eq!(snap.records()[0].name, "v1.1.0-alpha.0");
        assert_eq!(snap.records()[1].creation_order, 1);
        assert_eq!(snap.latest(BranchRole::Alpha).unwrap().name, "v1.1.0-alpha.1");
    }

    #[test]
    fn test_latest_is_by_creation_not_precedence() {
        let snap = snapshot(&["v2.0.0-alpha.0", "v1.1.0-alpha.4"]);
        assert_eq!(snap.latest(BranchRole::Alpha).unwrap().name, "v1.1.0-alpha.4");
        assert_eq!(snap.highest(BranchRole::Alpha).unwrap().name, "v2.0.0-alpha.0");
        assert_eq!(snap.latest_created().unwrap().name, "v1.1.0-alpha.4");
    }

    #[test]
    fn test_sealed_and_released() {
        let snap = snapshot(&["v1.0.0", "v1.1.0-alpha.2", "v1.1.0-beta.0"]);

        assert!(snap.is_sealed(&v("1.1.0")));
        assert!(snap.is_sealed(&v("1.0.0")));
        assert!(!snap.is_sealed(&v("1.2.0")));
        assert!(snap.is_released(&v("1.0.0")));
        assert!(!snap.is_released(&v("1.1.0")));
    }

    #[test]
    fn test_base_queries() {
        let snap = snapshot(&["v1.0.0", "v1.1.0-beta.3", "v2.0.0-alpha.0"]);

        assert_eq!(snap.global_highest_base(), Some(v("2.0.0")));
        assert_eq!(
            snap.highest_base(&[BranchRole::Beta, BranchRole::Main]),
            Some(v("1.1.0"))
        );
        assert!(snap.has_tag(BranchRole::Beta, &v("1.1.0")));
        assert!(!snap.has_tag(BranchRole::Beta, &v("1.0.0")));
    }

    #[test]
    fn test_reader_lists_tags_once() {
        let repo = MockRepository::new();
        let head = repo.commit_on("main", "init", &[]);
        repo.add_tag("v1.0.0", head, 1);
        repo.add_tag("v1.1.0-alpha.0", head, 2);

        let format = TagFormat::default();
        let snap = TagHistoryReader::new(&repo, &format).snapshot().unwrap();

        assert_eq!(snap.records().len(), 2);
        assert_eq!(repo.list_tag_calls(), 1);
    }
}
