use crate::domain::prerelease::{self, PreRelease};
use crate::error::{PolicyViolation, ReleaseError, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Semantic version of a release tier
///
/// Immutable once constructed; every derivation returns a new value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VersionValue {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    pub prerelease: Option<PreRelease>,
}

/// Magnitude of a version bump
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BumpMagnitude {
    Patch,
    Minor,
    Major,
}

impl BumpMagnitude {
    /// Lowercase name, as used for labels
    pub fn name(&self) -> &'static str {
        match self {
            BumpMagnitude::Major => "major",
            BumpMagnitude::Minor => "minor",
            BumpMagnitude::Patch => "patch",
        }
    }
}

impl fmt::Display for BumpMagnitude {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl VersionValue {
    /// Create a release version
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        VersionValue {
            major,
            minor,
            patch,
            prerelease: None,
        }
    }

    /// Parse a version from a tag or metadata string (e.g., "v1.2.3-beta.1")
    ///
    /// A leading `v`/`V` is stripped. Malformed pre-release suffixes are rewritten
    /// to `<identifier>.<counter>` before the string is handed to the semver parser,
    /// and build metadata is dropped.
    pub fn parse(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let clean = trimmed
            .strip_prefix('v')
            .or_else(|| trimmed.strip_prefix('V'))
            .unwrap_or(trimmed);
        Self::parse_canonical(clean, s)
    }

    /// Parse a version that must start with `prefix` (e.g., "release-1.2.3")
    pub fn parse_with_prefix(s: &str, prefix: &str) -> Result<Self> {
        let clean = s.trim().strip_prefix(prefix).ok_or_else(|| {
            ReleaseError::parse(format!("'{}' does not start with prefix '{}'", s, prefix))
        })?;
        Self::parse_canonical(clean, s)
    }

    fn parse_canonical(clean: &str, original: &str) -> Result<Self> {
        let without_build = clean.split('+').next().unwrap_or(clean);
        let (core, pre) = match without_build.split_once('-') {
            Some((core, pre)) => (core, Some(pre)),
            None => (without_build, None),
        };

        let parts: Vec<&str> = core.split('.').collect();
        if parts.len() != 3 || parts.iter().any(|p| p.is_empty()) {
            return Err(ReleaseError::parse(format!(
                "Invalid version format: '{}' - expected X.Y.Z",
                original
            )));
        }

        let canonical = match pre {
            Some(pre) => format!("{}-{}", core, prerelease::normalize(pre)?),
            None => core.to_string(),
        };

        let parsed = semver::Version::parse(&canonical).map_err(|e| {
            ReleaseError::parse(format!("Invalid version '{}': {}", original, e))
        })?;

        let prerelease = if parsed.pre.is_empty() {
            None
        } else {
            Some(PreRelease::parse(parsed.pre.as_str())?)
        };

        Ok(VersionValue {
            major: parsed.major,
            minor: parsed.minor,
            patch: parsed.patch,
            prerelease,
        })
    }

    /// The `major.minor.patch` triplet without any pre-release suffix
    pub fn base_version(&self) -> Self {
        VersionValue::new(self.major, self.minor, self.patch)
    }

    /// Whether this version carries a pre-release suffix
    pub fn is_prerelease(&self) -> bool {
        self.prerelease.is_some()
    }

    /// Pre-release identifier, if any
    pub fn identifier(&self) -> Option<&str> {
        self.prerelease.as_ref().map(|p| p.identifier.as_str())
    }

    /// Pre-release counter, if any
    pub fn counter(&self) -> Option<u64> {
        self.prerelease.as_ref().map(|p| p.counter)
    }

    /// Compare two versions, returning -1, 0 or 1
    pub fn compare(&self, other: &Self) -> i8 {
        match self.cmp(other) {
            Ordering::Less => -1,
            Ordering::Equal => 0,
            Ordering::Greater => 1,
        }
    }

    /// Bump the base version; the result is always a release version
    ///
    /// Fails with a policy error when the bumped component is already `u64::MAX`.
    pub fn bump(&self, magnitude: BumpMagnitude) -> Result<Self> {
        let next = |component: u64| {
            component.checked_add(1).ok_or_else(|| {
                ReleaseError::from(PolicyViolation::VersionOverflow {
                    version: self.to_string(),
                })
            })
        };
        Ok(match magnitude {
            BumpMagnitude::Major => VersionValue::new(next(self.major)?, 0, 0),
            BumpMagnitude::Minor => VersionValue::new(self.major, next(self.minor)?, 0),
            BumpMagnitude::Patch => VersionValue::new(self.major, self.minor, next(self.patch)?),
        })
    }

    /// Bump the base version and, when an identifier is given, open a new
    /// pre-release line on it at counter 0
    pub fn bump_for(&self, magnitude: BumpMagnitude, identifier: Option<&str>) -> Result<Self> {
        let bumped = self.bump(magnitude)?;
        Ok(match identifier {
            Some(id) => bumped.with_prerelease(id, 0),
            None => bumped,
        })
    }

    /// Same base, pre-release counter + 1
    ///
    /// A release version has no counter to increment and is returned unchanged.
    pub fn next_prerelease(&self) -> Result<Self> {
        Ok(VersionValue {
            prerelease: self.prerelease.as_ref().map(PreRelease::increment).transpose()?,
            ..self.clone()
        })
    }

    /// Same base with the given pre-release suffix
    pub fn with_prerelease(&self, identifier: &str, counter: u64) -> Self {
        VersionValue {
            prerelease: Some(PreRelease::new(identifier, counter)),
            ..self.base_version()
        }
    }

    /// Render as a tag name (e.g., prefix "v" -> "v1.2.3-alpha.0")
    pub fn with_prefix(&self, prefix: &str) -> String {
        format!("{}{}", prefix, self)
    }
}

impl Ord for VersionValue {
    fn cmp(&self, other: &Self) -> Ordering {
        self.major
            .cmp(&other.major)
            .then(self.minor.cmp(&other.minor))
            .then(self.patch.cmp(&other.patch))
            .then_with(|| match (&self.prerelease, &other.prerelease) {
                (None, None) => Ordering::Equal,
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (Some(a), Some(b)) => a.cmp(b),
            })
    }
}

impl PartialOrd for VersionValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl FromStr for VersionValue {
    type Err = ReleaseError;

    fn from_str(s: &str) -> Result<Self> {
        VersionValue::parse(s)
    }
}

impl fmt::Display for VersionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if let Some(pre) = &self.prerelease {
            write!(f, "-{}", pre)?;
        }
        Ok(())
    }
}
