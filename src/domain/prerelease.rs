//! Pre-release suffix handling for tier versions
//!
//! Every tier pre-release is canonically `<identifier>.<counter>` (e.g. `alpha.2`).
//! Historical tags are not always canonical, so parsing accepts a few malformed
//! encodings and rewrites them before the semver parser sees them.
//! According to semver.org: https://semver.org/#spec-item-9

use crate::error::{PolicyViolation, ReleaseError, Result};
use std::cmp::Ordering;
use std::fmt;

/// Pre-release suffix with an identifier and a counter
///
/// # Examples
/// - "alpha.0" -> PreRelease { identifier: "alpha", counter: 0 }
/// - "beta.3" -> PreRelease { identifier: "beta", counter: 3 }
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PreRelease {
    /// The tier identifier (`alpha`, `beta`, or a configured name)
    pub identifier: String,
    /// Position within the version line, starting at 0
    pub counter: u64,
}

impl PreRelease {
    /// Create a new pre-release suffix
    pub fn new(identifier: impl Into<String>, counter: u64) -> Self {
        PreRelease {
            identifier: identifier.into(),
            counter,
        }
    }

    /// Parse a pre-release suffix, normalizing malformed encodings
    ///
    /// Accepts "beta.1", "beta" (counter 0), "beta1" (glued counter) and
    /// "3.beta.1" (stray numeric segment before the identifier).
    ///
    /// # Returns
    /// * `Ok(PreRelease)` - Canonical pre-release
    /// * `Err` - If no identifier can be found or a segment is invalid
    pub fn parse(s: &str) -> Result<Self> {
        let canonical = normalize(s)?;
        let (identifier, counter) = canonical
            .split_once('.')
            .ok_or_else(|| ReleaseError::parse(format!("Invalid pre-release: '{}'", s)))?;
        let counter = counter.parse::<u64>().map_err(|_| {
            ReleaseError::parse(format!("Invalid pre-release counter: '{}'", counter))
        })?;

        Ok(PreRelease::new(identifier, counter))
    }

    /// Next position on the same version line
    pub fn increment(&self) -> Result<Self> {
        let counter = self.counter.checked_add(1).ok_or_else(|| PolicyViolation::VersionOverflow {
            version: self.to_string(),
        })?;
        Ok(PreRelease {
            identifier: self.identifier.clone(),
            counter,
        })
    }
}

impl Ord for PreRelease {
    fn cmp(&self, other: &Self) -> Ordering {
        self.identifier
            .cmp(&other.identifier)
            .then(self.counter.cmp(&other.counter))
    }
}

impl PartialOrd for PreRelease {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for PreRelease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.identifier, self.counter)
    }
}

/// Rewrite a pre-release suffix to the canonical `<identifier>.<counter>` form.
pub fn normalize(raw: &str) -> Result<String> {
    let segments: Vec<&str> = raw.split('.').filter(|s| !s.is_empty()).collect();

    // Drop numeric segments that precede the identifier
    let start = segments
        .iter()
        .position(|s| !s.chars().all(|c| c.is_ascii_digit()))
        .ok_or_else(|| {
            ReleaseError::parse(format!("Pre-release '{}' has no identifier", raw))
        })?;

    let head = segments[start];
    if !head.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(ReleaseError::parse(format!(
            "Invalid pre-release identifier: '{}'",
            head
        )));
    }

    // "alpha3" carries its counter glued to the identifier
    let split_at = head
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_digit())
        .last()
        .map(|(i, _)| i);
    let (identifier, glued) = match split_at {
        Some(i) if i > 0 => (&head[..i], Some(&head[i..])),
        _ => (head, None),
    };

    let counter = match (glued, segments.get(start + 1)) {
        (Some(digits), _) => digits,
        (None, Some(next)) if next.chars().all(|c| c.is_ascii_digit()) => *next,
        (None, _) => "0",
    };
    let counter = counter
        .parse::<u64>()
        .map_err(|_| ReleaseError::parse(format!("Invalid pre-release counter in '{}'", raw)))?;

    Ok(format!("{}.{}", identifier.to_lowercase(), counter))
}
