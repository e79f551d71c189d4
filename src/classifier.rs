use crate::config::LabelsConfig;
use crate::domain::{BumpMagnitude, ParsedCommit};
use tracing::info;

/// Bump magnitude requested for a release
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReleaseSignal {
    /// The winning magnitude; `None` when no signal was found
    pub magnitude: Option<BumpMagnitude>,
    /// Lower-priority magnitudes that were seen and discarded, highest first
    pub ignored: Vec<BumpMagnitude>,
}

impl ReleaseSignal {
    pub fn absent() -> Self {
        Self::default()
    }

    pub fn of(magnitude: BumpMagnitude) -> Self {
        ReleaseSignal {
            magnitude: Some(magnitude),
            ignored: Vec::new(),
        }
    }

    pub fn is_present(&self) -> bool {
        self.magnitude.is_some()
    }

    /// Keep the highest magnitude; the rest are recorded, never summed
    fn from_candidates(mut found: Vec<BumpMagnitude>) -> Self {
        found.sort_by(|a, b| b.cmp(a));
        found.dedup();
        let mut found = found.into_iter();
        ReleaseSignal {
            magnitude: found.next(),
            ignored: found.collect(),
        }
    }
}

/// Maps pull request labels or commit messages to a bump magnitude
#[derive(Debug, Clone)]
pub struct ReleaseClassifier {
    labels: LabelsConfig,
}

impl ReleaseClassifier {
    pub fn new(labels: LabelsConfig) -> Self {
        ReleaseClassifier { labels }
    }

    fn magnitude_of(&self, label: &str) -> Option<BumpMagnitude> {
        let label = label.trim();
        if label.eq_ignore_ascii_case(&self.labels.major) {
            Some(BumpMagnitude::Major)
        } else if label.eq_ignore_ascii_case(&self.labels.minor) {
            Some(BumpMagnitude::Minor)
        } else if label.eq_ignore_ascii_case(&self.labels.patch) {
            Some(BumpMagnitude::Patch)
        } else {
            None
        }
    }

    /// Classify a set of labels
    ///
    /// Priority is Major > Minor > Patch. Unrecognised labels are ignored
    /// silently; recognised but outranked ones are logged.
    pub fn classify<S: AsRef<str>>(&self, labels: &[S]) -> ReleaseSignal {
        let found = labels
            .iter()
            .filter_map(|l| self.magnitude_of(l.as_ref()))
            .collect();
        let signal = ReleaseSignal::from_candidates(found);

        if let (Some(winner), false) = (signal.magnitude, signal.ignored.is_empty()) {
            info!(%winner, ignored = ?signal.ignored, "multiple release labels, keeping the highest");
        }
        signal
    }

    /// Derive a signal from conventional commit messages
    ///
    /// Breaking changes are Major, `feat` is Minor, `fix` and `perf` are Patch.
    pub fn classify_commits<S: AsRef<str>>(&self, messages: &[S]) -> ReleaseSignal {
        let found = messages
            .iter()
            .filter_map(|m| {
                let commit = ParsedCommit::parse(m.as_ref());
                if commit.is_breaking_change {
                    return Some(BumpMagnitude::Major);
                }
                match commit.r#type.as_str() {
                    "feat" => Some(BumpMagnitude::Minor),
                    "fix" | "perf" => Some(BumpMagnitude::Patch),
                    _ => None,
                }
            })
            .collect();
        ReleaseSignal::from_candidates(found)
    }
}

impl Default for ReleaseClassifier {
    fn default() -> Self {
        Self::new(LabelsConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_major_wins_over_lower_labels() {
        let signal = ReleaseClassifier::default().classify(&["patch", "major", "minor"]);
        assert_eq!(signal.magnitude, Some(BumpMagnitude::Major));
        assert_eq!(signal.ignored, vec![BumpMagnitude::Minor, BumpMagnitude::Patch]);
    }

    #[test]
    fn test_labels_are_case_insensitive() {
        let signal = ReleaseClassifier::default().classify(&["Minor"]);
        assert_eq!(signal, ReleaseSignal::of(BumpMagnitude::Minor));
    }

    #[test]
    fn test_unrecognised_labels_give_absent_signal() {
        let signal = ReleaseClassifier::default().classify(&["documentation", "ci"]);
        assert!(!signal.is_present());
        assert!(signal.ignored.is_empty());
    }

    #[test]
    fn test_duplicate_labels_are_not_ignored_twice() {
        let signal = ReleaseClassifier::default().classify(&["minor", "minor", "patch"]);
        assert_eq!(signal.magnitude, Some(BumpMagnitude::Minor));
        assert_eq!(signal.ignored, vec![BumpMagnitude::Patch]);
    }

    #[test]
    fn test_custom_label_names() {
        let classifier = ReleaseClassifier::new(LabelsConfig {
            major: "semver:major".to_string(),
            minor: "semver:minor".to_string(),
            patch: "semver:patch".to_string(),
        });
        assert_eq!(
            classifier.classify(&["semver:patch"]).magnitude,
            Some(BumpMagnitude::Patch)
        );
        assert!(!classifier.classify(&["patch"]).is_present());
    }

    #[test]
    fn test_commit_scan() {
        let classifier = ReleaseClassifier::default();
        assert_eq!(
            classifier.classify_commits(&["fix: a", "feat(ui): b", "docs: c"]).magnitude,
            Some(BumpMagnitude::Minor)
        );
        assert_eq!(
            classifier
                .classify_commits(&["fix: a", "refactor!: drop api"])
                .magnitude,
            Some(BumpMagnitude::Major)
        );
        assert!(!classifier.classify_commits(&["chore: deps", "Merge branch"]).is_present());
    }
}
