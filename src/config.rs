use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::{BranchMap, BranchRole, TagFormat};
use crate::error::{ReleaseError, Result};

/// File name looked up in the working directory
pub const CONFIG_FILE_NAME: &str = "releaseladder.toml";

/// Represents the complete configuration for release-ladder.
///
/// Contains branch and tag naming, classification labels, automation identity,
/// collaborator settings and sync behavior.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
pub struct Config {
    #[serde(default)]
    pub branches: BranchesConfig,

    #[serde(default)]
    pub tags: TagsConfig,

    #[serde(default)]
    pub labels: LabelsConfig,

    #[serde(default)]
    pub signals: SignalsConfig,

    #[serde(default)]
    pub author: AuthorConfig,

    #[serde(default)]
    pub automation: AutomationConfig,

    #[serde(default)]
    pub metadata: MetadataConfig,

    #[serde(default)]
    pub changelog: ChangelogConfig,

    #[serde(default)]
    pub sync: SyncConfig,

    #[serde(default)]
    pub escalation: EscalationConfig,

    #[serde(default)]
    pub publish: PublishConfig,
}

fn default_alpha() -> String {
    "alpha".to_string()
}

fn default_beta() -> String {
    "beta".to_string()
}

fn default_main() -> String {
    "main".to_string()
}

/// Branch names mapped onto the three tiers.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct BranchesConfig {
    #[serde(default = "default_alpha")]
    pub alpha: String,

    #[serde(default = "default_beta")]
    pub beta: String,

    #[serde(default = "default_main")]
    pub main: String,
}

impl Default for BranchesConfig {
    fn default() -> Self {
        BranchesConfig {
            alpha: default_alpha(),
            beta: default_beta(),
            main: default_main(),
        }
    }
}

fn default_prefix() -> String {
    "v".to_string()
}

/// Tag naming: prefix and the pre-release identifiers of the Alpha and Beta tiers.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct TagsConfig {
    #[serde(default = "default_prefix")]
    pub prefix: String,

    #[serde(default = "default_alpha")]
    pub alpha: String,

    #[serde(default = "default_beta")]
    pub beta: String,
}

impl Default for TagsConfig {
    fn default() -> Self {
        TagsConfig {
            prefix: default_prefix(),
            alpha: default_alpha(),
            beta: default_beta(),
        }
    }
}

fn default_major_label() -> String {
    "major".to_string()
}

fn default_minor_label() -> String {
    "minor".to_string()
}

fn default_patch_label() -> String {
    "patch".to_string()
}

/// Label names recognized as classification signals.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct LabelsConfig {
    #[serde(default = "default_major_label")]
    pub major: String,

    #[serde(default = "default_minor_label")]
    pub minor: String,

    #[serde(default = "default_patch_label")]
    pub patch: String,
}

impl Default for LabelsConfig {
    fn default() -> Self {
        LabelsConfig {
            major: default_major_label(),
            minor: default_minor_label(),
            patch: default_patch_label(),
        }
    }
}

/// Whether commit messages are scanned when no label is present.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
pub struct SignalsConfig {
    #[serde(default)]
    pub scan_commits: bool,
}

fn default_author_name() -> String {
    "release-ladder[bot]".to_string()
}

fn default_author_email() -> String {
    "release-ladder@users.noreply.github.com".to_string()
}

/// Identity used for every automated commit and tag.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct AuthorConfig {
    #[serde(default = "default_author_name")]
    pub name: String,

    #[serde(default = "default_author_email")]
    pub email: String,
}

impl Default for AuthorConfig {
    fn default() -> Self {
        AuthorConfig {
            name: default_author_name(),
            email: default_author_email(),
        }
    }
}

fn default_marker() -> String {
    "[release-ladder]".to_string()
}

/// Marker written into automated commit messages; a run triggered by such a
/// commit does nothing.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct AutomationConfig {
    #[serde(default = "default_marker")]
    pub marker: String,
}

impl Default for AutomationConfig {
    fn default() -> Self {
        AutomationConfig {
            marker: default_marker(),
        }
    }
}

fn default_metadata_path() -> String {
    "package.json".to_string()
}

/// Package metadata file whose version field tracks the resolved version.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct MetadataConfig {
    #[serde(default = "default_metadata_path")]
    pub path: String,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        MetadataConfig {
            path: default_metadata_path(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_changelog_path() -> String {
    "CHANGELOG.md".to_string()
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ChangelogConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_changelog_path")]
    pub path: String,
}

impl Default for ChangelogConfig {
    fn default() -> Self {
        ChangelogConfig {
            enabled: true,
            path: default_changelog_path(),
        }
    }
}

fn default_remote() -> String {
    "origin".to_string()
}

fn default_push_attempts() -> u32 {
    3
}

fn default_backoff_min() -> u64 {
    1
}

fn default_backoff_max() -> u64 {
    3
}

/// Remote and push retry settings.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SyncConfig {
    #[serde(default = "default_remote")]
    pub remote: String,

    #[serde(default = "default_push_attempts")]
    pub push_attempts: u32,

    #[serde(default = "default_backoff_min")]
    pub backoff_min_secs: u64,

    #[serde(default = "default_backoff_max")]
    pub backoff_max_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        SyncConfig {
            remote: default_remote(),
            push_attempts: default_push_attempts(),
            backoff_min_secs: default_backoff_min(),
            backoff_max_secs: default_backoff_max(),
        }
    }
}

fn default_escalation_labels() -> Vec<String> {
    vec!["release-ladder".to_string(), "sync-conflict".to_string()]
}

fn default_state_file() -> String {
    ".release-ladder/host.toml".to_string()
}

/// Tracking items opened when a propagation edge cannot be reconciled.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct EscalationConfig {
    #[serde(default = "default_escalation_labels")]
    pub labels: Vec<String>,

    /// File backing the local host tracker
    #[serde(default = "default_state_file")]
    pub state_file: String,
}

impl Default for EscalationConfig {
    fn default() -> Self {
        EscalationConfig {
            labels: default_escalation_labels(),
            state_file: default_state_file(),
        }
    }
}

fn default_latest() -> String {
    "latest".to_string()
}

/// Registry publishing: the command to run and the distribution tag per tier.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct PublishConfig {
    /// Program and arguments; empty disables publishing
    #[serde(default)]
    pub command: Vec<String>,

    #[serde(default = "default_alpha")]
    pub alpha_dist_tag: String,

    #[serde(default = "default_beta")]
    pub beta_dist_tag: String,

    #[serde(default = "default_latest")]
    pub main_dist_tag: String,
}

impl Default for PublishConfig {
    fn default() -> Self {
        PublishConfig {
            command: Vec::new(),
            alpha_dist_tag: default_alpha(),
            beta_dist_tag: default_beta(),
            main_dist_tag: default_latest(),
        }
    }
}

impl PublishConfig {
    /// Distribution tag for a tier
    pub fn dist_tag(&self, role: BranchRole) -> &str {
        match role {
            BranchRole::Alpha => &self.alpha_dist_tag,
            BranchRole::Beta => &self.beta_dist_tag,
            BranchRole::Main => &self.main_dist_tag,
        }
    }
}

impl Config {
    /// Branch name to role mapping
    pub fn branch_map(&self) -> BranchMap {
        BranchMap::new(
            &self.branches.alpha,
            &self.branches.beta,
            &self.branches.main,
        )
    }

    /// Tag naming scheme
    pub fn tag_format(&self) -> TagFormat {
        TagFormat::new(&self.tags.prefix, &self.tags.alpha, &self.tags.beta)
    }

    /// Check invariants serde cannot express
    pub fn validate(&self) -> Result<()> {
        let branches = [&self.branches.alpha, &self.branches.beta, &self.branches.main];
        if branches.iter().any(|b| b.trim().is_empty()) {
            return Err(ReleaseError::config("branch names must not be empty"));
        }
        if branches[0] == branches[1] || branches[1] == branches[2] || branches[0] == branches[2]
        {
            return Err(ReleaseError::config(
                "alpha, beta and main must be distinct branches",
            ));
        }

        if self.tags.alpha.is_empty() || self.tags.beta.is_empty() {
            return Err(ReleaseError::config(
                "pre-release identifiers must not be empty",
            ));
        }
        if self.tags.alpha == self.tags.beta {
            return Err(ReleaseError::config(
                "alpha and beta pre-release identifiers must differ",
            ));
        }
        let valid_identifier = |id: &str| {
            id.chars().all(|c| c.is_ascii_lowercase() || c == '-')
                && !id.ends_with('-')
        };
        if !valid_identifier(&self.tags.alpha) || !valid_identifier(&self.tags.beta) {
            return Err(ReleaseError::config(
                "pre-release identifiers may only contain lowercase letters and '-'",
            ));
        }

        if self.automation.marker.trim().is_empty() {
            return Err(ReleaseError::config("automation marker must not be empty"));
        }
        if self.sync.push_attempts == 0 {
            return Err(ReleaseError::config("push_attempts must be at least 1"));
        }
        if self.sync.backoff_min_secs > self.sync.backoff_max_secs {
            return Err(ReleaseError::config(
                "backoff_min_secs must not exceed backoff_max_secs",
            ));
        }

        Ok(())
    }
}

/// Loads configuration from file or returns defaults.
///
/// Attempts to load configuration in the following order:
/// 1. Custom path provided as parameter
/// 2. `releaseladder.toml` in current directory
/// 3. `.releaseladder.toml` in user config directory
/// 4. Default configuration if no file found
///
/// # Arguments
/// * `config_path` - Optional path to custom configuration file
///
/// # Returns
/// * `Ok(Config)` - Loaded and validated configuration
/// * `Err` - If file exists but cannot be read, parsed or validated
pub fn load_config(config_path: Option<&str>) -> Result<Config> {
    let path = match resolve_config_path(config_path) {
        Some(path) => path,
        None => return Ok(Config::default()),
    };

    let config_str = fs::read_to_string(&path).map_err(|e| {
        ReleaseError::config(format!("cannot read {}: {}", path.display(), e))
    })?;
    let config: Config = toml::from_str(&config_str)?;
    config.validate()?;
    Ok(config)
}

fn resolve_config_path(config_path: Option<&str>) -> Option<PathBuf> {
    if let Some(path) = config_path {
        return Some(PathBuf::from(path));
    }

    let local = Path::new(".").join(CONFIG_FILE_NAME);
    if local.exists() {
        return Some(local);
    }

    dirs::config_dir()
        .map(|dir| dir.join(format!(".{}", CONFIG_FILE_NAME)))
        .filter(|path| path.exists())
}
