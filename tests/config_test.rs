// tests/config_test.rs
use release_ladder::config::{load_config, Config, CONFIG_FILE_NAME};
use release_ladder::domain::BranchRole;
use serial_test::serial;
use std::io::Write;
use tempfile::{NamedTempFile, TempDir};

#[test]
fn test_load_default_config() {
    let config = Config::default();
    let branches = config.branch_map();
    assert_eq!(branches.name_of(BranchRole::Alpha), "alpha");
    assert_eq!(branches.name_of(BranchRole::Beta), "beta");
    assert_eq!(branches.name_of(BranchRole::Main), "main");
    assert_eq!(config.automation.marker, "[release-ladder]");
    assert_eq!(config.metadata.path, "package.json");
}

#[test]
fn test_load_from_file() {
    let mut temp_file = NamedTempFile::new().unwrap();
    let toml_content = r#"
[branches]
alpha = "next"
beta = "rc"
main = "master"

[tags]
prefix = "release-"
beta = "rc"

[labels]
minor = "feature"

[signals]
scan_commits = true

[publish]
command = ["npm", "publish"]
"#;
    temp_file.write_all(toml_content.as_bytes()).unwrap();
    temp_file.flush().unwrap();

    let config = load_config(Some(temp_file.path().to_str().unwrap())).unwrap();
    assert_eq!(config.branch_map().role_of("rc"), Some(BranchRole::Beta));
    assert_eq!(config.branch_map().role_of("beta"), None);
    assert_eq!(config.tags.prefix, "release-");
    assert_eq!(config.tags.alpha, "alpha");
    assert_eq!(config.labels.minor, "feature");
    assert!(config.signals.scan_commits);
    assert_eq!(config.publish.command, vec!["npm", "publish"]);
    assert_eq!(config.publish.dist_tag(BranchRole::Main), "latest");
}

#[test]
fn test_invalid_file_is_rejected() {
    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file
        .write_all(b"[tags]\nalpha = \"pre\"\nbeta = \"pre\"\n")
        .unwrap();
    temp_file.flush().unwrap();

    let err = load_config(Some(temp_file.path().to_str().unwrap())).unwrap_err();
    assert!(err.to_string().contains("must differ"));
}

#[test]
fn test_missing_explicit_file_is_an_error() {
    assert!(load_config(Some("/nonexistent/releaseladder.toml")).is_err());
}

#[test]
#[serial]
fn test_local_file_is_discovered() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join(CONFIG_FILE_NAME),
        "[branches]\nmain = \"trunk\"\n",
    )
    .unwrap();

    let original = std::env::current_dir().unwrap();
    std::env::set_current_dir(dir.path()).unwrap();
    let result = load_config(None);
    std::env::set_current_dir(original).unwrap();

    assert_eq!(result.unwrap().branches.main, "trunk");
}
