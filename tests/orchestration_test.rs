// tests/orchestration_test.rs
use git2::Oid;
use rand::rngs::StdRng;
use rand::SeedableRng;
use release_ladder::boundary::BoundaryWarning;
use release_ladder::cli::{ReleaseOrchestrator, ReleaseOutcome, ReleaseRequest};
use release_ladder::config::Config;
use release_ladder::domain::VersionValue;
use release_ladder::git::{MockRepository, Repository};
use release_ladder::host::InMemoryHost;
use release_ladder::publish::RegistryPublisher;
use release_ladder::sync::{PushRetrier, RecordingSleeper, RetryPolicy};
use release_ladder::ui::PREVIEW_MARKER;
use release_ladder::{ReleaseError, Result};
use std::cell::RefCell;

fn pkg(version: &str) -> String {
    format!("{{\n  \"name\": \"demo\",\n  \"version\": \"{}\"\n}}\n", version)
}

fn request(target: &str, source: &str, labels: &[&str], preview: bool) -> ReleaseRequest {
    ReleaseRequest {
        target_branch: target.to_string(),
        source_branch: source.to_string(),
        labels: labels.iter().map(|l| l.to_string()).collect(),
        preview,
    }
}

fn run_with(
    repo: &MockRepository,
    host: &InMemoryHost,
    config: &Config,
    publisher: Option<&dyn RegistryPublisher>,
    sleeper: &RecordingSleeper,
    request: &ReleaseRequest,
) -> Result<ReleaseOutcome> {
    ReleaseOrchestrator::new(repo, host, config)
        .with_publisher(publisher)
        .with_retriers(|| {
            PushRetrier::with(RetryPolicy::default(), sleeper.clone(), StdRng::seed_from_u64(11))
        })
        .run(request)
}

fn run(repo: &MockRepository, host: &InMemoryHost, request: &ReleaseRequest) -> Result<ReleaseOutcome> {
    run_with(repo, host, &Config::default(), None, &RecordingSleeper::new(), request)
}

#[derive(Default)]
struct RecordingPublisher {
    calls: RefCell<Vec<(String, String)>>,
    fail: bool,
}

impl RegistryPublisher for RecordingPublisher {
    fn publish(&self, version: &VersionValue, dist_tag: &str) -> Result<()> {
        self.calls
            .borrow_mut()
            .push((version.to_string(), dist_tag.to_string()));
        if self.fail {
            return Err(ReleaseError::publish("registry said no"));
        }
        Ok(())
    }
}

/// Main at 1.0.0, Alpha at 1.1.0-alpha.2 with one more commit on top
fn alpha_in_flight(repo: &MockRepository) -> Oid {
    let main = repo.commit_on("main", "chore: init", &[("package.json", pkg("1.0.0").as_str())]);
    repo.add_tag("v1.0.0", main, 1);
    repo.branch_from("alpha", main);
    let tagged = repo.commit_on("alpha", "feat: first", &[("package.json", pkg("1.1.0-alpha.2").as_str())]);
    repo.add_tag("v1.1.0-alpha.2", tagged, 2);
    repo.commit_on("alpha", "feat: second", &[("second.txt", "2")])
}

#[test]
fn test_alpha_release_continues_open_line() {
    let repo = MockRepository::new();
    alpha_in_flight(&repo);
    let host = InMemoryHost::new();

    let outcome = run(&repo, &host, &request("alpha", "feature/x", &["minor"], false)).unwrap();

    assert_eq!(outcome.tag.as_deref(), Some("v1.1.0-alpha.3"));
    assert!(!outcome.preview);
    assert_eq!(outcome.published, None);
    assert!(outcome.sync.is_empty());
    assert!(repo.pushed_tags().contains(&"v1.1.0-alpha.3".to_string()));

    let head = repo.remote_head("alpha").unwrap();
    assert_eq!(repo.tag_target("v1.1.0-alpha.3"), Some(head));
    let message = repo.commit_message(head).unwrap();
    assert_eq!(message, "chore(release): v1.1.0-alpha.3 [release-ladder]");

    let files = repo.files_at(head);
    assert!(files["package.json"].contains("\"version\": \"1.1.0-alpha.3\""));
    let changelog = &files["CHANGELOG.md"];
    assert!(changelog.starts_with("# Changelog\n\n## [1.1.0-alpha.3] - "));
    assert!(changelog.contains("- feat: second\n"));
    assert!(!changelog.contains("feat: first"));
}

#[test]
fn test_major_signal_opens_new_line() {
    let repo = MockRepository::new();
    alpha_in_flight(&repo);
    let host = InMemoryHost::new();

    let outcome = run(&repo, &host, &request("alpha", "feature/x", &["minor", "major"], false)).unwrap();

    assert_eq!(outcome.tag.as_deref(), Some("v2.0.0-alpha.0"));
    assert!(outcome
        .warnings
        .iter()
        .any(|w| matches!(w, BoundaryWarning::IgnoredSignals { .. })));
}

#[test]
fn test_alpha_without_signal_does_nothing() {
    let repo = MockRepository::new();
    alpha_in_flight(&repo);
    let host = InMemoryHost::new();

    let outcome = run(&repo, &host, &request("alpha", "feature/x", &["documentation"], false)).unwrap();

    assert_eq!(outcome.version, None);
    assert!(outcome.skipped.is_some());
    assert!(repo.pushes().is_empty());
    assert_eq!(repo.tag_names().len(), 2);
}

#[test]
fn test_commit_scan_supplies_missing_signal() {
    let repo = MockRepository::new();
    alpha_in_flight(&repo);
    let host = InMemoryHost::new();
    let mut config = Config::default();
    config.signals.scan_commits = true;

    let outcome = run_with(
        &repo,
        &host,
        &config,
        None,
        &RecordingSleeper::new(),
        &request("alpha", "feature/x", &[], false),
    )
    .unwrap();

    // "feat: second" is a minor change on the open 1.1.0 line
    assert_eq!(outcome.tag.as_deref(), Some("v1.1.0-alpha.3"));
}

#[test]
fn test_self_triggered_run_is_a_no_op() {
    let repo = MockRepository::new();
    alpha_in_flight(&repo);
    repo.commit_on("alpha", "chore(release): v1.1.0-alpha.3 [release-ladder]", &[]);
    let host = InMemoryHost::new();

    let outcome = run(&repo, &host, &request("alpha", "feature/x", &["minor"], false)).unwrap();

    assert!(outcome.skipped.is_some());
    assert!(matches!(
        outcome.warnings.as_slice(),
        [BoundaryWarning::SelfTriggered { .. }]
    ));
    assert_eq!(repo.list_tag_calls(), 0);
    assert!(repo.pushes().is_empty());
}

#[test]
fn test_preview_reports_plan_without_writing() {
    let repo = MockRepository::new();
    alpha_in_flight(&repo);
    let host = InMemoryHost::new();

    let outcome = run(&repo, &host, &request("alpha", "feature/x", &["minor"], true)).unwrap();

    assert!(outcome.preview);
    assert_eq!(outcome.tag.as_deref(), Some("v1.1.0-alpha.3"));
    assert!(repo.pushes().is_empty());
    assert_eq!(repo.tag_names().len(), 2);
    let comment = host.comment(PREVIEW_MARKER).unwrap();
    assert!(comment.contains("v1.1.0-alpha.3"));

    // A second preview replaces the comment instead of adding one
    run(&repo, &host, &request("alpha", "feature/x", &["major"], true)).unwrap();
    assert_eq!(host.comment_count(), 1);
    assert!(host.comment(PREVIEW_MARKER).unwrap().contains("v2.0.0-alpha.0"));
}

#[test]
fn test_preview_surfaces_policy_error_as_comment() {
    let repo = MockRepository::new();
    let main = repo.commit_on("main", "chore: init", &[("package.json", pkg("1.0.0").as_str())]);
    repo.add_tag("v1.0.0", main, 1);
    repo.branch_from("beta", main);
    let host = InMemoryHost::new();

    let outcome = run(&repo, &host, &request("beta", "hotfix/x", &["patch"], true)).unwrap();

    assert_eq!(outcome.version, None);
    let error = outcome.error.unwrap();
    assert!(error.contains("without first completing Alpha"));
    assert!(host
        .comment(PREVIEW_MARKER)
        .unwrap()
        .contains("breaks the release branch rules"));
}

#[test]
fn test_policy_error_fails_real_run_before_any_write() {
    let repo = MockRepository::new();
    let main = repo.commit_on("main", "chore: init", &[("package.json", pkg("1.0.0").as_str())]);
    repo.add_tag("v1.0.0", main, 1);
    repo.branch_from("beta", main);
    let host = InMemoryHost::new();

    let err = run(&repo, &host, &request("beta", "hotfix/x", &["patch"], false)).unwrap_err();

    assert!(err.is_policy());
    assert!(repo.pushes().is_empty());
    assert_eq!(repo.tag_names(), vec!["v1.0.0".to_string()]);
    assert_eq!(host.comment_count(), 0);
}

#[test]
fn test_promotion_to_main_publishes_and_propagates() {
    let repo = MockRepository::new();
    let init = repo.commit_on("main", "chore: init", &[("package.json", pkg("1.1.0").as_str())]);
    repo.add_tag("v1.1.0", init, 1);
    repo.branch_from("beta", init);
    let beta = repo.commit_on("beta", "fix: ready", &[("package.json", pkg("1.2.0-beta.1").as_str())]);
    repo.add_tag("v1.2.0-beta.1", beta, 2);
    repo.branch_from("alpha", beta);
    let alpha = repo.commit_on("alpha", "feat: next", &[("next.txt", "n")]);
    repo.commit_on("main", "fix: ready", &[("fix.txt", "f")]);

    let host = InMemoryHost::new();
    let publisher = RecordingPublisher::default();
    let outcome = run_with(
        &repo,
        &host,
        &Config::default(),
        Some(&publisher),
        &RecordingSleeper::new(),
        &request("main", "beta", &[], false),
    )
    .unwrap();

    assert_eq!(outcome.tag.as_deref(), Some("v1.2.0"));
    assert_eq!(outcome.published, Some(true));
    assert_eq!(
        publisher.calls.borrow().as_slice(),
        &[("1.2.0".to_string(), "latest".to_string())]
    );

    assert_eq!(outcome.sync.len(), 2);
    assert!(outcome.sync.iter().all(|r| r.success), "{:?}", outcome.sync);
    assert_eq!(outcome.sync[0].edge.to_string(), "Main -> Beta");
    assert_eq!(outcome.sync[1].edge.to_string(), "Beta -> Alpha");

    let main_head = repo.remote_head("main").unwrap();
    assert!(repo.is_ancestor(main_head, repo.remote_head("beta").unwrap()).unwrap());
    let alpha_head = repo.remote_head("alpha").unwrap();
    assert!(repo.is_ancestor(alpha, alpha_head).unwrap());
    assert!(repo.is_ancestor(main_head, alpha_head).unwrap());
}

#[test]
fn test_publish_failure_does_not_fail_release() {
    let repo = MockRepository::new();
    alpha_in_flight(&repo);
    let host = InMemoryHost::new();
    let publisher = RecordingPublisher {
        fail: true,
        ..Default::default()
    };

    let outcome = run_with(
        &repo,
        &host,
        &Config::default(),
        Some(&publisher),
        &RecordingSleeper::new(),
        &request("alpha", "feature/x", &["patch"], false),
    )
    .unwrap();

    assert_eq!(outcome.published, Some(false));
    assert_eq!(publisher.calls.borrow()[0].1, "alpha");
    assert!(repo.pushed_tags().contains(&"v1.1.0-alpha.3".to_string()));
}

#[test]
fn test_concurrent_push_replays_release_commit() {
    let repo = MockRepository::new();
    alpha_in_flight(&repo);
    repo.race_next_push("alpha", "feat: landed meanwhile");
    let host = InMemoryHost::new();
    let sleeper = RecordingSleeper::new();

    let outcome = run_with(
        &repo,
        &host,
        &Config::default(),
        None,
        &sleeper,
        &request("alpha", "feature/x", &["minor"], false),
    )
    .unwrap();

    assert_eq!(outcome.tag.as_deref(), Some("v1.1.0-alpha.3"));
    assert_eq!(sleeper.delays().len(), 1);

    let head = repo.remote_head("alpha").unwrap();
    let parent = repo.parents_of(head)[0];
    assert_eq!(repo.commit_message(parent).unwrap(), "feat: landed meanwhile");
    // The tag follows the replayed commit
    assert_eq!(repo.tag_target("v1.1.0-alpha.3"), Some(head));
    assert!(repo.files_at(head)["package.json"].contains("1.1.0-alpha.3"));
}

#[test]
fn test_push_gives_up_after_bounded_attempts() {
    let repo = MockRepository::new();
    alpha_in_flight(&repo);
    repo.reject_pushes(5);
    let host = InMemoryHost::new();
    let sleeper = RecordingSleeper::new();

    let err = run_with(
        &repo,
        &host,
        &Config::default(),
        None,
        &sleeper,
        &request("alpha", "feature/x", &["minor"], false),
    )
    .unwrap_err();

    assert!(matches!(err, ReleaseError::Remote(_)));
    assert_eq!(sleeper.delays().len(), 2);
    assert!(!repo.pushed_tags().contains(&"v1.1.0-alpha.3".to_string()));
}

#[test]
fn test_failed_push_leaves_no_local_release() {
    let repo = MockRepository::new();
    let before = alpha_in_flight(&repo);
    repo.reject_pushes(3);
    let host = InMemoryHost::new();

    let err = run(&repo, &host, &request("alpha", "feature/x", &["minor"], false)).unwrap_err();
    assert!(matches!(err, ReleaseError::Remote(_)));
    assert_eq!(repo.tag_names(), vec!["v1.0.0", "v1.1.0-alpha.2"]);
    assert_eq!(repo.local_head("alpha"), Some(before));
    assert_eq!(repo.remote_head("alpha"), Some(before));

    // The next run releases the same version
    let outcome = run(&repo, &host, &request("alpha", "feature/x", &["minor"], false)).unwrap();
    assert_eq!(outcome.tag.as_deref(), Some("v1.1.0-alpha.3"));
    assert!(repo.pushed_tags().contains(&"v1.1.0-alpha.3".to_string()));
    assert!(!repo.tag_names().contains(&"v1.1.0-alpha.4".to_string()));
}
