use std::path::Path;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use release_ladder::cli::outputs;
use release_ladder::cli::{ReleaseOrchestrator, ReleaseRequest};
use release_ladder::config::{self, Config};
use release_ladder::git::{Git2Repository, Repository};
use release_ladder::history::TagHistoryReader;
use release_ladder::host::LocalHost;
use release_ladder::publish::{CommandPublisher, RegistryPublisher};
use release_ladder::sync::BranchSyncCoordinator;
use release_ladder::ui;

#[derive(Parser)]
#[command(
    name = "release-ladder",
    version,
    about = "Tiered alpha/beta/main release automation with downstream branch sync"
)]
struct Args {
    #[arg(short, long, global = true, help = "Custom configuration file path")]
    config: Option<String>,

    #[arg(short, long, global = true, action = ArgAction::Count, help = "Verbose logging")]
    verbose: u8,

    #[arg(long, global = true, help = "Path of the git repository")]
    repo: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve, tag and publish a release on one tier, then propagate downstream
    Release {
        #[arg(long, help = "Branch receiving the release")]
        target: String,

        #[arg(long, help = "Branch the change came from")]
        source: String,

        #[arg(long = "label", help = "Classification label (repeatable)")]
        labels: Vec<String>,

        #[arg(long, help = "Preview the release without changing anything")]
        dry_run: bool,

        #[arg(long, help = "File receiving key=value outputs (defaults to $GITHUB_OUTPUT)")]
        outputs: Option<String>,

        #[arg(long, help = "Remote to fetch from and push to")]
        remote: Option<String>,
    },

    /// Propagate a tier's head into the tiers below it
    Sync {
        #[arg(long, help = "Branch to propagate from")]
        from: String,

        #[arg(long, help = "Remote to fetch from and push to")]
        remote: Option<String>,
    },

    /// Show the latest and highest tag of every tier
    Tags,

    /// Close a sync tracking issue once the branches are reconciled by hand
    Resolve {
        #[arg(help = "Tracking issue number")]
        id: u64,
    },
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "release_ladder=warn",
        1 => "release_ladder=info",
        _ => "release_ladder=debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    // Load configuration
    let mut config = match config::load_config(args.config.as_deref()) {
        Ok(cfg) => cfg,
        Err(e) => {
            ui::display_error(&format!("Error loading config: {}", e));
            std::process::exit(1);
        }
    };
    let repo_path = args.repo.as_deref().unwrap_or(".");

    let result = match args.command {
        Command::Release {
            target,
            source,
            labels,
            dry_run,
            outputs,
            remote,
        } => {
            if let Some(remote) = remote {
                config.sync.remote = remote;
            }
            let request = ReleaseRequest {
                target_branch: target,
                source_branch: source,
                labels,
                preview: dry_run,
            };
            run_release(&config, repo_path, &request, outputs.as_deref())
        }
        Command::Sync { from, remote } => {
            if let Some(remote) = remote {
                config.sync.remote = remote;
            }
            run_sync(&config, repo_path, &from)
        }
        Command::Tags => show_tags(&config, repo_path),
        Command::Resolve { id } => resolve_issue(&config, repo_path, id),
    };

    if let Err(e) = result {
        ui::display_error(&format!("{:#}", e));
        std::process::exit(1);
    }
    Ok(())
}

fn host_for(config: &Config, repo_path: &str) -> LocalHost {
    LocalHost::new(Path::new(repo_path).join(&config.escalation.state_file))
}

fn run_release(
    config: &Config,
    repo_path: &str,
    request: &ReleaseRequest,
    outputs_path: Option<&str>,
) -> Result<()> {
    let repo = Git2Repository::open(repo_path).context("Failed to open repository")?;
    let host = host_for(config, repo_path);
    let publisher = CommandPublisher::from_command(&config.publish.command)
        .map(|p| p.in_dir(repo_path));

    let orchestrator = ReleaseOrchestrator::new(&repo, &host, config)
        .with_publisher(publisher.as_ref().map(|p| p as &dyn RegistryPublisher));
    let outcome = orchestrator.run(request)?;

    let previous = TagHistoryReader::new(&repo, &config.tag_format())
        .snapshot()
        .ok()
        .and_then(|s| {
            let role = config.branch_map().role_of(&request.target_branch)?;
            s.records()
                .iter()
                .filter(|t| t.role == role && Some(&t.name) != outcome.tag.as_ref())
                .max_by_key(|t| t.creation_order)
                .map(|t| t.name.clone())
        });
    ui::display_outcome(&outcome, previous.as_deref());

    print!("{}", outputs::render(&outcome));
    if let Some(path) = outputs::output_path(outputs_path) {
        outputs::write_outputs(&path, &outcome)
            .with_context(|| format!("Failed to write outputs to {}", path.display()))?;
    }
    Ok(())
}

fn run_sync(config: &Config, repo_path: &str, from: &str) -> Result<()> {
    let role = config
        .branch_map()
        .role_of(from)
        .with_context(|| format!("'{}' is not one of the release branches", from))?;
    let repo = Git2Repository::open(repo_path).context("Failed to open repository")?;
    let host = host_for(config, repo_path);

    repo.fetch(&config.sync.remote)?;
    let snapshot = TagHistoryReader::new(&repo, &config.tag_format()).snapshot()?;
    let results = BranchSyncCoordinator::new(&repo, &host, config).propagate_from(role, &snapshot);
    for warning in results.iter().flat_map(|r| &r.warnings) {
        ui::display_boundary_warning(warning);
    }
    ui::display_sync_results(&results);

    if results.iter().any(|r| !r.success && !r.unresolved_conflict) {
        anyhow::bail!("propagation from '{}' failed", from);
    }
    Ok(())
}

fn show_tags(config: &Config, repo_path: &str) -> Result<()> {
    let repo = Git2Repository::open(repo_path).context("Failed to open repository")?;
    let snapshot = TagHistoryReader::new(&repo, &config.tag_format()).snapshot()?;
    let branches = config.branch_map();
    ui::display_snapshot(&snapshot, |role| branches.name_of(role).to_string());
    Ok(())
}

fn resolve_issue(config: &Config, repo_path: &str, id: u64) -> Result<()> {
    let host = host_for(config, repo_path);
    host.close_issue(id)?;
    ui::display_success(&format!("Closed tracking issue #{}", id));
    Ok(())
}
