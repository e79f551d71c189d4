//! Terminal output for the binary.
//!
//! Everything here prints; nothing reads input. Colors come from `console`
//! and are dropped automatically when the stream is not a terminal.

use console::style;

use crate::boundary::BoundaryWarning;
use crate::cli::orchestration::ReleaseOutcome;
use crate::domain::BranchRole;
use crate::history::TagSnapshot;
use crate::sync::BranchSyncResult;

/// Format and print an error message in red.
pub fn display_error(message: &str) {
    eprintln!("{} {}", style("ERROR:").red().bold(), message);
}

/// Format and print a success message with green checkmark.
pub fn display_success(message: &str) {
    println!("{} {}", style("✓").green(), message);
}

/// Format and print a status message with yellow arrow.
pub fn display_status(message: &str) {
    println!("{} {}", style("→").yellow(), message);
}

/// Display a boundary warning to the user.
pub fn display_boundary_warning(warning: &BoundaryWarning) {
    eprintln!("{} {}", style("⚠ WARNING:").yellow(), warning);
}

/// Display the version change a run decided on.
///
/// Shows either:
/// - If the tier had a tag: "From: old -> To: new"
/// - If this is the tier's first tag: "Initial Tag: new"
pub fn display_plan(previous: Option<&str>, next_tag: &str, preview: bool) {
    let heading = if preview { "Planned Release" } else { "Release" };
    match previous {
        Some(old) => {
            println!("\n{}", style(format!("{}:", heading)).bold());
            println!("  From: {}", style(old).red());
            println!("  To:   {}", style(next_tag).green());
        }
        None => {
            println!("\n{}", style("Initial Tag:").bold());
            println!("  New tag: {}", style(next_tag).green());
        }
    }
}

/// Display a full release outcome: warnings, plan or skip reason, sync edges.
pub fn display_outcome(outcome: &ReleaseOutcome, previous: Option<&str>) {
    for warning in &outcome.warnings {
        display_boundary_warning(warning);
    }

    if let Some(error) = &outcome.error {
        display_error(error);
        return;
    }
    if let Some(reason) = &outcome.skipped {
        display_status(reason);
        return;
    }

    if let Some(tag) = &outcome.tag {
        display_plan(previous, tag, outcome.preview);
        if !outcome.preview {
            display_success(&format!("Tagged and pushed {}", tag));
        }
    }

    match outcome.published {
        Some(true) => display_success("Published to registry"),
        Some(false) => display_error("Publishing failed; the release itself stands"),
        None => {}
    }

    display_sync_results(&outcome.sync);
}

/// One line per propagation edge.
pub fn display_sync_results(results: &[BranchSyncResult]) {
    if results.is_empty() {
        return;
    }
    println!("\n{}", style("Propagation:").bold());
    for result in results {
        let edge = result.edge.to_string();
        if result.success {
            let how = result
                .tier
                .map(|t| t.to_string())
                .unwrap_or_else(|| "up to date".to_string());
            let version = result
                .resulting_version
                .as_ref()
                .map(|v| format!(" at {}", v))
                .unwrap_or_default();
            println!("  {} {} ({}){}", style("✓").green(), edge, how, version);
        } else if result.unresolved_conflict {
            println!(
                "  {} {} escalated: {}",
                style("⚠").yellow(),
                edge,
                result.error.as_deref().unwrap_or("unresolved conflict")
            );
        } else {
            println!(
                "  {} {}: {}",
                style("✗").red(),
                edge,
                result.error.as_deref().unwrap_or("failed")
            );
        }
    }
}

/// Latest and highest tag per tier.
pub fn display_snapshot(snapshot: &TagSnapshot, branch_name: impl Fn(BranchRole) -> String) {
    println!("{}", style("Release tiers:").bold());
    for role in [BranchRole::Main, BranchRole::Beta, BranchRole::Alpha] {
        let latest = snapshot
            .latest(role)
            .map(|t| t.name.clone())
            .unwrap_or_else(|| "-".to_string());
        let highest = snapshot
            .highest(role)
            .map(|t| t.version.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  {:<6} {:<12} latest {:<24} highest {}",
            role.to_string(),
            style(branch_name(role)).cyan(),
            latest,
            highest
        );
    }
    for warning in snapshot.warnings() {
        display_boundary_warning(warning);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TagFormat;

    #[test]
    fn test_display_error() {
        // Visual verification test - output is printed to stderr
        display_error("test error");
    }

    #[test]
    fn test_display_plan_variants() {
        display_plan(Some("v1.0.0"), "v1.1.0", false);
        display_plan(None, "v0.1.0-alpha.0", true);
    }

    #[test]
    fn test_display_snapshot() {
        let snapshot = TagSnapshot::from_names(&["v1.0.0", "v1.1.0-alpha.0", "vbroken"], &TagFormat::default());
        display_snapshot(&snapshot, |role| role.name().to_lowercase());
    }
}
