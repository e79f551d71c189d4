//! User interface module - terminal output and host comment bodies.
//!
//! Separates concerns:
//! - `formatter` - Printing to the terminal
//! - This module - Markdown bodies posted to the repository host

pub mod formatter;

pub use formatter::{
    display_boundary_warning, display_error, display_outcome, display_plan, display_snapshot,
    display_status, display_success, display_sync_results,
};

use crate::error::ReleaseError;
use crate::resolver::VersionPlan;

/// Hidden marker identifying the preview comment so reruns replace it
pub const PREVIEW_MARKER: &str = "<!-- release-ladder:preview -->";

/// Preview comment announcing the release a merge would produce.
pub fn render_preview_plan(target_branch: &str, plan: &VersionPlan, tag: &str) -> String {
    let previous = plan
        .previous
        .as_ref()
        .map(|v| format!("`{}`", v))
        .unwrap_or_else(|| "none".to_string());
    format!(
        "{}\n### Release preview\n\n\
         Merging this change into `{}` will release **`{}`**.\n\n\
         | | |\n|---|---|\n| Tier | {} |\n| Previous | {} |\n| Next | `{}` |\n",
        PREVIEW_MARKER, target_branch, tag, plan.role, previous, plan.next
    )
}

/// Preview comment for a change that releases nothing.
pub fn render_preview_skip(reason: &str) -> String {
    format!(
        "{}\n### Release preview\n\nNo release will be made: {}.\n",
        PREVIEW_MARKER, reason
    )
}

/// Preview comment for a change the branch rules refuse.
pub fn render_preview_error(error: &ReleaseError) -> String {
    let heading = if error.is_policy() {
        "This change breaks the release branch rules"
    } else {
        "The release could not be resolved"
    };
    format!(
        "{}\n### Release preview\n\n**{}.**\n\n> {}\n",
        PREVIEW_MARKER, heading, error
    )
}
