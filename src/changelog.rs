//! Markdown changelog maintenance

use chrono::NaiveDate;

const HEADER: &str = "# Changelog";

/// Render one release section
pub fn render_entry(version: &str, date: NaiveDate, entries: &[String]) -> String {
    let mut section = format!("## [{}] - {}\n\n", version, date.format("%Y-%m-%d"));
    if entries.is_empty() {
        section.push_str("- No notable changes\n");
    }
    for entry in entries {
        section.push_str(&format!("- {}\n", entry.trim()));
    }
    section
}

/// Insert a release section above every existing one, keeping the title on top
pub fn prepend_entry(existing: &str, version: &str, date: NaiveDate, entries: &[String]) -> String {
    let section = render_entry(version, date, entries);
    let body = existing.trim_start();

    let rest = match body.strip_prefix(HEADER) {
        Some(rest) => rest.trim_start_matches(['\n', '\r']),
        None => body,
    };

    if rest.is_empty() {
        format!("{}\n\n{}", HEADER, section)
    } else {
        format!("{}\n\n{}\n{}", HEADER, section, rest)
    }
}
