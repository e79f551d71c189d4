//! Package metadata version field
//!
//! Only the first version field of the file is read or rewritten; the rest of
//! the content is preserved byte for byte.

use crate::error::{ReleaseError, Result};
use regex::Regex;
use std::path::Path;

/// Metadata file formats, chosen by file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataFormat {
    /// `"version": "1.2.3"`
    Json,
    /// `version = "1.2.3"`
    Toml,
}

impl MetadataFormat {
    /// Detect the format from a file path
    pub fn from_path(path: &str) -> Result<Self> {
        match Path::new(path).extension().and_then(|e| e.to_str()) {
            Some("json") => Ok(MetadataFormat::Json),
            Some("toml") => Ok(MetadataFormat::Toml),
            _ => Err(ReleaseError::config(format!(
                "Unsupported metadata file '{}': expected .json or .toml",
                path
            ))),
        }
    }

    fn pattern(&self) -> Result<Regex> {
        let pattern = match self {
            MetadataFormat::Json => r#"("version"\s*:\s*")([^"]*)(")"#,
            MetadataFormat::Toml => r#"(?m)^(\s*version\s*=\s*")([^"]*)(")"#,
        };
        Regex::new(pattern).map_err(|e| ReleaseError::parse(format!("Invalid regex: {}", e)))
    }
}

/// Read the version field of a metadata file
pub fn read_version(path: &str, content: &str) -> Result<String> {
    let format = MetadataFormat::from_path(path)?;
    format
        .pattern()?
        .captures(content)
        .and_then(|caps| caps.get(2))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| ReleaseError::parse(format!("No version field in '{}'", path)))
}

/// Replace the version field of a metadata file, returning the new content
pub fn write_version(path: &str, content: &str, version: &str) -> Result<String> {
    let format = MetadataFormat::from_path(path)?;
    let re = format.pattern()?;
    if !re.is_match(content) {
        return Err(ReleaseError::parse(format!(
            "No version field in '{}'",
            path
        )));
    }

    let replaced = re.replacen(content, 1, |caps: &regex::Captures| {
        format!("{}{}{}", &caps[1], version, &caps[3])
    });
    Ok(replaced.into_owned())
}

/// Whether two revisions of a metadata file differ in more than their version field
///
/// Content without a recognisable version field is compared as is.
pub fn differs_beyond_version(path: &str, a: &str, b: &str) -> bool {
    match (write_version(path, a, ""), write_version(path, b, "")) {
        (Ok(a), Ok(b)) => a != b,
        _ => a != b,
    }
}
