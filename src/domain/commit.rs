use regex::Regex;

/// Parsed representation of a conventional commit message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommit {
    pub r#type: String,
    pub is_breaking_change: bool,
}

impl ParsedCommit {
    /// Parse a commit message in the Conventional Commits format
    /// Supports formats:
    /// - type(scope)!: description
    /// - type(scope): description
    /// - type!: description
    /// - type: description
    /// - non-conventional text
    pub fn parse(message: &str) -> Self {
        let subject = message.lines().next().unwrap_or_default();
        let footer_breaking =
            message.contains("BREAKING CHANGE:") || message.contains("BREAKING-CHANGE:");

        if let Some(captures) = Regex::new(r"^([a-z]+)(?:\(([^)]+)\))?(!?):\s*(.*)$")
            .ok()
            .and_then(|re| re.captures(subject))
        {
            let r#type = captures
                .get(1)
                .map(|m| m.as_str().to_string())
                .unwrap_or_default();
            let has_exclamation = captures.get(3).map(|m| m.as_str()) == Some("!");

            return ParsedCommit {
                r#type,
                is_breaking_change: has_exclamation || footer_breaking,
            };
        }

        // Default: non-conventional commit
        ParsedCommit {
            r#type: "chore".to_string(),
            is_breaking_change: false,
        }
    }
}
