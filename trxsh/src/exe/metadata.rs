//! Header parsing for executable files
//!
//! An executable starts with an optional shebang and a block of `//` comment
//! lines carrying `key: value` metadata. The first line that is neither blank
//! nor a comment starts the body.

use super::ExeError;
use serde::{Deserialize, Serialize};

const KNOWN_KEYS: [&str; 7] = [
    "name",
    "description",
    "version",
    "author",
    "created",
    "license",
    "requires",
];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutableMetadata {
    pub name: String,
    pub description: Option<String>,
    pub version: Option<String>,
    pub author: Option<String>,
    pub created: Option<String>,
    pub license: Option<String>,
    /// Host features the program needs, e.g. `network`
    pub requires: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedExecutable {
    pub metadata: ExecutableMetadata,
    /// Source after the header, trimmed
    pub body: String,
}

/// Parse the metadata header and split off the body.
pub fn parse_metadata(source: &str) -> Result<ParsedExecutable, ExeError> {
    let mut metadata = ExecutableMetadata::default();
    let mut name = None;
    let mut body_start = source.len();
    let mut offset = 0;
    let mut seen_content = false;

    for line in source.split_inclusive('\n') {
        let line_start = offset;
        offset += line.len();
        let trimmed = line.trim();

        if trimmed.is_empty() {
            continue;
        }
        if !seen_content && trimmed.starts_with("#!") {
            seen_content = true;
            continue;
        }
        seen_content = true;

        let Some(comment) = trimmed.strip_prefix("//") else {
            body_start = line_start;
            break;
        };
        let Some((key, value)) = parse_field(comment) else {
            continue;
        };
        let value = value.to_string();
        match key.as_str() {
            "name" => name = Some(value),
            "description" => metadata.description = Some(value),
            "version" => metadata.version = Some(value),
            "author" => metadata.author = Some(value),
            "created" => metadata.created = Some(value),
            "license" => metadata.license = Some(value),
            "requires" => {
                metadata.requires = value
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(ToString::to_string)
                    .collect();
            }
            _ => {}
        }
    }

    metadata.name = name
        .filter(|n| !n.is_empty())
        .ok_or_else(|| ExeError::MissingRequiredField("name".to_string()))?;

    Ok(ParsedExecutable {
        metadata,
        body: source[body_start..].trim().to_string(),
    })
}

/// `[@]key: value` with a known key, lower-cased.
fn parse_field(comment: &str) -> Option<(String, &str)> {
    let comment = comment.trim();
    let comment = comment.strip_prefix('@').unwrap_or(comment);
    let (key, value) = comment.split_once(':')?;
    let key = key.trim().to_ascii_lowercase();
    KNOWN_KEYS
        .contains(&key.as_str())
        .then_some((key, value.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const HELLO: &str = "#!/usr/bin/env trx\n\
        // @name: hello\n\
        // @description: Says hello\n\
        // Version: 1.2.0\n\
        // @requires: network, , storage\n\
        // just a note\n\
        // @homepage: ignored\n\
        \n\
        async function(t) {\n  t.writeln('hi');\n}\n";

    #[test]
    fn test_parses_header_and_body() {
        let parsed = parse_metadata(HELLO).unwrap();
        assert_eq!(parsed.metadata.name, "hello");
        assert_eq!(parsed.metadata.description.as_deref(), Some("Says hello"));
        assert_eq!(parsed.metadata.version.as_deref(), Some("1.2.0"));
        assert_eq!(parsed.metadata.requires, vec!["network", "storage"]);
        assert_eq!(parsed.metadata.author, None);
        assert_eq!(parsed.body, "async function(t) {\n  t.writeln('hi');\n}");
    }

    #[test]
    fn test_missing_name() {
        let err = parse_metadata("// @description: x\nasync function(t) {}").unwrap_err();
        assert_eq!(err, ExeError::MissingRequiredField("name".to_string()));
        assert_eq!(err.to_string(), "missing required field: name");
    }

    #[test]
    fn test_header_only() {
        let parsed = parse_metadata("// name: empty\n").unwrap();
        assert_eq!(parsed.body, "");
    }

    #[test]
    fn test_comments_after_body_start_are_body() {
        let parsed = parse_metadata("// name: a\ncode();\n// name: b\n").unwrap();
        assert_eq!(parsed.metadata.name, "a");
        assert_eq!(parsed.body, "code();\n// name: b");
    }

    #[test]
    fn test_value_may_contain_colon() {
        let parsed = parse_metadata("// name: x\n// created: 2024-01-01T10:00\n").unwrap();
        assert_eq!(parsed.metadata.created.as_deref(), Some("2024-01-01T10:00"));
    }
}
