//! Configuration loading from disk.
//!
//! The route file is line oriented:
//!
//! ```text
//! # comment
//! keys = Launchkey MK3
//! synth = MicroFreak
//! keys -> synth, drums
//! ```
//!
//! Parsing is a single pass; a route may only name a source that was defined
//! on an earlier line.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use serde::Serialize;
use thiserror::Error;

use crate::config::schema::{Definition, RouteConfig, RouterSettings};
use crate::config::validation::{validate_settings, ValidationError};

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            ConfigError::Parse(e) => Some(e),
            ConfigError::Validation(_) => None,
        }
    }
}

/// A recovered problem in the route file. The offending line is skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConfigWarning {
    #[error("line {line}: malformed entry {text:?}")]
    MalformedLine { line: usize, text: String },

    #[error("line {line}: duplicate definition of '{id}' ignored (first defined on line {first_line})")]
    DuplicateDefinition {
        line: usize,
        id: String,
        first_line: usize,
    },

    #[error("line {line}: route source '{id}' is not defined, route dropped")]
    UndefinedSource { line: usize, id: String },
}

impl ConfigWarning {
    /// 1-based line number the warning refers to.
    pub fn line(&self) -> usize {
        match self {
            ConfigWarning::MalformedLine { line, .. }
            | ConfigWarning::DuplicateDefinition { line, .. }
            | ConfigWarning::UndefinedSource { line, .. } => *line,
        }
    }
}

fn is_valid_id(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

enum Line<'a> {
    Definition { id: &'a str, match_key: &'a str },
    Route { source: &'a str, destinations: Vec<&'a str> },
}

fn parse_line(line: &str) -> Option<Line<'_>> {
    // A match key may contain "->"; the id check on the left side keeps
    // such definitions out of the route branch.
    if let Some((source, rest)) = line.split_once("->") {
        let source = source.trim();
        if is_valid_id(source) {
            let destinations: Vec<&str> = rest.split(',').map(str::trim).collect();
            if destinations.iter().all(|d| is_valid_id(d)) {
                return Some(Line::Route {
                    source,
                    destinations,
                });
            }
            return None;
        }
    }

    let (id, match_key) = line.split_once('=')?;
    let id = id.trim();
    let match_key = match_key.trim();
    if is_valid_id(id) && !match_key.is_empty() {
        Some(Line::Definition { id, match_key })
    } else {
        None
    }
}

/// Parse route file text.
///
/// Never fails: every problem becomes a [`ConfigWarning`] and the line is
/// skipped. Identical input always yields an identical result.
pub fn parse_routes(content: &str) -> RouteConfig {
    let mut config = RouteConfig::default();
    let mut first_lines: Vec<usize> = Vec::new();

    for (index, raw) in content.lines().enumerate() {
        let line_no = index + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        match parse_line(line) {
            Some(Line::Definition { id, match_key }) => {
                if let Some(pos) = config.definitions.iter().position(|d| d.id == id) {
                    config.warnings.push(ConfigWarning::DuplicateDefinition {
                        line: line_no,
                        id: id.to_string(),
                        first_line: first_lines[pos],
                    });
                    continue;
                }
                config.definitions.push(Definition {
                    id: id.to_string(),
                    match_key: match_key.to_string(),
                });
                first_lines.push(line_no);
            }
            Some(Line::Route {
                source,
                destinations,
            }) => {
                if config.definition(source).is_none() {
                    config.warnings.push(ConfigWarning::UndefinedSource {
                        line: line_no,
                        id: source.to_string(),
                    });
                    continue;
                }
                let unique: BTreeSet<String> =
                    destinations.into_iter().map(str::to_string).collect();
                config.routes.insert(source, unique);
            }
            None => {
                config.warnings.push(ConfigWarning::MalformedLine {
                    line: line_no,
                    text: line.to_string(),
                });
            }
        }
    }

    config
}

/// Load the route file. A missing or unreadable file is fatal; everything
/// else is logged and recovered.
pub fn load_routes(path: &Path) -> Result<RouteConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    let config = parse_routes(&content);

    for warning in &config.warnings {
        tracing::warn!(path = %path.display(), line = warning.line(), "{}", warning);
    }

    tracing::info!(
        path = %path.display(),
        definitions = config.definitions.len(),
        routes = config.routes.len(),
        warnings = config.warnings.len(),
        "Route file loaded"
    );

    Ok(config)
}

/// Load and validate operational settings from a TOML file.
pub fn load_settings(path: &Path) -> Result<RouterSettings, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    let settings: RouterSettings = toml::from_str(&content).map_err(ConfigError::Parse)?;

    validate_settings(&settings).map_err(ConfigError::Validation)?;

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn set(ids: &[&str]) -> BTreeSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_simple_route() {
        let config = parse_routes("A = x\nB = y\nA -> B\n");

        assert_eq!(config.routes.destinations("A"), Some(&set(&["B"])));
        assert!(config.routes.destinations("B").is_none());
        assert!(config.warnings.is_empty());
    }

    #[test]
    fn test_duplicate_definition_first_wins() {
        let config = parse_routes("A = x\nA = z\n");

        assert_eq!(config.definition("A").unwrap().match_key, "x");
        assert_eq!(config.definitions.len(), 1);
        assert_eq!(
            config.warnings,
            vec![ConfigWarning::DuplicateDefinition {
                line: 2,
                id: "A".into(),
                first_line: 1,
            }]
        );
    }

    #[test]
    fn test_undefined_source_dropped() {
        let config = parse_routes("A -> B\n");

        assert!(config.routes.destinations("A").is_none());
        assert!(config.routes.is_empty());
        assert_eq!(
            config.warnings,
            vec![ConfigWarning::UndefinedSource {
                line: 1,
                id: "A".into()
            }]
        );
    }

    #[test]
    fn test_source_must_be_defined_before_route() {
        let config = parse_routes("A -> B\nA = x\n");
        assert!(config.routes.is_empty());
        assert_eq!(config.warnings.len(), 1);
        assert!(config.definition("A").is_some());
    }

    #[test]
    fn test_destinations_not_validated() {
        let config = parse_routes("A = x\nA -> Nowhere\n");
        assert_eq!(config.routes.destinations("A"), Some(&set(&["Nowhere"])));
        assert!(config.warnings.is_empty());
    }

    #[test]
    fn test_multiple_lines_and_duplicates_merge() {
        let config = parse_routes("A = x\nA -> B, C\nA -> B\nA->C,D\n");
        assert_eq!(config.routes.destinations("A"), Some(&set(&["B", "C", "D"])));
    }

    #[test]
    fn test_comments_and_blank_lines() {
        let config = parse_routes("# header\n\n   \n  # indented comment\nA = x\n");
        assert_eq!(config.definitions.len(), 1);
        assert!(config.warnings.is_empty());
    }

    #[test]
    fn test_match_key_keeps_inner_spaces() {
        let config = parse_routes("keys =  Launchkey MK3 MIDI 1  \n");
        assert_eq!(config.definition("keys").unwrap().match_key, "Launchkey MK3 MIDI 1");
    }

    #[test]
    fn test_numeric_ids() {
        let config = parse_routes("20_0 = Midi Through:0\n24_0 = Keystation\n24_0 -> 20_0\n");
        assert_eq!(config.routes.destinations("24_0"), Some(&set(&["20_0"])));
    }

    #[test]
    fn test_malformed_lines() {
        let config = parse_routes("A = x\nnot a line\nA -> \nA -> B,\nbad-id = x\nC =\n");

        let lines: Vec<usize> = config.warnings.iter().map(|w| w.line()).collect();
        assert_eq!(lines, vec![2, 3, 4, 5, 6]);
        assert!(config
            .warnings
            .iter()
            .all(|w| matches!(w, ConfigWarning::MalformedLine { .. })));
        assert!(config.routes.is_empty());
    }

    #[test]
    fn test_parsing_is_deterministic() {
        let text = "A = x\nB = y\nC = z\nA -> C, B\nB -> A\nA = dup\nX -> A\n";
        assert_eq!(parse_routes(text), parse_routes(text));
    }

    #[test]
    fn test_missing_file_is_fatal() {
        let err = load_routes(Path::new("/nonexistent/midi_routes.txt")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
