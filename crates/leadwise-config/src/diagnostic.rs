// SPDX-FileCopyrightText: 2026 Leadwise Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Turns figment extraction failures into miette diagnostics.
//!
//! Unknown keys get a "did you mean" suggestion (Jaro-Winkler) and, when the
//! offending file is available, a labelled source span.

#![allow(unused_assignments)] // miette's Diagnostic derive triggers this lint

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

/// Similarity above which a valid key is offered as a correction.
const SUGGESTION_THRESHOLD: f64 = 0.8;

/// A configuration problem, rendered Elm-style by miette.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    /// A key that no config struct declares.
    #[error("unknown configuration key `{key}`")]
    #[diagnostic(
        code(leadwise::config::unknown_key),
        help("{}", unknown_key_help(suggestion.as_deref(), valid_keys))
    )]
    UnknownKey {
        /// Key as written in the file.
        key: String,
        /// Closest valid key, when one is near enough.
        suggestion: Option<String>,
        /// Comma-separated keys the section accepts.
        valid_keys: String,
        /// Location of the key in its file, when it could be found.
        #[label("not a recognized key")]
        span: Option<SourceSpan>,
        /// Contents of the file that declared the key.
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    /// A value of the wrong type.
    #[error("invalid type for `{key}`: {detail}")]
    #[diagnostic(code(leadwise::config::invalid_type), help("expected {expected}"))]
    InvalidType {
        /// Dotted path of the offending value, e.g. `scheduler.poll_interval_ms`.
        key: String,
        /// What was found instead.
        detail: String,
        /// Type the config struct declares.
        expected: String,
    },

    /// A required key that is absent.
    #[error("missing required key `{key}`")]
    #[diagnostic(
        code(leadwise::config::missing_key),
        help("add `{key} = <value>` to leadwise.toml")
    )]
    MissingKey {
        /// Dotted path of the absent key.
        key: String,
    },

    /// A semantic check that failed after deserialization.
    #[error("validation error: {message}")]
    #[diagnostic(code(leadwise::config::validation))]
    Validation {
        /// Which setting is wrong and why.
        message: String,
    },

    /// Anything else figment reports.
    #[error("configuration error: {0}")]
    #[diagnostic(code(leadwise::config::other))]
    Other(String),
}

fn unknown_key_help(suggestion: Option<&str>, valid_keys: &str) -> String {
    match suggestion {
        Some(s) => format!("did you mean `{s}`? valid keys: {valid_keys}"),
        None => format!("valid keys: {valid_keys}"),
    }
}

/// Converts every error carried by a `figment::Error` into a [`ConfigError`].
///
/// `sources` pairs file paths with their contents so unknown keys can be
/// pointed at.
pub fn figment_to_config_errors(
    err: figment::Error,
    sources: &[(String, String)],
) -> Vec<ConfigError> {
    use figment::error::Kind;

    err.into_iter()
        .map(|error| {
            let dotted = error
                .path
                .iter()
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(".");
            match &error.kind {
                Kind::UnknownField(field, expected) => {
                    let suggestion = suggest_key(field, &expected[..]);
                    let (span, src) = locate(&error, field, sources);
                    ConfigError::UnknownKey {
                        key: field.clone(),
                        suggestion,
                        valid_keys: expected.join(", "),
                        span,
                        src,
                    }
                }
                Kind::MissingField(field) => ConfigError::MissingKey {
                    key: field.to_string(),
                },
                Kind::InvalidType(actual, expected) => ConfigError::InvalidType {
                    key: dotted,
                    detail: format!("found {actual}"),
                    expected: expected.clone(),
                },
                _ => ConfigError::Other(error.to_string()),
            }
        })
        .collect()
}

/// Finds the file a figment error came from and the span of `field` in it.
fn locate(
    error: &figment::Error,
    field: &str,
    sources: &[(String, String)],
) -> (Option<SourceSpan>, Option<NamedSource<String>>) {
    let Some(figment::Source::File(path)) = error.metadata.as_ref().and_then(|m| m.source.as_ref())
    else {
        return (None, None);
    };
    let path = path.display().to_string();
    let Some((name, content)) = sources.iter().find(|(p, _)| *p == path) else {
        return (None, None);
    };

    match find_key_offset(content, &error.path, field) {
        Some(offset) => (
            Some(SourceSpan::new(offset.into(), field.len())),
            Some(NamedSource::new(name, content.clone())),
        ),
        None => (None, None),
    }
}

/// Byte offset of `field` as a key inside the `[section]` named by `path`.
///
/// Searches from the section header (or the file start for top-level keys)
/// for a line whose first token is `field`.
pub fn find_key_offset(content: &str, path: &[String], field: &str) -> Option<usize> {
    let start = match path.first() {
        Some(section) => {
            let header = format!("[{section}]");
            content.find(&header)? + header.len()
        }
        None => 0,
    };

    let mut offset = start;
    for line in content[start..].split_inclusive('\n') {
        let indent = line.len() - line.trim_start().len();
        let rest = &line[indent..];
        if let Some(after) = rest.strip_prefix(field)
            && after.trim_start().starts_with('=')
        {
            return Some(offset + indent);
        }
        offset += line.len();
    }
    None
}

/// Best valid key whose similarity to `unknown` clears the threshold.
pub fn suggest_key<S: AsRef<str>>(unknown: &str, valid_keys: &[S]) -> Option<String> {
    valid_keys
        .iter()
        .map(|k| (k.as_ref(), strsim::jaro_winkler(unknown, k.as_ref())))
        .filter(|(_, score)| *score > SUGGESTION_THRESHOLD)
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(k, _)| k.to_string())
}

/// Prints every error to stderr with miette's graphical handler.
pub fn render_errors(errors: &[ConfigError]) {
    let handler = miette::GraphicalReportHandler::new();
    for error in errors {
        let mut out = String::new();
        match handler.render_report(&mut out, error as &dyn Diagnostic) {
            Ok(()) => eprint!("{out}"),
            Err(_) => eprintln!("error: {error}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suggests_close_key() {
        let valid = ["negative_sentiment_threshold", "urgent_keywords", "store"];
        assert_eq!(
            suggest_key("urgent_keyword", &valid),
            Some("urgent_keywords".to_string())
        );
    }

    #[test]
    fn no_suggestion_for_unrelated_key() {
        let valid = ["poll_interval_ms", "batch_size"];
        assert_eq!(suggest_key("zzz", &valid), None);
    }

    #[test]
    fn finds_key_inside_its_section() {
        let content = "[service]\nname = \"a\"\n\n[scheduler]\nbatch_sise = 4\n";
        let offset = find_key_offset(content, &["scheduler".to_string()], "batch_sise").unwrap();
        assert_eq!(&content[offset..offset + 10], "batch_sise");
    }

    #[test]
    fn key_prefix_of_longer_key_is_not_matched() {
        let content = "[storage]\nwal_mode_extra = true\n";
        assert_eq!(
            find_key_offset(content, &["storage".to_string()], "wal_mode"),
            None
        );
    }
}
