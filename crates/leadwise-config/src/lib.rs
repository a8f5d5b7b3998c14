// SPDX-FileCopyrightText: 2026 Leadwise Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration for the Leadwise automation engine.
//!
//! TOML files layered through figment with `LEADWISE_*` environment
//! overrides, strict `deny_unknown_fields` parsing, semantic validation, and
//! miette diagnostics with typo suggestions.
//!
//! ```no_run
//! let config = leadwise_config::load_and_validate().expect("config errors");
//! println!("poll every {} ms", config.scheduler.poll_interval_ms);
//! ```

pub mod diagnostic;
pub mod loader;
pub mod model;
pub mod validation;

pub use diagnostic::{ConfigError, render_errors};
pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::LeadwiseConfig;

/// Loads configuration from the standard hierarchy and validates it.
pub fn load_and_validate() -> Result<LeadwiseConfig, Vec<ConfigError>> {
    finish(loader::load_config(), read_sources(&loader::config_file_candidates()))
}

/// Loads configuration from one explicit file and validates it.
pub fn load_and_validate_path(path: &std::path::Path) -> Result<LeadwiseConfig, Vec<ConfigError>> {
    finish(
        loader::load_config_from_path(path),
        read_sources(&[path.to_path_buf()]),
    )
}

/// Loads configuration from a TOML string and validates it.
pub fn load_and_validate_str(toml_content: &str) -> Result<LeadwiseConfig, Vec<ConfigError>> {
    finish(
        loader::load_config_from_str(toml_content),
        vec![("<inline>".to_string(), toml_content.to_string())],
    )
}

fn finish(
    loaded: Result<LeadwiseConfig, figment::Error>,
    sources: Vec<(String, String)>,
) -> Result<LeadwiseConfig, Vec<ConfigError>> {
    match loaded {
        Ok(config) => {
            validation::validate_config(&config)?;
            Ok(config)
        }
        Err(err) => Err(diagnostic::figment_to_config_errors(err, &sources)),
    }
}

/// Reads whichever candidate files exist, keyed by the path figment reports.
fn read_sources(paths: &[std::path::PathBuf]) -> Vec<(String, String)> {
    paths
        .iter()
        .filter_map(|path| {
            let content = std::fs::read_to_string(path).ok()?;
            let display = std::fs::canonicalize(path)
                .unwrap_or_else(|_| path.clone())
                .display()
                .to_string();
            Some((display, content))
        })
        .collect()
}
