// SPDX-FileCopyrightText: 2026 Leadwise Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Figment-based layered loading.
//!
//! Merge order, later wins: compiled defaults, `/etc/leadwise/leadwise.toml`,
//! `$XDG_CONFIG_HOME/leadwise/leadwise.toml`, `./leadwise.toml`, `LEADWISE_*`
//! environment variables.

#![allow(clippy::result_large_err)] // figment::Error is external

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::LeadwiseConfig;

/// Config sections addressable from `LEADWISE_<SECTION>_<KEY>` variables.
const ENV_SECTIONS: &[&str] = &[
    "service",
    "storage",
    "whatsapp",
    "classifier",
    "scoring",
    "escalation",
    "scheduler",
    "notification",
    "processor",
];

/// Candidate config files, lowest precedence first.
pub fn config_file_candidates() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from("/etc/leadwise/leadwise.toml")];
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("leadwise").join("leadwise.toml"));
    }
    paths.push(PathBuf::from("leadwise.toml"));
    paths
}

/// Builds the standard figment (files plus env) without extracting it.
pub fn build_figment() -> Figment {
    let mut figment = Figment::new().merge(Serialized::defaults(LeadwiseConfig::default()));
    for path in config_file_candidates() {
        figment = figment.merge(Toml::file(path));
    }
    figment.merge(env_provider())
}

/// Loads configuration from the standard file hierarchy with env overrides.
pub fn load_config() -> Result<LeadwiseConfig, figment::Error> {
    build_figment().extract()
}

/// Loads configuration from an explicit file, still honouring env overrides.
pub fn load_config_from_path(path: &Path) -> Result<LeadwiseConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(LeadwiseConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Loads configuration from a TOML string over the defaults only.
pub fn load_config_from_str(toml_content: &str) -> Result<LeadwiseConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(LeadwiseConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Maps `LEADWISE_ESCALATION_NEGATIVE_MESSAGE_THRESHOLD` to
/// `escalation.negative_message_threshold`.
///
/// Only the first underscore after a known section name becomes a dot, so
/// keys that themselves contain underscores stay intact.
fn env_provider() -> Env {
    Env::prefixed("LEADWISE_").map(|key| {
        let raw = key.as_str().to_ascii_lowercase();
        for section in ENV_SECTIONS {
            if let Some(rest) = raw
                .strip_prefix(section)
                .and_then(|r| r.strip_prefix('_'))
            {
                return format!("{section}.{rest}").into();
            }
        }
        raw.into()
    })
}
