// SPDX-FileCopyrightText: 2026 Volera Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./volera.toml` > `~/.config/volera/volera.toml` > `/etc/volera/volera.toml`
//! with environment variable overrides via the `VOLERA_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::VoleraConfig;

/// Top-level sections, used to turn `VOLERA_LLM_API_KEY` into `llm.api_key`.
const SECTIONS: &[&str] = &[
    "agent",
    "llm",
    "storage",
    "credits",
    "cache",
    "research",
    "search",
    "crawler",
    "store",
    "sync",
    "checkpoint",
    "gateway",
];

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/volera/volera.toml` (system-wide)
/// 3. `~/.config/volera/volera.toml` (user XDG config)
/// 4. `./volera.toml` (local directory)
/// 5. Well-known provider variables (`OPENROUTER_API_KEY`, `SERPER_API_KEY`, `APPWRITE_API_KEY`)
/// 6. `VOLERA_*` environment variables
pub fn load_config() -> Result<VoleraConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no files, no environment).
///
/// Used for testing and explicit configuration.
pub fn load_config_from_str(toml_content: &str) -> Result<VoleraConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(VoleraConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<VoleraConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(VoleraConfig::default()))
        .merge(Toml::file(path))
        .merge(well_known_env())
        .merge(env_provider())
        .extract()
}

/// Build the Figment used internally for config loading.
///
/// Returns the Figment before extraction so callers can inspect metadata.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(VoleraConfig::default()))
        .merge(Toml::file("/etc/volera/volera.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("volera/volera.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("volera.toml"))
        .merge(well_known_env())
        .merge(env_provider())
}

/// Maps a prefix-stripped, lowercased `VOLERA_*` key to its dotted config path.
///
/// Only the first underscore after a known section name becomes a dot, so
/// `credits_daily_limit` maps to `credits.daily_limit`, not `credits.daily.limit`.
/// `VOLERA_MODEL` is shorthand for `agent.default_model`.
pub fn map_env_key(key: &str) -> String {
    if key == "model" {
        return "agent.default_model".to_string();
    }
    for section in SECTIONS {
        if let Some(rest) = key.strip_prefix(section)
            && let Some(field) = rest.strip_prefix('_')
        {
            return format!("{section}.{field}");
        }
    }
    key.to_string()
}

/// Create the `VOLERA_` environment variable provider.
///
/// Uses `Env::map()` NOT `Env::split("_")`: field names contain underscores.
fn env_provider() -> Env {
    Env::prefixed("VOLERA_").map(|key| map_env_key(key.as_str()).into())
}

/// Unprefixed variables that provider SDKs conventionally read.
fn well_known_env() -> Env {
    Env::raw()
        .only(&["OPENROUTER_API_KEY", "SERPER_API_KEY", "APPWRITE_API_KEY"])
        .map(|key| match key.as_str() {
            "openrouter_api_key" => "llm.api_key".into(),
            "serper_api_key" => "search.api_key".into(),
            "appwrite_api_key" => "store.api_key".into(),
            other => other.to_string().into(),
        })
}
