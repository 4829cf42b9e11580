//! Configuration resolution for qmap-ts
//!
//! Provides ENV → TOML priority for the completion API key, plus
//! completion endpoint and taxonomy path resolution.

use qmap_common::config::TomlConfig;
use qmap_common::{Error, Result};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::services::completion_client::{DEFAULT_BASE_URL, DEFAULT_MODEL};

/// Environment variable carrying the completion API key
pub const API_KEY_ENV: &str = "QMAP_GROQ_API_KEY";

/// Taxonomy document filename looked up inside the data folder
pub const TAXONOMY_FILENAME: &str = "MASTER_TAXONOMY.json";

/// Resolve the completion API key from 2-tier configuration
///
/// **Priority:** ENV → TOML
pub fn resolve_api_key(toml_config: &TomlConfig) -> Result<String> {
    let mut sources = Vec::new();

    // Tier 1: Environment variable
    let env_key = std::env::var(API_KEY_ENV).ok();
    if let Some(key) = &env_key {
        if is_valid_key(key) {
            sources.push("environment");
        }
    }

    // Tier 2: TOML config
    let toml_key = toml_config.groq_api_key.as_ref();
    if let Some(key) = toml_key {
        if is_valid_key(key) {
            sources.push("TOML");
        }
    }

    // Warn if multiple sources (potential misconfiguration)
    if sources.len() > 1 {
        warn!(
            "Completion API key found in multiple sources: {}. Using environment (highest priority).",
            sources.join(", ")
        );
    }

    // Resolution priority
    if let Some(key) = env_key {
        if is_valid_key(&key) {
            info!("Completion API key loaded from environment variable");
            return Ok(key);
        }
    }

    if let Some(key) = toml_key {
        if is_valid_key(key) {
            info!("Completion API key loaded from TOML config");
            return Ok(key.clone());
        }
    }

    // No valid key found
    Err(Error::Config(
        "Completion API key not configured. Please configure using one of:\n\
         1. Environment: QMAP_GROQ_API_KEY=your-key-here\n\
         2. TOML config: ~/.config/qmap/config.toml (groq_api_key = \"your-key\")\n\
         \n\
         Obtain API key at: https://console.groq.com/keys"
            .to_string(),
    ))
}

/// Validate API key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

/// Completion endpoint settings after TOML overrides
#[derive(Debug, Clone)]
pub struct CompletionSettings {
    pub base_url: String,
    pub model: String,
}

/// Resolve completion endpoint settings
///
/// TOML overrides apply per field; everything else keeps the compiled
/// defaults.
pub fn resolve_completion_settings(toml_config: &TomlConfig) -> CompletionSettings {
    CompletionSettings {
        base_url: toml_config
            .completion_base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        model: toml_config
            .completion_model
            .clone()
            .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
    }
}

/// Resolve the taxonomy document path
///
/// **Priority:** CLI argument → TOML config → `<data folder>/MASTER_TAXONOMY.json`
pub fn resolve_taxonomy_path(
    cli_arg: Option<&str>,
    toml_config: &TomlConfig,
    data_folder: &Path,
) -> PathBuf {
    if let Some(path) = cli_arg {
        return PathBuf::from(path);
    }

    if let Some(path) = &toml_config.taxonomy_path {
        return PathBuf::from(path);
    }

    data_folder.join(TAXONOMY_FILENAME)
}
