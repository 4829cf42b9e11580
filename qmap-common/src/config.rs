//! Configuration loading and data folder resolution

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Optional TOML configuration file contents
///
/// All fields are optional; absent fields fall through to environment
/// variables or compiled defaults at the resolution sites.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Data folder holding the database and taxonomy document
    pub root_folder: Option<String>,
    /// Generation service API key
    pub groq_api_key: Option<String>,
    /// Generation service base URL override
    pub completion_base_url: Option<String>,
    /// Generation model name override
    pub completion_model: Option<String>,
    /// Taxonomy document path override
    pub taxonomy_path: Option<String>,
}

/// Data folder resolution priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. TOML config file
/// 4. OS-dependent compiled default (fallback)
pub fn resolve_data_folder(
    cli_arg: Option<&str>,
    env_var_name: &str,
    config_file_key: Option<&str>,
) -> Result<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Ok(PathBuf::from(path));
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        return Ok(PathBuf::from(path));
    }

    // Priority 3: TOML config file
    if config_file_key.is_some() {
        if let Ok(config_path) = locate_config_file() {
            if let Ok(config) = read_toml_config(&config_path) {
                if let Some(root_folder) = config.root_folder {
                    return Ok(PathBuf::from(root_folder));
                }
            }
        }
    }

    // Priority 4: OS-dependent compiled default
    Ok(get_default_data_folder())
}

/// Load the TOML configuration file, falling back to defaults when absent
///
/// Read failures on an existing file are reported; a missing file is not
/// an error.
pub fn load_toml_config() -> Result<TomlConfig> {
    match locate_config_file() {
        Ok(path) => read_toml_config(&path),
        Err(_) => Ok(TomlConfig::default()),
    }
}

/// Read and parse a TOML configuration file at a known path
pub fn read_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))
}

/// Get the configuration file path for the platform
fn locate_config_file() -> Result<PathBuf> {
    let config_path = if cfg!(target_os = "linux") {
        // Try ~/.config/qmap/config.toml first, then /etc/qmap/config.toml
        let user_config = dirs::config_dir().map(|d| d.join("qmap").join("config.toml"));
        let system_config = PathBuf::from("/etc/qmap/config.toml");

        if let Some(path) = user_config {
            if path.exists() {
                return Ok(path);
            }
        }
        if system_config.exists() {
            return Ok(system_config);
        }
        return Err(Error::Config("No config file found".to_string()));
    } else {
        dirs::config_dir()
            .map(|d| d.join("qmap").join("config.toml"))
            .ok_or_else(|| Error::Config("Could not determine config directory".to_string()))?
    };

    if config_path.exists() {
        Ok(config_path)
    } else {
        Err(Error::Config(format!(
            "Config file not found: {:?}",
            config_path
        )))
    }
}

/// Get OS-dependent default data folder path
fn get_default_data_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/qmap (or /var/lib/qmap for system-wide)
        dirs::data_local_dir()
            .map(|d| d.join("qmap"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/qmap"))
    } else if cfg!(target_os = "macos") {
        // ~/Library/Application Support/qmap
        dirs::data_dir()
            .map(|d| d.join("qmap"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/qmap"))
    } else if cfg!(target_os = "windows") {
        // %LOCALAPPDATA%\qmap
        dirs::data_local_dir()
            .map(|d| d.join("qmap"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\qmap"))
    } else {
        PathBuf::from("./qmap_data")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_argument_wins() {
        let folder = resolve_data_folder(
            Some("/tmp/qmap-cli"),
            "QMAP_TEST_UNSET_VAR",
            Some("root_folder"),
        )
        .unwrap();
        assert_eq!(folder, PathBuf::from("/tmp/qmap-cli"));
    }

    #[test]
    fn test_falls_through_to_default() {
        // Environment variable name chosen to never exist
        let folder =
            resolve_data_folder(None, "QMAP_TEST_UNSET_VAR_FOR_DEFAULT", None).unwrap();
        assert!(!folder.as_os_str().is_empty());
    }

    #[test]
    fn test_toml_config_parses_partial() {
        let config: TomlConfig = toml::from_str(
            r#"
            groq_api_key = "gsk_test"
            completion_model = "llama-3.3-70b-versatile"
            "#,
        )
        .unwrap();

        assert_eq!(config.groq_api_key.as_deref(), Some("gsk_test"));
        assert_eq!(
            config.completion_model.as_deref(),
            Some("llama-3.3-70b-versatile")
        );
        assert!(config.root_folder.is_none());
        assert!(config.taxonomy_path.is_none());
    }

    #[test]
    fn test_read_toml_config_missing_file() {
        let result = read_toml_config(Path::new("/nonexistent/qmap/config.toml"));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_read_toml_config_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "root_folder = \"/data/qmap\"\n").unwrap();

        let config = read_toml_config(&path).unwrap();
        assert_eq!(config.root_folder.as_deref(), Some("/data/qmap"));
    }

    #[test]
    fn test_read_toml_config_rejects_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "root_folder = [not toml").unwrap();

        assert!(matches!(read_toml_config(&path), Err(Error::Config(_))));
    }
}
