//! Configuration loading and root folder resolution

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// TOML configuration file contents (`~/.config/medley/medley.toml`)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    /// Data directory holding medley.db
    pub root_folder: Option<String>,
    /// Days an instance completion keeps an item on the dashboard
    /// recently-finished list
    pub recently_finished_window_days: Option<i64>,
    /// Days a member completion keeps a series' displayed status forced to
    /// in-progress
    pub series_activity_window_days: Option<i64>,
    /// TMDB API key (movies / TV search)
    pub tmdb_api_key: Option<String>,
    /// IGDB (Twitch) OAuth client credentials (game search)
    pub igdb_client_id: Option<String>,
    pub igdb_client_secret: Option<String>,
    /// Hardcover API token (book search)
    pub hardcover_api_token: Option<String>,
}

/// Default window for both the dashboard recently-finished list and the
/// series activity override. The two are configured independently; they
/// just happen to share a default.
pub const DEFAULT_WINDOW_DAYS: i64 = 30;

/// Root folder resolution priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. TOML config file
/// 4. OS-dependent compiled default (fallback)
pub fn resolve_root_folder(cli_arg: Option<&str>, env_var_name: &str) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return PathBuf::from(path);
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        return PathBuf::from(path);
    }

    // Priority 3: TOML config file
    if let Ok(config) = load_toml_config() {
        if let Some(root_folder) = config.root_folder {
            return PathBuf::from(root_folder);
        }
    }

    // Priority 4: OS-dependent compiled default
    default_root_folder()
}

/// Load the TOML config from the platform config directory
pub fn load_toml_config() -> Result<TomlConfig> {
    let path = toml_config_path()?;
    if !path.exists() {
        return Err(Error::Config(format!("Config file not found: {:?}", path)));
    }
    let content = std::fs::read_to_string(&path)
        .map_err(|e| Error::Config(format!("Read TOML failed: {}", e)))?;
    toml::from_str(&content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
}

/// Write the TOML config back to disk (best-effort backup of settings)
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content)?;
    Ok(())
}

/// Path of the user-level config file
pub fn toml_config_path() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|d| d.join("medley").join("medley.toml"))
        .ok_or_else(|| Error::Config("Could not determine config directory".to_string()))
}

/// Get OS-dependent default root folder path
fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/medley (or /var/lib/medley for system-wide)
        dirs::data_local_dir()
            .map(|d| d.join("medley"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/medley"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("medley"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/medley"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("medley"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\medley"))
    } else {
        PathBuf::from("./medley_data")
    }
}

/// Database file path inside the root folder
pub fn database_path(root_folder: &Path) -> PathBuf {
    root_folder.join("medley.db")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_arg_wins() {
        let path = resolve_root_folder(Some("/tmp/medley-test"), "MEDLEY_TEST_UNSET_VAR");
        assert_eq!(path, PathBuf::from("/tmp/medley-test"));
    }

    #[test]
    fn test_toml_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("medley.toml");
        let config = TomlConfig {
            root_folder: Some("/data/medley".to_string()),
            recently_finished_window_days: Some(14),
            ..Default::default()
        };
        write_toml_config(&config, &path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let loaded: TomlConfig = toml::from_str(&content).unwrap();
        assert_eq!(loaded.root_folder.as_deref(), Some("/data/medley"));
        assert_eq!(loaded.recently_finished_window_days, Some(14));
        assert_eq!(loaded.series_activity_window_days, None);
    }
}
