//! Configuration management for gini-census.
//!
//! `Settings` holds the resolved values the pipeline runs with. `Config` is
//! the optional on-disk file (`gini.toml`, `gini.json` or `gini.yaml`) whose
//! fields override the defaults. Environment variables override both.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Directory listing that holds the 1991 census Gini index archives.
pub const DEFAULT_BASE_URL: &str =
    "https://ftp.ibge.gov.br/Censos/Censo_Demografico_1991/Indice_de_Gini";

/// Default database filename.
pub const DEFAULT_DATABASE_FILENAME: &str = "gini.db";

/// Token the source spreadsheets use for a missing index value.
pub const DEFAULT_MISSING_VALUE_TOKEN: &str = "...";

const DOWNLOAD_SUBDIR: &str = "zipfiles";
const EXTRACT_SUBDIR: &str = "extracted";
const CONFIG_BASENAME: &str = "gini";
const CONFIG_EXTENSIONS: &[&str] = &["toml", "json", "yaml", "yml"];

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

/// Application settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Listing page the archives are published under.
    pub base_url: String,
    /// Base data directory.
    pub data_dir: PathBuf,
    /// Where downloaded archives are written.
    pub download_dir: PathBuf,
    /// Where archive contents are unpacked.
    pub extract_dir: PathBuf,
    /// SQLite database file.
    pub database_path: PathBuf,
    /// User agent for HTTP requests.
    pub user_agent: String,
    /// Request timeout in seconds. None means requests never time out.
    pub request_timeout: Option<u64>,
    /// Cell text that marks a missing index value.
    pub missing_value_token: String,
    /// Leading rows of every sheet to skip before the country row.
    pub header_rows: usize,
}

impl Default for Settings {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("gini-census");
        Self::with_data_dir(data_dir)
    }
}

impl Settings {
    /// Create settings rooted at a custom data directory.
    pub fn with_data_dir(data_dir: PathBuf) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            download_dir: data_dir.join(DOWNLOAD_SUBDIR),
            extract_dir: data_dir.join(EXTRACT_SUBDIR),
            database_path: data_dir.join(DEFAULT_DATABASE_FILENAME),
            data_dir,
            user_agent: format!("gini-census/{}", env!("CARGO_PKG_VERSION")),
            request_timeout: None,
            missing_value_token: DEFAULT_MISSING_VALUE_TOKEN.to_string(),
            header_rows: 0,
        }
    }

    /// Move the data directory, resetting the layout beneath it.
    fn rehome(&mut self, data_dir: PathBuf) {
        let rooted = Self::with_data_dir(data_dir);
        self.download_dir = rooted.download_dir;
        self.extract_dir = rooted.extract_dir;
        self.database_path = rooted.database_path;
        self.data_dir = rooted.data_dir;
    }

    /// Request timeout as a duration, if one is configured.
    pub fn timeout(&self) -> Option<Duration> {
        self.request_timeout.map(Duration::from_secs)
    }

    /// Ensure all directories exist.
    pub fn ensure_directories(&self) -> std::io::Result<()> {
        for (label, dir) in [
            ("data", &self.data_dir),
            ("download", &self.download_dir),
            ("extraction", &self.extract_dir),
        ] {
            tracing::debug!("Ensuring {} directory {}", label, dir.display());
            fs::create_dir_all(dir).map_err(|e| {
                std::io::Error::new(
                    e.kind(),
                    format!(
                        "Failed to create {} directory '{}': {}",
                        label,
                        dir.display(),
                        e
                    ),
                )
            })?;
        }
        if let Some(parent) = self.database_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        Ok(())
    }
}

/// Configuration file structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Listing page URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Data directory path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<String>,
    /// Archive download directory (defaults to `<data_dir>/zipfiles`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_dir: Option<String>,
    /// Extraction directory (defaults to `<data_dir>/extracted`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extract_dir: Option<String>,
    /// Database file, relative to the data directory unless absolute.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    /// User agent string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    /// Request timeout in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout: Option<u64>,
    /// Missing index value placeholder.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub missing_value_token: Option<String>,
    /// Leading rows to skip in every sheet.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header_rows: Option<usize>,
    /// Path to the config file this was loaded from (not serialized).
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from a specific file path.
    /// Supports TOML, YAML and JSON based on file extension.
    pub async fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents =
            tokio::fs::read_to_string(path)
                .await
                .map_err(|source| ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");
        let mut config = Self::parse(&contents, ext).map_err(|message| ConfigError::Parse {
            path: path.to_path_buf(),
            message,
        })?;
        config.source_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Parse config text in the format named by `ext`.
    pub fn parse(contents: &str, ext: &str) -> Result<Self, String> {
        match ext {
            "json" => serde_json::from_str(contents).map_err(|e| e.to_string()),
            "yaml" | "yml" => serde_yaml::from_str(contents).map_err(|e| e.to_string()),
            _ => toml::from_str(contents).map_err(|e| e.to_string()),
        }
    }

    /// Get the base directory for resolving relative paths.
    pub fn base_dir(&self) -> Option<PathBuf> {
        self.source_path
            .as_ref()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
    }

    /// Resolve a path that may be relative to the config file.
    /// - Absolute paths are returned as-is
    /// - Paths starting with ~ are expanded
    /// - Relative paths are resolved against `base_dir`
    pub fn resolve_path(&self, path_str: &str, base_dir: &Path) -> PathBuf {
        let expanded = shellexpand::tilde(path_str);
        let path = Path::new(expanded.as_ref());

        if path.is_absolute() {
            path.to_path_buf()
        } else {
            base_dir.join(path)
        }
    }

    /// Apply configuration to settings.
    pub fn apply_to_settings(&self, settings: &mut Settings, base_dir: &Path) {
        if let Some(ref data_dir) = self.data_dir {
            settings.rehome(self.resolve_path(data_dir, base_dir));
        }
        self.apply_path_overrides(settings, base_dir);
        if let Some(ref url) = self.base_url {
            settings.base_url = url.clone();
        }
        if let Some(ref user_agent) = self.user_agent {
            settings.user_agent = user_agent.clone();
        }
        if let Some(timeout) = self.request_timeout {
            settings.request_timeout = Some(timeout);
        }
        if let Some(ref token) = self.missing_value_token {
            settings.missing_value_token = token.clone();
        }
        if let Some(rows) = self.header_rows {
            settings.header_rows = rows;
        }
    }

    /// Apply the explicit download, extraction and database locations.
    /// The database path is resolved against the current data directory.
    fn apply_path_overrides(&self, settings: &mut Settings, base_dir: &Path) {
        if let Some(ref dir) = self.download_dir {
            settings.download_dir = self.resolve_path(dir, base_dir);
        }
        if let Some(ref dir) = self.extract_dir {
            settings.extract_dir = self.resolve_path(dir, base_dir);
        }
        if let Some(ref database) = self.database {
            let data_dir = settings.data_dir.clone();
            settings.database_path = self.resolve_path(database, &data_dir);
        }
    }

    /// Apply `GINI_*` environment overrides read through `lookup`.
    ///
    /// `GINI_DATA_DIR` (relative to `cwd`) moves the data directory, but the
    /// file's explicit download, extraction and database locations still
    /// take precedence over the layout derived from it. `GINI_DATABASE`
    /// overrides every other database setting.
    fn apply_env_overrides(
        &self,
        settings: &mut Settings,
        base_dir: &Path,
        cwd: &Path,
        lookup: impl Fn(&str) -> Option<String>,
    ) {
        if let Some(data_dir) = lookup("GINI_DATA_DIR") {
            tracing::debug!("Using GINI_DATA_DIR from environment: {}", data_dir);
            settings.rehome(self.resolve_path(&data_dir, cwd));
            self.apply_path_overrides(settings, base_dir);
        }
        if let Some(database) = lookup("GINI_DATABASE") {
            tracing::debug!("Using GINI_DATABASE from environment: {}", database);
            settings.database_path = self.resolve_path(&database, cwd);
        }
        if let Some(url) = lookup("GINI_BASE_URL") {
            tracing::debug!("Using GINI_BASE_URL from environment: {}", url);
            settings.base_url = url;
        }
    }
}

/// Options for loading settings.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Explicit config file path (overrides auto-discovery).
    pub config_path: Option<PathBuf>,
    /// Use CWD for relative paths instead of config file directory.
    pub use_cwd: bool,
}

/// Look for `gini.{ext}` inside a directory.
fn find_config_in(dir: &Path) -> Option<PathBuf> {
    CONFIG_EXTENSIONS
        .iter()
        .map(|ext| dir.join(format!("{}.{}", CONFIG_BASENAME, ext)))
        .find(|path| path.is_file())
}

/// Discover a config file: working directory first, then the user config dir.
fn discover_config_path() -> Option<PathBuf> {
    let cwd = std::env::current_dir().ok();
    cwd.as_deref()
        .and_then(find_config_in)
        .or_else(|| dirs::config_dir().and_then(|d| find_config_in(&d.join("gini-census"))))
}

fn env_override(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}

/// Load settings with explicit options.
/// Returns (Settings, Config) tuple.
pub async fn load_settings_with_options(
    options: LoadOptions,
) -> Result<(Settings, Config), ConfigError> {
    let config = match options.config_path.or_else(discover_config_path) {
        Some(path) => {
            tracing::debug!("Loading config from {}", path.display());
            Config::load_from_path(&path).await?
        }
        None => Config::default(),
    };

    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let base_dir = if options.use_cwd {
        cwd.clone()
    } else {
        config.base_dir().unwrap_or_else(|| cwd.clone())
    };

    let mut settings = Settings::default();
    config.apply_to_settings(&mut settings, &base_dir);

    // Environment variables take highest precedence
    config.apply_env_overrides(&mut settings, &base_dir, &cwd, env_override);

    Ok((settings, config))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_layout_under_data_dir() {
        let settings = Settings::with_data_dir(PathBuf::from("/data"));
        assert_eq!(settings.download_dir, PathBuf::from("/data/zipfiles"));
        assert_eq!(settings.extract_dir, PathBuf::from("/data/extracted"));
        assert_eq!(settings.database_path, PathBuf::from("/data/gini.db"));
        assert_eq!(settings.missing_value_token, "...");
        assert!(settings.timeout().is_none());
    }

    #[test]
    fn test_parse_toml() {
        let config = Config::parse(
            r#"
            base_url = "http://localhost:8080/gini"
            data_dir = "store"
            request_timeout = 30
            header_rows = 2
            "#,
            "toml",
        )
        .unwrap();
        assert_eq!(config.base_url.as_deref(), Some("http://localhost:8080/gini"));
        assert_eq!(config.data_dir.as_deref(), Some("store"));
        assert_eq!(config.request_timeout, Some(30));
        assert_eq!(config.header_rows, Some(2));
    }

    #[test]
    fn test_parse_json_and_yaml() {
        let json = Config::parse(r#"{"database": "other.db"}"#, "json").unwrap();
        assert_eq!(json.database.as_deref(), Some("other.db"));

        let yaml = Config::parse("missing_value_token: \"-\"\n", "yaml").unwrap();
        assert_eq!(yaml.missing_value_token.as_deref(), Some("-"));
    }

    #[test]
    fn test_parse_rejects_unknown_types() {
        assert!(Config::parse("request_timeout = \"soon\"", "toml").is_err());
    }

    #[test]
    fn test_apply_resolves_relative_paths() {
        let config = Config {
            data_dir: Some("store".to_string()),
            extract_dir: Some("/tmp/unpacked".to_string()),
            database: Some("census.db".to_string()),
            ..Default::default()
        };
        let mut settings = Settings::default();
        config.apply_to_settings(&mut settings, Path::new("/etc/gini"));

        assert_eq!(settings.data_dir, PathBuf::from("/etc/gini/store"));
        assert_eq!(settings.download_dir, PathBuf::from("/etc/gini/store/zipfiles"));
        assert_eq!(settings.extract_dir, PathBuf::from("/tmp/unpacked"));
        assert_eq!(settings.database_path, PathBuf::from("/etc/gini/store/census.db"));
    }

    fn env(vars: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        move |name: &str| {
            vars.iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| value.to_string())
        }
    }

    #[test]
    fn test_env_data_dir_keeps_file_locations() {
        let config = Config {
            extract_dir: Some("unpacked".to_string()),
            database: Some("census.db".to_string()),
            ..Default::default()
        };
        let base_dir = Path::new("/etc/gini");
        let mut settings = Settings::default();
        config.apply_to_settings(&mut settings, base_dir);
        config.apply_env_overrides(
            &mut settings,
            base_dir,
            Path::new("/work"),
            env(&[("GINI_DATA_DIR", "env-data")]),
        );

        assert_eq!(settings.data_dir, PathBuf::from("/work/env-data"));
        assert_eq!(settings.download_dir, PathBuf::from("/work/env-data/zipfiles"));
        assert_eq!(settings.extract_dir, PathBuf::from("/etc/gini/unpacked"));
        assert_eq!(settings.database_path, PathBuf::from("/work/env-data/census.db"));
    }

    #[test]
    fn test_env_database_and_url_win() {
        let config = Config {
            base_url: Some("http://file.example/gini".to_string()),
            database: Some("census.db".to_string()),
            ..Default::default()
        };
        let mut settings = Settings::with_data_dir(PathBuf::from("/data"));
        config.apply_to_settings(&mut settings, Path::new("/etc/gini"));
        config.apply_env_overrides(
            &mut settings,
            Path::new("/etc/gini"),
            Path::new("/work"),
            env(&[
                ("GINI_DATABASE", "override.db"),
                ("GINI_BASE_URL", "http://env.example/gini"),
            ]),
        );

        assert_eq!(settings.database_path, PathBuf::from("/work/override.db"));
        assert_eq!(settings.base_url, "http://env.example/gini");
        assert_eq!(settings.download_dir, PathBuf::from("/data/zipfiles"));
    }

    #[tokio::test]
    async fn test_load_from_path_records_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gini.toml");
        std::fs::write(&path, "user_agent = \"tester\"\n").unwrap();

        let config = Config::load_from_path(&path).await.unwrap();
        assert_eq!(config.user_agent.as_deref(), Some("tester"));
        assert_eq!(config.base_dir(), Some(dir.path().to_path_buf()));
    }

    #[tokio::test]
    async fn test_load_from_missing_path_fails() {
        let err = Config::load_from_path(Path::new("/nonexistent/gini.toml"))
            .await
            .unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_ensure_directories_creates_layout() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::with_data_dir(dir.path().join("nested"));
        settings.ensure_directories().unwrap();
        assert!(settings.download_dir.is_dir());
        assert!(settings.extract_dir.is_dir());
    }
}
