use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::store::DEFAULT_SETTLE_DELAY;

/// Name of the links file inside the storage directory.
pub const LINKS_FILE: &str = "links.json";

/// Name of the config file inside the config directory.
pub const CONFIG_FILE: &str = "config.toml";

/// Settings that may be persisted in `config.toml`.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_dir: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_found_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Directory holding `config.toml`, e.g. `~/.config/golink`
    pub config_dir: PathBuf,

    /// Path of `config.toml` if it exists
    pub config_file: Option<PathBuf>,

    /// Directory holding `links.json`. Defaults to the config directory.
    pub storage_dir: PathBuf,

    /// Host to bind the HTTP server to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Where to send visitors whose alias does not exist. When unset they get
    /// a 404 instead.
    pub not_found_url: Option<String>,

    /// Pause between a change to the links file and reloading it
    pub settle_delay: Duration,
}

impl AppConfig {
    /// Load configuration from the config file and environment variables
    /// (populated by dotenvy before this is called).
    pub fn load(config_dir: Option<PathBuf>) -> Result<Self> {
        Self::resolve(config_dir, |key| std::env::var(key).ok())
    }

    fn resolve(config_dir: Option<PathBuf>, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let env = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        let config_dir = config_dir
            .or_else(|| env("GOLINK_CONFIG_DIR").map(PathBuf::from))
            .unwrap_or_else(default_config_dir);

        let config_path = config_dir.join(CONFIG_FILE);
        let (file, config_file) = if config_path.is_file() {
            (read_file_config(&config_path)?, Some(config_path))
        } else {
            (FileConfig::default(), None)
        };

        let storage_dir = env("GOLINK_STORAGE_DIR")
            .map(PathBuf::from)
            .or(file.storage_dir)
            .unwrap_or_else(|| config_dir.clone());

        let host = env("GOLINK_HOST")
            .or(file.host)
            .unwrap_or_else(|| "0.0.0.0".into());

        let port = match env("GOLINK_PORT") {
            Some(port) => port
                .parse::<u16>()
                .context("GOLINK_PORT must be a valid port number (1–65535)")?,
            None => file.port.unwrap_or(80),
        };

        let not_found_url = env("GOLINK_NOT_FOUND_URL").or(file.not_found_url);

        let settle_delay = match env("GOLINK_SETTLE_DELAY_MS") {
            Some(ms) => Duration::from_millis(
                ms.parse::<u64>()
                    .context("GOLINK_SETTLE_DELAY_MS must be a number of milliseconds")?,
            ),
            None => DEFAULT_SETTLE_DELAY,
        };

        Ok(Self {
            config_dir,
            config_file,
            storage_dir,
            host,
            port,
            not_found_url,
            settle_delay,
        })
    }

    pub fn links_path(&self) -> PathBuf {
        self.storage_dir.join(LINKS_FILE)
    }

    pub fn config_path(&self) -> PathBuf {
        self.config_dir.join(CONFIG_FILE)
    }

    /// Public base URL of the redirect server, without a trailing slash.
    pub fn base_url(&self) -> String {
        format!("http://localhost:{}", self.port)
    }

    /// Persist `dir` as the storage directory in `config.toml`, keeping any
    /// other keys already there. Returns the absolute path written.
    pub fn set_storage_dir(&self, dir: &Path) -> Result<PathBuf> {
        let dir = std::path::absolute(dir)
            .with_context(|| format!("Cannot resolve {}", dir.display()))?;

        std::fs::create_dir_all(&self.config_dir).with_context(|| {
            format!("Failed to create config directory {}", self.config_dir.display())
        })?;

        let path = self.config_path();
        let mut table = if path.is_file() {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            raw.parse::<toml::Table>()
                .with_context(|| format!("Failed to parse {}", path.display()))?
        } else {
            toml::Table::new()
        };

        table.insert(
            "storage_dir".into(),
            toml::Value::String(dir.to_string_lossy().into_owned()),
        );

        let raw = toml::to_string_pretty(&table).context("Failed to serialize config")?;
        std::fs::write(&path, raw).with_context(|| format!("Failed to write {}", path.display()))?;

        tracing::info!("Storage directory set to {}", dir.display());
        Ok(dir)
    }
}

fn read_file_config(path: &Path) -> Result<FileConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    toml::from_str(&raw).with_context(|| format!("Failed to parse {}", path.display()))
}

/// `$XDG_CONFIG_HOME/golink`, or `~/.config/golink`.
pub fn default_config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .ok()
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("/tmp"))
                .join(".config")
        })
        .join("golink")
}
