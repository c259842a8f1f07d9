use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_HOST: &str = "https://anilife.live";
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36";

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub logging: LoggingConfig,
    pub site: SiteConfig,
    pub download: DownloadConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    /// Either "json" or "text"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: "json".to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct SiteConfig {
    pub host: String,
    pub user_agent: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct DownloadConfig {
    /// Maximum number of segment fetches in flight
    pub concurrency: usize,
    pub request_timeout_secs: u64,
    pub output_dir: PathBuf,
    /// Root for per-episode working directories. Defaults to the destination's parent.
    pub work_dir: Option<PathBuf>,
    /// Assemble even when some segments failed (leaves gaps in the output)
    pub allow_partial: bool,
    pub preferred_resolution: Option<String>,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            concurrency: 8,
            request_timeout_secs: 60,
            output_dir: PathBuf::from("."),
            work_dir: None,
            allow_partial: false,
            preferred_resolution: None,
        }
    }
}

impl Config {
    pub fn from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).context("Failed to parse config")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.download.concurrency == 0 {
            anyhow::bail!("download.concurrency must be at least 1");
        }
        if self.site.host.trim().is_empty() {
            anyhow::bail!("site.host must not be empty");
        }
        Ok(())
    }

    pub fn get_logging_format(&self) -> &str {
        &self.logging.format
    }

    /// Site host without a trailing slash, as used for URL building and the Origin header.
    pub fn host(&self) -> &str {
        self.site.host.trim_end_matches('/')
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.download.request_timeout_secs)
    }
}

/// Resolves the config file location: explicit path, `ANILIFE_DL_CONFIG`, then the XDG and
/// home config directories. Returns `None` when nothing exists.
pub fn get_config_path(explicit: Option<&str>) -> Option<String> {
    if let Some(path) = explicit {
        return Some(path.to_string());
    }

    if let Ok(path) = std::env::var("ANILIFE_DL_CONFIG") {
        return Some(path);
    }

    if let Ok(xdg_config_home) = std::env::var("XDG_CONFIG_HOME") {
        let config_path = Path::new(&xdg_config_home).join("anilife-dl/config.toml");
        if config_path.exists() {
            return Some(config_path.display().to_string());
        }
    }

    if let Some(home) = dirs::home_dir() {
        let config_path = home.join(".config/anilife-dl/config.toml");
        if config_path.exists() {
            return Some(config_path.display().to_string());
        }
    }

    None
}
