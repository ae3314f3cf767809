use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration for the tripshot pipeline.
///
/// Controls how sources are fetched, the HEIC→JPEG quality, batch
/// concurrency, and CLI output.
///
/// # Loading
///
/// ```rust,no_run
/// use tripshot::config::Config;
///
/// // From a JSON file
/// let config = Config::load(Some("config.json".as_ref())).unwrap();
///
/// // Or use defaults and customize
/// let mut config = Config::default();
/// config.fetch.timeout_secs = Some(10);
/// config.batch.max_concurrency = 4;
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    /// Network and file fetching.
    pub fetch: FetchConfig,
    /// HEIC normalization.
    pub conversion: ConversionConfig,
    /// Gallery batch processing.
    pub batch: BatchConfig,
    /// CLI output behavior.
    pub output: OutputConfig,
}

/// Fetch settings. Timeout policy lives here, not in the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FetchConfig {
    /// Whole-request timeout in seconds. `None` disables the timeout.
    pub timeout_secs: Option<u64>,
    pub user_agent: String,
}

/// HEIC→JPEG settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ConversionConfig {
    /// JPEG quality, 1–100. Out-of-range values are clamped.
    pub jpeg_quality: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BatchConfig {
    /// Maximum photos processed at once. `0` means unbounded.
    pub max_concurrency: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct OutputConfig {
    /// If set, converted display JPEGs are written to this directory.
    pub display_dir: Option<String>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: Some(30),
            user_agent: format!("tripshot/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self { jpeg_quality: 90 }
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self { max_concurrency: 8 }
    }
}

impl ConversionConfig {
    /// Quality clamped to the range the JPEG encoder accepts.
    pub fn quality(&self) -> u8 {
        self.jpeg_quality.clamp(1, 100)
    }
}

impl Config {
    /// Resolve the config file path: `config.json` beside the executable.
    pub fn config_path() -> Result<PathBuf> {
        let exe_path = std::env::current_exe().context("Failed to get executable path")?;
        let exe_dir = exe_path
            .parent()
            .context("Failed to get executable directory")?;
        Ok(exe_dir.join("config.json"))
    }

    /// Load config from the given path, or from the default location.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::config_path()?,
        };

        if !config_path.exists() {
            log::warn!(
                "Config file not found at {}. Using defaults.",
                config_path.display()
            );
            return Ok(Self::default());
        }

        let contents =
            std::fs::read_to_string(&config_path).context("Failed to read config file")?;
        let config: Config =
            serde_json::from_str(&contents).context("Failed to parse config file")?;
        Ok(config)
    }

    /// Save config to the given path, or to the default location.
    pub fn save(&self, path: Option<&Path>) -> Result<()> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::config_path()?,
        };

        let contents = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(&config_path, contents).context("Failed to write config file")?;
        log::info!("Config saved to {}", config_path.display());
        Ok(())
    }
}
