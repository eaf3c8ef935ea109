//! hakidgen configuration management
//!
//! Configuration is read once at startup: an optional TOML file provides the
//! base, command line arguments / environment variables override it, and the
//! result is validated before anything else starts. Only the prompts file
//! named here is re-read at runtime.

use crate::error::{Error, Result};
use crate::media::MediaFormat;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main hakidgen configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Prompt definitions file, re-read every maintenance cycle
    pub prompts_file: PathBuf,

    /// HTTP server configuration
    pub server: ServerConfig,

    /// Pool sizing and timing
    pub pool: PoolConfig,

    /// Artifact storage configuration
    pub storage: StorageConfig,

    /// Upstream generation services
    pub upstream: UpstreamConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            prompts_file: PathBuf::from("prompts.json"),
            server: ServerConfig::default(),
            pool: PoolConfig::default(),
            storage: StorageConfig::default(),
            upstream: UpstreamConfig::default(),
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 10001,
        }
    }
}

/// Pool sizing and timing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Number of generative items kept available
    pub target_size: usize,

    /// Seconds a picked generative item is kept before deletion
    pub grace_period_secs: u64,

    /// Seconds between maintenance cycles
    pub maintenance_interval_secs: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            target_size: 10,
            grace_period_secs: 5 * 60,
            maintenance_interval_secs: 60,
        }
    }
}

impl PoolConfig {
    pub fn grace_period(&self) -> Duration {
        Duration::from_secs(self.grace_period_secs)
    }

    pub fn maintenance_interval(&self) -> Duration {
        Duration::from_secs(self.maintenance_interval_secs)
    }
}

/// Artifact storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root directory holding `static/` and `genai/`
    pub output_dir: PathBuf,

    /// Public URL prefix the artifact paths are appended to
    pub url_base: String,

    /// Produce `.mp4` instead of `.mp3`
    pub generate_video: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("/var/lib/hakidgenai"),
            url_base: String::new(),
            generate_video: false,
        }
    }
}

impl StorageConfig {
    pub fn media_format(&self) -> MediaFormat {
        MediaFormat::from_video_flag(self.generate_video)
    }
}

/// Upstream generation services configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// API key for the text generation service
    pub api_key: String,

    /// API key for speech synthesis (None = use `api_key`)
    pub tts_api_key: Option<String>,

    /// Project billed for speech synthesis (`x-goog-user-project`)
    pub project: Option<String>,

    /// Speech synthesis endpoint
    pub tts_endpoint: String,

    /// Text generation API base URL
    pub genai_endpoint: String,

    /// Text generation model
    pub genai_model: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            tts_api_key: None,
            project: None,
            tts_endpoint: "https://texttospeech.googleapis.com/v1/text:synthesize".to_string(),
            genai_endpoint: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            genai_model: "gemini-1.5-flash-latest".to_string(),
        }
    }
}

impl UpstreamConfig {
    /// Key used for speech synthesis
    pub fn tts_key(&self) -> &str {
        self.tts_api_key.as_deref().unwrap_or(&self.api_key)
    }
}

impl ServiceConfig {
    /// Load a TOML configuration file.
    pub fn from_toml_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Invalid config file {}: {}", path.display(), e)))
    }

    /// Check required values. A failure here stops the process.
    pub fn validate(&self) -> Result<()> {
        if self.storage.url_base.trim().is_empty() {
            return Err(Error::Config(
                "storage.url_base (DMS_URL_BASE) is required".to_string(),
            ));
        }
        if self.upstream.api_key.trim().is_empty() {
            return Err(Error::Config(
                "upstream.api_key (GOOGLE_API_KEY) is required".to_string(),
            ));
        }
        if self.pool.maintenance_interval_secs == 0 {
            return Err(Error::Config(
                "pool.maintenance_interval_secs must be greater than zero".to_string(),
            ));
        }
        if self.prompts_file.as_os_str().is_empty() {
            return Err(Error::Config("prompts_file is required".to_string()));
        }
        Ok(())
    }

    /// Copy of the configuration with credentials masked, for display.
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        config.upstream.api_key = mask(&config.upstream.api_key);
        config.upstream.tts_api_key = config.upstream.tts_api_key.as_deref().map(mask);
        config
    }
}

fn mask(secret: &str) -> String {
    if secret.is_empty() {
        String::new()
    } else if secret.len() <= 8 {
        "****".to_string()
    } else {
        format!("{}****", secret.chars().take(4).collect::<String>())
    }
}
