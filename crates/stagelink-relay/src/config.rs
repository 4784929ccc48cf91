//! Configuration loading and validation

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub daemon: DaemonConfig,
    #[serde(default)]
    pub models: ModelsConfig,
    #[serde(default)]
    pub presign: PresignConfig,
    #[serde(default)]
    pub relay: RelayConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            daemon: DaemonConfig::default(),
            models: ModelsConfig::default(),
            presign: PresignConfig::default(),
            relay: RelayConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Bind address for the web server
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Public base URL clients reach this relay at (used in catalog and
    /// presigned URLs). Defaults to http://{bind}.
    #[serde(default)]
    pub public_url: Option<String>,
    /// TLS configuration (optional - enables HTTPS when present)
    #[serde(default)]
    pub tls: Option<TlsConfig>,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            public_url: None,
            tls: None,
        }
    }
}

/// TLS/HTTPS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM format)
    pub cert: String,
    /// Path to private key file (PEM format)
    pub key: String,
}

fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsConfig {
    /// Path where uploaded model files are stored
    #[serde(default = "default_models_path")]
    pub path: String,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            path: default_models_path(),
        }
    }
}

fn default_models_path() -> String {
    "./models".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresignConfig {
    /// Secret used to sign presigned upload tokens
    #[serde(default = "default_presign_secret")]
    pub secret: String,
    /// How long an issued upload URL stays valid
    #[serde(default = "default_presign_expiry")]
    pub expiry_secs: u64,
}

impl Default for PresignConfig {
    fn default() -> Self {
        Self {
            secret: default_presign_secret(),
            expiry_secs: default_presign_expiry(),
        }
    }
}

fn default_presign_secret() -> String {
    "stagelink-dev-secret".to_string()
}

fn default_presign_expiry() -> u64 {
    900
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Capacity of the event fan-out channel; slow clients that lag past
    /// this many events skip ahead instead of stalling the relay
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
        }
    }
}

fn default_channel_capacity() -> usize {
    100
}

impl Config {
    /// The base URL used when building model and upload URLs
    pub fn public_url(&self) -> String {
        match &self.daemon.public_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => {
                let scheme = if self.daemon.tls.is_some() { "https" } else { "http" };
                format!("{}://{}", scheme, self.daemon.bind)
            }
        }
    }
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<Config> {
    if path.exists() {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    } else {
        info!(
            path = %path.display(),
            "Configuration file not found, using defaults"
        );
        Ok(Config::default())
    }
}
