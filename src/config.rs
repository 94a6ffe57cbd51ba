use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::bot::DEFAULT_MAX_IMAGE_BYTES;
use crate::docomo::{Endpoints, Persona};

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the config file.
    #[error("failed to read config file '{}': {source}", path.display())]
    ReadFile { path: PathBuf, source: std::io::Error },
    /// Failed to parse JSON.
    #[error("failed to parse config file '{}': {source}", path.display())]
    ParseJson { path: PathBuf, source: serde_json::Error },
    /// Validation error.
    #[error("config validation error: {0}")]
    Validation(String),
}

#[derive(Deserialize)]
struct ConfigFile {
    /// docomo developer API key
    apikey: String,
    /// Listen address, host:port
    addr: String,
    /// Bot persona sent with every dialogue request
    user: Persona,
    /// Answer "これ読んで <url>" with character recognition
    #[serde(default = "default_read_images")]
    read_images: bool,
    /// Largest image fetched for character recognition
    #[serde(default = "default_max_image_bytes")]
    max_image_bytes: usize,
    /// Skip certificate verification towards the vendor API
    #[serde(default)]
    insecure_tls: bool,
    #[serde(default)]
    endpoints: Endpoints,
    /// Directory holding index.html and assets/. Defaults to current directory.
    static_dir: Option<String>,
    /// Directory for the log file. Logs go to stdout only when unset.
    log_dir: Option<String>,
}

fn default_read_images() -> bool {
    true
}

fn default_max_image_bytes() -> usize {
    DEFAULT_MAX_IMAGE_BYTES
}

#[derive(Debug, Clone)]
pub struct Config {
    pub apikey: String,
    pub addr: String,
    pub user: Persona,
    pub read_images: bool,
    pub max_image_bytes: usize,
    pub insecure_tls: bool,
    pub endpoints: Endpoints,
    pub static_dir: PathBuf,
    pub log_dir: Option<PathBuf>,
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config_path = path.as_ref().to_path_buf();
        let content = std::fs::read_to_string(&config_path)
            .map_err(|e| ConfigError::ReadFile { path: config_path.clone(), source: e })?;
        let file: ConfigFile = serde_json::from_str(&content)
            .map_err(|e| ConfigError::ParseJson { path: config_path.clone(), source: e })?;

        if file.apikey.trim().is_empty() {
            return Err(ConfigError::Validation("apikey is required".into()));
        }
        if file.user.nickname.trim().is_empty() {
            return Err(ConfigError::Validation("user.nickname is required".into()));
        }
        let addr = listen_addr(&file.addr)?;
        if file.max_image_bytes == 0 {
            return Err(ConfigError::Validation("max_image_bytes must be positive".into()));
        }

        let static_dir = file
            .static_dir
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));

        Ok(Self {
            apikey: file.apikey,
            addr,
            user: file.user,
            read_images: file.read_images,
            max_image_bytes: file.max_image_bytes,
            insecure_tls: file.insecure_tls,
            endpoints: file.endpoints,
            static_dir,
            log_dir: file.log_dir.map(PathBuf::from),
        })
    }
}

/// Check the shape of a listen address. Hostnames are resolved at bind time.
/// An empty host (":8080") means every interface.
fn listen_addr(addr: &str) -> Result<String, ConfigError> {
    match addr.rsplit_once(':') {
        Some((host, port)) if port.parse::<u16>().is_ok() => {
            if host.is_empty() {
                Ok(format!("0.0.0.0:{port}"))
            } else {
                Ok(addr.to_string())
            }
        }
        _ => Err(ConfigError::Validation(format!(
            "addr '{addr}' is invalid (expected host:port)"
        ))),
    }
}
