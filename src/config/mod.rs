//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Uploads larger than this are rejected before reaching the game
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Root directory for uploaded images
    pub upload_dir: PathBuf,
    /// Request body limit in bytes
    pub max_upload_bytes: usize,

    /// Allowed client origins for CORS (comma-separated); permissive when unset
    pub client_origin: Option<String>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // PORT wins over SERVER_ADDR so hosted platforms can pick the port
        let server_addr = if let Ok(port) = env::var("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            env::var("SERVER_ADDR").unwrap_or_else(|_| "127.0.0.1:5000".to_string())
        };

        let max_upload_bytes = match env::var("MAX_UPLOAD_BYTES") {
            Ok(raw) => raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidNumber("MAX_UPLOAD_BYTES"))?,
            Err(_) => DEFAULT_MAX_UPLOAD_BYTES,
        };

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,

            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),

            upload_dir: env::var("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(".cache/uploads")),
            max_upload_bytes,

            client_origin: env::var("CLIENT_ORIGIN")
                .ok()
                .filter(|s| !s.trim().is_empty()),
        })
    }

    /// Defaults rooted at the given upload directory
    #[cfg(test)]
    pub fn with_upload_dir(upload_dir: impl Into<PathBuf>) -> Self {
        Self {
            server_addr: SocketAddr::from(([127, 0, 0, 1], 5000)),
            log_level: "info".to_string(),
            upload_dir: upload_dir.into(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            client_origin: None,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid server address format")]
    InvalidAddress,

    #[error("Invalid number in environment variable: {0}")]
    InvalidNumber(&'static str),
}
