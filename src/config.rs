//! Client configuration

use dotenvy::dotenv;
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use crate::storage::{FileStorage, MemoryStorage, SessionStorage};
use crate::{Result, StorefrontError};

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_REFRESH_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub backend_url: String,
    pub request_timeout: Duration,
    pub refresh_timeout: Duration,
    /// File-backed session storage when set, in-memory otherwise.
    pub storage_path: Option<PathBuf>,
}

impl ClientConfig {
    pub fn new(backend_url: impl Into<String>) -> Self {
        Self {
            backend_url: backend_url.into().trim_end_matches('/').to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            refresh_timeout: DEFAULT_REFRESH_TIMEOUT,
            storage_path: None,
        }
    }

    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let get_env = |name: &str| {
            env::var(name).map_err(|e| StorefrontError::Config(format!("Missing environment variable '{}': {}", name, e)))
        };
        let secs = |name: &str, default: Duration| -> Result<Duration> {
            match env::var(name) {
                Ok(raw) => raw
                    .trim()
                    .parse::<u64>()
                    .map(Duration::from_secs)
                    .map_err(|e| StorefrontError::Config(format!("Invalid {}: {}", name, e))),
                Err(_) => Ok(default),
            }
        };

        let backend_url = get_env("STOREFRONT_BACKEND_URL")?;
        if !backend_url.starts_with("http://") && !backend_url.starts_with("https://") {
            return Err(StorefrontError::Config(format!("STOREFRONT_BACKEND_URL must be an http(s) URL, got '{}'", backend_url)));
        }

        let mut config = Self::new(backend_url);
        config.request_timeout = secs("STOREFRONT_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT)?;
        config.refresh_timeout = secs("STOREFRONT_REFRESH_TIMEOUT_SECS", DEFAULT_REFRESH_TIMEOUT)?;
        config.storage_path = env::var("STOREFRONT_STORAGE_PATH").ok().filter(|p| !p.trim().is_empty()).map(PathBuf::from);

        tracing::info!(backend_url = %config.backend_url, "client configuration loaded");
        Ok(config)
    }

    pub fn storage(&self) -> Arc<dyn SessionStorage> {
        match &self.storage_path {
            Some(path) => Arc::new(FileStorage::new(path)),
            None => Arc::new(MemoryStorage::new()),
        }
    }
}
