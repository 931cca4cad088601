//! Client configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Platform client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Backend API base URL, including the `/api` prefix.
    pub base_url: String,

    /// Client-side timeout applied to every request.
    pub timeout: Duration,

    /// Directory holding the persisted state slots.
    pub storage_dir: PathBuf,
}

impl ClientConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let base_url = std::env::var("DATALENS_API_URL")
            .unwrap_or_else(|_| "http://localhost:8080/api".to_string());

        let timeout_secs: u64 = std::env::var("DATALENS_API_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(30);

        let storage_dir = std::env::var("DATALENS_STATE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| Self::default_storage_dir());

        Self {
            base_url,
            timeout: Duration::from_secs(timeout_secs),
            storage_dir,
        }
    }

    /// Override the backend base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn default_storage_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".datalens")
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/api".to_string(),
            timeout: Duration::from_secs(30),
            storage_dir: Self::default_storage_dir(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = ClientConfig::default();
        assert_eq!(config.base_url, "http://localhost:8080/api");
        assert_eq!(config.timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_with_base_url() {
        let config = ClientConfig::default().with_base_url("https://api.datalens.ai/api");
        assert_eq!(config.base_url, "https://api.datalens.ai/api");
    }
}
