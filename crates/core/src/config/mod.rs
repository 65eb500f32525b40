use std::{path::Path, time::Duration};

use serde::{Deserialize, Serialize};

use crate::Result;

/// Environment variable that overrides [`ServiceConfig::api_url`].
pub const API_URL_ENV: &str = "API_URL";

/// Top-level configuration structure for the application.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub service: ServiceConfig,
    pub upload: UploadConfig,
}

impl AppConfig {
    /// Reads a JSON configuration file. Missing fields keep their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Applies `API_URL` from the process environment, if set.
    pub fn apply_env(mut self) -> Self {
        if let Ok(url) = std::env::var(API_URL_ENV) {
            if !url.trim().is_empty() {
                self.service.api_url = url;
            }
        }
        self
    }
}

/// Settings for the external processing service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub api_url: String,
    pub request_timeout_secs: u64,
    pub user_agent: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8000".to_string(),
            request_timeout_secs: 300,
            user_agent: concat!("AudioMagic/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl ServiceConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Base address without a trailing slash.
    pub fn base_url(&self) -> &str {
        self.api_url.trim_end_matches('/')
    }

    pub fn process_url(&self) -> String {
        format!("{}/process", self.base_url())
    }

    /// Resolves an artifact identifier returned by the service into the URL a
    /// player can load.
    pub fn download_url(&self, identifier: &str) -> String {
        format!("{}/download/{}", self.base_url(), identifier)
    }
}

/// Constraints applied to local files before they are accepted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    pub max_file_bytes: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_file_bytes: 100 * 1024 * 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn builds_download_urls_without_double_slashes() {
        let service = ServiceConfig {
            api_url: "http://example.test/".to_string(),
            ..Default::default()
        };
        assert_eq!(service.download_url("v1"), "http://example.test/download/v1");
        assert_eq!(service.process_url(), "http://example.test/process");
    }

    #[test]
    fn loads_partial_json_with_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"service": {{"api_url": "http://svc:9000"}}}}"#).unwrap();

        let config = AppConfig::load(file.path()).unwrap();
        assert_eq!(config.service.api_url, "http://svc:9000");
        assert_eq!(config.service.request_timeout(), Duration::from_secs(300));
        assert_eq!(config.upload.max_file_bytes, 100 * 1024 * 1024);
    }

    #[test]
    fn rejects_malformed_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();

        let err = AppConfig::load(file.path()).unwrap_err();
        assert!(err.to_string().starts_with("invalid configuration"));
    }
}
