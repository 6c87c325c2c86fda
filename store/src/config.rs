//! Configuration management for the entity store.
//!
//! Loads configuration from environment variables with sensible defaults.

use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Invalid configuration
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The API base URL is empty
    #[error("API base URL must not be empty")]
    EmptyBaseUrl,
}

/// Store configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackstageConfig {
    /// Backend base URL (`BACKSTAGE_API_BASE_URL`)
    pub api_base_url: String,
    /// Per-request timeout (`BACKSTAGE_REQUEST_TIMEOUT_SECS`)
    pub request_timeout: Duration,
    /// Directory for the session snapshot; in memory when unset (`BACKSTAGE_SNAPSHOT_DIR`)
    pub snapshot_dir: Option<PathBuf>,
    /// Default tracing directive (`BACKSTAGE_LOG`)
    pub log_directive: String,
    /// Ignore out-of-order list completions (`BACKSTAGE_DISCARD_STALE_LISTS`)
    pub discard_stale_lists: bool,
    /// Default list page size (`BACKSTAGE_PAGE_SIZE`)
    pub page_size: u32,
}

impl Default for BackstageConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8080".to_string(),
            request_timeout: Duration::from_secs(30),
            snapshot_dir: None,
            log_directive: "info".to_string(),
            discard_stale_lists: false,
            page_size: 10,
        }
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl BackstageConfig {
    /// Load configuration from environment variables.
    ///
    /// Unparseable numbers and flags fall back to their defaults.
    ///
    /// # Errors
    ///
    /// [`ConfigError::EmptyBaseUrl`] if `BACKSTAGE_API_BASE_URL` is set but blank.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    ///
    /// # Errors
    ///
    /// Same as [`from_env`](Self::from_env).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let config = Self {
            api_base_url: lookup("BACKSTAGE_API_BASE_URL").unwrap_or(defaults.api_base_url),
            request_timeout: lookup("BACKSTAGE_REQUEST_TIMEOUT_SECS")
                .and_then(|s| s.trim().parse().ok())
                .map_or(defaults.request_timeout, Duration::from_secs),
            snapshot_dir: lookup("BACKSTAGE_SNAPSHOT_DIR")
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from),
            log_directive: lookup("BACKSTAGE_LOG").unwrap_or(defaults.log_directive),
            discard_stale_lists: lookup("BACKSTAGE_DISCARD_STALE_LISTS")
                .and_then(|s| parse_flag(&s))
                .unwrap_or(defaults.discard_stale_lists),
            page_size: lookup("BACKSTAGE_PAGE_SIZE")
                .and_then(|s| s.trim().parse().ok())
                .filter(|size| *size > 0)
                .unwrap_or(defaults.page_size),
        };

        config.validate()?;
        Ok(config)
    }

    /// Check invariants that defaults cannot repair
    ///
    /// # Errors
    ///
    /// [`ConfigError::EmptyBaseUrl`] if the base URL is blank.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_base_url.trim().is_empty() {
            return Err(ConfigError::EmptyBaseUrl);
        }
        Ok(())
    }

    /// Set the backend base URL
    #[must_use]
    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    /// Set the request timeout
    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Persist the session snapshot under `dir`
    #[must_use]
    pub fn with_snapshot_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.snapshot_dir = Some(dir.into());
        self
    }

    /// Set the default tracing directive
    #[must_use]
    pub fn with_log_directive(mut self, directive: impl Into<String>) -> Self {
        self.log_directive = directive.into();
        self
    }

    /// Enable or disable the stale list guard
    #[must_use]
    pub const fn with_discard_stale_lists(mut self, discard: bool) -> Self {
        self.discard_stale_lists = discard;
        self
    }

    /// Set the default page size
    #[must_use]
    pub const fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }
}
