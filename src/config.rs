//! Configuration management for the PhyLab client

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::PathBuf;

#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    /// Primary backend base URL (production deployment).
    pub base_url: String,
    /// Ordered fallback base URLs tried after the primary.
    pub fallback_urls: Vec<String>,
    /// Per-attempt request timeout, applied uniformly to every call.
    pub timeout_seconds: u64,
    /// Total attempt budget across the candidate ring.
    pub max_attempts: u32,
    /// Session token; when absent, requests rely on cookie credentials.
    pub auth_token: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    /// Directory holding the offline cache documents.
    pub dir: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        // Load environment variables from a .env file when present
        dotenvy::dotenv().ok();

        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let config = Config::builder()
            // Start with default configuration
            .add_source(File::with_name("config/default").required(false))
            // Layer on the environment-specific file
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Add environment variables (with prefix PHYLAB_)
            .add_source(
                Environment::with_prefix("PHYLAB")
                    .separator("_")
                    .try_parsing(true),
            )
            // Override API base URL from PHYLAB_API_BASE env var if present
            .set_override_option(
                "api.base_url",
                env::var("PHYLAB_API_BASE").ok(),
            )?
            // Override session token from PHYLAB_AUTH_TOKEN env var if present
            .set_override_option(
                "api.auth_token",
                env::var("PHYLAB_AUTH_TOKEN").ok(),
            )?
            .build()?;

        config.try_deserialize()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            cache: CacheConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://phylab-inventory-backend.onrender.com".to_string(),
            fallback_urls: vec!["http://127.0.0.1:8000".to_string()],
            timeout_seconds: 8,
            max_attempts: 4,
            auth_token: None,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(".phylab-cache"),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
