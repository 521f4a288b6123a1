//! Configuration management for LeadForge.
//!
//! Provides TOML-based configuration with XDG-compliant paths and
//! environment variable overrides.

use crate::error::{ConfigError, ConfigResult};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Main application configuration.
///
/// This is loaded from `~/.config/leadforge/config.toml` (or platform equivalent).
/// If the file doesn't exist, default values are used.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// HTTP server settings
    pub server: ServerConfig,
    /// Database location and pool settings
    pub database: DatabaseConfig,
    /// Headless browser settings
    pub browser: BrowserConfig,
    /// Scraping sources and per-domain rate limits
    pub scraping: ScrapingConfig,
    /// Email generation and verification settings
    pub enrichment: EnrichmentConfig,
    /// Prospecting job settings
    pub prospecting: ProspectingConfig,
    /// Campaign sending settings
    pub email_marketing: EmailMarketingConfig,
}

impl AppConfig {
    /// Load configuration from disk, falling back to defaults if not found.
    ///
    /// # Errors
    /// Returns error if:
    /// - Config directory cannot be determined
    /// - File exists but cannot be read
    /// - File contents are not valid TOML
    pub fn load() -> ConfigResult<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            tracing::debug!("Loading config from {}", config_path.display());
            let contents = fs::read_to_string(&config_path)?;
            let config = toml::from_str(&contents)?;
            Ok(config)
        } else {
            tracing::debug!("Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load configuration with environment variable overrides.
    ///
    /// Supports the following environment variables:
    /// - `LEADFORGE_BIND`: Override the listen address (`host:port`)
    /// - `PORT`: Override only the listen port
    /// - `LEADFORGE_DATABASE_PATH`: Override the `SQLite` file location
    /// - `LEADFORGE_HEADLESS`: Override browser headless mode (true/false)
    /// - `PROXY_LIST`: Comma-separated proxy URLs for scraping
    /// - `LEADFORGE_BACKEND_URL`: Public base URL used in tracking pixels
    /// - `LEADFORGE_FRONTEND_URL`: Allowed CORS origin
    /// - `LEADFORGE_ENV`: Environment name reported by `/health`
    pub fn load_with_env() -> ConfigResult<Self> {
        let mut config = Self::load()?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Apply overrides from a variable lookup function.
    ///
    /// Split out from [`AppConfig::load_with_env`] so the override rules can
    /// be exercised without touching the process environment.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(bind) = lookup("LEADFORGE_BIND") {
            tracing::debug!("Override server.bind from env: {}", bind);
            self.server.bind = bind;
        }

        if let Some(port) = lookup("PORT") {
            if let Ok(port) = port.parse::<u16>() {
                let host = self
                    .server
                    .bind
                    .rsplit_once(':')
                    .map_or("0.0.0.0", |(host, _)| host)
                    .to_string();
                self.server.bind = format!("{host}:{port}");
                tracing::debug!("Override server port from env: {}", port);
            }
        }

        if let Some(path) = lookup("LEADFORGE_DATABASE_PATH") {
            tracing::debug!("Override database.path from env: {}", path);
            self.database.path = Some(PathBuf::from(path));
        }

        if let Some(val) = lookup("LEADFORGE_HEADLESS") {
            if let Ok(headless) = val.parse() {
                self.browser.headless = headless;
                tracing::debug!("Override browser.headless from env: {}", headless);
            }
        }

        if let Some(list) = lookup("PROXY_LIST") {
            self.scraping.proxies = list
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(ToString::to_string)
                .collect();
            tracing::debug!(
                "Override scraping.proxies from env: {} proxies",
                self.scraping.proxies.len()
            );
        }

        if let Some(url) = lookup("LEADFORGE_BACKEND_URL") {
            tracing::debug!("Override server.backend_url from env: {}", url);
            self.server.backend_url = url;
        }

        if let Some(url) = lookup("LEADFORGE_FRONTEND_URL") {
            tracing::debug!("Override server.frontend_url from env: {}", url);
            self.server.frontend_url = url;
        }

        if let Some(env) = lookup("LEADFORGE_ENV") {
            tracing::debug!("Override server.environment from env: {}", env);
            self.server.environment = env;
        }
    }

    /// Save configuration to disk.
    ///
    /// Creates the config directory if it doesn't exist.
    pub fn save(&self) -> ConfigResult<()> {
        let config_path = Self::config_path()?;
        let config_dir = config_path
            .parent()
            .ok_or_else(|| ConfigError::InvalidValue {
                field: "config_path".to_string(),
                reason: "no parent directory".to_string(),
            })?;

        fs::create_dir_all(config_dir)?;
        tracing::debug!("Saving config to {}", config_path.display());

        let contents = toml::to_string_pretty(self)?;
        fs::write(config_path, contents)?;
        Ok(())
    }

    /// Get the path to the configuration file.
    ///
    /// Uses XDG base directories: `~/.config/leadforge/config.toml`
    pub fn config_path() -> ConfigResult<PathBuf> {
        Ok(Self::project_dirs()?.config_dir().join("config.toml"))
    }

    /// Get the data directory path.
    ///
    /// Uses XDG base directories: `~/.local/share/leadforge`
    pub fn data_dir() -> ConfigResult<PathBuf> {
        Ok(Self::project_dirs()?.data_dir().to_path_buf())
    }

    /// Resolve the database file, defaulting to `<data_dir>/leadforge.db`.
    pub fn database_path(&self) -> ConfigResult<PathBuf> {
        match &self.database.path {
            Some(path) => Ok(path.clone()),
            None => Ok(Self::data_dir()?.join("leadforge.db")),
        }
    }

    fn project_dirs() -> ConfigResult<ProjectDirs> {
        ProjectDirs::from("com", "leadforge", "leadforge").ok_or(ConfigError::NoConfigDir)
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address
    pub bind: String,
    /// Environment name reported by the health endpoint
    pub environment: String,
    /// Origin allowed by CORS (the dashboard)
    pub frontend_url: String,
    /// Public base URL of this server, used to build tracking pixel links
    pub backend_url: String,
    /// Requests allowed per client within one rate-limit window on `/api`
    pub api_rate_limit_requests: u32,
    /// Length of the `/api` rate-limit window in seconds
    pub api_rate_limit_window_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:5002".to_string(),
            environment: "development".to_string(),
            frontend_url: "http://localhost:3000".to_string(),
            backend_url: "http://localhost:5002".to_string(),
            api_rate_limit_requests: 100,
            api_rate_limit_window_secs: 15 * 60,
        }
    }
}

/// Database settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Path to the `SQLite` file (defaults to the data directory)
    pub path: Option<PathBuf>,
    /// Maximum pooled connections
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: None,
            max_connections: 5,
        }
    }
}

/// Browser automation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Run browser in headless mode
    pub headless: bool,
    /// Browser window width
    pub window_width: u32,
    /// Browser window height
    pub window_height: u32,
    /// Navigation timeout in seconds
    pub navigation_timeout_secs: u64,
    /// How long to wait for a results selector to appear
    pub selector_timeout_ms: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            window_width: 1920,
            window_height: 1080,
            navigation_timeout_secs: 30,
            selector_timeout_ms: 10_000,
        }
    }
}

/// Scraping settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrapingConfig {
    /// Enabled sources (`all`, `google_maps`, `linkedin`, `yelp`, `yellowpages`,
    /// `crunchbase`, `job_boards`, `indeed`, `glassdoor`)
    pub sources: Vec<String>,
    /// Default cap on results taken from a single source
    pub results_per_source: usize,
    /// Timeout for plain HTTP fetches of company websites
    pub request_timeout_secs: u64,
    /// Requests allowed per rate-limited domain within one window
    pub domain_points: u32,
    /// Length of the per-domain window in seconds
    pub domain_window_secs: u64,
    /// How long a domain stays blocked once its points are exhausted
    pub domain_block_secs: u64,
    /// Proxy URLs rotated round-robin
    pub proxies: Vec<String>,
}

impl Default for ScrapingConfig {
    fn default() -> Self {
        Self {
            sources: vec!["all".to_string()],
            results_per_source: 20,
            request_timeout_secs: 10,
            domain_points: 10,
            domain_window_secs: 60,
            domain_block_secs: 300,
            proxies: Vec::new(),
        }
    }
}

/// Email enrichment settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentConfig {
    /// Upper bound on generated candidates per company
    pub max_generated_emails: usize,
    /// Candidates generated and verified per lead during prospecting
    pub emails_per_lead: usize,
    /// MX lookup timeout in seconds
    pub dns_timeout_secs: u64,
    /// TCP reachability timeout in seconds
    pub tcp_timeout_secs: u64,
    /// Score at or above which an email counts as high confidence
    pub high_confidence_score: u32,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            max_generated_emails: 10,
            emails_per_lead: 5,
            dns_timeout_secs: 5,
            tcp_timeout_secs: 5,
            high_confidence_score: 80,
        }
    }
}

/// Prospecting job settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProspectingConfig {
    /// `max_results` used when a request omits it
    pub default_max_results: u32,
    /// Lower clamp for `max_results`
    pub min_results: u32,
    /// Upper clamp for `max_results`
    pub max_results: u32,
    /// Polling interval of the SSE progress stream in milliseconds
    pub progress_poll_ms: u64,
}

impl Default for ProspectingConfig {
    fn default() -> Self {
        Self {
            default_max_results: 100,
            min_results: 10,
            max_results: 1000,
            progress_poll_ms: 2000,
        }
    }
}

/// Email campaign settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailMarketingConfig {
    /// Default daily send limit for new SMTP accounts
    pub daily_limit: u32,
    /// Pause between two campaign sends in milliseconds
    pub send_delay_ms: u64,
    /// Whether to append an open-tracking pixel to outgoing mail
    pub tracking_enabled: bool,
    /// Delivery attempts reported to the dashboard
    pub max_retries: u32,
    /// Default sender address
    pub default_from_email: String,
    /// Default sender display name
    pub default_from_name: String,
}

impl Default for EmailMarketingConfig {
    fn default() -> Self {
        Self {
            daily_limit: 200,
            send_delay_ms: 1000,
            tracking_enabled: true,
            max_retries: 3,
            default_from_email: "noreply@yourcompany.com".to_string(),
            default_from_name: "Your Company".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.bind, "0.0.0.0:5002");
        assert_eq!(config.server.api_rate_limit_requests, 100);
        assert_eq!(config.server.api_rate_limit_window_secs, 900);
        assert_eq!(config.scraping.domain_points, 10);
        assert_eq!(config.prospecting.max_results, 1000);
        assert_eq!(config.email_marketing.daily_limit, 200);
        assert!(config.browser.headless);
    }

    #[test]
    fn test_config_serialization() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("[server]"));
        assert!(toml_str.contains("[scraping]"));
        assert!(toml_str.contains("[email_marketing]"));

        let parsed: AppConfig = toml::from_str(&toml_str).expect("parse serialized config");
        assert_eq!(parsed.server.bind, config.server.bind);
    }

    #[test]
    fn test_config_save_load() {
        let tmp = TempDir::new().expect("create temp dir");
        let config_path = tmp.path().join("config.toml");

        let mut config = AppConfig::default();
        config.server.bind = "127.0.0.1:8080".to_string();
        config.email_marketing.send_delay_ms = 250;

        let contents = toml::to_string_pretty(&config).expect("serialize config");
        fs::write(&config_path, contents).expect("write config file");

        let loaded_contents = fs::read_to_string(&config_path).expect("read config file");
        let loaded: AppConfig = toml::from_str(&loaded_contents).expect("parse loaded config");

        assert_eq!(loaded.server.bind, "127.0.0.1:8080");
        assert_eq!(loaded.email_marketing.send_delay_ms, 250);
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("PORT", "6000"),
            ("LEADFORGE_HEADLESS", "false"),
            ("PROXY_LIST", "http://p1:8080, http://p2:8080,,"),
            ("LEADFORGE_DATABASE_PATH", "/tmp/leads.db"),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::default();
        config.apply_env_overrides(|key| vars.get(key).map(ToString::to_string));

        assert_eq!(config.server.bind, "0.0.0.0:6000");
        assert!(!config.browser.headless);
        assert_eq!(
            config.scraping.proxies,
            vec!["http://p1:8080".to_string(), "http://p2:8080".to_string()]
        );
        assert_eq!(
            config.database_path().expect("database path"),
            PathBuf::from("/tmp/leads.db")
        );
    }

    #[test]
    fn test_env_override_ignores_bad_values() {
        let mut config = AppConfig::default();
        config.apply_env_overrides(|key| match key {
            "PORT" => Some("not-a-port".to_string()),
            "LEADFORGE_HEADLESS" => Some("maybe".to_string()),
            _ => None,
        });
        assert_eq!(config.server.bind, "0.0.0.0:5002");
        assert!(config.browser.headless);
    }

    #[test]
    fn test_partial_config() {
        let toml_str = r#"
[server]
frontend_url = "https://app.example.com"

[email_marketing]
daily_limit = 50
"#;

        let config: AppConfig = toml::from_str(toml_str).expect("parse partial config");
        assert_eq!(config.server.frontend_url, "https://app.example.com");
        assert_eq!(config.email_marketing.daily_limit, 50);
        // These should be defaults
        assert_eq!(config.server.bind, "0.0.0.0:5002");
        assert_eq!(config.email_marketing.send_delay_ms, 1000);
        assert_eq!(config.enrichment.emails_per_lead, 5);
    }
}
