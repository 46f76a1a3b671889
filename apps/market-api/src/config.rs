//! # Market Configuration
//!
//! Configuration management for the market API server.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     TREIDO_PORT=8080                                                   │
//! │     STRIPE_SECRET_KEY=sk_test_...                                      │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/treido/market.toml (Linux)                               │
//! │     ~/Library/Application Support/bg.treido.market/market.toml (macOS) │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     0.0.0.0:8080, ./treido.db, payments disabled                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # market.toml
//! [server]
//! bind_addr = "0.0.0.0"
//! port = 8080
//!
//! [database]
//! path = "./treido.db"
//! max_connections = 5
//!
//! [payments]
//! enabled = true
//! api_base_url = "https://api.stripe.com"
//! secret_key = "sk_test_..."
//! currency = "eur"
//! app_url = "https://treido.eu"
//!
//! [catalog]
//! api_base_url = "http://localhost:8080"
//! page_size = 24
//!
//! [auth]
//! user_header = "x-user-id"
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info, warn};

use crate::error::{MarketError, MarketResult};

// =============================================================================
// Server Settings
// =============================================================================

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Bind address (default: 0.0.0.0 for all interfaces).
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_bind_addr() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerSettings {
    fn default() -> Self {
        ServerSettings {
            bind_addr: default_bind_addr(),
            port: default_port(),
        }
    }
}

impl ServerSettings {
    /// Returns the full bind address.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }
}

// =============================================================================
// Database Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite file path.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./treido.db")
}

fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_db_path(),
            max_connections: default_max_connections(),
        }
    }
}

// =============================================================================
// Payment Settings
// =============================================================================

/// Hosted payment provider settings.
///
/// `STRIPE_SECRET_KEY` in the environment sets the key and enables payments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentSettings {
    /// When false, checkout endpoints answer with a payment error.
    #[serde(default)]
    pub enabled: bool,

    /// Provider API root. Tests point this at a mock server.
    #[serde(default = "default_payments_base_url")]
    pub api_base_url: String,

    #[serde(default)]
    pub secret_key: String,

    /// ISO currency code, lowercase.
    #[serde(default = "default_currency")]
    pub currency: String,

    /// Public storefront origin used for success/cancel return URLs.
    #[serde(default = "default_app_url")]
    pub app_url: String,
}

fn default_payments_base_url() -> String {
    "https://api.stripe.com".to_string()
}

fn default_currency() -> String {
    "eur".to_string()
}

fn default_app_url() -> String {
    "http://localhost:3000".to_string()
}

impl Default for PaymentSettings {
    fn default() -> Self {
        PaymentSettings {
            enabled: false,
            api_base_url: default_payments_base_url(),
            secret_key: String::new(),
            currency: default_currency(),
            app_url: default_app_url(),
        }
    }
}

// =============================================================================
// Catalog Settings
// =============================================================================

/// Where the category browser fetches contexts and product pages from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogSettings {
    #[serde(default = "default_catalog_base_url")]
    pub api_base_url: String,

    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

fn default_catalog_base_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_page_size() -> u32 {
    treido_core::PRODUCTS_PAGE_SIZE
}

impl Default for CatalogSettings {
    fn default() -> Self {
        CatalogSettings {
            api_base_url: default_catalog_base_url(),
            page_size: default_page_size(),
        }
    }
}

// =============================================================================
// Auth Settings
// =============================================================================

/// Identity is established upstream; the API trusts a forwarded header.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSettings {
    #[serde(default = "default_user_header")]
    pub user_header: String,
}

fn default_user_header() -> String {
    "x-user-id".to_string()
}

impl Default for AuthSettings {
    fn default() -> Self {
        AuthSettings {
            user_header: default_user_header(),
        }
    }
}

// =============================================================================
// Main Configuration
// =============================================================================

/// Complete market API configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MarketConfig {
    #[serde(default)]
    pub server: ServerSettings,

    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub payments: PaymentSettings,

    #[serde(default)]
    pub catalog: CatalogSettings,

    #[serde(default)]
    pub auth: AuthSettings,
}

impl MarketConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (market.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> MarketResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading market config from file");
                let contents = std::fs::read_to_string(&path)
                    .map_err(|e| MarketError::Config(format!("{}: {}", path.display(), e)))?;
                config = toml::from_str(&contents)
                    .map_err(|e| MarketError::Config(format!("{}: {}", path.display(), e)))?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load market config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> MarketResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| MarketError::Config("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| MarketError::Config(e.to_string()))?;
        }

        let contents = toml::to_string_pretty(self).map_err(|e| MarketError::Config(e.to_string()))?;
        std::fs::write(&path, contents).map_err(|e| MarketError::Config(e.to_string()))?;

        info!(?path, "Market config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> MarketResult<()> {
        if self.payments.enabled && self.payments.secret_key.trim().is_empty() {
            return Err(MarketError::Config(
                "payments.secret_key is required when payments are enabled".into(),
            ));
        }

        for (name, value) in [
            ("payments.api_base_url", &self.payments.api_base_url),
            ("payments.app_url", &self.payments.app_url),
            ("catalog.api_base_url", &self.catalog.api_base_url),
        ] {
            if !value.starts_with("http://") && !value.starts_with("https://") {
                return Err(MarketError::Config(format!(
                    "{} must start with http:// or https://, got: {}",
                    name, value
                )));
            }
        }

        if self.catalog.page_size == 0 || self.catalog.page_size > treido_core::MAX_PAGE_SIZE {
            return Err(MarketError::Config(format!(
                "catalog.page_size must be between 1 and {}",
                treido_core::MAX_PAGE_SIZE
            )));
        }

        if self.database.max_connections == 0 {
            return Err(MarketError::Config(
                "database.max_connections must be greater than 0".into(),
            ));
        }

        if self.auth.user_header.trim().is_empty() {
            return Err(MarketError::Config("auth.user_header must not be empty".into()));
        }

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(addr) = std::env::var("TREIDO_BIND_ADDR") {
            self.server.bind_addr = addr;
        }

        if let Ok(port) = std::env::var("TREIDO_PORT") {
            if let Ok(p) = port.parse::<u16>() {
                debug!(port = p, "Overriding port from environment");
                self.server.port = p;
            }
        }

        if let Ok(path) = std::env::var("TREIDO_DATABASE_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        if let Ok(url) = std::env::var("TREIDO_APP_URL") {
            self.payments.app_url = url;
        }

        if let Ok(url) = std::env::var("TREIDO_CATALOG_URL") {
            self.catalog.api_base_url = url;
        }

        if let Ok(url) = std::env::var("TREIDO_PAYMENTS_URL") {
            self.payments.api_base_url = url;
        }

        if let Ok(key) = std::env::var("STRIPE_SECRET_KEY") {
            if !key.is_empty() {
                debug!("Payment secret key set from environment");
                self.payments.secret_key = key;
                self.payments.enabled = true;
            }
        }

        if let Ok(header) = std::env::var("TREIDO_USER_HEADER") {
            self.auth.user_header = header.to_lowercase();
        }
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("bg", "treido", "market")
            .map(|dirs| dirs.config_dir().join("market.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = MarketConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.bind_address(), "0.0.0.0:8080");
        assert_eq!(config.catalog.page_size, 24);
        assert_eq!(config.payments.currency, "eur");
        assert!(!config.payments.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = MarketConfig::default();

        // Enabled payments need a key
        config.payments.enabled = true;
        assert!(config.validate().is_err());
        config.payments.secret_key = "sk_test_123".into();
        assert!(config.validate().is_ok());

        config.catalog.api_base_url = "ftp://catalog".into();
        assert!(config.validate().is_err());
        config.catalog.api_base_url = "https://catalog.test".into();

        config.catalog.page_size = 0;
        assert!(config.validate().is_err());
        config.catalog.page_size = 24;

        config.auth.user_header = " ".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_serialization() {
        let config = MarketConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[server]"));
        assert!(toml_str.contains("[payments]"));
        assert!(toml_str.contains("[catalog]"));

        let parsed: MarketConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.server.port, config.server.port);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let parsed: MarketConfig = toml::from_str("[server]\nport = 9000\n").unwrap();
        assert_eq!(parsed.server.port, 9000);
        assert_eq!(parsed.server.bind_addr, "0.0.0.0");
        assert_eq!(parsed.auth.user_header, "x-user-id");
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("market.toml");

        let mut config = MarketConfig::default();
        config.catalog.page_size = 48;
        config.database.path = dir.path().join("market.db");
        config.save(Some(path.clone())).unwrap();

        let loaded = MarketConfig::load(Some(path)).unwrap();
        assert_eq!(loaded.catalog.page_size, 48);
        assert_eq!(loaded.database.path, dir.path().join("market.db"));
    }

    #[test]
    fn test_invalid_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("market.toml");
        std::fs::write(&path, "[catalog]\npage_size = 0\n").unwrap();

        assert!(MarketConfig::load(Some(path.clone())).is_err());
        let config = MarketConfig::load_or_default(Some(path));
        assert_eq!(config.catalog.page_size, 24);
    }
}
