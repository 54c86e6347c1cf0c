//! Configuration management
//!
//! This module handles loading and parsing configuration for Rubrica.
//! Configuration is read from a YAML file; missing optional values are
//! filled with sensible defaults, so an empty (or absent) file yields a
//! working single-binary setup with an SQLite database.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Cache configuration
    #[serde(default)]
    pub cache: CacheConfig,
    /// Template configuration
    #[serde(default)]
    pub templates: TemplateConfig,
    /// Catalog configuration (registered content kinds, filters)
    #[serde(default)]
    pub catalog: CatalogConfig,
    /// Initial admin account seeded on first start
    #[serde(default)]
    pub admin: AdminConfig,
}

impl Config {
    /// Load configuration from a YAML file.
    ///
    /// A missing file is not an error: defaults are used so the binary
    /// can start without any configuration at all.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;
        Ok(config)
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
    /// CORS allowed origin (for cookie-based auth from the admin widget)
    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origin: default_cors_origin(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_cors_origin() -> String {
    "http://localhost:3000".to_string()
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database driver (sqlite or mysql)
    #[serde(default)]
    pub driver: DatabaseDriver,
    /// Database connection URL
    #[serde(default = "default_database_url")]
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            driver: DatabaseDriver::default(),
            url: default_database_url(),
        }
    }
}

fn default_database_url() -> String {
    "data/rubrica.db".to_string()
}

/// Database driver type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseDriver {
    /// SQLite (default)
    #[default]
    Sqlite,
    /// MySQL
    Mysql,
}

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum number of cached entries
    #[serde(default = "default_cache_capacity")]
    pub capacity: u64,
    /// Cache TTL in seconds
    #[serde(default = "default_ttl")]
    pub ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: default_cache_capacity(),
            ttl_seconds: default_ttl(),
        }
    }
}

fn default_cache_capacity() -> u64 {
    10_000
}

fn default_ttl() -> u64 {
    3600
}

/// Template configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateConfig {
    /// Directory with template overrides. Templates found here shadow
    /// the embedded defaults by name.
    #[serde(default = "default_template_path")]
    pub path: PathBuf,
    /// Menu tree display mode: `expanded`, `collapsed` or `drilldown`
    #[serde(default = "default_menu_mode")]
    pub menu_mode: String,
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            path: default_template_path(),
            menu_mode: default_menu_mode(),
        }
    }
}

fn default_template_path() -> PathBuf {
    PathBuf::from("templates")
}

fn default_menu_mode() -> String {
    "drilldown".to_string()
}

/// Catalog configuration
///
/// Controls which row filters are applied when listing catalog content.
/// Filters are plain column/value equality pairs appended to listing
/// queries, either for every kind (`filters`) or per kind
/// (`kind_filters`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Page size used by the remoting grid query when the client sends none
    #[serde(default = "default_grid_page_size")]
    pub grid_page_size: i64,
    /// Filters applied to every registered kind
    #[serde(default)]
    pub filters: HashMap<String, String>,
    /// Filters applied per kind ("section", "metaitem", "item")
    #[serde(default)]
    pub kind_filters: HashMap<String, HashMap<String, String>>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            grid_page_size: default_grid_page_size(),
            filters: HashMap::new(),
            kind_filters: HashMap::new(),
        }
    }
}

fn default_grid_page_size() -> i64 {
    25
}

/// Initial admin account
///
/// The account is created only when no user with this name exists, so a
/// changed password in the database is never overwritten from here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminConfig {
    #[serde(default = "default_admin_username")]
    pub username: String,
    #[serde(default = "default_admin_password")]
    pub password: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            username: default_admin_username(),
            password: default_admin_password(),
        }
    }
}

fn default_admin_username() -> String {
    "admin".to_string()
}

fn default_admin_password() -> String {
    "admin".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.database.driver, DatabaseDriver::Sqlite);
        assert_eq!(config.database.url, "data/rubrica.db");
        assert_eq!(config.catalog.grid_page_size, 25);
        assert!(config.catalog.filters.is_empty());
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let config = Config::load(Path::new("/nonexistent/rubrica.yml")).unwrap();
        assert_eq!(config.server.host, "0.0.0.0");
    }

    #[test]
    fn test_parse_partial_yaml() {
        let yaml = r#"
server:
  port: 9000
database:
  driver: mysql
  url: "mysql://root@localhost/catalog"
catalog:
  filters:
    show: "1"
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.database.driver, DatabaseDriver::Mysql);
        assert_eq!(config.catalog.filters.get("show"), Some(&"1".to_string()));
        // defaults still applied for missing fields
        assert_eq!(config.server.host, "0.0.0.0");
    }

    #[test]
    fn test_parse_kind_filters() {
        let yaml = r#"
catalog:
  kind_filters:
    item:
      show: "1"
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        let item_filters = config.catalog.kind_filters.get("item").unwrap();
        assert_eq!(item_filters.get("show"), Some(&"1".to_string()));
    }

    #[test]
    fn test_admin_defaults() {
        let config = Config::default();
        assert_eq!(config.admin.username, "admin");
        assert_eq!(config.admin.password, "admin");

        let yaml = r#"
admin:
  username: boss
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.admin.username, "boss");
        assert_eq!(config.admin.password, "admin");
    }
}
