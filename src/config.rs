//! Configuration loading.
//!
//! Exposes [`MigrateConfig`] so applications can load the connection
//! descriptor and migrations-directory path from `config/config.toml` or
//! environment variables using `MigrateConfig::load()`. The migration engine
//! itself never reads ambient environment state; configuration is loaded
//! here and passed into constructors.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_user")]
    pub user: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_dbname")]
    pub dbname: String,
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    5432
}

fn default_user() -> String {
    "postgres".to_string()
}

fn default_dbname() -> String {
    "tidemark_dev".to_string()
}

fn default_migrations_dir() -> PathBuf {
    PathBuf::from("migrations")
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            user: default_user(),
            password: String::new(),
            dbname: default_dbname(),
        }
    }
}

impl DatabaseConfig {
    /// Render the descriptor in the key-value connection format accepted by
    /// [`crate::connection::connect`].
    pub fn connection_string(&self) -> String {
        let mut parts = vec![
            format!("host={}", self.host),
            format!("port={}", self.port),
            format!("user={}", self.user),
        ];
        if !self.password.is_empty() {
            parts.push(format!("password={}", self.password));
        }
        parts.push(format!("dbname={}", self.dbname));
        parts.join(" ")
    }
}

#[derive(Debug, Deserialize)]
pub struct MigrateConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default = "default_migrations_dir")]
    pub migrations_dir: PathBuf,
}

impl Default for MigrateConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            migrations_dir: default_migrations_dir(),
        }
    }
}

impl MigrateConfig {
    /// Load the configuration from `config/config.toml`, falling back to env vars.
    ///
    /// Environment variables use the `TIDEMARK` prefix with `__` as the
    /// section separator, e.g. `TIDEMARK__DATABASE__HOST=db.internal`.
    pub fn load() -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .add_source(File::with_name("config/config.toml").required(false))
            .add_source(Environment::with_prefix("TIDEMARK").separator("__"));

        let settings = match builder.build() {
            Ok(cfg) => cfg,
            Err(err) => {
                // If the file existed but was unreadable, warn and retry with env only
                if std::path::Path::new("config/config.toml").exists() {
                    log::warn!("failed to load config file, falling back to env: {}", err);
                }
                Config::builder()
                    .add_source(Environment::with_prefix("TIDEMARK").separator("__"))
                    .build()
                    .map_err(|env_err| {
                        ConfigError::Message(format!(
                            "Failed to load configuration from file and env: {}, then env-only error: {}",
                            err, env_err
                        ))
                    })?
            }
        };

        settings.try_deserialize::<MigrateConfig>().map_err(|e| {
            ConfigError::Message(format!(
                "Migration configuration could not be loaded from file or environment: {}",
                e
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_config_defaults() {
        let cfg = DatabaseConfig::default();
        assert_eq!(cfg.host, "localhost");
        assert_eq!(cfg.port, 5432);
        assert_eq!(cfg.user, "postgres");
        assert_eq!(cfg.dbname, "tidemark_dev");
        assert!(cfg.password.is_empty());
    }

    #[test]
    fn test_connection_string_omits_empty_password() {
        let cfg = DatabaseConfig::default();
        let conn = cfg.connection_string();
        assert_eq!(
            conn,
            "host=localhost port=5432 user=postgres dbname=tidemark_dev"
        );
        assert!(!conn.contains("password"));
    }

    #[test]
    fn test_connection_string_with_password() {
        let cfg = DatabaseConfig {
            password: "secret".to_string(),
            ..DatabaseConfig::default()
        };
        assert!(cfg.connection_string().contains("password=secret"));
    }

    #[test]
    fn test_migrate_config_default_dir() {
        let cfg = MigrateConfig::default();
        assert_eq!(cfg.migrations_dir, PathBuf::from("migrations"));
    }
}
