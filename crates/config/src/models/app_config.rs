use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::{database::DatabaseConfig, logging::LogConfig};
use crate::{validation::ConfigValidator, ConfigError, ConfigResult};

/// Default locations checked when no config file is given explicitly
pub const DEFAULT_CONFIG_PATHS: [&str; 3] = [
    "config/marketplace.toml",
    "marketplace.toml",
    "/etc/marketplace/config.toml",
];

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LogConfig,
}

impl AppConfig {
    /// Load configuration from config file and environment variables
    ///
    /// Load order:
    /// 1. Default configuration
    /// 2. Config file (TOML format)
    /// 3. Environment variable overrides (`MARKETPLACE_DATABASE__URL`, ...)
    pub fn load(config_path: Option<&str>) -> ConfigResult<Self> {
        let defaults = DatabaseConfig::default();
        let mut builder = ConfigBuilder::builder()
            .set_default("database.url", defaults.url)?
            .set_default("database.max_connections", defaults.max_connections as i64)?
            .set_default("database.min_connections", defaults.min_connections as i64)?
            .set_default(
                "database.connection_timeout_seconds",
                defaults.connection_timeout_seconds as i64,
            )?
            .set_default(
                "database.idle_timeout_seconds",
                defaults.idle_timeout_seconds as i64,
            )?
            .set_default("database.auto_migrate", defaults.auto_migrate)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?;

        if let Some(path) = config_path {
            if !Path::new(path).exists() {
                return Err(ConfigError::File(format!("配置文件不存在: {path}")));
            }
            builder = builder.add_source(File::new(path, FileFormat::Toml));
        } else if let Some(path) = DEFAULT_CONFIG_PATHS
            .iter()
            .find(|path| Path::new(path).exists())
        {
            builder = builder.add_source(File::new(path, FileFormat::Toml));
        }

        builder = builder.add_source(
            Environment::with_prefix("MARKETPLACE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: AppConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from TOML string
    pub fn from_toml(toml_str: &str) -> ConfigResult<Self> {
        let config: AppConfig = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to TOML string
    pub fn to_toml(&self) -> ConfigResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        self.database.validate()?;
        self.logging.validate()?;
        Ok(())
    }
}
