use anyhow::{Context, Result};
use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::sections::{HarvestConfig, LoggingConfig, SchedulerConfig, StorageConfig};

/// System configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub harvest: HarvestConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from config file and environment variables
    ///
    /// Load order:
    /// 1. Default configuration
    /// 2. Config file (TOML format)
    /// 3. Environment variable overrides (prefix: HARVESTER__)
    ///
    /// # Arguments
    ///
    /// * `config_path` - Config file path, if None use default paths
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let defaults = AppConfig::default();
        let mut builder = ConfigBuilder::builder()
            .set_default("scheduler.pool_size", defaults.scheduler.pool_size as u64)?
            .set_default(
                "scheduler.max_concurrent_harvests",
                defaults.scheduler.max_concurrent_harvests as u64,
            )?
            .set_default(
                "scheduler.shutdown_timeout_seconds",
                defaults.scheduler.shutdown_timeout_seconds,
            )?
            .set_default("storage.backend", "memory")?
            .set_default("storage.url", defaults.storage.url.as_str())?
            .set_default("storage.max_connections", defaults.storage.max_connections)?
            .set_default("harvest.cleanup_enabled", defaults.harvest.cleanup_enabled)?
            .set_default(
                "harvest.broker_timeout_seconds",
                defaults.harvest.broker_timeout_seconds,
            )?
            .set_default("harvest.locale", defaults.harvest.locale.as_str())?
            .set_default("logging.level", defaults.logging.level.as_str())?
            .set_default("logging.format", defaults.logging.format.as_str())?;

        // 1. Load config file if provided
        if let Some(path) = config_path {
            if Path::new(path).exists() {
                builder = builder.add_source(File::new(path, FileFormat::Toml));
            } else {
                return Err(anyhow::anyhow!("配置文件不存在: {}", path));
            }
        } else {
            let default_paths = [
                "config/harvester.toml",
                "harvester.toml",
                "/etc/harvester/config.toml",
            ];
            if let Some(path) = default_paths.iter().find(|p| Path::new(p).exists()) {
                builder = builder.add_source(File::new(path, FileFormat::Toml));
            }
        }

        // 2. Environment variable overrides - highest priority
        builder = builder.add_source(
            Environment::with_prefix("HARVESTER")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config: AppConfig = builder
            .build()
            .context("构建配置失败")?
            .try_deserialize()
            .context("反序列化配置失败")?;

        config.validate()?;

        Ok(config)
    }

    /// Load configuration from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(toml_str).context("解析TOML配置失败")?;

        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to TOML string
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("序列化配置为TOML失败")
    }

    /// Validate configuration effectiveness
    pub fn validate(&self) -> Result<()> {
        self.scheduler.validate().context("调度配置验证失败")?;
        self.storage.validate().context("存储配置验证失败")?;
        self.harvest.validate().context("采集配置验证失败")?;
        self.logging.validate().context("日志配置验证失败")?;
        Ok(())
    }
}
