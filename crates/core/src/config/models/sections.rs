use serde::{Deserialize, Serialize};

/// 调度池配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// 可同时挂起的触发器定时器数量上限提示
    pub pool_size: usize,
    /// 同时运行的采集流水线数量
    pub max_concurrent_harvests: usize,
    pub shutdown_timeout_seconds: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            pool_size: 64,
            max_concurrent_harvests: 8,
            shutdown_timeout_seconds: 30,
        }
    }
}

impl SchedulerConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.pool_size == 0 {
            return Err(anyhow::anyhow!("调度池大小必须大于0"));
        }
        if self.max_concurrent_harvests == 0 {
            return Err(anyhow::anyhow!("最大并发采集数必须大于0"));
        }
        if self.max_concurrent_harvests > self.pool_size {
            return Err(anyhow::anyhow!(
                "最大并发采集数 ({}) 不能超过调度池大小 ({})",
                self.max_concurrent_harvests,
                self.pool_size
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    Sqlite,
}

/// 配置与历史存储
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub url: String,
    pub max_connections: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Memory,
            url: "sqlite://harvester.db?mode=rwc".to_string(),
            max_connections: 5,
        }
    }
}

impl StorageConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.backend == StorageBackend::Sqlite {
            if !self.url.starts_with("sqlite:") {
                return Err(anyhow::anyhow!("SQLite存储地址必须以 sqlite: 开头: {}", self.url));
            }
            if self.max_connections == 0 {
                return Err(anyhow::anyhow!("数据库最大连接数必须大于0"));
            }
        }
        Ok(())
    }
}

/// 采集运行配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarvestConfig {
    /// 全局清理开关，关闭时任何目标都不会删除记录
    pub cleanup_enabled: bool,
    /// 代理单次调用（初始化、拉取、发布）的超时时间
    pub broker_timeout_seconds: u64,
    pub locale: String,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            cleanup_enabled: true,
            broker_timeout_seconds: 120,
            locale: "zh-CN".to_string(),
        }
    }
}

impl HarvestConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.broker_timeout_seconds == 0 {
            return Err(anyhow::anyhow!("代理调用超时时间必须大于0"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl LoggingConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.level.as_str()) {
            return Err(anyhow::anyhow!(
                "无效的日志级别: {}，支持的级别: {:?}",
                self.level,
                valid_levels
            ));
        }
        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.format.as_str()) {
            return Err(anyhow::anyhow!(
                "无效的日志格式: {}，支持的格式: {:?}",
                self.format,
                valid_formats
            ));
        }
        Ok(())
    }
}
