//! # 配置管理
//!
//! 采集引擎的配置按以下顺序加载，后者覆盖前者：
//!
//! 1. 内置默认值
//! 2. TOML 配置文件
//! 3. 以 `HARVESTER__` 为前缀的环境变量，例如 `HARVESTER__SCHEDULER__POOL_SIZE=8`
//!
//! ```rust,ignore
//! use harvester_core::config::AppConfig;
//!
//! let config = AppConfig::load(Some("config/harvester.toml"))?;
//! println!("调度池大小: {}", config.scheduler.pool_size);
//! ```

pub mod models;

#[cfg(test)]
mod tests;

pub use models::*;
