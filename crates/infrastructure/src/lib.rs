//! # Harvester Infrastructure
//!
//! 任务、触发器、代理定义和采集历史的存储实现：
//!
//! - [`memory`] 内存存储，用于单次运行和测试
//! - [`database`] 基于 `sqlx` 的 SQLite 存储，启动时自动建表
//! - [`store_factory::StoreFactory`] 按配置选择存储后端

pub mod database;
pub mod error_handling;
pub mod memory;
pub mod store_factory;

pub use database::{DatabaseManager, SqliteDefinitionStore, SqliteHistoryRepository};
pub use memory::{InMemoryHistoryRepository, InMemoryRepository};
pub use store_factory::{StoreFactory, Stores};
