//! SQLite 存储
//!
//! 任务、触发器、代理定义以 JSON 文本保存，每类一张表；采集历史和失败的数据ID单独建表。
//! 连接时自动创建缺失的表。

pub mod definition_store;
pub mod history_repository;

pub use definition_store::{DefinitionTable, SqliteDefinitionStore};
pub use history_repository::SqliteHistoryRepository;

use std::str::FromStr;
use std::time::Duration;

use harvester_core::config::StorageConfig;
use harvester_core::{HarvesterError, HarvesterResult};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error_handling::{db_error, RepositoryOperation};

pub struct DatabaseManager {
    pool: SqlitePool,
}

impl DatabaseManager {
    /// 连接数据库并初始化表结构
    pub async fn connect(config: &StorageConfig) -> HarvesterResult<Self> {
        let options = SqliteConnectOptions::from_str(&config.url)
            .map_err(|e| {
                HarvesterError::Configuration(format!("无效的数据库地址 '{}': {e}", config.url))
            })?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(30))
            .connect_with(options)
            .await
            .map_err(db_error(RepositoryOperation::Read, "数据库连接"))?;

        let manager = Self { pool };
        manager.migrate().await?;
        info!("已连接数据库: {}", config.url);
        Ok(manager)
    }

    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn migrate(&self) -> HarvesterResult<()> {
        debug!("初始化 SQLite 表结构");

        for table in DefinitionTable::ALL {
            let sql = format!(
                r#"
                CREATE TABLE IF NOT EXISTS {} (
                    id TEXT PRIMARY KEY,
                    definition TEXT NOT NULL,
                    created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
                    updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
                )
                "#,
                table.name()
            );
            sqlx::query(&sql)
                .execute(&self.pool)
                .await
                .map_err(db_error(RepositoryOperation::Migrate, table.name()))?;
        }

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS history_events (
                id TEXT PRIMARY KEY,
                task_id TEXT NOT NULL,
                started_at DATETIME NOT NULL,
                ended_at DATETIME NOT NULL,
                report TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(db_error(RepositoryOperation::Migrate, "history_events"))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS failed_data_ids (
                event_id TEXT NOT NULL,
                data_id TEXT NOT NULL,
                FOREIGN KEY (event_id) REFERENCES history_events(id) ON DELETE CASCADE
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(db_error(RepositoryOperation::Migrate, "failed_data_ids"))?;

        let indexes = [
            "CREATE INDEX IF NOT EXISTS idx_history_task_id ON history_events(task_id, started_at)",
            "CREATE INDEX IF NOT EXISTS idx_failed_data_ids_event ON failed_data_ids(event_id)",
        ];
        for index_sql in indexes {
            sqlx::query(index_sql)
                .execute(&self.pool)
                .await
                .map_err(db_error(RepositoryOperation::Migrate, "索引"))?;
        }

        Ok(())
    }

    pub async fn health_check(&self) -> HarvesterResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(db_error(RepositoryOperation::Query, "数据库"))?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}
