use std::sync::Arc;

use harvester_core::config::{StorageBackend, StorageConfig};
use harvester_core::models::{BrokerReference, TaskDefinition, TriggerRecord};
use harvester_core::traits::{CrudRepository, HistoryRepository};
use harvester_core::{HarvesterError, HarvesterResult};
use tracing::{debug, info};

use crate::database::{
    DatabaseManager, DefinitionTable, SqliteDefinitionStore, SqliteHistoryRepository,
};
use crate::memory::{InMemoryHistoryRepository, InMemoryRepository};

/// 引擎使用的全部存储
#[derive(Clone)]
pub struct Stores {
    pub tasks: Arc<dyn CrudRepository<TaskDefinition>>,
    pub triggers: Arc<dyn CrudRepository<TriggerRecord>>,
    pub brokers: Arc<dyn CrudRepository<BrokerReference>>,
    pub history: Arc<dyn HistoryRepository>,
    database: Option<Arc<DatabaseManager>>,
}

impl Stores {
    pub fn in_memory() -> Self {
        Self {
            tasks: Arc::new(InMemoryRepository::new("任务")),
            triggers: Arc::new(InMemoryRepository::new("触发器")),
            brokers: Arc::new(InMemoryRepository::new("代理")),
            history: Arc::new(InMemoryHistoryRepository::new()),
            database: None,
        }
    }

    pub fn sqlite(database: Arc<DatabaseManager>) -> Self {
        let pool = database.pool().clone();
        Self {
            tasks: Arc::new(SqliteDefinitionStore::<TaskDefinition>::new(
                pool.clone(),
                DefinitionTable::Tasks,
            )),
            triggers: Arc::new(SqliteDefinitionStore::<TriggerRecord>::new(
                pool.clone(),
                DefinitionTable::Triggers,
            )),
            brokers: Arc::new(SqliteDefinitionStore::<BrokerReference>::new(
                pool.clone(),
                DefinitionTable::Brokers,
            )),
            history: Arc::new(SqliteHistoryRepository::new(pool)),
            database: Some(database),
        }
    }

    pub fn is_persistent(&self) -> bool {
        self.database.is_some()
    }

    /// 关闭数据库连接池
    pub async fn close(&self) {
        if let Some(database) = &self.database {
            database.close().await;
            debug!("数据库连接池已关闭");
        }
    }
}

pub struct StoreFactory;

impl StoreFactory {
    pub async fn build(config: &StorageConfig) -> HarvesterResult<Stores> {
        debug!("Creating stores with backend: {:?}", config.backend);
        config
            .validate()
            .map_err(|e| HarvesterError::Configuration(e.to_string()))?;

        match config.backend {
            StorageBackend::Memory => {
                info!("使用内存存储，进程退出后数据不会保留");
                Ok(Stores::in_memory())
            }
            StorageBackend::Sqlite => {
                info!("使用 SQLite 存储: {}", config.url);
                let database = DatabaseManager::connect(config).await?;
                Ok(Stores::sqlite(Arc::new(database)))
            }
        }
    }
}
