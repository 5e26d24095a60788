use std::marker::PhantomData;

use async_trait::async_trait;
use harvester_core::traits::CrudRepository;
use harvester_core::HarvesterResult;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::{Row, SqlitePool};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::error_handling::{db_error, RepositoryErrorHelpers, RepositoryOperation};

/// 定义表
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefinitionTable {
    Tasks,
    Triggers,
    Brokers,
}

impl DefinitionTable {
    pub const ALL: [DefinitionTable; 3] = [
        DefinitionTable::Tasks,
        DefinitionTable::Triggers,
        DefinitionTable::Brokers,
    ];

    pub fn name(self) -> &'static str {
        match self {
            DefinitionTable::Tasks => "tasks",
            DefinitionTable::Triggers => "triggers",
            DefinitionTable::Brokers => "brokers",
        }
    }

    fn entity(self) -> &'static str {
        match self {
            DefinitionTable::Tasks => "任务",
            DefinitionTable::Triggers => "触发器",
            DefinitionTable::Brokers => "代理",
        }
    }
}

/// 以 JSON 文本保存定义的 SQLite 存储
pub struct SqliteDefinitionStore<T> {
    pool: SqlitePool,
    table: DefinitionTable,
    _marker: PhantomData<fn() -> T>,
}

impl<T> SqliteDefinitionStore<T> {
    pub fn new(pool: SqlitePool, table: DefinitionTable) -> Self {
        Self {
            pool,
            table,
            _marker: PhantomData,
        }
    }

    fn decode(&self, id: &str, definition: &str) -> HarvesterResult<(Uuid, T)>
    where
        T: DeserializeOwned,
    {
        let entity = self.table.entity();
        let uuid = Uuid::parse_str(id)
            .map_err(|e| RepositoryErrorHelpers::corrupted(entity, id, e))?;
        let item = serde_json::from_str(definition)
            .map_err(|e| RepositoryErrorHelpers::corrupted(entity, id, e))?;
        Ok((uuid, item))
    }
}

#[async_trait]
impl<T> CrudRepository<T> for SqliteDefinitionStore<T>
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    #[instrument(skip(self, item), fields(table = self.table.name()))]
    async fn create(&self, item: T) -> HarvesterResult<Uuid> {
        let id = Uuid::new_v4();
        let definition = serde_json::to_string(&item)?;
        let sql = format!(
            "INSERT INTO {} (id, definition) VALUES ($1, $2)",
            self.table.name()
        );
        sqlx::query(&sql)
            .bind(id.to_string())
            .bind(definition)
            .execute(&self.pool)
            .await
            .map_err(db_error(RepositoryOperation::Create, self.table.entity()))?;
        debug!("创建{}: {}", self.table.entity(), id);
        Ok(id)
    }

    async fn read(&self, id: Uuid) -> HarvesterResult<Option<T>> {
        let sql = format!(
            "SELECT id, definition FROM {} WHERE id = $1",
            self.table.name()
        );
        let row = sqlx::query(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error(RepositoryOperation::Read, self.table.entity()))?;

        match row {
            Some(row) => {
                let id: String = row
                    .try_get("id")
                    .map_err(db_error(RepositoryOperation::Read, self.table.entity()))?;
                let definition: String = row
                    .try_get("definition")
                    .map_err(db_error(RepositoryOperation::Read, self.table.entity()))?;
                Ok(Some(self.decode(&id, &definition)?.1))
            }
            None => Ok(None),
        }
    }

    async fn update(&self, id: Uuid, item: T) -> HarvesterResult<bool> {
        let definition = serde_json::to_string(&item)?;
        let sql = format!(
            "UPDATE {} SET definition = $2, updated_at = CURRENT_TIMESTAMP WHERE id = $1",
            self.table.name()
        );
        let result = sqlx::query(&sql)
            .bind(id.to_string())
            .bind(definition)
            .execute(&self.pool)
            .await
            .map_err(db_error(RepositoryOperation::Update, self.table.entity()))?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, id: Uuid) -> HarvesterResult<bool> {
        let sql = format!("DELETE FROM {} WHERE id = $1", self.table.name());
        let result = sqlx::query(&sql)
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(db_error(RepositoryOperation::Delete, self.table.entity()))?;
        if result.rows_affected() > 0 {
            debug!("删除{}: {}", self.table.entity(), id);
        }
        Ok(result.rows_affected() > 0)
    }

    async fn list(&self) -> HarvesterResult<Vec<(Uuid, T)>> {
        let sql = format!(
            "SELECT id, definition FROM {} ORDER BY created_at, id",
            self.table.name()
        );
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error(RepositoryOperation::Query, self.table.entity()))?;

        rows.iter()
            .map(|row| {
                let id: String = row
                    .try_get("id")
                    .map_err(db_error(RepositoryOperation::Query, self.table.entity()))?;
                let definition: String = row
                    .try_get("definition")
                    .map_err(db_error(RepositoryOperation::Query, self.table.entity()))?;
                self.decode(&id, &definition)
            })
            .collect()
    }
}
