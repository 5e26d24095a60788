use async_trait::async_trait;
use chrono::{DateTime, Utc};
use harvester_core::models::{History, HistoryEvent, HistoryReport};
use harvester_core::traits::HistoryRepository;
use harvester_core::HarvesterResult;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::error_handling::{db_error, RepositoryErrorHelpers, RepositoryOperation};

const ENTITY: &str = "采集历史";

pub struct SqliteHistoryRepository {
    pool: SqlitePool,
}

impl SqliteHistoryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_event(row: &SqliteRow) -> HarvesterResult<HistoryEvent> {
        let read = db_error(RepositoryOperation::Read, ENTITY);
        let id: String = row.try_get("id").map_err(&read)?;
        let task_id: String = row.try_get("task_id").map_err(&read)?;
        let start: DateTime<Utc> = row.try_get("started_at").map_err(&read)?;
        let end: DateTime<Utc> = row.try_get("ended_at").map_err(&read)?;
        let report: String = row.try_get("report").map_err(&read)?;

        let parse_id = |value: &str| {
            Uuid::parse_str(value).map_err(|e| RepositoryErrorHelpers::corrupted(ENTITY, &id, e))
        };
        let report: HistoryReport = serde_json::from_str(&report)
            .map_err(|e| RepositoryErrorHelpers::corrupted(ENTITY, &id, e))?;

        Ok(HistoryEvent {
            id: parse_id(&id)?,
            task_id: parse_id(&task_id)?,
            start,
            end,
            report,
        })
    }
}

#[async_trait]
impl HistoryRepository for SqliteHistoryRepository {
    #[instrument(skip(self, event), fields(event_id = %event.id, task_id = %event.task_id))]
    async fn create(&self, event: HistoryEvent) -> HarvesterResult<Uuid> {
        let report = serde_json::to_string(&event.report)?;
        sqlx::query(
            r#"
            INSERT INTO history_events (id, task_id, started_at, ended_at, report)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(event.id.to_string())
        .bind(event.task_id.to_string())
        .bind(event.start)
        .bind(event.end)
        .bind(report)
        .execute(&self.pool)
        .await
        .map_err(db_error(RepositoryOperation::Create, ENTITY))?;

        debug!("写入采集历史: {}", event.id);
        Ok(event.id)
    }

    async fn list(&self, task_id: Uuid) -> HarvesterResult<History> {
        let rows = sqlx::query(
            "SELECT id, task_id, started_at, ended_at, report
             FROM history_events WHERE task_id = $1 ORDER BY started_at",
        )
        .bind(task_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(db_error(RepositoryOperation::Query, ENTITY))?;

        let events: HarvesterResult<Vec<HistoryEvent>> =
            rows.iter().map(Self::row_to_event).collect();
        Ok(History(events?))
    }

    async fn purge(&self, task_id: Uuid) -> HarvesterResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(db_error(RepositoryOperation::Delete, ENTITY))?;

        sqlx::query(
            "DELETE FROM failed_data_ids
             WHERE event_id IN (SELECT id FROM history_events WHERE task_id = $1)",
        )
        .bind(task_id.to_string())
        .execute(&mut *tx)
        .await
        .map_err(db_error(RepositoryOperation::Delete, ENTITY))?;

        let result = sqlx::query("DELETE FROM history_events WHERE task_id = $1")
            .bind(task_id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(db_error(RepositoryOperation::Delete, ENTITY))?;

        tx.commit()
            .await
            .map_err(db_error(RepositoryOperation::Delete, ENTITY))?;

        debug!("清除任务 {} 的 {} 条历史", task_id, result.rows_affected());
        Ok(())
    }

    async fn store_failed_data_id(&self, event_id: Uuid, data_id: &str) -> HarvesterResult<()> {
        sqlx::query("INSERT INTO failed_data_ids (event_id, data_id) VALUES ($1, $2)")
            .bind(event_id.to_string())
            .bind(data_id)
            .execute(&self.pool)
            .await
            .map_err(db_error(RepositoryOperation::Create, "失败数据ID"))?;
        Ok(())
    }

    async fn failed_data_ids(&self, event_id: Uuid) -> HarvesterResult<Vec<String>> {
        let rows = sqlx::query("SELECT data_id FROM failed_data_ids WHERE event_id = $1 ORDER BY rowid")
            .bind(event_id.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(db_error(RepositoryOperation::Query, "失败数据ID"))?;

        rows.iter()
            .map(|row| {
                row.try_get::<String, _>("data_id")
                    .map_err(db_error(RepositoryOperation::Query, "失败数据ID"))
            })
            .collect()
    }

    async fn last_harvest(&self, task_id: Uuid) -> HarvesterResult<Option<DateTime<Utc>>> {
        let row = sqlx::query(
            "SELECT started_at FROM history_events
             WHERE task_id = $1 ORDER BY started_at DESC LIMIT 1",
        )
        .bind(task_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error(RepositoryOperation::Query, ENTITY))?;

        match row {
            Some(row) => Ok(Some(
                row.try_get("started_at")
                    .map_err(db_error(RepositoryOperation::Query, ENTITY))?,
            )),
            None => Ok(None),
        }
    }
}
