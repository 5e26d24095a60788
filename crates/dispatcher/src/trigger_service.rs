use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use harvester_core::models::{HistoryReport, TaskDefinition, TriggerDefinition, TriggerRecord};
use harvester_core::traits::{
    CrudRepository, HarvestExecutor, HistoryRepository, TriggerContext, TriggerFactory,
    TriggerInstance, TriggerState,
};
use harvester_core::{HarvesterError, HarvesterResult, Registries, StructuredLogger};
use serde::Serialize;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::info;
use uuid::Uuid;

/// 把执行服务包装成触发器上下文
pub struct ExecutorTriggerContext {
    task_id: Option<Uuid>,
    executor: Arc<dyn HarvestExecutor>,
    history: Arc<dyn HistoryRepository>,
}

impl ExecutorTriggerContext {
    pub fn new(
        task_id: Option<Uuid>,
        executor: Arc<dyn HarvestExecutor>,
        history: Arc<dyn HistoryRepository>,
    ) -> Self {
        Self {
            task_id,
            executor,
            history,
        }
    }
}

#[async_trait]
impl TriggerContext for ExecutorTriggerContext {
    fn task_id(&self) -> Option<Uuid> {
        self.task_id
    }

    async fn submit(
        &self,
        task: &TaskDefinition,
        cancel: CancellationToken,
    ) -> HarvesterResult<Uuid> {
        self.executor.submit(self.task_id, task, cancel).await
    }

    async fn execute(
        &self,
        task: &TaskDefinition,
        cancel: CancellationToken,
    ) -> HarvesterResult<HistoryReport> {
        self.executor.execute(self.task_id, task, cancel).await
    }

    async fn last_harvest(&self) -> HarvesterResult<Option<DateTime<Utc>>> {
        match self.task_id {
            Some(task_id) => self.history.last_harvest(task_id).await,
            None => Ok(None),
        }
    }
}

/// 激活中的触发器概要
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActiveTrigger {
    pub id: Uuid,
    #[serde(rename = "taskId")]
    pub task_id: Option<Uuid>,
    #[serde(rename = "type")]
    pub type_id: String,
    pub state: TriggerState,
}

struct Entry {
    task_id: Option<Uuid>,
    instance: Arc<dyn TriggerInstance>,
}

/// 触发器管理服务
///
/// 重复触发的触发器会保存到存储中，启动时通过 [`activate_stored`](Self::activate_stored) 恢复。
/// `NOW` 这类一次性触发器提交后不再登记，采集进程通过 `ProcessesService` 中止。
pub struct TriggersService {
    registries: Arc<Registries>,
    store: Arc<dyn CrudRepository<TriggerRecord>>,
    executor: Arc<dyn HarvestExecutor>,
    history: Arc<dyn HistoryRepository>,
    active: RwLock<HashMap<Uuid, Entry>>,
}

impl TriggersService {
    pub fn new(
        registries: Arc<Registries>,
        store: Arc<dyn CrudRepository<TriggerRecord>>,
        executor: Arc<dyn HarvestExecutor>,
        history: Arc<dyn HistoryRepository>,
    ) -> Self {
        Self {
            registries,
            store,
            executor,
            history,
            active: RwLock::new(HashMap::new()),
        }
    }

    fn context(&self, task_id: Option<Uuid>) -> Arc<dyn TriggerContext> {
        Arc::new(ExecutorTriggerContext::new(
            task_id,
            self.executor.clone(),
            self.history.clone(),
        ))
    }

    fn factory(&self, definition: &TriggerDefinition) -> HarvesterResult<Arc<dyn TriggerFactory>> {
        self.registries.triggers.resolve(&definition.type_id).map_err(|e| match e {
            HarvesterError::NotFound { key, .. } => HarvesterError::invalid_definition(key),
            other => other,
        })
    }

    fn instantiate(&self, definition: &TriggerDefinition) -> HarvesterResult<Arc<dyn TriggerInstance>> {
        definition.task_definition.validate()?;
        self.factory(definition)?.create_instance(definition)
    }

    /// 创建并激活触发器，返回触发器ID
    ///
    /// 重复触发的触发器先保存再激活，激活失败时删除已保存的记录。
    pub async fn schedule(
        &self,
        task_id: Option<Uuid>,
        definition: TriggerDefinition,
    ) -> HarvesterResult<Uuid> {
        let instance = self.instantiate(&definition)?;
        let context = self.context(task_id);

        let recurring = instance.recurring();
        let id = if recurring {
            let id = self
                .store
                .create(TriggerRecord {
                    task_id,
                    definition: definition.clone(),
                })
                .await?;
            if let Err(e) = instance.activate(context).await {
                instance.deactivate().await;
                if let Err(rollback) = self.store.delete(id).await {
                    StructuredLogger::log_persistence_failure("delete_trigger", &rollback);
                }
                return Err(e);
            }
            id
        } else {
            instance.activate(context).await?;
            instance.id()
        };

        info!(
            "触发器 {} ({}) 已激活, 任务: {}",
            id,
            definition.type_id,
            task_id.map_or_else(|| "-".to_string(), |id| id.to_string())
        );
        // 一次性触发器提交后交给进程登记表管理
        if recurring {
            self.active
                .write()
                .await
                .insert(id, Entry { task_id, instance });
        }
        Ok(id)
    }

    /// 激活存储中的全部触发器，返回成功激活的数量
    ///
    /// 单个触发器失败只记录日志，不影响其余触发器。
    pub async fn activate_stored(&self) -> HarvesterResult<usize> {
        let records = self.store.list().await?;
        let mut activated = 0;

        for (id, record) in records {
            if self.active.read().await.contains_key(&id) {
                continue;
            }
            let type_id = record.definition.type_id.clone();
            let result = async {
                let instance = self.instantiate(&record.definition)?;
                instance.activate(self.context(record.task_id)).await?;
                Ok::<_, HarvesterError>(instance)
            }
            .await;

            match result {
                Ok(instance) => {
                    self.active.write().await.insert(
                        id,
                        Entry {
                            task_id: record.task_id,
                            instance,
                        },
                    );
                    activated += 1;
                }
                Err(e) => StructuredLogger::log_trigger_failure(id, &type_id, &e),
            }
        }

        info!("已恢复 {} 个触发器", activated);
        Ok(activated)
    }

    /// 停用触发器并删除其记录
    pub async fn deactivate(&self, id: Uuid) -> HarvesterResult<()> {
        let entry = self.active.write().await.remove(&id);
        let was_active = entry.is_some();
        if let Some(entry) = entry {
            entry.instance.deactivate().await;
        }
        let deleted = self.store.delete(id).await?;
        if !was_active && !deleted {
            return Err(HarvesterError::not_found("触发器", id));
        }
        info!("触发器 {} 已停用", id);
        Ok(())
    }

    /// 停用任务的全部触发器，返回停用的数量
    pub async fn deactivate_for_task(&self, task_id: Uuid) -> HarvesterResult<usize> {
        let mut ids: Vec<Uuid> = self
            .active
            .read()
            .await
            .iter()
            .filter(|(_, entry)| entry.task_id == Some(task_id))
            .map(|(id, _)| *id)
            .collect();
        for (id, record) in self.store.list().await? {
            if record.task_id == Some(task_id) && !ids.contains(&id) {
                ids.push(id);
            }
        }
        for id in &ids {
            self.deactivate(*id).await?;
        }
        Ok(ids.len())
    }

    pub async fn list_active(&self, task_id: Option<Uuid>) -> Vec<ActiveTrigger> {
        let mut triggers: Vec<ActiveTrigger> = self
            .active
            .read()
            .await
            .iter()
            .filter(|(_, entry)| task_id.is_none() || entry.task_id == task_id)
            .map(|(id, entry)| ActiveTrigger {
                id: *id,
                task_id: entry.task_id,
                type_id: entry.instance.definition().type_id.clone(),
                state: entry.instance.state(),
            })
            .collect();
        triggers.sort_by_key(|trigger| trigger.id);
        triggers
    }

    /// 停用全部触发器并关闭所有工厂，存储中的记录保留
    pub async fn shutdown(&self) {
        let entries: Vec<(Uuid, Entry)> = self.active.write().await.drain().collect();
        for (id, entry) in entries {
            entry.instance.deactivate().await;
            info!("触发器 {} 已关闭", id);
        }
        for factory in self.registries.triggers.factories() {
            factory.close().await;
        }
        info!("全部触发器工厂已关闭 ({} 个)", self.registries.triggers.len());
    }
}
