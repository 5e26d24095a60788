//! 任务与代理定义的管理服务

use std::collections::BTreeMap;
use std::sync::Arc;

use harvester_core::models::{
    BrokerCategory, BrokerReference, DataReference, EntityDefinition, TaskDefinition,
};
use harvester_core::traits::{CrudRepository, HistoryRepository};
use harvester_core::{HarvesterError, HarvesterResult, Registries};
use tracing::info;
use uuid::Uuid;

use crate::execution::ExecutionService;

/// 任务定义管理
pub struct TasksService {
    tasks: Arc<dyn CrudRepository<TaskDefinition>>,
    history: Arc<dyn HistoryRepository>,
    executor: Option<Arc<ExecutionService>>,
}

impl TasksService {
    pub fn new(
        tasks: Arc<dyn CrudRepository<TaskDefinition>>,
        history: Arc<dyn HistoryRepository>,
    ) -> Self {
        Self {
            tasks,
            history,
            executor: None,
        }
    }

    /// 用于读取单条记录的执行服务
    pub fn with_executor(mut self, executor: Arc<ExecutionService>) -> Self {
        self.executor = Some(executor);
        self
    }

    pub async fn create(&self, task: TaskDefinition) -> HarvesterResult<Uuid> {
        task.validate()?;
        let title = task.title();
        let id = self.tasks.create(task).await?;
        info!(task.id = %id, title = %title, "任务已创建");
        Ok(id)
    }

    pub async fn read(&self, id: Uuid) -> HarvesterResult<Option<TaskDefinition>> {
        self.tasks.read(id).await
    }

    /// 读取任务，不存在时返回 NotFound
    pub async fn get(&self, id: Uuid) -> HarvesterResult<TaskDefinition> {
        self.read(id)
            .await?
            .ok_or_else(|| HarvesterError::not_found("任务", id))
    }

    pub async fn update(&self, id: Uuid, task: TaskDefinition) -> HarvesterResult<bool> {
        task.validate()?;
        self.tasks.update(id, task).await
    }

    /// 删除任务并清除它的历史
    pub async fn delete(&self, id: Uuid) -> HarvesterResult<bool> {
        let deleted = self.tasks.delete(id).await?;
        if deleted {
            self.history.purge(id).await?;
            info!(task.id = %id, "任务及其历史已删除");
        }
        Ok(deleted)
    }

    pub async fn list(&self) -> HarvesterResult<Vec<(Uuid, TaskDefinition)>> {
        self.tasks.list().await
    }

    pub fn history(&self) -> &Arc<dyn HistoryRepository> {
        &self.history
    }

    /// 从任务的数据源重新读取一条记录，通常用于核对失败记录
    ///
    /// `params` 按运行参数覆盖数据源配置，可以携带访问凭据。
    pub async fn fetch_content(
        &self,
        task_id: Uuid,
        record_id: &str,
        params: BTreeMap<String, String>,
    ) -> HarvesterResult<DataReference> {
        let executor = self.executor.as_ref().ok_or_else(|| {
            HarvesterError::Configuration("任务服务未配置执行服务，无法读取记录".to_string())
        })?;
        let task = self.get(task_id).await?;
        info!(task.id = %task_id, record.id = %record_id, "读取任务数据源中的记录");
        executor
            .fetch_content(Some(task_id), &task, record_id, params)
            .await
    }
}

/// 可复用代理定义管理
pub struct BrokersService {
    brokers: Arc<dyn CrudRepository<BrokerReference>>,
    registries: Arc<Registries>,
}

impl BrokersService {
    pub fn new(
        brokers: Arc<dyn CrudRepository<BrokerReference>>,
        registries: Arc<Registries>,
    ) -> Self {
        Self {
            brokers,
            registries,
        }
    }

    /// 按类别构建一次代理，确认定义可用
    fn check(&self, category: BrokerCategory, definition: &EntityDefinition) -> HarvesterResult<()> {
        match category {
            BrokerCategory::Inbound => {
                self.registries
                    .inputs
                    .resolve(&definition.type_id)?
                    .build(definition)?;
            }
            BrokerCategory::Outbound => {
                self.registries
                    .outputs
                    .resolve(&definition.type_id)?
                    .build(definition)?;
            }
        }
        Ok(())
    }

    pub async fn create(
        &self,
        category: BrokerCategory,
        definition: EntityDefinition,
        resource_locator: impl Into<String>,
    ) -> HarvesterResult<Uuid> {
        self.check(category, &definition)?;
        let reference = BrokerReference {
            id: Uuid::nil(),
            category,
            definition,
            resource_locator: resource_locator.into(),
        };
        let id = self.brokers.create(reference).await?;
        info!(broker.id = %id, %category, "代理定义已创建");
        Ok(id)
    }

    pub async fn read(&self, id: Uuid) -> HarvesterResult<Option<BrokerReference>> {
        Ok(self.brokers.read(id).await?.map(|mut reference| {
            reference.id = id;
            reference
        }))
    }

    /// 更新代理定义，类别不可更改
    pub async fn update(&self, id: Uuid, definition: EntityDefinition) -> HarvesterResult<bool> {
        let Some(mut reference) = self.read(id).await? else {
            return Ok(false);
        };
        self.check(reference.category, &definition)?;
        reference.definition = definition;
        self.brokers.update(id, reference).await
    }

    pub async fn delete(&self, id: Uuid) -> HarvesterResult<bool> {
        self.brokers.delete(id).await
    }

    pub async fn list(&self, category: Option<BrokerCategory>) -> HarvesterResult<Vec<BrokerReference>> {
        Ok(self
            .brokers
            .list()
            .await?
            .into_iter()
            .filter(|(_, reference)| category.map_or(true, |c| reference.category == c))
            .map(|(id, mut reference)| {
                reference.id = id;
                reference
            })
            .collect())
    }
}
