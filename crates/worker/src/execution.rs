use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use harvester_core::models::{
    BrokerCategory, BrokerReference, DataReference, EntityDefinition, HistoryReport,
    TaskDefinition,
};
use harvester_core::traits::{
    CrudRepository, HarvestExecutor, HistoryRepository, InitContext, IteratorContext,
};
use harvester_core::{HarvesterError, HarvesterResult, Registries, StructuredLogger};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::collector::DataCollector;
use crate::listeners::{HistoryAdaptor, ProgressLogger};
use crate::process::ProcessInstance;
use crate::processes::ProcessesService;

/// 采集执行服务
///
/// 把任务定义解析成具体的代理、过滤器和转换器，创建采集进程并登记到
/// [`ProcessesService`]。未知类型返回 `InvalidDefinition`。
pub struct ExecutionService {
    registries: Arc<Registries>,
    processes: Arc<ProcessesService>,
    brokers: Option<Arc<dyn CrudRepository<BrokerReference>>>,
    history: Option<Arc<dyn HistoryRepository>>,
    broker_timeout: Duration,
    can_cleanup: bool,
}

impl ExecutionService {
    pub fn new(registries: Arc<Registries>, processes: Arc<ProcessesService>) -> Self {
        Self {
            registries,
            processes,
            brokers: None,
            history: None,
            broker_timeout: Duration::from_secs(120),
            can_cleanup: true,
        }
    }

    /// 用于解析 `ref` 引用的代理存储
    pub fn with_brokers(mut self, brokers: Arc<dyn CrudRepository<BrokerReference>>) -> Self {
        self.brokers = Some(brokers);
        self
    }

    pub fn with_history(mut self, history: Arc<dyn HistoryRepository>) -> Self {
        self.history = Some(history);
        self
    }

    pub fn with_broker_timeout(mut self, timeout: Duration) -> Self {
        self.broker_timeout = timeout;
        self
    }

    /// 全局清理开关，关闭后任何运行都不会删除记录
    pub fn with_cleanup(mut self, can_cleanup: bool) -> Self {
        self.can_cleanup = can_cleanup;
        self
    }

    pub fn processes(&self) -> &Arc<ProcessesService> {
        &self.processes
    }

    pub fn registries(&self) -> &Arc<Registries> {
        &self.registries
    }

    /// 解析 `ref` 引用，返回实际使用的定义
    async fn resolve_reference(
        &self,
        definition: &EntityDefinition,
        category: BrokerCategory,
    ) -> HarvesterResult<EntityDefinition> {
        let Some(reference) = definition.reference else {
            return Ok(definition.clone());
        };
        let brokers = self.brokers.as_ref().ok_or_else(|| {
            HarvesterError::invalid_definition(format!("无法解析代理引用 {reference}: 未配置代理存储"))
        })?;
        let stored = brokers
            .read(reference)
            .await?
            .ok_or_else(|| HarvesterError::not_found("代理", reference))?;
        if stored.category != category {
            return Err(HarvesterError::invalid_definition(format!(
                "代理 {reference} 的类别为 {}, 期望 {category}",
                stored.category
            )));
        }
        let mut resolved = stored.definition;
        if definition.label.is_some() {
            resolved.label = definition.label.clone();
        }
        Ok(resolved)
    }

    async fn last_harvest(
        &self,
        task_id: Option<Uuid>,
        task: &TaskDefinition,
    ) -> IteratorContext {
        let mut context = IteratorContext::default();
        if !task.incremental {
            return context;
        }
        if let (Some(task_id), Some(history)) = (task_id, &self.history) {
            match history.last_harvest(task_id).await {
                Ok(last_harvest) => context.last_harvest = last_harvest,
                Err(e) => StructuredLogger::log_persistence_failure("history.last_harvest", &e),
            }
        }
        context
    }

    /// 创建采集进程并登记，不启动
    pub async fn create_process(
        &self,
        task_id: Option<Uuid>,
        task: &TaskDefinition,
        params: BTreeMap<String, String>,
        cancel: CancellationToken,
    ) -> HarvesterResult<Arc<ProcessInstance>> {
        task.validate()?;

        let source = self
            .resolve_reference(&task.source, BrokerCategory::Inbound)
            .await?;
        let input = self
            .registries
            .inputs
            .resolve(&source.type_id)
            .map_err(|e| HarvesterError::invalid_definition(e.to_string()))?
            .build(&source)?;

        let mut outputs = Vec::with_capacity(task.destinations.len());
        for destination in &task.destinations {
            let destination = self
                .resolve_reference(destination, BrokerCategory::Outbound)
                .await?;
            let connector = self
                .registries
                .outputs
                .resolve(&destination.type_id)
                .map_err(|e| HarvesterError::invalid_definition(e.to_string()))?;
            outputs.push(connector.build(&destination)?);
        }

        let mut filters = Vec::with_capacity(task.filters.len());
        for definition in &task.filters {
            let factory = self
                .registries
                .filters
                .resolve(&definition.type_id)
                .map_err(|e| HarvesterError::invalid_definition(e.to_string()))?;
            filters.push(factory.build(definition)?);
        }

        let mut transformers = Vec::with_capacity(task.transformers.len());
        for definition in &task.transformers {
            let factory = self
                .registries
                .transformers
                .resolve(&definition.type_id)
                .map_err(|e| HarvesterError::invalid_definition(e.to_string()))?;
            transformers.push(factory.build(definition)?);
        }

        let context = InitContext::new(task_id, task.clone())
            .with_params(params)
            .with_cleanup(self.can_cleanup);
        let collector = DataCollector::new(input, outputs, context)
            .with_filters(filters)
            .with_transformers(transformers)
            .with_iterator_context(self.last_harvest(task_id, task).await)
            .with_timeout(self.broker_timeout);

        let process = Arc::new(ProcessInstance::new(
            task_id,
            task.clone(),
            collector,
            cancel,
        ));
        process.add_listener(Arc::new(ProgressLogger::new(process.title())));
        if let (Some(task_id), Some(history)) = (task_id, &self.history) {
            process.add_listener(Arc::new(HistoryAdaptor::new(task_id, Arc::clone(history))));
        }

        self.processes.register(Arc::clone(&process)).await;
        debug!(process.id = %process.id(), task.id = ?task_id, "采集进程已创建");
        Ok(process)
    }

    /// 带运行参数执行一次采集并等待结束
    pub async fn execute_with_params(
        &self,
        task_id: Option<Uuid>,
        task: &TaskDefinition,
        params: BTreeMap<String, String>,
        cancel: CancellationToken,
    ) -> HarvesterResult<HistoryReport> {
        let process = self.create_process(task_id, task, params, cancel).await?;
        let result = process.run().await;
        // 结束的进程不再保留在登记表中
        self.processes.remove(process.id()).await;
        result
    }

    /// 通过任务的数据源读取单条记录，不经过过滤器和转换器
    ///
    /// `params` 覆盖数据源配置，例如访问凭据。记录不存在时返回 NotFound。
    pub async fn fetch_content(
        &self,
        task_id: Option<Uuid>,
        task: &TaskDefinition,
        record_id: &str,
        params: BTreeMap<String, String>,
    ) -> HarvesterResult<DataReference> {
        let source = self
            .resolve_reference(&task.source, BrokerCategory::Inbound)
            .await?;
        let mut input = self
            .registries
            .inputs
            .resolve(&source.type_id)
            .map_err(|e| HarvesterError::invalid_definition(e.to_string()))?
            .build(&source)?;

        let context = InitContext::new(task_id, task.clone()).with_params(params);
        let result = match timeout(self.broker_timeout, input.initialize(&context)).await {
            Ok(Ok(())) => match timeout(self.broker_timeout, input.read_content(record_id)).await {
                Ok(result) => result,
                Err(_) => Err(HarvesterError::Input(format!(
                    "读取记录 {record_id} 超时 ({}s)",
                    self.broker_timeout.as_secs()
                ))),
            },
            Ok(Err(e)) => Err(e),
            Err(_) => Err(HarvesterError::Processor(format!(
                "初始化数据源超时 ({}s)",
                self.broker_timeout.as_secs()
            ))),
        };
        if let Err(e) = input.terminate().await {
            warn!(task.id = ?task_id, "终止数据源失败: {e}");
        }

        let data = result?.ok_or_else(|| HarvesterError::not_found("记录", record_id))?;
        debug!(task.id = ?task_id, record.id = %record_id, "已读取单条记录");
        Ok(data)
    }
}

#[async_trait]
impl HarvestExecutor for ExecutionService {
    async fn submit(
        &self,
        task_id: Option<Uuid>,
        task: &TaskDefinition,
        cancel: CancellationToken,
    ) -> HarvesterResult<Uuid> {
        let process = self
            .create_process(task_id, task, BTreeMap::new(), cancel)
            .await?;
        let process_id = process.id();
        process.init().await;
        let handle = process.begin();
        info!(process.id = %process_id, title = %process.title(), "采集进程已启动");

        let processes = Arc::clone(&self.processes);
        tokio::spawn(async move {
            if let Err(e) = handle.await {
                warn!(process.id = %process_id, "采集进程异常退出: {e}");
            }
            processes.remove(process_id).await;
        });
        Ok(process_id)
    }

    async fn execute(
        &self,
        task_id: Option<Uuid>,
        task: &TaskDefinition,
        cancel: CancellationToken,
    ) -> HarvesterResult<HistoryReport> {
        self.execute_with_params(task_id, task, BTreeMap::new(), cancel)
            .await
    }
}
