use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use harvester_core::models::{HistoryReport, TaskDefinition, UiTemplate};
use harvester_core::traits::HarvestExecutor;
use harvester_core::{AppConfig, Registries};
use harvester_dispatcher::{register_triggers, SchedulerPool, TriggersService};
use harvester_infrastructure::{StoreFactory, Stores};
use harvester_worker::{
    register_builtin, BrokersService, ExecutionService, ProcessesService, TasksService,
};
use serde::Serialize;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// 按插件类别分组的参数模板
#[derive(Debug, Clone, Serialize)]
pub struct PluginTemplates {
    pub inputs: Vec<UiTemplate>,
    pub outputs: Vec<UiTemplate>,
    pub triggers: Vec<UiTemplate>,
    pub filters: Vec<UiTemplate>,
    pub transformers: Vec<UiTemplate>,
}

/// 主应用程序
///
/// 持有存储、插件注册表和各个服务；守护模式下恢复已保存的触发器，
/// 单次模式下直接执行一个任务定义。
pub struct Application {
    config: AppConfig,
    stores: Stores,
    registries: Arc<Registries>,
    processes: Arc<ProcessesService>,
    executor: Arc<ExecutionService>,
    tasks: TasksService,
    brokers: BrokersService,
    triggers: Arc<TriggersService>,
}

impl Application {
    /// 创建新的应用实例，必须在 Tokio 运行时内调用
    pub async fn new(config: AppConfig) -> Result<Self> {
        info!(
            "初始化应用程序, 存储后端: {:?}, 调度池大小: {}",
            config.storage.backend, config.scheduler.pool_size
        );

        let stores = StoreFactory::build(&config.storage)
            .await
            .context("初始化存储失败")?;

        let pool = Arc::new(SchedulerPool::from_config(&config.scheduler));
        let mut registries = Registries::new();
        register_builtin(&mut registries);
        register_triggers(&mut registries.triggers, pool);
        let registries = Arc::new(registries);

        let processes = Arc::new(ProcessesService::new());
        let executor = Arc::new(
            ExecutionService::new(Arc::clone(&registries), Arc::clone(&processes))
                .with_brokers(stores.brokers.clone())
                .with_history(stores.history.clone())
                .with_broker_timeout(Duration::from_secs(config.harvest.broker_timeout_seconds))
                .with_cleanup(config.harvest.cleanup_enabled),
        );

        let tasks = TasksService::new(stores.tasks.clone(), stores.history.clone())
            .with_executor(Arc::clone(&executor));
        let brokers = BrokersService::new(stores.brokers.clone(), Arc::clone(&registries));
        let triggers = Arc::new(TriggersService::new(
            Arc::clone(&registries),
            stores.triggers.clone(),
            executor.clone(),
            stores.history.clone(),
        ));

        Ok(Self {
            config,
            stores,
            registries,
            processes,
            executor,
            tasks,
            brokers,
            triggers,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn registries(&self) -> &Arc<Registries> {
        &self.registries
    }

    /// 全部插件的参数模板，按 `harvest.locale` 本地化
    pub fn templates(&self) -> PluginTemplates {
        let locale = self.config.harvest.locale.as_str();
        let sorted = |mut templates: Vec<UiTemplate>| {
            templates.sort_by(|a, b| a.type_id.cmp(&b.type_id));
            templates
        };
        PluginTemplates {
            inputs: sorted(self.registries.inputs.templates(locale)),
            outputs: sorted(self.registries.outputs.templates(locale)),
            triggers: sorted(self.registries.triggers.templates(locale)),
            filters: sorted(self.registries.filters.templates(locale)),
            transformers: sorted(self.registries.transformers.templates(locale)),
        }
    }

    pub fn tasks(&self) -> &TasksService {
        &self.tasks
    }

    pub fn brokers(&self) -> &BrokersService {
        &self.brokers
    }

    pub fn triggers(&self) -> &Arc<TriggersService> {
        &self.triggers
    }

    pub fn processes(&self) -> &Arc<ProcessesService> {
        &self.processes
    }

    /// 守护模式：恢复触发器并等待关闭信号
    pub async fn run(&self, mut shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        let activated = self
            .triggers
            .activate_stored()
            .await
            .context("恢复已保存的触发器失败")?;
        info!(
            "采集调度已启动, 已恢复 {} 个触发器, 可用类型: {:?}",
            activated,
            self.registries.triggers.types()
        );

        let _ = shutdown_rx.recv().await;
        info!("收到关闭信号，停止采集调度");
        self.shutdown().await;
        Ok(())
    }

    /// 单次模式：执行任务定义并返回报告，不写入历史
    pub async fn run_once(
        &self,
        task: &TaskDefinition,
        cancel: CancellationToken,
    ) -> Result<HistoryReport> {
        task.validate().context("任务定义无效")?;
        info!("执行采集任务: {}", task.title());
        let report = self
            .executor
            .execute(None, task, cancel)
            .await
            .with_context(|| format!("采集任务执行失败: {}", task.title()))?;
        Ok(report)
    }

    /// 关闭全部触发器和运行中的进程，然后关闭存储
    pub async fn shutdown(&self) {
        self.triggers.shutdown().await;

        let running = self.processes.list_running().await.len();
        if running > 0 {
            warn!("中止 {} 个运行中的采集进程", running);
            self.processes.abort_all().await;
        }

        self.stores.close().await;
        info!("应用已关闭");
    }
}

/// 读取 JSON 格式的任务定义文件
pub async fn load_task(path: impl AsRef<Path>) -> Result<TaskDefinition> {
    let path = path.as_ref();
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("读取任务文件失败: {}", path.display()))?;
    let task: TaskDefinition = serde_json::from_str(&content)
        .with_context(|| format!("解析任务文件失败: {}", path.display()))?;
    Ok(task)
}
