//! 采集进程
//!
//! [`ProcessInstance`] 把一次流水线运行包装成可观察的状态机：
//!
//! ```text
//! Submitted ──begin()──> Working ──流水线结束──> Completed
//! ```
//!
//! 状态只能前进。单条记录的错误通过 `on_error` 事件报告，运行仍然会到达 Completed；
//! 只有代理初始化失败会在进入 Working 之前终止，并以错误形式返回给调用方。
//!
//! 监听器按注册顺序在流水线所在的任务中依次调用。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Instant;

use async_trait::async_trait;
use harvester_core::models::{
    DataReference, HistoryReport, ProcessStatus, PublishingStatus, TaskDefinition,
};
use harvester_core::{HarvesterError, HarvesterResult};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::collector::DataCollector;
use crate::listeners::ReportBuilder;

/// 采集进程监听器
#[async_trait]
pub trait ProcessListener: Send + Sync {
    async fn on_status_change(&self, _process_id: Uuid, _status: ProcessStatus) {}

    async fn on_data_acquired(&self, _process_id: Uuid, _data: &DataReference) {}

    async fn on_data_processed(
        &self,
        _process_id: Uuid,
        _data: &DataReference,
        _status: PublishingStatus,
    ) {
    }

    async fn on_error(&self, _process_id: Uuid, _error: &HarvesterError) {}
}

/// 监听器集合，负责广播事件
pub struct ProcessEvents {
    process_id: Uuid,
    listeners: RwLock<Vec<Arc<dyn ProcessListener>>>,
}

impl ProcessEvents {
    pub fn new(process_id: Uuid) -> Self {
        Self {
            process_id,
            listeners: RwLock::new(Vec::new()),
        }
    }

    pub fn process_id(&self) -> Uuid {
        self.process_id
    }

    pub fn add(&self, listener: Arc<dyn ProcessListener>) {
        if let Ok(mut listeners) = self.listeners.write() {
            listeners.push(listener);
        }
    }

    fn snapshot(&self) -> Vec<Arc<dyn ProcessListener>> {
        self.listeners
            .read()
            .map(|listeners| listeners.clone())
            .unwrap_or_default()
    }

    pub async fn status_changed(&self, status: ProcessStatus) {
        for listener in self.snapshot() {
            listener.on_status_change(self.process_id, status).await;
        }
    }

    pub async fn data_acquired(&self, data: &DataReference) {
        for listener in self.snapshot() {
            listener.on_data_acquired(self.process_id, data).await;
        }
    }

    pub async fn data_processed(&self, data: &DataReference, status: PublishingStatus) {
        for listener in self.snapshot() {
            listener
                .on_data_processed(self.process_id, data, status)
                .await;
        }
    }

    pub async fn error(&self, error: &HarvesterError) {
        for listener in self.snapshot() {
            listener.on_error(self.process_id, error).await;
        }
    }
}

/// 一次采集运行
pub struct ProcessInstance {
    id: Uuid,
    task_id: Option<Uuid>,
    task: TaskDefinition,
    title: String,
    status: RwLock<ProcessStatus>,
    announced: AtomicBool,
    events: ProcessEvents,
    report: Arc<ReportBuilder>,
    collector: Mutex<Option<DataCollector>>,
    cancel: CancellationToken,
}

impl ProcessInstance {
    /// 创建进程，内置的报告监听器总是第一个被调用
    pub fn new(
        task_id: Option<Uuid>,
        task: TaskDefinition,
        collector: DataCollector,
        cancel: CancellationToken,
    ) -> Self {
        let id = Uuid::new_v4();
        let events = ProcessEvents::new(id);
        let report = Arc::new(ReportBuilder::new());
        events.add(report.clone());
        Self {
            id,
            task_id,
            title: task.title(),
            task,
            status: RwLock::new(ProcessStatus::Submitted),
            announced: AtomicBool::new(false),
            events,
            report,
            collector: Mutex::new(Some(collector)),
            cancel,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn task_id(&self) -> Option<Uuid> {
        self.task_id
    }

    pub fn task(&self) -> &TaskDefinition {
        &self.task
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn status(&self) -> ProcessStatus {
        self.status
            .read()
            .map(|status| *status)
            .unwrap_or(ProcessStatus::Completed)
    }

    /// 当前报告的快照
    pub fn report(&self) -> HistoryReport {
        self.report.snapshot()
    }

    pub fn add_listener(&self, listener: Arc<dyn ProcessListener>) {
        self.events.add(listener);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// 请求中止，流水线在下一条记录之前停止并跳过清理
    pub fn abort(&self) {
        if self.status() != ProcessStatus::Completed {
            debug!(process.id = %self.id, "请求中止采集进程");
            self.cancel.cancel();
        }
    }

    /// 广播 Submitted 状态，只执行一次
    pub async fn init(&self) {
        if !self.announced.swap(true, Ordering::SeqCst) {
            self.events.status_changed(ProcessStatus::Submitted).await;
        }
    }

    async fn transition(&self, next: ProcessStatus) -> HarvesterResult<()> {
        {
            let mut status = self
                .status
                .write()
                .map_err(|_| HarvesterError::Internal("进程状态锁已损坏".to_string()))?;
            if !status.can_transition_to(next) {
                return Err(HarvesterError::Processor(format!(
                    "进程 {} 无法从 {} 转换到 {}",
                    self.id, *status, next
                )));
            }
            *status = next;
        }
        self.events.status_changed(next).await;
        Ok(())
    }

    /// 在当前任务中运行到结束
    pub async fn run(&self) -> HarvesterResult<HistoryReport> {
        let mut collector = self.collector.lock().await.take().ok_or_else(|| {
            HarvesterError::Processor(format!("进程 {} 已经启动过", self.id))
        })?;
        self.init().await;

        let started = Instant::now();
        collector.initialize().await?;
        self.transition(ProcessStatus::Working).await?;

        let clean = collector.collect(&self.events, &self.cancel).await;
        collector.finish(&self.events, clean).await;

        self.transition(ProcessStatus::Completed).await?;
        let report = self.report();
        harvester_core::StructuredLogger::log_process_completed(
            self.id,
            &self.title,
            &report,
            started.elapsed().as_millis() as u64,
        );
        Ok(report)
    }

    /// 在运行时中启动进程，不等待结束
    pub fn begin(self: &Arc<Self>) -> JoinHandle<HarvesterResult<HistoryReport>> {
        let process = Arc::clone(self);
        tokio::spawn(async move {
            let result = process.run().await;
            if let Err(e) = &result {
                warn!(process.id = %process.id, "采集进程启动失败: {e}");
            }
            result
        })
    }
}
