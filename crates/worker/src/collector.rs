//! 数据采集流水线
//!
//! 从一个数据源拉取记录，依次经过过滤器和转换器，再发布到每个目标：
//!
//! 1. 初始化数据源和全部目标；支持清理的目标记录本数据源此前发布过的记录标识（existing 集合）
//! 2. 通过迭代器惰性拉取
//! 3. 过滤器可以丢弃记录，转换器可以改写内容
//! 4. 每个目标独立发布，单个目标失败不影响其他目标和后续记录
//! 5. 发布成功后从该目标的 existing 集合中移除记录标识
//! 6. 结束时，如果整个运行没有出现不可忽略的错误（取消也算），删除 existing 中剩余的记录，
//!    然后终止全部代理
//!
//! 读取单条记录失败只记录错误，连续失败 [`MAX_CONSECUTIVE_INPUT_ERRORS`] 次后停止拉取。

use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;

use harvester_core::models::DataReference;
use harvester_core::traits::{
    Filter, InitContext, InputBroker, IteratorContext, OutputBroker, Transformer,
};
use harvester_core::{HarvesterError, HarvesterResult, StructuredLogger};
use metrics::counter;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::process::ProcessEvents;

/// 连续读取失败的上限
pub const MAX_CONSECUTIVE_INPUT_ERRORS: usize = 10;

struct OutputSlot {
    broker: Box<dyn OutputBroker>,
    name: String,
    initialized: bool,
    /// 是否参与清理
    tracking: bool,
    existing: HashSet<String>,
}

/// 一次运行的流水线
pub struct DataCollector {
    input: Box<dyn InputBroker>,
    input_initialized: bool,
    outputs: Vec<OutputSlot>,
    filters: Vec<Box<dyn Filter>>,
    transformers: Vec<Box<dyn Transformer>>,
    context: InitContext,
    iterator_context: IteratorContext,
    timeout: Duration,
}

impl DataCollector {
    pub fn new(
        input: Box<dyn InputBroker>,
        outputs: Vec<Box<dyn OutputBroker>>,
        context: InitContext,
    ) -> Self {
        let outputs = outputs
            .into_iter()
            .map(|broker| OutputSlot {
                name: broker.definition().display_name().to_string(),
                broker,
                initialized: false,
                tracking: false,
                existing: HashSet::new(),
            })
            .collect();
        Self {
            input,
            input_initialized: false,
            outputs,
            filters: Vec::new(),
            transformers: Vec::new(),
            context,
            iterator_context: IteratorContext::default(),
            timeout: Duration::from_secs(120),
        }
    }

    pub fn with_filters(mut self, filters: Vec<Box<dyn Filter>>) -> Self {
        self.filters = filters;
        self
    }

    pub fn with_transformers(mut self, transformers: Vec<Box<dyn Transformer>>) -> Self {
        self.transformers = transformers;
        self
    }

    pub fn with_iterator_context(mut self, iterator_context: IteratorContext) -> Self {
        self.iterator_context = iterator_context;
        self
    }

    /// 单次代理调用的超时时间
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn bounded<T, F>(timeout: Duration, what: &str, fut: F) -> HarvesterResult<T>
    where
        F: Future<Output = HarvesterResult<T>>,
        T: Send,
    {
        match tokio::time::timeout(timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(HarvesterError::Processor(format!(
                "{what} 超时 ({}s)",
                timeout.as_secs()
            ))),
        }
    }

    /// 初始化全部代理；失败时终止已初始化的代理并返回处理器错误
    pub async fn initialize(&mut self) -> HarvesterResult<()> {
        if let Err(e) = self.initialize_brokers().await {
            warn!("代理初始化失败，终止采集: {e}");
            self.terminate_brokers().await;
            return Err(match e {
                HarvesterError::Processor(_) => e,
                other => HarvesterError::Processor(other.to_string()),
            });
        }
        Ok(())
    }

    async fn initialize_brokers(&mut self) -> HarvesterResult<()> {
        let timeout = self.timeout;
        Self::bounded(timeout, "初始化数据源", self.input.initialize(&self.context)).await?;
        self.input_initialized = true;
        let source_uri = self.input.broker_uri()?;

        for slot in &mut self.outputs {
            Self::bounded(timeout, "初始化目标", slot.broker.initialize(&self.context)).await?;
            slot.initialized = true;

            if !(self.context.can_cleanup && slot.broker.cleanup_enabled()) {
                continue;
            }
            match Self::bounded(timeout, "读取已发布记录", slot.broker.existing_ids(&source_uri))
                .await
            {
                Ok(existing) => {
                    debug!(broker = %slot.name, count = existing.len(), "已记录现有记录标识");
                    slot.existing = existing;
                    slot.tracking = true;
                }
                Err(e) => {
                    StructuredLogger::log_cleanup_skipped(
                        &slot.name,
                        &format!("无法读取已发布记录: {e}"),
                    );
                }
            }
        }
        Ok(())
    }

    async fn report(events: &ProcessEvents, clean: &mut bool, error: HarvesterError) {
        if !error.is_negligible() {
            *clean = false;
        }
        events.error(&error).await;
    }

    /// 拉取并发布全部记录，返回运行是否没有出现不可忽略的错误
    pub async fn collect(&mut self, events: &ProcessEvents, cancel: &CancellationToken) -> bool {
        let timeout = self.timeout;
        let mut clean = true;
        let mut input_errors = 0;

        let mut iterator = match Self::bounded(
            timeout,
            "打开数据源迭代器",
            self.input.iterator(&self.iterator_context),
        )
        .await
        {
            Ok(iterator) => iterator,
            Err(e) => {
                let error = match e {
                    HarvesterError::Processor(message) => HarvesterError::Input(message),
                    other => other,
                };
                Self::report(events, &mut clean, error).await;
                return false;
            }
        };

        loop {
            if cancel.is_cancelled() {
                info!(process.id = %events.process_id(), "采集已取消，停止拉取记录");
                Self::report(events, &mut clean, HarvesterError::Cancelled).await;
                break;
            }

            match Self::bounded(timeout, "检查下一条记录", iterator.has_next()).await {
                Ok(true) => {}
                Ok(false) => break,
                Err(e) => {
                    Self::report(events, &mut clean, HarvesterError::Input(e.to_string())).await;
                    break;
                }
            }

            let data = match Self::bounded(timeout, "读取记录", iterator.next()).await {
                Ok(data) => {
                    input_errors = 0;
                    data
                }
                Err(e) => {
                    let error = match e {
                        HarvesterError::Input(_) => e,
                        other => HarvesterError::Input(other.to_string()),
                    };
                    Self::report(events, &mut clean, error).await;
                    input_errors += 1;
                    if input_errors >= MAX_CONSECUTIVE_INPUT_ERRORS {
                        warn!(
                            process.id = %events.process_id(),
                            "数据源连续 {input_errors} 次读取失败，停止拉取记录"
                        );
                        break;
                    }
                    continue;
                }
            };

            counter!("harvester_records_acquired_total").increment(1);
            events.data_acquired(&data).await;

            let Some(data) = self.process(events, &mut clean, data).await else {
                continue;
            };
            self.publish(events, &mut clean, &data).await;
        }

        clean
    }

    /// 过滤和转换，返回 None 表示记录被丢弃
    async fn process(
        &self,
        events: &ProcessEvents,
        clean: &mut bool,
        data: DataReference,
    ) -> Option<DataReference> {
        if let Some(filter) = self.filters.iter().find(|f| !f.test(&data)) {
            debug!(
                data.id = %data.id,
                filter = %filter.definition().type_id,
                "记录被过滤器丢弃"
            );
            return None;
        }

        let mut data = data;
        for transformer in &self.transformers {
            let data_id = data.id.clone();
            match transformer.transform(data).await {
                Ok(transformed) => data = transformed,
                Err(e) => {
                    let error = match e {
                        HarvesterError::Transform(_) => e,
                        other => HarvesterError::Transform(format!("{data_id}: {other}")),
                    };
                    Self::report(events, clean, error).await;
                    return None;
                }
            }
        }
        Some(data)
    }

    async fn publish(&mut self, events: &ProcessEvents, clean: &mut bool, data: &DataReference) {
        let timeout = self.timeout;
        for slot in &mut self.outputs {
            let result = Self::bounded(timeout, "发布记录", slot.broker.publish(data)).await;
            match result {
                Ok(published) => {
                    if slot.tracking {
                        slot.existing.remove(&published.id);
                    }
                    counter!("harvester_records_published_total").increment(1);
                    StructuredLogger::log_record_published(
                        events.process_id(),
                        &published.id,
                        data.source_uri.as_str(),
                    );
                    events.data_processed(data, published.status).await;
                }
                Err(e) => {
                    counter!("harvester_records_failed_total").increment(1);
                    let error = match e {
                        HarvesterError::Output { .. } => e,
                        other => HarvesterError::output(
                            slot.name.clone(),
                            Some(data.id.clone()),
                            other.to_string(),
                        ),
                    };
                    Self::report(events, clean, error).await;
                }
            }
        }
    }

    /// 清理并终止全部代理
    pub async fn finish(&mut self, events: &ProcessEvents, clean: bool) {
        let timeout = self.timeout;
        for slot in self.outputs.iter_mut().filter(|slot| slot.tracking) {
            if !clean {
                StructuredLogger::log_cleanup_skipped(&slot.name, "本次运行出现了不可忽略的错误");
                continue;
            }
            let mut removed = 0usize;
            let mut failed = 0usize;
            let mut stale: Vec<String> = slot.existing.drain().collect();
            stale.sort();
            for id in stale {
                match Self::bounded(timeout, "删除记录", slot.broker.delete(&id)).await {
                    Ok(()) => removed += 1,
                    Err(e) => {
                        failed += 1;
                        events
                            .error(&HarvesterError::Processor(format!(
                                "清理记录 {id} 失败: {e}"
                            )))
                            .await;
                    }
                }
            }
            StructuredLogger::log_cleanup(&slot.name, removed, failed);
        }
        self.terminate_brokers().await;
    }

    async fn terminate_brokers(&mut self) {
        let timeout = self.timeout;
        for slot in self.outputs.iter_mut().filter(|slot| slot.initialized) {
            slot.initialized = false;
            if let Err(e) = Self::bounded(timeout, "终止目标", slot.broker.terminate()).await {
                warn!(broker = %slot.name, "终止目标失败: {e}");
            }
        }
        if self.input_initialized {
            self.input_initialized = false;
            if let Err(e) = Self::bounded(timeout, "终止数据源", self.input.terminate()).await {
                warn!(
                    broker = %self.input.definition().display_name(),
                    "终止数据源失败: {e}"
                );
            }
        }
    }
}
