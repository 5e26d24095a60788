//! 数据代理接口定义
//!
//! 每个数据源（Input）和目标（Output）连接器都实现这里的接口：
//! - `initialize` / `terminate` 生命周期
//! - 数据源提供拉取式迭代器 ([`InputIterator`])，可选支持按标识读取单条记录
//! - 目标提供 `publish`，支持清理的目标还提供快照和删除
//!
//! ## 生命周期
//!
//! ```text
//! initialize(context) → iterator()/publish()... → terminate()
//! ```
//!
//! `initialize` 失败属于处理器错误，会在拉取任何记录之前终止本次运行；
//! 迭代器和发布的错误是单条记录级别的，由流水线记录后继续。
//!
//! ## 实现示例
//!
//! ```rust,ignore
//! use async_trait::async_trait;
//! use harvester_core::traits::{InitContext, OutputBroker};
//! use harvester_core::models::{DataReference, PublishedRecord};
//!
//! struct NullBroker { definition: EntityDefinition }
//!
//! #[async_trait]
//! impl OutputBroker for NullBroker {
//!     fn definition(&self) -> &EntityDefinition { &self.definition }
//!     async fn initialize(&mut self, _context: &InitContext) -> HarvesterResult<()> { Ok(()) }
//!     async fn publish(&mut self, data: &DataReference) -> HarvesterResult<PublishedRecord> {
//!         Ok(PublishedRecord::created(&data.id))
//!     }
//!     async fn terminate(&mut self) -> HarvesterResult<()> { Ok(()) }
//! }
//! ```

use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use url::Url;
use uuid::Uuid;

use crate::{
    models::{DataReference, EntityDefinition, PublishedRecord, TaskDefinition},
    HarvesterError, HarvesterResult,
};

/// 代理初始化上下文
///
/// 携带本次运行的任务信息和运行时参数。`params` 通过
/// [`DefinitionAdaptor::override_with`](crate::definition::DefinitionAdaptor::override_with)
/// 覆盖到代理配置上，不会修改已存储的定义。
#[derive(Debug, Clone)]
pub struct InitContext {
    pub task_id: Option<Uuid>,
    pub task: TaskDefinition,
    pub params: BTreeMap<String, String>,
    /// 全局开关，为 false 时所有目标都不做清理
    pub can_cleanup: bool,
}

impl InitContext {
    pub fn new(task_id: Option<Uuid>, task: TaskDefinition) -> Self {
        Self {
            task_id,
            task,
            params: BTreeMap::new(),
            can_cleanup: true,
        }
    }

    pub fn with_params(mut self, params: BTreeMap<String, String>) -> Self {
        self.params = params;
        self
    }

    pub fn with_cleanup(mut self, can_cleanup: bool) -> Self {
        self.can_cleanup = can_cleanup;
        self
    }
}

/// 迭代器上下文
#[derive(Debug, Clone, Default)]
pub struct IteratorContext {
    /// 上次成功采集的时间，仅在增量任务中设置
    pub last_harvest: Option<DateTime<Utc>>,
}

/// 数据源记录迭代器
///
/// 惰性拉取，分页数据源在 `has_next` 中按需获取下一页。
#[async_trait]
pub trait InputIterator: Send {
    async fn has_next(&mut self) -> HarvesterResult<bool>;

    async fn next(&mut self) -> HarvesterResult<DataReference>;
}

/// 数据源代理
#[async_trait]
pub trait InputBroker: Send + Sync {
    fn definition(&self) -> &EntityDefinition;

    /// 数据源地址，写入每条记录的 `broker_uri`
    fn broker_uri(&self) -> HarvesterResult<Url>;

    async fn initialize(&mut self, context: &InitContext) -> HarvesterResult<()>;

    async fn iterator(
        &mut self,
        context: &IteratorContext,
    ) -> HarvesterResult<Box<dyn InputIterator>>;

    /// 按记录标识读取单条记录，记录不存在时返回 `None`
    ///
    /// 在 `initialize` 之后调用。
    async fn read_content(&mut self, id: &str) -> HarvesterResult<Option<DataReference>> {
        Err(HarvesterError::Processor(format!(
            "数据源 {} 不支持读取单条记录: {id}",
            self.definition().type_id
        )))
    }

    async fn terminate(&mut self) -> HarvesterResult<()>;
}

/// 目标代理
#[async_trait]
pub trait OutputBroker: Send + Sync {
    fn definition(&self) -> &EntityDefinition;

    async fn initialize(&mut self, context: &InitContext) -> HarvesterResult<()>;

    async fn publish(&mut self, data: &DataReference) -> HarvesterResult<PublishedRecord>;

    async fn terminate(&mut self) -> HarvesterResult<()>;

    /// 是否在运行结束时删除数据源中已不存在的记录
    fn cleanup_enabled(&self) -> bool {
        false
    }

    /// 此前由同一数据源发布的记录标识
    async fn existing_ids(&mut self, _source: &Url) -> HarvesterResult<HashSet<String>> {
        Ok(HashSet::new())
    }

    async fn delete(&mut self, id: &str) -> HarvesterResult<()> {
        Err(HarvesterError::Processor(format!(
            "目标 {} 不支持删除记录: {id}",
            self.definition().type_id
        )))
    }
}
