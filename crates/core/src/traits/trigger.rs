//! 触发器接口定义
//!
//! 触发器只决定任务*何时*运行，与流水线做什么无关。
//!
//! ## 核心概念
//!
//! ### TriggerFactory
//! 按 `type` 注册的工厂，从 [`TriggerDefinition`] 创建触发器实例，
//! 并持有它创建过的全部实例，`close` 时逐一停用。
//!
//! ### TriggerInstance
//! 运行时对象，状态为 Inactive / Active。最多持有一个待执行的调度句柄，
//! `deactivate` 可以重复调用。
//!
//! ### TriggerContext
//! 触发器与执行层之间的接口：提交任务、同步执行任务、查询上次采集时间。
//!
//! ## 使用示例
//!
//! ```rust,ignore
//! let factory = registry.resolve("PERIOD")?;
//! let instance = factory.create_instance(&definition)?;
//! instance.activate(context).await?;
//! // ...
//! instance.deactivate().await;
//! instance.deactivate().await; // 重复调用是安全的
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::PluginFactory;
use crate::{
    models::{HistoryReport, TaskDefinition, TriggerDefinition},
    HarvesterResult,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriggerState {
    Inactive,
    Active,
}

/// 触发器执行上下文
#[async_trait]
pub trait TriggerContext: Send + Sync {
    /// 所属任务ID，未保存的任务为 None
    fn task_id(&self) -> Option<Uuid>;

    /// 启动一次采集并立即返回进程ID
    async fn submit(&self, task: &TaskDefinition, cancel: CancellationToken)
        -> HarvesterResult<Uuid>;

    /// 执行一次采集并等待完成
    async fn execute(
        &self,
        task: &TaskDefinition,
        cancel: CancellationToken,
    ) -> HarvesterResult<HistoryReport>;

    /// 最近一次采集的开始时间
    async fn last_harvest(&self) -> HarvesterResult<Option<DateTime<Utc>>>;
}

#[async_trait]
pub trait TriggerInstance: Send + Sync {
    fn id(&self) -> Uuid;

    fn definition(&self) -> &TriggerDefinition;

    fn state(&self) -> TriggerState;

    /// 是否会重复触发；一次性触发器不需要持久化
    fn recurring(&self) -> bool {
        true
    }

    /// 激活触发器；时间或周期格式错误时返回 InvalidDefinition，实例保持 Inactive
    async fn activate(&self, context: Arc<dyn TriggerContext>) -> HarvesterResult<()>;

    /// 停用触发器并取消待执行的调度，可重复调用
    async fn deactivate(&self);
}

#[async_trait]
pub trait TriggerFactory: PluginFactory {
    fn create_instance(
        &self,
        definition: &TriggerDefinition,
    ) -> HarvesterResult<Arc<dyn TriggerInstance>>;

    /// 停用此工厂创建过的全部实例
    async fn close(&self);
}
