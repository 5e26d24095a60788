//! 存储层接口定义
//!
//! 此模块定义了配置和历史的持久化抽象：
//! - 通用CRUD仓储 ([`CrudRepository`])，用于任务、触发器、代理定义
//! - 历史仓储 ([`HistoryRepository`])，保存每次运行的报告
//!
//! ## 设计原则
//!
//! ### 单一错误类型
//! 所有存储操作失败时都返回 [`HarvesterError::Persistence`](crate::HarvesterError::Persistence)，
//! 调用方不需要区分底层存储引擎。
//!
//! ### 引擎无关
//! 接口与具体实现分离，内置内存实现和SQLite实现，
//! 也可以替换为其他数据库。
//!
//! ## 使用示例
//!
//! ```rust,ignore
//! use harvester_core::traits::CrudRepository;
//! use harvester_core::models::TaskDefinition;
//!
//! async fn save(repo: &dyn CrudRepository<TaskDefinition>, task: TaskDefinition) -> HarvesterResult<()> {
//!     let id = repo.create(task.clone()).await?;
//!     assert_eq!(repo.read(id).await?, Some(task));
//!     assert!(repo.delete(id).await?);
//!     Ok(())
//! }
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    models::{History, HistoryEvent},
    HarvesterResult,
};

/// 通用CRUD仓储
#[async_trait]
pub trait CrudRepository<T>: Send + Sync
where
    T: Send + Sync + 'static,
{
    /// 保存新条目并返回其唯一ID
    async fn create(&self, item: T) -> HarvesterResult<Uuid>;

    async fn read(&self, id: Uuid) -> HarvesterResult<Option<T>>;

    /// 更新已有条目，条目不存在时返回 false
    async fn update(&self, id: Uuid, item: T) -> HarvesterResult<bool>;

    /// 删除条目，条目不存在时返回 false
    async fn delete(&self, id: Uuid) -> HarvesterResult<bool>;

    async fn list(&self) -> HarvesterResult<Vec<(Uuid, T)>>;
}

/// 采集历史仓储
#[async_trait]
pub trait HistoryRepository: Send + Sync {
    /// 写入一条历史事件并返回其ID
    async fn create(&self, event: HistoryEvent) -> HarvesterResult<Uuid>;

    /// 构建任务的完整历史
    async fn list(&self, task_id: Uuid) -> HarvesterResult<History>;

    /// 清除任务的全部历史（任务被删除时调用）
    async fn purge(&self, task_id: Uuid) -> HarvesterResult<()>;

    /// 记录发布失败的数据ID，用于事后核对
    async fn store_failed_data_id(&self, event_id: Uuid, data_id: &str) -> HarvesterResult<()>;

    async fn failed_data_ids(&self, event_id: Uuid) -> HarvesterResult<Vec<String>>;

    /// 最近一次采集的开始时间
    async fn last_harvest(&self, task_id: Uuid) -> HarvesterResult<Option<DateTime<Utc>>> {
        Ok(self.list(task_id).await?.last_event().map(|event| event.start))
    }
}
