use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::{
    models::{HistoryReport, TaskDefinition},
    HarvesterResult,
};

/// 采集执行接口
///
/// 由执行层实现，触发器通过它启动采集进程。`cancel` 被取消时，
/// 正在运行的流水线会在下一条记录之前停止并跳过清理。
#[async_trait]
pub trait HarvestExecutor: Send + Sync {
    /// 启动采集进程，不等待完成
    async fn submit(
        &self,
        task_id: Option<Uuid>,
        task: &TaskDefinition,
        cancel: CancellationToken,
    ) -> HarvesterResult<Uuid>;

    /// 执行采集并等待进程结束，返回本次运行的报告
    async fn execute(
        &self,
        task_id: Option<Uuid>,
        task: &TaskDefinition,
        cancel: CancellationToken,
    ) -> HarvesterResult<HistoryReport>;
}
