use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::models::{HistoryReport, ProcessStatus};
use crate::HarvesterError;

/// Structured logging utilities
pub struct StructuredLogger;

impl StructuredLogger {
    /// Log process status change
    pub fn log_process_status(process_id: Uuid, title: &str, status: ProcessStatus) {
        info!(
            event = "process_status",
            process.id = %process_id,
            process.title = title,
            process.status = %status,
            "采集进程状态变更: {status}"
        );
    }

    /// Log process completion with the final report
    pub fn log_process_completed(
        process_id: Uuid,
        title: &str,
        report: &HistoryReport,
        duration_ms: u64,
    ) {
        info!(
            event = "process_completed",
            process.id = %process_id,
            process.title = title,
            report.acquired = report.acquired,
            report.created = report.created,
            report.updated = report.updated,
            report.failed = report.failed,
            duration_ms = duration_ms,
            "采集完成: 获取 {}, 新建 {}, 更新 {}, 失败 {}",
            report.acquired,
            report.created,
            report.updated,
            report.failed
        );
    }

    /// Log a record level failure
    pub fn log_record_failed(process_id: Uuid, error: &HarvesterError) {
        warn!(
            event = "record_failed",
            process.id = %process_id,
            error.negligible = error.is_negligible(),
            error.data_id = error.failed_data_id().unwrap_or(""),
            "记录处理失败: {error}"
        );
    }

    pub fn log_record_published(process_id: Uuid, data_id: &str, source_uri: &str) {
        debug!(
            event = "record_published",
            process.id = %process_id,
            data.id = data_id,
            data.source_uri = source_uri,
            "记录已发布"
        );
    }

    /// Log cleanup result
    pub fn log_cleanup(broker: &str, removed: usize, failed: usize) {
        info!(
            event = "cleanup",
            broker = broker,
            removed = removed,
            failed = failed,
            "清理完成: 删除 {removed} 条记录"
        );
    }

    pub fn log_cleanup_skipped(broker: &str, reason: &str) {
        warn!(
            event = "cleanup_skipped",
            broker = broker,
            reason = reason,
            "跳过清理: {reason}"
        );
    }

    /// Log trigger scheduling
    pub fn log_trigger_scheduled(trigger_id: Uuid, trigger_type: &str, delay_minutes: i64) {
        info!(
            event = "trigger_scheduled",
            trigger.id = %trigger_id,
            trigger.kind = trigger_type,
            delay_minutes = delay_minutes,
            "任务将在 {delay_minutes} 分钟后运行"
        );
    }

    pub fn log_trigger_fire_at(trigger_id: Uuid, trigger_type: &str, fire_at: DateTime<Utc>) {
        info!(
            event = "trigger_scheduled",
            trigger.id = %trigger_id,
            trigger.kind = trigger_type,
            trigger.fire_at = %fire_at,
            "任务计划于 {} 运行",
            fire_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
    }

    pub fn log_trigger_failure(trigger_id: Uuid, trigger_type: &str, error: &HarvesterError) {
        error!(
            event = "trigger_failure",
            trigger.id = %trigger_id,
            trigger.kind = trigger_type,
            "触发任务执行失败: {error}"
        );
    }

    pub fn log_persistence_failure(operation: &str, error: &HarvesterError) {
        error!(
            event = "persistence_failure",
            operation = operation,
            "持久化失败: {error}"
        );
    }
}
