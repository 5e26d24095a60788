use async_trait::async_trait;
use harvester_core::models::{DataReference, ProcessStatus, PublishingStatus};
use harvester_core::{HarvesterError, StructuredLogger};
use metrics::counter;
use tracing::debug;
use uuid::Uuid;

use crate::process::ProcessListener;

/// 面向运维的进度日志
pub struct ProgressLogger {
    title: String,
}

impl ProgressLogger {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
        }
    }
}

#[async_trait]
impl ProcessListener for ProgressLogger {
    async fn on_status_change(&self, process_id: Uuid, status: ProcessStatus) {
        StructuredLogger::log_process_status(process_id, &self.title, status);
        counter!("harvester_process_transitions_total", "status" => status.to_string())
            .increment(1);
    }

    async fn on_data_acquired(&self, process_id: Uuid, data: &DataReference) {
        debug!(process.id = %process_id, data.id = %data.id, "已获取记录");
    }

    async fn on_data_processed(
        &self,
        process_id: Uuid,
        data: &DataReference,
        status: PublishingStatus,
    ) {
        debug!(process.id = %process_id, data.id = %data.id, ?status, "记录已发布");
    }

    async fn on_error(&self, process_id: Uuid, error: &HarvesterError) {
        StructuredLogger::log_record_failed(process_id, error);
        counter!("harvester_errors_total").increment(1);
    }
}
