use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use harvester_core::models::{DataReference, HistoryEvent, ProcessStatus, PublishingStatus};
use harvester_core::traits::HistoryRepository;
use harvester_core::{HarvesterError, StructuredLogger};
use tracing::debug;
use uuid::Uuid;

use super::ReportBuilder;
use crate::process::ProcessListener;

#[derive(Debug, Default)]
struct EventDraft {
    id: Option<Uuid>,
    start: Option<DateTime<Utc>>,
    failed_data_ids: Vec<String>,
}

/// 把进程生命周期写入历史存储
///
/// 存储失败只记录日志，不影响采集本身。
pub struct HistoryAdaptor {
    task_id: Uuid,
    repository: Arc<dyn HistoryRepository>,
    report: ReportBuilder,
    draft: Mutex<EventDraft>,
}

impl HistoryAdaptor {
    pub fn new(task_id: Uuid, repository: Arc<dyn HistoryRepository>) -> Self {
        Self {
            task_id,
            repository,
            report: ReportBuilder::new(),
            draft: Mutex::new(EventDraft::default()),
        }
    }

    fn with_draft<T>(&self, apply: impl FnOnce(&mut EventDraft) -> T) -> Option<T> {
        self.draft.lock().ok().map(|mut draft| apply(&mut draft))
    }

    async fn write_event(&self) {
        let end = Utc::now();
        let Some((id, start, failed)) = self.with_draft(|draft| {
            (
                *draft.id.get_or_insert_with(Uuid::new_v4),
                *draft.start.get_or_insert(end),
                std::mem::take(&mut draft.failed_data_ids),
            )
        }) else {
            return;
        };

        let event = HistoryEvent {
            id,
            task_id: self.task_id,
            start,
            end,
            report: self.report.snapshot(),
        };
        let event_id = match self.repository.create(event).await {
            Ok(event_id) => event_id,
            Err(e) => {
                StructuredLogger::log_persistence_failure("history.create", &e);
                return;
            }
        };
        debug!(task.id = %self.task_id, event.id = %event_id, "历史事件已保存");

        for data_id in failed {
            if let Err(e) = self.repository.store_failed_data_id(event_id, &data_id).await {
                StructuredLogger::log_persistence_failure("history.store_failed_data_id", &e);
                break;
            }
        }
    }
}

#[async_trait]
impl ProcessListener for HistoryAdaptor {
    async fn on_status_change(&self, _process_id: Uuid, status: ProcessStatus) {
        match status {
            ProcessStatus::Submitted => {
                self.with_draft(|draft| draft.id = Some(Uuid::new_v4()));
            }
            ProcessStatus::Working => {
                self.with_draft(|draft| draft.start = Some(Utc::now()));
            }
            ProcessStatus::Completed => self.write_event().await,
        }
    }

    async fn on_data_acquired(&self, process_id: Uuid, data: &DataReference) {
        self.report.on_data_acquired(process_id, data).await;
    }

    async fn on_data_processed(
        &self,
        process_id: Uuid,
        data: &DataReference,
        status: PublishingStatus,
    ) {
        self.report.on_data_processed(process_id, data, status).await;
    }

    async fn on_error(&self, process_id: Uuid, error: &HarvesterError) {
        self.report.on_error(process_id, error).await;
        if let Some(data_id) = error.failed_data_id() {
            let data_id = data_id.to_string();
            self.with_draft(|draft| draft.failed_data_ids.push(data_id));
        }
    }
}
