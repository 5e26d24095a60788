use std::sync::Mutex;

use async_trait::async_trait;
use harvester_core::models::{DataReference, HistoryReport, PublishingStatus};
use harvester_core::HarvesterError;
use uuid::Uuid;

use crate::process::ProcessListener;

/// 汇总一次运行的计数
///
/// 每个目标的发布结果分别计数，因此一条记录发布到两个目标会计两次。
/// 处理器错误和取消不是记录级错误，不计入失败数。
#[derive(Debug, Default)]
pub struct ReportBuilder {
    report: Mutex<HistoryReport>,
}

impl ReportBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> HistoryReport {
        self.report
            .lock()
            .map(|report| *report)
            .unwrap_or_default()
    }

    fn update(&self, apply: impl FnOnce(&mut HistoryReport)) {
        if let Ok(mut report) = self.report.lock() {
            apply(&mut report);
        }
    }
}

#[async_trait]
impl ProcessListener for ReportBuilder {
    async fn on_data_acquired(&self, _process_id: Uuid, _data: &DataReference) {
        self.update(HistoryReport::record_acquired);
    }

    async fn on_data_processed(
        &self,
        _process_id: Uuid,
        _data: &DataReference,
        status: PublishingStatus,
    ) {
        self.update(|report| report.record_processed(status));
    }

    async fn on_error(&self, _process_id: Uuid, error: &HarvesterError) {
        if error.is_record_level() {
            let output_side = error.is_output_side();
            self.update(|report| report.record_failure(output_side));
        }
    }
}
