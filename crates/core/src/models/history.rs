use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::PublishingStatus;

/// 单次运行的计数报告
///
/// 所有计数在一次运行中只增不减；多个目标的计数按进程汇总。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryReport {
    pub acquired: u64,
    pub created: u64,
    pub updated: u64,
    pub failed: u64,
    #[serde(rename = "failedToHarvest")]
    pub failed_to_harvest: u64,
    #[serde(rename = "failedToPublish")]
    pub failed_to_publish: u64,
}

impl HistoryReport {
    pub fn record_acquired(&mut self) {
        self.acquired += 1;
    }

    pub fn record_processed(&mut self, status: PublishingStatus) {
        match status {
            PublishingStatus::Created => self.created += 1,
            PublishingStatus::Updated => self.updated += 1,
        }
    }

    pub fn record_failure(&mut self, output_side: bool) {
        self.failed += 1;
        if output_side {
            self.failed_to_publish += 1;
        } else {
            self.failed_to_harvest += 1;
        }
    }

    pub fn published(&self) -> u64 {
        self.created + self.updated
    }
}

/// 一次已完成运行的历史事件，写入后不可变
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEvent {
    pub id: Uuid,
    #[serde(rename = "taskId")]
    pub task_id: Uuid,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub report: HistoryReport,
}

/// 任务的历史事件集合
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct History(pub Vec<HistoryEvent>);

impl History {
    /// 开始时间最晚的事件
    pub fn last_event(&self) -> Option<&HistoryEvent> {
        self.0.iter().max_by_key(|event| event.start)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<HistoryEvent>> for History {
    fn from(events: Vec<HistoryEvent>) -> Self {
        Self(events)
    }
}
