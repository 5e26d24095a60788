use std::collections::HashMap;
use std::sync::Arc;

use harvester_core::models::ProcessStatus;
use harvester_core::{HarvesterError, HarvesterResult};
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::process::ProcessInstance;

/// 采集进程登记表
#[derive(Default)]
pub struct ProcessesService {
    processes: RwLock<HashMap<Uuid, Arc<ProcessInstance>>>,
}

impl ProcessesService {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, process: Arc<ProcessInstance>) {
        let mut processes = self.processes.write().await;
        debug!(process.id = %process.id(), title = %process.title(), "登记采集进程");
        processes.insert(process.id(), process);
    }

    pub async fn get(&self, process_id: Uuid) -> Option<Arc<ProcessInstance>> {
        self.processes.read().await.get(&process_id).cloned()
    }

    pub async fn remove(&self, process_id: Uuid) -> Option<Arc<ProcessInstance>> {
        self.processes.write().await.remove(&process_id)
    }

    /// 全部进程，按标题排序
    pub async fn list(&self) -> Vec<Arc<ProcessInstance>> {
        let mut processes: Vec<_> = self.processes.read().await.values().cloned().collect();
        processes.sort_by(|a, b| a.title().cmp(b.title()));
        processes
    }

    /// 仍在运行或等待运行的进程
    pub async fn list_running(&self) -> Vec<Arc<ProcessInstance>> {
        self.list()
            .await
            .into_iter()
            .filter(|p| p.status() != ProcessStatus::Completed)
            .collect()
    }

    pub async fn abort(&self, process_id: Uuid) -> HarvesterResult<()> {
        let process = self
            .get(process_id)
            .await
            .ok_or_else(|| HarvesterError::not_found("采集进程", process_id))?;
        info!(process.id = %process_id, "中止采集进程");
        process.abort();
        Ok(())
    }

    /// 中止全部进程
    pub async fn abort_all(&self) {
        for process in self.list_running().await {
            process.abort();
        }
    }

    pub async fn len(&self) -> usize {
        self.processes.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.processes.read().await.is_empty()
    }
}
