//! 内存存储实现
//!
//! 适用于单次运行和测试，进程退出后数据丢失。

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use harvester_core::models::{History, HistoryEvent};
use harvester_core::traits::{CrudRepository, HistoryRepository};
use harvester_core::HarvesterResult;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

/// 内存中的定义存储
#[derive(Debug)]
pub struct InMemoryRepository<T> {
    kind: &'static str,
    items: Arc<RwLock<BTreeMap<Uuid, T>>>,
}

impl<T> InMemoryRepository<T> {
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            items: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }

    pub async fn len(&self) -> usize {
        self.items.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.items.read().await.is_empty()
    }
}

impl<T> Clone for InMemoryRepository<T> {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            items: self.items.clone(),
        }
    }
}

#[async_trait]
impl<T> CrudRepository<T> for InMemoryRepository<T>
where
    T: Clone + Send + Sync + 'static,
{
    async fn create(&self, item: T) -> HarvesterResult<Uuid> {
        let id = Uuid::new_v4();
        self.items.write().await.insert(id, item);
        debug!("创建{}: {}", self.kind, id);
        Ok(id)
    }

    async fn read(&self, id: Uuid) -> HarvesterResult<Option<T>> {
        Ok(self.items.read().await.get(&id).cloned())
    }

    async fn update(&self, id: Uuid, item: T) -> HarvesterResult<bool> {
        let mut items = self.items.write().await;
        match items.get_mut(&id) {
            Some(existing) => {
                *existing = item;
                debug!("更新{}: {}", self.kind, id);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, id: Uuid) -> HarvesterResult<bool> {
        let removed = self.items.write().await.remove(&id).is_some();
        if removed {
            debug!("删除{}: {}", self.kind, id);
        }
        Ok(removed)
    }

    async fn list(&self) -> HarvesterResult<Vec<(Uuid, T)>> {
        Ok(self
            .items
            .read()
            .await
            .iter()
            .map(|(id, item)| (*id, item.clone()))
            .collect())
    }
}

#[derive(Debug, Default)]
struct HistoryState {
    events: Vec<HistoryEvent>,
    failed: HashMap<Uuid, Vec<String>>,
}

/// 内存中的采集历史
#[derive(Debug, Clone, Default)]
pub struct InMemoryHistoryRepository {
    state: Arc<RwLock<HistoryState>>,
}

impl InMemoryHistoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HistoryRepository for InMemoryHistoryRepository {
    async fn create(&self, event: HistoryEvent) -> HarvesterResult<Uuid> {
        let id = event.id;
        self.state.write().await.events.push(event);
        Ok(id)
    }

    async fn list(&self, task_id: Uuid) -> HarvesterResult<History> {
        let state = self.state.read().await;
        let mut events: Vec<HistoryEvent> = state
            .events
            .iter()
            .filter(|event| event.task_id == task_id)
            .cloned()
            .collect();
        events.sort_by_key(|event| event.start);
        Ok(History(events))
    }

    async fn purge(&self, task_id: Uuid) -> HarvesterResult<()> {
        let mut state = self.state.write().await;
        let (purged, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut state.events)
            .into_iter()
            .partition(|event| event.task_id == task_id);
        state.events = kept;
        for event in &purged {
            state.failed.remove(&event.id);
        }
        debug!("清除任务 {} 的 {} 条历史", task_id, purged.len());
        Ok(())
    }

    async fn store_failed_data_id(&self, event_id: Uuid, data_id: &str) -> HarvesterResult<()> {
        self.state
            .write()
            .await
            .failed
            .entry(event_id)
            .or_default()
            .push(data_id.to_string());
        Ok(())
    }

    async fn failed_data_ids(&self, event_id: Uuid) -> HarvesterResult<Vec<String>> {
        Ok(self
            .state
            .read()
            .await
            .failed
            .get(&event_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use harvester_core::models::HistoryReport;

    fn event(task_id: Uuid, hour: u32) -> HistoryEvent {
        let start = Utc.with_ymd_and_hms(2024, 4, 1, hour, 0, 0).unwrap();
        HistoryEvent {
            id: Uuid::new_v4(),
            task_id,
            start,
            end: start + Duration::minutes(10),
            report: HistoryReport::default(),
        }
    }

    #[tokio::test]
    async fn test_crud_round() {
        let repo = InMemoryRepository::<String>::new("任务");
        let id = repo.create("first".to_string()).await.unwrap();
        assert_eq!(repo.read(id).await.unwrap().as_deref(), Some("first"));

        assert!(repo.update(id, "second".to_string()).await.unwrap());
        assert!(!repo.update(Uuid::new_v4(), "x".to_string()).await.unwrap());
        assert_eq!(repo.list().await.unwrap(), vec![(id, "second".to_string())]);

        assert!(repo.delete(id).await.unwrap());
        assert!(!repo.delete(id).await.unwrap());
        assert!(repo.is_empty().await);
    }

    #[tokio::test]
    async fn test_history_last_harvest_and_purge() {
        let repo = InMemoryHistoryRepository::new();
        let task_id = Uuid::new_v4();
        let other = Uuid::new_v4();

        let late = event(task_id, 9);
        let early = event(task_id, 6);
        repo.create(late.clone()).await.unwrap();
        repo.create(early.clone()).await.unwrap();
        repo.create(event(other, 12)).await.unwrap();
        repo.store_failed_data_id(late.id, "rec-1").await.unwrap();

        let history = repo.list(task_id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history.0[0].id, early.id);
        assert_eq!(repo.last_harvest(task_id).await.unwrap(), Some(late.start));
        assert_eq!(repo.failed_data_ids(late.id).await.unwrap(), vec!["rec-1"]);

        repo.purge(task_id).await.unwrap();
        assert!(repo.list(task_id).await.unwrap().is_empty());
        assert!(repo.failed_data_ids(late.id).await.unwrap().is_empty());
        assert_eq!(repo.list(other).await.unwrap().len(), 1);
        assert_eq!(repo.last_harvest(task_id).await.unwrap(), None);
    }
}
