use std::future::Future;
use std::sync::Arc;

use harvester_core::config::SchedulerConfig;
use harvester_core::{HarvesterError, HarvesterResult};
use tokio::runtime::Handle;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// 触发器共享的调度池
///
/// 定时器数量由 `pool_size` 限制，同时运行的采集数量由 `max_concurrent_harvests` 限制。
/// 超出并发上限的触发会排队等待许可，而不是被丢弃。
#[derive(Debug, Clone)]
pub struct SchedulerPool {
    handle: Handle,
    harvests: Arc<Semaphore>,
    timers: Arc<Semaphore>,
    pool_size: usize,
}

impl SchedulerPool {
    /// 必须在 tokio 运行时内调用
    pub fn new(pool_size: usize, max_concurrent_harvests: usize) -> Self {
        Self {
            handle: Handle::current(),
            harvests: Arc::new(Semaphore::new(max_concurrent_harvests.max(1))),
            timers: Arc::new(Semaphore::new(pool_size.max(1))),
            pool_size: pool_size.max(1),
        }
    }

    pub fn from_config(config: &SchedulerConfig) -> Self {
        Self::new(config.pool_size, config.max_concurrent_harvests)
    }

    pub fn spawn<F>(&self, future: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.handle.spawn(future)
    }

    /// 等待一个采集许可；取消时返回 None
    pub async fn acquire(&self, cancel: &CancellationToken) -> Option<OwnedSemaphorePermit> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            permit = self.harvests.clone().acquire_owned() => permit.ok(),
        }
    }

    /// 占用一个定时器名额，名额用尽时返回错误
    pub fn try_reserve_timer(&self) -> HarvesterResult<OwnedSemaphorePermit> {
        self.timers.clone().try_acquire_owned().map_err(|_| {
            HarvesterError::Configuration(format!(
                "调度池已满，无法再激活触发器 (上限 {})",
                self.pool_size
            ))
        })
    }

    pub fn available_harvests(&self) -> usize {
        self.harvests.available_permits()
    }

    pub fn available_timers(&self) -> usize {
        self.timers.available_permits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_timer_reservations_are_bounded() {
        let pool = SchedulerPool::new(2, 1);
        let first = pool.try_reserve_timer().unwrap();
        let _second = pool.try_reserve_timer().unwrap();
        assert!(matches!(
            pool.try_reserve_timer(),
            Err(HarvesterError::Configuration(_))
        ));

        drop(first);
        assert_eq!(pool.available_timers(), 1);
        assert!(pool.try_reserve_timer().is_ok());
    }

    #[tokio::test]
    async fn test_acquire_gives_up_when_cancelled() {
        let pool = SchedulerPool::new(4, 1);
        let cancel = CancellationToken::new();
        let held = pool.acquire(&cancel).await.unwrap();
        assert_eq!(pool.available_harvests(), 0);

        cancel.cancel();
        assert!(pool.acquire(&cancel).await.is_none());
        drop(held);
        assert_eq!(pool.available_harvests(), 1);
    }
}
