//! 内置触发器
//!
//! - `NOW` 立即提交一次
//! - `AT` 每天固定时刻，可按星期、周次、月份过滤
//! - `PERIOD` 按 ISO-8601 时间段重复，以上次采集时间为锚点
//!
//! 定时类触发器共用 [`TimerCore`]：每个实例最多持有一个调度循环，
//! 循环在共享的 [`SchedulerPool`] 上运行，执行前先等待采集许可。

mod at;
mod immediate;
mod period;

use std::future::Future;
use std::sync::{Arc, Mutex};

use harvester_core::models::TriggerDefinition;
use harvester_core::traits::{TriggerContext, TriggerInstance, TriggerState};
use harvester_core::{HarvesterError, HarvesterResult, StructuredLogger, TriggerRegistry};
use tokio::sync::OwnedSemaphorePermit;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::pool::SchedulerPool;

pub use at::{AtTrigger, AtTriggerFactory, AT_TIME_PROPERTY};
pub use immediate::{ImmediateTrigger, ImmediateTriggerFactory};
pub use period::{PeriodTrigger, PeriodTriggerFactory, PERIOD_PROPERTY};

/// 注册全部内置触发器
pub fn register_triggers(registry: &mut TriggerRegistry, pool: Arc<SchedulerPool>) {
    registry.register_factory(Arc::new(ImmediateTriggerFactory::new()));
    registry.register_factory(Arc::new(AtTriggerFactory::new(pool.clone())));
    registry.register_factory(Arc::new(PeriodTriggerFactory::new(pool)));
}

struct Armed {
    handle: JoinHandle<()>,
    _slot: OwnedSemaphorePermit,
}

/// 定时触发器的公共部分
pub(crate) struct TimerCore {
    id: Uuid,
    type_id: &'static str,
    definition: TriggerDefinition,
    pool: Arc<SchedulerPool>,
    cancel: CancellationToken,
    armed: Mutex<Option<Armed>>,
}

impl TimerCore {
    pub(crate) fn new(
        type_id: &'static str,
        definition: TriggerDefinition,
        pool: Arc<SchedulerPool>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            type_id,
            definition,
            pool,
            cancel: CancellationToken::new(),
            armed: Mutex::new(None),
        }
    }

    pub(crate) fn id(&self) -> Uuid {
        self.id
    }

    pub(crate) fn definition(&self) -> &TriggerDefinition {
        &self.definition
    }

    pub(crate) fn state(&self) -> TriggerState {
        let armed = match self.armed.lock() {
            Ok(armed) => armed.is_some(),
            Err(poisoned) => poisoned.into_inner().is_some(),
        };
        if armed && !self.cancel.is_cancelled() {
            TriggerState::Active
        } else {
            TriggerState::Inactive
        }
    }

    pub(crate) fn is_retired(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// 启动调度循环
    ///
    /// 已停用的实例不会再次启动；已有循环时直接返回。
    pub(crate) fn start<F, Fut>(&self, schedule_loop: F) -> HarvesterResult<()>
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut armed = self
            .armed
            .lock()
            .map_err(|_| HarvesterError::Internal("触发器状态锁已损坏".to_string()))?;
        if self.cancel.is_cancelled() {
            return Err(HarvesterError::Internal(format!(
                "触发器 {} 已停用，不能再次激活",
                self.id
            )));
        }
        if armed.is_some() {
            debug!("触发器 {} 已处于激活状态", self.id);
            return Ok(());
        }
        let slot = self.pool.try_reserve_timer()?;
        let handle = self.pool.spawn(schedule_loop(self.cancel.clone()));
        *armed = Some(Armed {
            handle,
            _slot: slot,
        });
        Ok(())
    }

    /// 取消调度并等待循环退出
    pub(crate) async fn stop(&self) {
        let armed = {
            let mut guard = match self.armed.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            self.cancel.cancel();
            guard.take()
        };
        if let Some(armed) = armed {
            if let Err(e) = armed.handle.await {
                warn!("触发器 {} 的调度循环异常退出: {}", self.id, e);
            }
        }
    }

    /// 调度循环所需的共享数据
    pub(crate) fn runner(&self) -> Runner {
        Runner {
            pool: self.pool.clone(),
            id: self.id,
            type_id: self.type_id,
            definition: self.definition.clone(),
        }
    }
}

/// 调度循环持有的数据，循环本身不引用触发器实例
pub(crate) struct Runner {
    pool: Arc<SchedulerPool>,
    pub(crate) id: Uuid,
    pub(crate) type_id: &'static str,
    definition: TriggerDefinition,
}

impl Runner {
    /// 等待采集许可后执行一次任务，失败只记录日志
    pub(crate) async fn fire(&self, context: &Arc<dyn TriggerContext>, cancel: &CancellationToken) {
        let Some(_permit) = self.pool.acquire(cancel).await else {
            debug!("触发器 {} 在等待采集许可时被取消", self.id);
            return;
        };
        match context
            .execute(&self.definition.task_definition, cancel.child_token())
            .await
        {
            Ok(report) => debug!(
                "触发器 {} 执行完成: 获取 {}, 失败 {}",
                self.id, report.acquired, report.failed
            ),
            Err(e) => StructuredLogger::log_trigger_failure(self.id, self.type_id, &e),
        }
    }
}

/// 可以判断是否已停用的触发器实例
pub(crate) trait Retire: TriggerInstance {
    fn is_retired(&self) -> bool;
}

/// 工厂持有的实例集合
pub(crate) struct Instances<T> {
    items: Mutex<Vec<Arc<T>>>,
}

impl<T: Retire + 'static> Instances<T> {
    pub(crate) fn new() -> Self {
        Self {
            items: Mutex::new(Vec::new()),
        }
    }

    /// 记录新实例，同时移除已停用的实例
    pub(crate) fn track(&self, instance: Arc<T>) -> Arc<T> {
        let mut items = match self.items.lock() {
            Ok(items) => items,
            Err(poisoned) => poisoned.into_inner(),
        };
        items.retain(|item| !item.is_retired());
        items.push(instance.clone());
        instance
    }

    pub(crate) fn len(&self) -> usize {
        match self.items.lock() {
            Ok(items) => items.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub(crate) async fn close_all(&self) {
        let items = {
            let mut items = match self.items.lock() {
                Ok(items) => items,
                Err(poisoned) => poisoned.into_inner(),
            };
            std::mem::take(&mut *items)
        };
        for item in items {
            item.deactivate().await;
        }
    }
}

/// 必填属性
pub(crate) fn required_property<'a>(
    definition: &'a TriggerDefinition,
    key: &str,
) -> HarvesterResult<&'a str> {
    definition
        .get(key)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| {
            HarvesterError::invalid_definition(format!(
                "触发器 {} 缺少属性 '{key}'",
                definition.type_id
            ))
        })
}

pub(crate) fn expect_type(definition: &TriggerDefinition, type_id: &str) -> HarvesterResult<()> {
    if definition.type_id.eq_ignore_ascii_case(type_id) {
        Ok(())
    } else {
        Err(HarvesterError::invalid_definition(format!(
            "触发器类型不匹配: 期望 {type_id}, 实际 {}",
            definition.type_id
        )))
    }
}
