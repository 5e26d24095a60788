use std::sync::Arc;

use async_trait::async_trait;
use chrono::Local;
use harvester_core::models::{localized, ArgumentKind, TriggerDefinition, UiTemplate};
use harvester_core::traits::{
    PluginFactory, TriggerContext, TriggerFactory, TriggerInstance, TriggerState,
};
use harvester_core::{HarvesterResult, StructuredLogger};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

use super::{expect_type, required_property, Instances, Retire, Runner, TimerCore};
use crate::at_schedule::AtSchedule;
use crate::pool::SchedulerPool;

const TYPE: &str = "AT";
pub const AT_TIME_PROPERTY: &str = "t-at-time";

/// 每天固定时刻触发，时间按本地时区计算
pub struct AtTrigger {
    core: TimerCore,
}

impl AtTrigger {
    fn new(definition: TriggerDefinition, pool: Arc<SchedulerPool>) -> Self {
        Self {
            core: TimerCore::new(TYPE, definition, pool),
        }
    }

    fn schedule(&self) -> HarvesterResult<AtSchedule> {
        required_property(self.core.definition(), AT_TIME_PROPERTY)?.parse()
    }
}

async fn schedule_loop(
    runner: Runner,
    schedule: AtSchedule,
    context: Arc<dyn TriggerContext>,
    cancel: CancellationToken,
) {
    // sleep 按单调时钟计时，墙上时钟偏慢时可能在同一天再次醒来
    let mut last_fired = None;
    loop {
        let delay = schedule.delay_from(Local::now().time());
        StructuredLogger::log_trigger_scheduled(
            runner.id,
            runner.type_id,
            delay.as_secs().div_ceil(60) as i64,
        );

        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(delay) => {}
        }

        let today = Local::now().date_naive();
        if schedule.should_fire(today, last_fired) {
            last_fired = Some(today);
            runner.fire(&context, &cancel).await;
        } else if last_fired == Some(today) {
            debug!("触发器 {} 今天 ({}) 已经执行过, 跳过", runner.id, today);
        } else {
            debug!("触发器 {} 今天 ({}) 不满足条件 {}, 跳过", runner.id, today, schedule);
        }
        if cancel.is_cancelled() {
            break;
        }
    }
    debug!("触发器 {} 的调度循环已退出", runner.id);
}

#[async_trait]
impl TriggerInstance for AtTrigger {
    fn id(&self) -> Uuid {
        self.core.id()
    }

    fn definition(&self) -> &TriggerDefinition {
        self.core.definition()
    }

    fn state(&self) -> TriggerState {
        self.core.state()
    }

    async fn activate(&self, context: Arc<dyn TriggerContext>) -> HarvesterResult<()> {
        let schedule = self.schedule()?;
        let runner = self.core.runner();
        self.core
            .start(move |cancel| schedule_loop(runner, schedule, context, cancel))
    }

    async fn deactivate(&self) {
        self.core.stop().await;
    }
}

impl Retire for AtTrigger {
    fn is_retired(&self) -> bool {
        self.core.is_retired()
    }
}

pub struct AtTriggerFactory {
    pool: Arc<SchedulerPool>,
    instances: Instances<AtTrigger>,
}

impl AtTriggerFactory {
    pub fn new(pool: Arc<SchedulerPool>) -> Self {
        Self {
            pool,
            instances: Instances::new(),
        }
    }

    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }
}

impl PluginFactory for AtTriggerFactory {
    fn type_id(&self) -> &str {
        TYPE
    }

    fn describe(&self, locale: &str) -> UiTemplate {
        UiTemplate::new(TYPE, localized(locale, "定时执行", "At time"))
            .argument(
                AT_TIME_PROPERTY,
                localized(locale, "时间 (HH:mm[:星期[:周次[:月份]]])", "Time (HH:mm[:dow[:wom[:moy]]])"),
                ArgumentKind::String,
                true,
            )
            .default_value("00:00")
    }
}

#[async_trait]
impl TriggerFactory for AtTriggerFactory {
    fn create_instance(
        &self,
        definition: &TriggerDefinition,
    ) -> HarvesterResult<Arc<dyn TriggerInstance>> {
        expect_type(definition, TYPE)?;
        let instance: Arc<dyn TriggerInstance> = self
            .instances
            .track(Arc::new(AtTrigger::new(definition.clone(), self.pool.clone())));
        Ok(instance)
    }

    async fn close(&self) {
        self.instances.close_all().await;
    }
}
