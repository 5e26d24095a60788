use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use harvester_core::models::{localized, ArgumentKind, TriggerDefinition, UiTemplate};
use harvester_core::traits::{
    PluginFactory, TriggerContext, TriggerFactory, TriggerInstance, TriggerState,
};
use harvester_core::{HarvesterResult, StructuredLogger};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{expect_type, required_property, Instances, Retire, Runner, TimerCore};
use crate::period::IsoPeriod;
use crate::pool::SchedulerPool;

const TYPE: &str = "PERIOD";
pub const PERIOD_PROPERTY: &str = "t-period";

/// 按固定时间段重复触发
///
/// 第一次以任务的上次采集时间为锚点，此后以每次执行完成的时间为锚点。
pub struct PeriodTrigger {
    core: TimerCore,
}

impl PeriodTrigger {
    fn new(definition: TriggerDefinition, pool: Arc<SchedulerPool>) -> Self {
        Self {
            core: TimerCore::new(TYPE, definition, pool),
        }
    }

    fn period(&self) -> HarvesterResult<IsoPeriod> {
        required_property(self.core.definition(), PERIOD_PROPERTY)?.parse()
    }
}

async fn schedule_loop(
    runner: Runner,
    period: IsoPeriod,
    context: Arc<dyn TriggerContext>,
    cancel: CancellationToken,
) {
    let mut anchor = match context.last_harvest().await {
        Ok(last) => last,
        Err(e) => {
            warn!("触发器 {} 无法读取上次采集时间，立即执行: {}", runner.id, e);
            None
        }
    };

    loop {
        let now = Utc::now();
        let delay = period.delay(anchor, now);
        if delay == Duration::MAX {
            warn!("触发器 {} 的下一次运行时间超出范围 ({}), 停止调度", runner.id, period);
            break;
        }
        if delay.is_zero() {
            debug!("触发器 {} 立即执行", runner.id);
        } else if let Ok(offset) = TimeDelta::from_std(delay) {
            StructuredLogger::log_trigger_fire_at(runner.id, runner.type_id, now + offset);
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(delay) => {}
        }

        runner.fire(&context, &cancel).await;
        if cancel.is_cancelled() {
            break;
        }
        anchor = Some(Utc::now());
    }
    debug!("触发器 {} 的调度循环已退出", runner.id);
}

#[async_trait]
impl TriggerInstance for PeriodTrigger {
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
        let period = self.period()?;
        let runner = self.core.runner();
        self.core
            .start(move |cancel| schedule_loop(runner, period, context, cancel))
    }

    async fn deactivate(&self) {
        self.core.stop().await;
    }
}

impl Retire for PeriodTrigger {
    fn is_retired(&self) -> bool {
        self.core.is_retired()
    }
}

pub struct PeriodTriggerFactory {
    pool: Arc<SchedulerPool>,
    instances: Instances<PeriodTrigger>,
}

impl PeriodTriggerFactory {
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

impl PluginFactory for PeriodTriggerFactory {
    fn type_id(&self) -> &str {
        TYPE
    }

    fn describe(&self, locale: &str) -> UiTemplate {
        UiTemplate::new(TYPE, localized(locale, "周期执行", "Periodically"))
            .argument(
                PERIOD_PROPERTY,
                localized(locale, "周期", "Period"),
                ArgumentKind::Period,
                true,
            )
            .default_value("P1D")
    }
}

#[async_trait]
impl TriggerFactory for PeriodTriggerFactory {
    fn create_instance(
        &self,
        definition: &TriggerDefinition,
    ) -> HarvesterResult<Arc<dyn TriggerInstance>> {
        expect_type(definition, TYPE)?;
        let instance: Arc<dyn TriggerInstance> = self
            .instances
            .track(Arc::new(PeriodTrigger::new(definition.clone(), self.pool.clone())));
        Ok(instance)
    }

    async fn close(&self) {
        self.instances.close_all().await;
    }
}
