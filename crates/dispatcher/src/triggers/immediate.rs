use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use harvester_core::models::{localized, TriggerDefinition, UiTemplate};
use harvester_core::traits::{
    PluginFactory, TriggerContext, TriggerFactory, TriggerInstance, TriggerState,
};
use harvester_core::{HarvesterError, HarvesterResult};
use tokio_util::sync::CancellationToken;
use tracing::info;
use uuid::Uuid;

use super::{expect_type, Instances, Retire};

const TYPE: &str = "NOW";

/// 激活时立即提交一次任务，不会再次触发
pub struct ImmediateTrigger {
    id: Uuid,
    definition: TriggerDefinition,
    cancel: CancellationToken,
    submitted: AtomicBool,
}

impl ImmediateTrigger {
    fn new(definition: TriggerDefinition) -> Self {
        Self {
            id: Uuid::new_v4(),
            definition,
            cancel: CancellationToken::new(),
            submitted: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl TriggerInstance for ImmediateTrigger {
    fn id(&self) -> Uuid {
        self.id
    }

    fn definition(&self) -> &TriggerDefinition {
        &self.definition
    }

    fn state(&self) -> TriggerState {
        if self.submitted.load(Ordering::SeqCst) && !self.cancel.is_cancelled() {
            TriggerState::Active
        } else {
            TriggerState::Inactive
        }
    }

    fn recurring(&self) -> bool {
        false
    }

    async fn activate(&self, context: Arc<dyn TriggerContext>) -> HarvesterResult<()> {
        if self.cancel.is_cancelled() {
            return Err(HarvesterError::Internal(format!(
                "触发器 {} 已停用，不能再次激活",
                self.id
            )));
        }
        if self.submitted.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        match context
            .submit(&self.definition.task_definition, self.cancel.child_token())
            .await
        {
            Ok(process_id) => {
                info!("触发器 {} 已提交采集进程 {}", self.id, process_id);
                Ok(())
            }
            Err(e) => {
                self.submitted.store(false, Ordering::SeqCst);
                Err(e)
            }
        }
    }

    /// 取消已提交的采集
    async fn deactivate(&self) {
        self.cancel.cancel();
    }
}

/// 提交过的实例不再由工厂持有
impl Retire for ImmediateTrigger {
    fn is_retired(&self) -> bool {
        self.submitted.load(Ordering::SeqCst) || self.cancel.is_cancelled()
    }
}

pub struct ImmediateTriggerFactory {
    instances: Instances<ImmediateTrigger>,
}

impl ImmediateTriggerFactory {
    pub fn new() -> Self {
        Self {
            instances: Instances::new(),
        }
    }

    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }
}

impl Default for ImmediateTriggerFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl PluginFactory for ImmediateTriggerFactory {
    fn type_id(&self) -> &str {
        TYPE
    }

    fn describe(&self, locale: &str) -> UiTemplate {
        UiTemplate::new(TYPE, localized(locale, "立即执行", "Now"))
    }
}

#[async_trait]
impl TriggerFactory for ImmediateTriggerFactory {
    fn create_instance(
        &self,
        definition: &TriggerDefinition,
    ) -> HarvesterResult<Arc<dyn TriggerInstance>> {
        expect_type(definition, TYPE)?;
        let instance: Arc<dyn TriggerInstance> = self
            .instances
            .track(Arc::new(ImmediateTrigger::new(definition.clone())));
        Ok(instance)
    }

    async fn close(&self) {
        self.instances.close_all().await;
    }
}
