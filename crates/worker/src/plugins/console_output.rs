use async_trait::async_trait;
use harvester_core::models::{localized, DataReference, EntityDefinition, PublishedRecord, UiTemplate};
use harvester_core::traits::{InitContext, OutputBroker, OutputConnector, PluginFactory};
use harvester_core::HarvesterResult;
use tracing::info;

const TYPE: &str = "CONSOLE";

/// 把记录打印到日志，调试任务时使用
pub struct ConsoleOutputBroker {
    definition: EntityDefinition,
    published: u64,
}

#[async_trait]
impl OutputBroker for ConsoleOutputBroker {
    fn definition(&self) -> &EntityDefinition {
        &self.definition
    }

    async fn initialize(&mut self, _context: &InitContext) -> HarvesterResult<()> {
        self.published = 0;
        Ok(())
    }

    async fn publish(&mut self, data: &DataReference) -> HarvesterResult<PublishedRecord> {
        let (kind, payload) = data.primary_content().unwrap_or(("-", b"".as_slice()));
        info!(
            data.id = %data.id,
            source = %data.source_uri,
            content_kind = kind,
            "{}",
            String::from_utf8_lossy(payload)
        );
        self.published += 1;
        Ok(PublishedRecord::created(&data.id))
    }

    async fn terminate(&mut self) -> HarvesterResult<()> {
        info!(count = self.published, "控制台输出结束");
        Ok(())
    }
}

pub struct ConsoleOutputConnector;

impl PluginFactory for ConsoleOutputConnector {
    fn type_id(&self) -> &str {
        TYPE
    }

    fn describe(&self, locale: &str) -> UiTemplate {
        UiTemplate::new(TYPE, localized(locale, "控制台", "Console"))
    }
}

impl OutputConnector for ConsoleOutputConnector {
    fn build(&self, definition: &EntityDefinition) -> HarvesterResult<Box<dyn OutputBroker>> {
        definition.expect_type(TYPE)?;
        Ok(Box::new(ConsoleOutputBroker {
            definition: definition.clone(),
            published: 0,
        }))
    }
}
