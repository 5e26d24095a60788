//! Test data builders for creating test entities
//!
//! This module provides builder patterns for creating test data with
//! sensible defaults and easy customization.

use chrono::{DateTime, Utc};
use harvester_core::models::{
    content_kind, DataReference, EntityDefinition, TaskDefinition, TriggerDefinition,
};
use url::Url;

/// Builder for creating test DataReference entities
pub struct DataReferenceBuilder {
    data: DataReference,
}

impl DataReferenceBuilder {
    pub fn new(id: &str) -> Self {
        let broker_uri = Url::parse("mock://source").expect("valid url");
        let source_uri = Url::parse(&format!("http://source.example.com/records/{id}.xml"))
            .expect("valid url");
        Self {
            data: DataReference::new(id, broker_uri, "MOCK", source_uri).with_content(
                content_kind::APPLICATION_XML,
                format!("<record id=\"{id}\"/>").into_bytes(),
            ),
        }
    }

    pub fn with_broker_uri(mut self, uri: &str) -> Self {
        self.data.broker_uri = Url::parse(uri).expect("valid url");
        self
    }

    pub fn with_source_uri(mut self, uri: &str) -> Self {
        self.data.source_uri = Url::parse(uri).expect("valid url");
        self
    }

    pub fn with_content(mut self, kind: &str, payload: &str) -> Self {
        self.data
            .content
            .insert(kind.to_string(), payload.as_bytes().to_vec());
        self
    }

    pub fn with_last_modified(mut self, last_modified: DateTime<Utc>) -> Self {
        self.data.last_modified = Some(last_modified);
        self
    }

    pub fn build(self) -> DataReference {
        self.data
    }
}

/// Creates `count` records with ids `rec-0`, `rec-1`, ...
pub fn records(count: usize) -> Vec<DataReference> {
    (0..count)
        .map(|i| DataReferenceBuilder::new(&format!("rec-{i}")).build())
        .collect()
}

/// Builder for creating test TaskDefinition entities
pub struct TaskDefinitionBuilder {
    task: TaskDefinition,
}

impl TaskDefinitionBuilder {
    pub fn new() -> Self {
        Self {
            task: TaskDefinition::new(
                EntityDefinition::new("MOCK-IN"),
                vec![EntityDefinition::new("MOCK-OUT")],
            ),
        }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.task.name = Some(name.to_string());
        self
    }

    pub fn with_source(mut self, source: EntityDefinition) -> Self {
        self.task.source = source;
        self
    }

    pub fn with_destinations(mut self, destinations: Vec<EntityDefinition>) -> Self {
        self.task.destinations = destinations;
        self
    }

    pub fn with_filter(mut self, filter: EntityDefinition) -> Self {
        self.task.filters.push(filter);
        self
    }

    pub fn with_transformer(mut self, transformer: EntityDefinition) -> Self {
        self.task.transformers.push(transformer);
        self
    }

    pub fn incremental(mut self) -> Self {
        self.task.incremental = true;
        self
    }

    pub fn build(self) -> TaskDefinition {
        self.task
    }

    pub fn build_trigger(self, trigger_type: &str, properties: &[(&str, &str)]) -> TriggerDefinition {
        let mut trigger = TriggerDefinition::new(trigger_type, self.task);
        for (key, value) in properties {
            trigger = trigger.with_property(*key, *value);
        }
        trigger
    }
}

impl Default for TaskDefinitionBuilder {
    fn default() -> Self {
        Self::new()
    }
}
