use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{HarvesterError, HarvesterResult};

/// 通用插件定义
///
/// `type_id` 必须与解析它的工厂类型一致；`reference` 不为空时表示引用一个
/// 单独管理的 [`BrokerReference`](super::BrokerReference)，由执行层在运行前解析。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityDefinition {
    #[serde(rename = "type")]
    pub type_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, rename = "ref", skip_serializing_if = "Option::is_none")]
    pub reference: Option<Uuid>,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

impl EntityDefinition {
    pub fn new(type_id: impl Into<String>) -> Self {
        Self {
            type_id: type_id.into(),
            ..Default::default()
        }
    }

    /// 仅引用已存储的代理定义
    pub fn reference_to(id: Uuid) -> Self {
        Self {
            reference: Some(id),
            ..Default::default()
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.properties.insert(key.into(), value.into());
    }

    /// 确认定义类型与工厂类型一致
    pub fn expect_type(&self, type_id: &str) -> HarvesterResult<()> {
        if self.type_id.eq_ignore_ascii_case(type_id) {
            Ok(())
        } else {
            Err(HarvesterError::invalid_definition(format!(
                "定义类型不匹配: 期望 {type_id}, 实际 {}",
                self.type_id
            )))
        }
    }

    pub fn display_name(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.type_id)
    }
}

/// 采集任务定义
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub source: EntityDefinition,
    pub destinations: Vec<EntityDefinition>,
    #[serde(default)]
    pub filters: Vec<EntityDefinition>,
    #[serde(default)]
    pub transformers: Vec<EntityDefinition>,
    /// 增量采集：迭代器上下文携带上次采集时间
    #[serde(default)]
    pub incremental: bool,
    #[serde(default)]
    pub ignore_robots_txt: bool,
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl TaskDefinition {
    pub fn new(source: EntityDefinition, destinations: Vec<EntityDefinition>) -> Self {
        Self {
            source,
            destinations,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> HarvesterResult<()> {
        if self.source.type_id.is_empty() && self.source.reference.is_none() {
            return Err(HarvesterError::invalid_definition("任务缺少数据源定义"));
        }
        if self.destinations.is_empty() {
            return Err(HarvesterError::invalid_definition("任务至少需要一个目标"));
        }
        Ok(())
    }

    pub fn title(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => {
                let destinations: Vec<&str> = self
                    .destinations
                    .iter()
                    .map(EntityDefinition::display_name)
                    .collect();
                format!(
                    "{} -> [{}]",
                    self.source.display_name(),
                    destinations.join(", ")
                )
            }
        }
    }
}

/// 触发器定义
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerDefinition {
    #[serde(rename = "type")]
    pub type_id: String,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
    #[serde(rename = "taskDefinition")]
    pub task_definition: TaskDefinition,
}

impl TriggerDefinition {
    pub fn new(type_id: impl Into<String>, task_definition: TaskDefinition) -> Self {
        Self {
            type_id: type_id.into(),
            properties: BTreeMap::new(),
            task_definition,
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }
}

/// 已存储的触发器记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerRecord {
    #[serde(default, rename = "taskId")]
    pub task_id: Option<Uuid>,
    pub definition: TriggerDefinition,
}
