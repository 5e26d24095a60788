use std::collections::BTreeMap;

use async_trait::async_trait;
use harvester_core::definition::{DefinitionAdaptor, PropertyReader};
use harvester_core::models::{
    content_kind, localized, ArgumentKind, DataReference, EntityDefinition, UiTemplate,
};
use harvester_core::traits::{PluginFactory, Transformer, TransformerFactory};
use harvester_core::{HarvesterError, HarvesterResult};
use regex::Regex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplaceConfig {
    pub pattern: String,
    pub replacement: String,
    pub content_kind: String,
}

impl ReplaceConfig {
    pub const P_PATTERN: &'static str = "t-replace-pattern";
    pub const P_WITH: &'static str = "t-replace-with";
    pub const P_CONTENT: &'static str = "t-replace-content";
}

impl DefinitionAdaptor for ReplaceConfig {
    const TYPE: &'static str = "REPLACE";

    fn from_properties(properties: &BTreeMap<String, String>) -> HarvesterResult<Self> {
        let reader = PropertyReader::new(Self::TYPE, properties);
        Ok(Self {
            pattern: reader.required(Self::P_PATTERN)?,
            // 替换为空字符串是合法的，不做 trim
            replacement: properties.get(Self::P_WITH).cloned().unwrap_or_default(),
            content_kind: reader
                .optional(Self::P_CONTENT)
                .unwrap_or_else(|| content_kind::APPLICATION_XML.to_string()),
        })
    }

    fn write_properties(&self, properties: &mut BTreeMap<String, String>) {
        properties.insert(Self::P_PATTERN.to_string(), self.pattern.clone());
        properties.insert(Self::P_WITH.to_string(), self.replacement.clone());
        properties.insert(Self::P_CONTENT.to_string(), self.content_kind.clone());
    }
}

/// 对记录的文本内容做正则替换
pub struct ReplaceTransformer {
    definition: EntityDefinition,
    regex: Regex,
    replacement: String,
    content_kind: String,
}

impl ReplaceTransformer {
    pub fn new(config: ReplaceConfig) -> HarvesterResult<Self> {
        let regex = Regex::new(&config.pattern).map_err(|e| {
            HarvesterError::invalid_definition(format!("无效的正则表达式 {}: {e}", config.pattern))
        })?;
        Ok(Self {
            definition: config.to_definition(),
            regex,
            replacement: config.replacement,
            content_kind: config.content_kind,
        })
    }
}

#[async_trait]
impl Transformer for ReplaceTransformer {
    fn definition(&self) -> &EntityDefinition {
        &self.definition
    }

    async fn transform(&self, mut data: DataReference) -> HarvesterResult<DataReference> {
        let Some(payload) = data.content.get_mut(&self.content_kind) else {
            return Ok(data);
        };
        let text = std::str::from_utf8(payload).map_err(|e| {
            HarvesterError::Transform(format!("记录 {} 的内容不是UTF-8文本: {e}", data.id))
        })?;
        let replaced = self.regex.replace_all(text, self.replacement.as_str());
        *payload = replaced.into_owned().into_bytes();
        Ok(data)
    }
}

pub struct ReplaceTransformerFactory;

impl PluginFactory for ReplaceTransformerFactory {
    fn type_id(&self) -> &str {
        ReplaceConfig::TYPE
    }

    fn describe(&self, locale: &str) -> UiTemplate {
        UiTemplate::new(
            ReplaceConfig::TYPE,
            localized(locale, "文本替换", "Text replace"),
        )
        .argument(
            ReplaceConfig::P_PATTERN,
            localized(locale, "查找", "Find"),
            ArgumentKind::String,
            true,
        )
        .argument(
            ReplaceConfig::P_WITH,
            localized(locale, "替换为", "Replace with"),
            ArgumentKind::String,
            false,
        )
        .argument(
            ReplaceConfig::P_CONTENT,
            localized(locale, "内容类型", "Content type"),
            ArgumentKind::String,
            false,
        )
        .default_value(content_kind::APPLICATION_XML)
    }
}

impl TransformerFactory for ReplaceTransformerFactory {
    fn build(&self, definition: &EntityDefinition) -> HarvesterResult<Box<dyn Transformer>> {
        let config = ReplaceConfig::from_definition(definition)?;
        Ok(Box::new(ReplaceTransformer::new(config)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn record(payload: &[u8]) -> DataReference {
        DataReference::new(
            "rec-1",
            Url::parse("mock://source").unwrap(),
            "mock",
            Url::parse("http://example.com/rec-1.xml").unwrap(),
        )
        .with_content(content_kind::APPLICATION_XML, payload.to_vec())
    }

    fn transformer(pattern: &str, with: &str) -> Box<dyn Transformer> {
        ReplaceTransformerFactory
            .build(
                &EntityDefinition::new("REPLACE")
                    .with_property(ReplaceConfig::P_PATTERN, pattern)
                    .with_property(ReplaceConfig::P_WITH, with),
            )
            .unwrap()
    }

    #[tokio::test]
    async fn test_replaces_xml_content() {
        let transformer = transformer("http://old\\.host", "https://new.host");
        let data = record(b"<a href=\"http://old.host/x\"/><b>http://old.host</b>");
        let data = transformer.transform(data).await.unwrap();
        assert_eq!(
            data.content(content_kind::APPLICATION_XML).unwrap(),
            b"<a href=\"https://new.host/x\"/><b>https://new.host</b>"
        );
    }

    #[tokio::test]
    async fn test_other_content_kinds_pass_through() {
        let transformer = transformer("a", "b");
        let data = DataReference::new(
            "rec-1",
            Url::parse("mock://source").unwrap(),
            "mock",
            Url::parse("http://example.com/rec-1.json").unwrap(),
        )
        .with_content(content_kind::APPLICATION_JSON, b"aaa".to_vec());
        let data = transformer.transform(data).await.unwrap();
        assert_eq!(data.content(content_kind::APPLICATION_JSON).unwrap(), b"aaa");
    }

    #[tokio::test]
    async fn test_binary_payload_is_transform_error() {
        let transformer = transformer("a", "b");
        let err = transformer
            .transform(record(&[0xff, 0xfe, 0x00]))
            .await
            .unwrap_err();
        assert!(matches!(err, HarvesterError::Transform(_)));
    }
}
