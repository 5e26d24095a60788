use std::collections::BTreeMap;

use harvester_core::definition::{DefinitionAdaptor, PropertyReader};
use harvester_core::models::{localized, ArgumentKind, DataReference, EntityDefinition, UiTemplate};
use harvester_core::traits::{Filter, FilterFactory, PluginFactory};
use harvester_core::{HarvesterError, HarvesterResult};
use regex::Regex;

const MAX_PATTERN_LENGTH: usize = 500;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegexFilterConfig {
    pub pattern: String,
}

impl RegexFilterConfig {
    pub const P_PATTERN: &'static str = "f-regex-pattern";
}

impl DefinitionAdaptor for RegexFilterConfig {
    const TYPE: &'static str = "REGEX";

    fn from_properties(properties: &BTreeMap<String, String>) -> HarvesterResult<Self> {
        let reader = PropertyReader::new(Self::TYPE, properties);
        let pattern = reader.required(Self::P_PATTERN)?;
        if pattern.chars().count() > MAX_PATTERN_LENGTH {
            return Err(HarvesterError::invalid_definition(format!(
                "{}: 正则表达式超过 {MAX_PATTERN_LENGTH} 个字符",
                Self::TYPE
            )));
        }
        Ok(Self { pattern })
    }

    fn write_properties(&self, properties: &mut BTreeMap<String, String>) {
        properties.insert(Self::P_PATTERN.to_string(), self.pattern.clone());
    }
}

/// 只保留来源地址完整匹配正则表达式的记录
pub struct RegexFilter {
    definition: EntityDefinition,
    regex: Regex,
}

impl RegexFilter {
    pub fn new(config: RegexFilterConfig) -> HarvesterResult<Self> {
        let regex = Regex::new(&format!("^(?:{})$", config.pattern)).map_err(|e| {
            HarvesterError::invalid_definition(format!("无效的正则表达式 {}: {e}", config.pattern))
        })?;
        Ok(Self {
            definition: config.to_definition(),
            regex,
        })
    }
}

impl Filter for RegexFilter {
    fn definition(&self) -> &EntityDefinition {
        &self.definition
    }

    fn test(&self, data: &DataReference) -> bool {
        self.regex.is_match(data.source_uri.as_str())
    }
}

pub struct RegexFilterFactory;

impl PluginFactory for RegexFilterFactory {
    fn type_id(&self) -> &str {
        RegexFilterConfig::TYPE
    }

    fn describe(&self, locale: &str) -> UiTemplate {
        UiTemplate::new(
            RegexFilterConfig::TYPE,
            localized(locale, "正则表达式过滤器", "Regular expression filter"),
        )
        .argument(
            RegexFilterConfig::P_PATTERN,
            localized(locale, "正则表达式", "Pattern"),
            ArgumentKind::String,
            true,
        )
    }
}

impl FilterFactory for RegexFilterFactory {
    fn build(&self, definition: &EntityDefinition) -> HarvesterResult<Box<dyn Filter>> {
        let config = RegexFilterConfig::from_definition(definition)?;
        Ok(Box::new(RegexFilter::new(config)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn record(source: &str) -> DataReference {
        DataReference::new(
            "a",
            Url::parse("mock://source").unwrap(),
            "mock",
            Url::parse(source).unwrap(),
        )
    }

    fn build(pattern: &str) -> HarvesterResult<Box<dyn Filter>> {
        RegexFilterFactory.build(
            &EntityDefinition::new("REGEX").with_property(RegexFilterConfig::P_PATTERN, pattern),
        )
    }

    #[test]
    fn test_full_match_on_source_uri() {
        let filter = build(r"http://example\.com/.*\.xml").unwrap();
        assert!(filter.test(&record("http://example.com/data/a.xml")));
        assert!(!filter.test(&record("http://example.com/data/a.xml.bak")));
        assert!(!filter.test(&record("https://other.org/http://example.com/a.xml")));
    }

    #[test]
    fn test_invalid_patterns_are_rejected() {
        assert!(matches!(
            build("(unclosed"),
            Err(HarvesterError::InvalidDefinition(_))
        ));
        assert!(build(&"a".repeat(501)).is_err());
        assert!(RegexFilterFactory
            .build(&EntityDefinition::new("REGEX"))
            .is_err());
    }
}
