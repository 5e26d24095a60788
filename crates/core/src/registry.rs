//! 插件注册表
//!
//! 将配置中声明的 `type` 字符串映射到具体的工厂实现，引擎本身不需要知道具体类型。
//! 每个扩展维度一个注册表，在启动时显式构建：
//!
//! ```rust,ignore
//! let mut inputs = InputRegistry::new();
//! inputs.register("FOLDER", Arc::new(FolderInputConnector));
//!
//! let connector = inputs.resolve(&definition.type_id)?;
//! let broker = connector.build(&definition)?;
//! ```
//!
//! 类型字符串不区分大小写。

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::{
    models::UiTemplate,
    traits::{
        FilterFactory, InputConnector, OutputConnector, PluginFactory, TransformerFactory,
        TriggerFactory,
    },
    HarvesterError, HarvesterResult,
};

pub type InputRegistry = Registry<dyn InputConnector>;
pub type OutputRegistry = Registry<dyn OutputConnector>;
pub type TriggerRegistry = Registry<dyn TriggerFactory>;
pub type FilterRegistry = Registry<dyn FilterFactory>;
pub type TransformerRegistry = Registry<dyn TransformerFactory>;

/// 按类型字符串索引的工厂表
pub struct Registry<F: ?Sized + PluginFactory> {
    kind: &'static str,
    factories: BTreeMap<String, Arc<F>>,
}

impl<F: ?Sized + PluginFactory> Registry<F> {
    pub fn new() -> Self {
        Self::named("插件")
    }

    /// `kind` 用于错误信息，例如 "数据源"、"触发器"
    pub fn named(kind: &'static str) -> Self {
        Self {
            kind,
            factories: BTreeMap::new(),
        }
    }

    fn key(type_id: &str) -> String {
        type_id.trim().to_ascii_uppercase()
    }

    /// 注册工厂，同名工厂会被替换
    pub fn register(&mut self, type_id: &str, factory: Arc<F>) -> Option<Arc<F>> {
        self.factories.insert(Self::key(type_id), factory)
    }

    /// 使用工厂自身的类型ID注册
    pub fn register_factory(&mut self, factory: Arc<F>) -> Option<Arc<F>> {
        let type_id = factory.type_id().to_string();
        self.register(&type_id, factory)
    }

    /// 注册工厂，同名工厂已存在时返回 false
    pub fn try_register(&mut self, type_id: &str, factory: Arc<F>) -> bool {
        let key = Self::key(type_id);
        if self.factories.contains_key(&key) {
            return false;
        }
        self.factories.insert(key, factory);
        true
    }

    pub fn unregister(&mut self, type_id: &str) -> bool {
        self.factories.remove(&Self::key(type_id)).is_some()
    }

    pub fn resolve(&self, type_id: &str) -> HarvesterResult<Arc<F>> {
        self.factories
            .get(&Self::key(type_id))
            .cloned()
            .ok_or_else(|| HarvesterError::NotFound {
                kind: self.kind,
                key: format!(
                    "未知类型 '{}', 可用类型: [{}]",
                    type_id,
                    self.types().join(", ")
                ),
            })
    }

    pub fn contains(&self, type_id: &str) -> bool {
        self.factories.contains_key(&Self::key(type_id))
    }

    pub fn types(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    pub fn templates(&self, locale: &str) -> Vec<UiTemplate> {
        self.factories.values().map(|f| f.describe(locale)).collect()
    }

    pub fn factories(&self) -> impl Iterator<Item = &Arc<F>> {
        self.factories.values()
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl<F: ?Sized + PluginFactory> Default for Registry<F> {
    fn default() -> Self {
        Self::new()
    }
}

/// 全部插件注册表
pub struct Registries {
    pub inputs: InputRegistry,
    pub outputs: OutputRegistry,
    pub triggers: TriggerRegistry,
    pub filters: FilterRegistry,
    pub transformers: TransformerRegistry,
}

impl Registries {
    pub fn new() -> Self {
        Self {
            inputs: Registry::named("数据源"),
            outputs: Registry::named("目标"),
            triggers: Registry::named("触发器"),
            filters: Registry::named("过滤器"),
            transformers: Registry::named("转换器"),
        }
    }
}

impl Default for Registries {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DataReference, EntityDefinition, UiTemplate};
    use crate::traits::{Filter, FilterFactory, PluginFactory};

    struct AcceptAll(EntityDefinition);

    impl Filter for AcceptAll {
        fn definition(&self) -> &EntityDefinition {
            &self.0
        }

        fn test(&self, _data: &DataReference) -> bool {
            true
        }
    }

    struct AcceptAllFactory;

    impl PluginFactory for AcceptAllFactory {
        fn type_id(&self) -> &str {
            "ALL"
        }

        fn describe(&self, _locale: &str) -> UiTemplate {
            UiTemplate::new("ALL", "Accept all")
        }
    }

    impl FilterFactory for AcceptAllFactory {
        fn build(&self, definition: &EntityDefinition) -> HarvesterResult<Box<dyn Filter>> {
            definition.expect_type("ALL")?;
            Ok(Box::new(AcceptAll(definition.clone())))
        }
    }

    #[test]
    fn test_register_and_resolve_ignores_case() {
        let mut registry = FilterRegistry::named("过滤器");
        assert!(registry.is_empty());
        registry.register_factory(Arc::new(AcceptAllFactory));

        assert!(registry.contains("all"));
        let factory = registry.resolve("All").unwrap();
        assert!(factory.build(&EntityDefinition::new("ALL")).is_ok());
        assert_eq!(registry.templates("en").len(), 1);
    }

    #[test]
    fn test_resolve_unknown_type_lists_available() {
        let mut registry = FilterRegistry::named("过滤器");
        registry.register("ALL", Arc::new(AcceptAllFactory));

        let err = match registry.resolve("REGEX") {
            Err(err) => err,
            Ok(_) => panic!("REGEX should not resolve"),
        };
        assert!(matches!(err, HarvesterError::NotFound { kind: "过滤器", .. }));
        assert!(err.to_string().contains("ALL"));
    }

    #[test]
    fn test_try_register_keeps_first() {
        let mut registry = FilterRegistry::new();
        assert!(registry.try_register("ALL", Arc::new(AcceptAllFactory)));
        assert!(!registry.try_register("all", Arc::new(AcceptAllFactory)));
        assert_eq!(registry.len(), 1);
        assert!(registry.unregister("ALL"));
        assert!(!registry.contains("ALL"));
    }
}
