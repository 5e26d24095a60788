//! 插件工厂接口
//!
//! 每个扩展维度（数据源、目标、触发器、过滤器、转换器）都有自己的工厂接口，
//! 按 `type` 字符串注册到 [`Registry`](crate::registry::Registry) 中。
//! 工厂在 `build` 时立即校验必填参数并解析类型化字段，配置错误不会拖到第一次使用时才暴露。

use async_trait::async_trait;

use super::{InputBroker, OutputBroker};
use crate::{
    models::{DataReference, EntityDefinition, UiTemplate},
    HarvesterResult,
};

/// 所有插件工厂的公共部分
pub trait PluginFactory: Send + Sync {
    fn type_id(&self) -> &str;

    /// 供外部配置界面使用的参数模板
    fn describe(&self, locale: &str) -> UiTemplate;
}

pub trait InputConnector: PluginFactory {
    fn build(&self, definition: &EntityDefinition) -> HarvesterResult<Box<dyn InputBroker>>;
}

pub trait OutputConnector: PluginFactory {
    fn build(&self, definition: &EntityDefinition) -> HarvesterResult<Box<dyn OutputBroker>>;
}

/// 过滤器，返回 false 的记录被丢弃
pub trait Filter: Send + Sync {
    fn definition(&self) -> &EntityDefinition;

    fn test(&self, data: &DataReference) -> bool;
}

pub trait FilterFactory: PluginFactory {
    fn build(&self, definition: &EntityDefinition) -> HarvesterResult<Box<dyn Filter>>;
}

/// 转换器，可以改写记录内容
#[async_trait]
pub trait Transformer: Send + Sync {
    fn definition(&self) -> &EntityDefinition;

    async fn transform(&self, data: DataReference) -> HarvesterResult<DataReference>;
}

pub trait TransformerFactory: PluginFactory {
    fn build(&self, definition: &EntityDefinition) -> HarvesterResult<Box<dyn Transformer>>;
}
