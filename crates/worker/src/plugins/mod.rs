//! 内置插件
//!
//! | 维度 | 类型 | 说明 |
//! |------|------|------|
//! | 数据源 | `FOLDER` | 读取本地目录 |
//! | 目标 | `FOLDER` | 写入本地目录，支持清理 |
//! | 目标 | `CONSOLE` | 输出到日志 |
//! | 过滤器 | `REGEX` | 按来源地址过滤 |
//! | 转换器 | `REPLACE` | 文本替换 |
//!
//! 触发器由调度层注册。

mod console_output;
mod folder_input;
mod folder_output;
mod regex_filter;
mod replace_transformer;

use std::sync::Arc;

use harvester_core::Registries;

pub use console_output::{ConsoleOutputBroker, ConsoleOutputConnector};
pub use folder_input::{FolderInputBroker, FolderInputConfig, FolderInputConnector};
pub use folder_output::{source_folder, FolderOutputBroker, FolderOutputConfig, FolderOutputConnector};
pub use regex_filter::{RegexFilter, RegexFilterConfig, RegexFilterFactory};
pub use replace_transformer::{ReplaceConfig, ReplaceTransformer, ReplaceTransformerFactory};

/// 注册全部内置的数据源、目标、过滤器和转换器
pub fn register_builtin(registries: &mut Registries) {
    registries
        .inputs
        .register_factory(Arc::new(FolderInputConnector));
    registries
        .outputs
        .register_factory(Arc::new(FolderOutputConnector));
    registries
        .outputs
        .register_factory(Arc::new(ConsoleOutputConnector));
    registries
        .filters
        .register_factory(Arc::new(RegexFilterFactory));
    registries
        .transformers
        .register_factory(Arc::new(ReplaceTransformerFactory));
}
