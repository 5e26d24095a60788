//! # 数据模型
//!
//! 定义采集引擎的核心数据结构：插件定义、任务定义、采集记录、历史报告和模板。
//!
//! ## 核心模型
//!
//! ### EntityDefinition - 通用插件定义
//! 任意插件（数据源、目标、触发器、过滤器、转换器）的配置都是
//! `{type, properties}` 形式，由对应工厂负责解析和校验。
//!
//! ### TaskDefinition - 采集任务
//! 一个数据源、一个或多个目标，以及可选的过滤器/转换器链和运行标志。
//!
//! ### DataReference - 采集记录
//! 由数据源迭代器产生，在过滤、转换之后发布到每个目标。
//!
//! ### HistoryEvent / HistoryReport - 采集历史
//! 每次运行完成后写入一条不可变事件。
//!
//! ## 状态流转
//!
//! ```text
//! Submitted → Working → Completed
//! ```
//!
//! ## 使用示例
//!
//! ```rust
//! use harvester_core::models::{EntityDefinition, TaskDefinition};
//!
//! let source = EntityDefinition::new("FOLDER").with_property("f-root-folder", "/data/in");
//! let destination = EntityDefinition::new("CONSOLE");
//! let task = TaskDefinition::new(source, vec![destination]);
//! assert_eq!(task.destinations.len(), 1);
//! ```

pub mod broker;
pub mod data;
pub mod definition;
pub mod history;
pub mod process;
pub mod template;

pub use broker::*;
pub use data::*;
pub use definition::*;
pub use history::*;
pub use process::*;
pub use template::*;
