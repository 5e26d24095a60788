//! 元数据采集调度引擎的应用层
//!
//! 把存储、插件注册表、采集执行和触发器调度组装成一个可运行的应用。

pub mod app;
pub mod shutdown;

pub use app::{load_task, Application, PluginTemplates};
pub use shutdown::ShutdownManager;
