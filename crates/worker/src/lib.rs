//! 采集执行层
//!
//! 负责把任务定义变成一次可观察的采集运行：
//!
//! - [`collector`]: 数据源 → 过滤器 → 转换器 → 目标 的流水线，以及清理
//! - [`process`]: 采集进程状态机和监听器
//! - [`listeners`]: 报告汇总、历史写入和进度日志
//! - [`execution`]: 解析任务定义并创建进程，实现 `HarvestExecutor`
//! - [`services`]: 任务和代理定义的管理
//! - [`plugins`]: 内置的数据源、目标、过滤器和转换器

pub mod collector;
pub mod execution;
pub mod listeners;
pub mod plugins;
pub mod process;
pub mod processes;
pub mod services;

pub use collector::DataCollector;
pub use execution::ExecutionService;
pub use listeners::{HistoryAdaptor, ProgressLogger, ReportBuilder};
pub use plugins::register_builtin;
pub use process::{ProcessEvents, ProcessInstance, ProcessListener};
pub use processes::ProcessesService;
pub use services::{BrokersService, TasksService};
