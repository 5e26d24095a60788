//! # Harvester Dispatcher
//!
//! 触发器调度层：决定采集任务*何时*运行。
//!
//! - [`at_schedule`] / [`period`] 解析 `AT` 时间表达式和 ISO-8601 时间段
//! - [`pool::SchedulerPool`] 所有定时器共享的运行时句柄和并发许可
//! - [`triggers`] 内置触发器 `NOW`、`AT`、`PERIOD`
//! - [`trigger_service::TriggersService`] 触发器的保存、恢复和停用

pub mod at_schedule;
pub mod period;
pub mod pool;
pub mod trigger_service;
pub mod triggers;

pub use at_schedule::AtSchedule;
pub use period::IsoPeriod;
pub use pool::SchedulerPool;
pub use trigger_service::{ActiveTrigger, ExecutorTriggerContext, TriggersService};
pub use triggers::register_triggers;
