//! 结构化日志
//!
//! 采集过程中的关键事件统一通过 [`StructuredLogger`] 输出，每条日志都带有
//! `event` 字段和任务/进程标识，便于在JSON日志中检索。

pub mod structured_logger;

pub use structured_logger::StructuredLogger;
