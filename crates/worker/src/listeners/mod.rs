//! 内置的采集进程监听器

mod history_adaptor;
mod progress_logger;
mod report_builder;

pub use history_adaptor::HistoryAdaptor;
pub use progress_logger::ProgressLogger;
pub use report_builder::ReportBuilder;
