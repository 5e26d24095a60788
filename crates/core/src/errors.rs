use thiserror::Error;

/// 采集引擎错误类型定义
///
/// 每个错误都能回答"是否可忽略"：可忽略的错误（例如目标端对单条记录的软校验拒绝）
/// 不会阻止清理，其余错误一旦出现在一次运行中就会抑制清理。
#[derive(Debug, Error)]
pub enum HarvesterError {
    #[error("无效的定义: {0}")]
    InvalidDefinition(String),

    #[error("处理器错误: {0}")]
    Processor(String),

    #[error("数据输入错误: {0}")]
    Input(String),

    #[error("数据输出错误 [{broker}]: {message}")]
    Output {
        broker: String,
        data_id: Option<String>,
        message: String,
        negligible: bool,
    },

    #[error("数据转换错误: {0}")]
    Transform(String),

    #[error("持久化错误: {0}")]
    Persistence(String),

    #[error("{kind}未找到: {key}")]
    NotFound { kind: &'static str, key: String },

    #[error("采集已取消")]
    Cancelled,

    #[error("配置错误: {0}")]
    Configuration(String),

    #[error("IO错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("内部错误: {0}")]
    Internal(String),
}

impl HarvesterError {
    pub fn invalid_definition(message: impl Into<String>) -> Self {
        Self::InvalidDefinition(message.into())
    }

    pub fn not_found(kind: &'static str, key: impl ToString) -> Self {
        Self::NotFound {
            kind,
            key: key.to_string(),
        }
    }

    /// 目标端发布失败
    pub fn output(
        broker: impl Into<String>,
        data_id: Option<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Output {
            broker: broker.into(),
            data_id,
            message: message.into(),
            negligible: false,
        }
    }

    /// 目标端拒绝了单条记录（软校验失败），不影响清理
    pub fn rejected(
        broker: impl Into<String>,
        data_id: Option<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Output {
            broker: broker.into(),
            data_id,
            message: message.into(),
            negligible: true,
        }
    }

    pub fn is_negligible(&self) -> bool {
        matches!(
            self,
            Self::Output {
                negligible: true,
                ..
            }
        )
    }

    /// 发布失败时记录的数据ID，用于事后人工核对
    pub fn failed_data_id(&self) -> Option<&str> {
        match self {
            Self::Output { data_id, .. } => data_id.as_deref(),
            _ => None,
        }
    }

    pub fn is_output_side(&self) -> bool {
        matches!(self, Self::Output { .. })
    }

    pub fn is_input_side(&self) -> bool {
        matches!(self, Self::Input(_))
    }

    /// 单条记录级别的错误，计入报告的失败数
    pub fn is_record_level(&self) -> bool {
        matches!(
            self,
            Self::Input(_) | Self::Transform(_) | Self::Output { .. }
        )
    }
}

/// 统一的Result类型
pub type HarvesterResult<T> = std::result::Result<T, HarvesterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negligible_only_for_rejected_output() {
        assert!(HarvesterError::rejected("GPT", Some("a".into()), "bad xml").is_negligible());
        assert!(!HarvesterError::output("GPT", Some("a".into()), "timeout").is_negligible());
        assert!(!HarvesterError::Input("eof".into()).is_negligible());
        assert!(!HarvesterError::Cancelled.is_negligible());
    }

    #[test]
    fn test_failed_data_id() {
        let err = HarvesterError::output("FOLDER", Some("rec-1".into()), "disk full");
        assert_eq!(err.failed_data_id(), Some("rec-1"));
        assert!(err.is_output_side());
        assert!(!err.is_input_side());
        assert!(HarvesterError::Input("eof".into()).is_input_side());
        assert_eq!(HarvesterError::Processor("x".into()).failed_data_id(), None);
    }

    #[test]
    fn test_not_found_message() {
        let err = HarvesterError::not_found("任务", "42");
        assert_eq!(err.to_string(), "任务未找到: 42");
    }
}
