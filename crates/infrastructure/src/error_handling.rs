//! 存储操作的错误处理
//!
//! 数据库错误统一转换为 [`HarvesterError::Persistence`]，并带上操作类型和实体描述。

use std::fmt;

use harvester_core::HarvesterError;
use sqlx::Error as SqlxError;
use tracing::error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepositoryOperation {
    Create,
    Read,
    Update,
    Delete,
    Query,
    Migrate,
}

impl fmt::Display for RepositoryOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepositoryOperation::Create => write!(f, "创建"),
            RepositoryOperation::Read => write!(f, "读取"),
            RepositoryOperation::Update => write!(f, "更新"),
            RepositoryOperation::Delete => write!(f, "删除"),
            RepositoryOperation::Query => write!(f, "查询"),
            RepositoryOperation::Migrate => write!(f, "初始化表结构"),
        }
    }
}

pub struct RepositoryErrorHelpers;

impl RepositoryErrorHelpers {
    pub fn database_error(
        operation: RepositoryOperation,
        entity: &str,
        err: SqlxError,
    ) -> HarvesterError {
        let message = match &err {
            SqlxError::RowNotFound => format!("{operation}{entity}失败: 记录不存在"),
            SqlxError::PoolTimedOut => format!("{operation}{entity}失败: 获取数据库连接超时"),
            other => format!("{operation}{entity}失败: {other}"),
        };
        error!(
            event = "repository_error",
            operation = %operation,
            entity = entity,
            "{message}"
        );
        HarvesterError::Persistence(message)
    }

    /// 存储中的数据无法解析
    pub fn corrupted(entity: &str, id: &str, reason: impl fmt::Display) -> HarvesterError {
        error!(
            event = "repository_corrupted_row",
            entity = entity,
            id = id,
            "{entity} {id} 的存储数据无效: {reason}"
        );
        HarvesterError::Persistence(format!("{entity} {id} 的存储数据无效: {reason}"))
    }
}

/// 为 `map_err` 构造转换函数
pub(crate) fn db_error(
    operation: RepositoryOperation,
    entity: &'static str,
) -> impl Fn(SqlxError) -> HarvesterError {
    move |err| RepositoryErrorHelpers::database_error(operation, entity, err)
}
