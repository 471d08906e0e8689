// ==========================================
// 工序就绪评估系统 - 引擎层错误类型
// ==========================================

use crate::domain::types::OperationStatus;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// 就绪引擎错误
#[derive(Error, Debug)]
pub enum ReadinessError {
    /// 工序/工作中心/工单不存在
    #[error("{entity}不存在: id={id}")]
    NotFound { entity: String, id: String },

    /// 对终态工序请求评估（调用方应事先过滤）
    #[error("工序已处于终态，不参与就绪评估: operation_id={operation_id}, status={status}")]
    InvalidState {
        operation_id: String,
        status: OperationStatus,
    },

    /// 传播过程中某个评估或持久化步骤失败
    #[error("就绪传播失败: operation_id={operation_id}, 失败项: {}", .failures.join("; "))]
    Propagation {
        operation_id: String,
        failures: Vec<String>,
    },

    #[error(transparent)]
    Repository(RepositoryError),
}

impl ReadinessError {
    pub fn not_found(entity: &str, id: &str) -> Self {
        ReadinessError::NotFound {
            entity: entity.to_string(),
            id: id.to_string(),
        }
    }
}

// 仓储层 NotFound 提升为引擎层 NotFound，其余原样包裹
impl From<RepositoryError> for ReadinessError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity, id } => ReadinessError::NotFound { entity, id },
            other => ReadinessError::Repository(other),
        }
    }
}

/// Result 类型别名
pub type ReadinessResult<T> = Result<T, ReadinessError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_not_found_is_lifted() {
        let err: ReadinessError = RepositoryError::NotFound {
            entity: "WorkCenter".to_string(),
            id: "WC9".to_string(),
        }
        .into();
        match err {
            ReadinessError::NotFound { entity, id } => {
                assert_eq!(entity, "WorkCenter");
                assert_eq!(id, "WC9");
            }
            other => panic!("Expected NotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_propagation_message_lists_failures() {
        let err = ReadinessError::Propagation {
            operation_id: "OP1".to_string(),
            failures: vec!["WC1: locked".to_string(), "OP2: timeout".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("OP1"));
        assert!(msg.contains("WC1: locked; OP2: timeout"));
    }
}
