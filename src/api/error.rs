// ==========================================
// 工序就绪评估系统 - API层错误类型
// ==========================================
// 职责: 定义API层错误类型，把仓储/引擎错误转换为稳定的错误分类
// ==========================================

use crate::domain::types::OperationStatus;
use crate::engine::error::ReadinessError;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 业务错误
    // ==========================================
    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("工序处于终态: operation_id={operation_id}, status={status}")]
    InvalidState {
        operation_id: String,
        status: OperationStatus,
    },

    #[error("未授权: {0}")]
    Unauthorized(String),

    /// 就绪传播部分失败（调用方的状态变更已生效）
    #[error("就绪传播失败: operation_id={operation_id}")]
    PropagationError {
        operation_id: String,
        failures: Vec<String>,
    },

    // ==========================================
    // 数据访问错误
    // ==========================================
    #[error("数据库错误: {0}")]
    DatabaseError(String),

    #[error("数据库连接失败: {0}")]
    DatabaseConnectionError(String),

    /// 数据库繁忙，稍后重试可恢复
    #[error("数据库繁忙: {0}")]
    DatabaseBusy(String),

    #[error("数据库事务失败: {0}")]
    DatabaseTransactionError(String),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error("内部错误: {0}")]
    InternalError(String),
}

impl ApiError {
    /// 是否为内部/存储错误（界面上不展示原始信息）
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            ApiError::DatabaseError(_)
                | ApiError::DatabaseConnectionError(_)
                | ApiError::DatabaseBusy(_)
                | ApiError::DatabaseTransactionError(_)
                | ApiError::InternalError(_)
        )
    }
}

// ==========================================
// 从 RepositoryError 转换
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            RepositoryError::LockError(msg) => {
                ApiError::DatabaseConnectionError(format!("数据库锁获取失败: {}", msg))
            }
            RepositoryError::Busy(msg) => ApiError::DatabaseBusy(msg),
            RepositoryError::DatabaseTransactionError(msg) => {
                ApiError::DatabaseTransactionError(msg)
            }
            RepositoryError::ConstraintViolation(msg) => {
                ApiError::DatabaseError(format!("约束违反: {}", msg))
            }
            RepositoryError::DatabaseQueryError(msg) => ApiError::DatabaseError(msg),
            RepositoryError::FieldValueError { field, message } => {
                ApiError::InternalError(format!("字段{}数据异常: {}", field, message))
            }
            err @ RepositoryError::QueueEntryMismatch { .. } => {
                ApiError::InternalError(err.to_string())
            }
        }
    }
}

// ==========================================
// 从 ReadinessError 转换
// ==========================================
impl From<ReadinessError> for ApiError {
    fn from(err: ReadinessError) -> Self {
        match err {
            ReadinessError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            ReadinessError::InvalidState {
                operation_id,
                status,
            } => ApiError::InvalidState {
                operation_id,
                status,
            },
            ReadinessError::Propagation {
                operation_id,
                failures,
            } => ApiError::PropagationError {
                operation_id,
                failures,
            },
            ReadinessError::Repository(e) => e.into(),
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;
