// ==========================================
// 工序就绪评估系统 - 仓储层错误类型
// ==========================================
// 按 SQLite 结果码分类，调用方据此决定重试或上报
// ==========================================

use rusqlite::ErrorCode;
use thiserror::Error;

/// 仓储层错误类型
#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("记录未找到: {entity} with id={id}")]
    NotFound { entity: String, id: String },

    /// 共享连接的互斥锁中毒
    #[error("数据库锁获取失败: {0}")]
    LockError(String),

    /// 其他连接持有写锁且超过 busy_timeout
    #[error("数据库繁忙: {0}")]
    Busy(String),

    #[error("数据库事务失败: {0}")]
    DatabaseTransactionError(String),

    #[error("约束违反: {0}")]
    ConstraintViolation(String),

    #[error("数据库查询失败: {0}")]
    DatabaseQueryError(String),

    /// 列值无法解析（时间戳、状态码、原因列表）
    #[error("字段值错误 (field={field}): {message}")]
    FieldValueError { field: String, message: String },

    /// 队列重建收到其他工作中心的条目
    #[error("队列条目工作中心不一致: expected={expected}, actual={actual}")]
    QueueEntryMismatch { expected: String, actual: String },
}

impl RepositoryError {
    /// 可通过重试恢复
    pub fn is_transient(&self) -> bool {
        matches!(self, RepositoryError::Busy(_))
    }
}

impl From<rusqlite::Error> for RepositoryError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(code, msg) => {
                let msg = msg.unwrap_or_else(|| code.to_string());
                match code.code {
                    ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked => RepositoryError::Busy(msg),
                    ErrorCode::ConstraintViolation => RepositoryError::ConstraintViolation(msg),
                    _ => RepositoryError::DatabaseQueryError(msg),
                }
            }
            rusqlite::Error::QueryReturnedNoRows => RepositoryError::NotFound {
                entity: "Row".to_string(),
                id: "-".to_string(),
            },
            rusqlite::Error::FromSqlConversionFailure(column, _, e) => RepositoryError::FieldValueError {
                field: format!("column#{}", column),
                message: e.to_string(),
            },
            other => RepositoryError::DatabaseQueryError(other.to_string()),
        }
    }
}

/// Result 类型别名
pub type RepositoryResult<T> = Result<T, RepositoryError>;

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_no_rows_maps_to_not_found() {
        let err: RepositoryError = rusqlite::Error::QueryReturnedNoRows.into();
        assert!(matches!(err, RepositoryError::NotFound { .. }));
    }

    #[test]
    fn test_sqlite_codes_are_classified() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (id TEXT PRIMARY KEY);").unwrap();
        conn.execute("INSERT INTO t (id) VALUES ('A')", []).unwrap();

        let dup: RepositoryError = conn
            .execute("INSERT INTO t (id) VALUES ('A')", [])
            .unwrap_err()
            .into();
        assert!(matches!(dup, RepositoryError::ConstraintViolation(_)));
        assert!(!dup.is_transient());

        let missing: RepositoryError = conn
            .execute("SELECT * FROM no_such_table", [])
            .unwrap_err()
            .into();
        assert!(matches!(missing, RepositoryError::DatabaseQueryError(_)));

        let busy: RepositoryError = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            None,
        )
        .into();
        assert!(busy.is_transient());
    }
}
