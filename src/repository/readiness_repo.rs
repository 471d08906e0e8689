// ==========================================
// 工序就绪评估系统 - 就绪结果仓储
// ==========================================
// 表: operation_readiness（派生缓存，可随时清空重建）
// 红线: 缓存仅供展示，任何状态变更动作都必须重新评估
// ==========================================

use crate::domain::readiness::Readiness;
use crate::domain::types::BlockedReason;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::row_mapping::{format_ts, parse_ts};
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use std::sync::{Arc, Mutex};

/// 就绪结果仓储
pub struct ReadinessRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ReadinessRepository {
    /// 从已有连接创建仓储实例
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 查询单道工序的缓存结论
    pub fn find(&self, operation_id: &str) -> RepositoryResult<Option<Readiness>> {
        let conn = self.get_conn()?;
        let raw = conn
            .query_row(
                r#"
                SELECT operation_id, is_ready, blocked_reasons, estimated_wait_time, computed_at
                FROM operation_readiness
                WHERE operation_id = ?1
                "#,
                params![operation_id],
                map_raw_readiness,
            )
            .optional()?;

        raw.map(RawReadiness::into_readiness).transpose()
    }

    /// 写入评估结论（按 operation_id upsert，替换旧记录）
    ///
    /// # 返回
    /// - Ok(Some(prev)): 被替换的旧结论
    /// - Ok(None): 首次写入
    pub fn upsert(&self, readiness: &Readiness) -> RepositoryResult<Option<Readiness>> {
        let mut conn = self.get_conn()?;
        // 先读后写：直接取写锁，避免与外部写连接互等时读锁升级失败
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let previous = tx
            .query_row(
                r#"
                SELECT operation_id, is_ready, blocked_reasons, estimated_wait_time, computed_at
                FROM operation_readiness
                WHERE operation_id = ?1
                "#,
                params![readiness.operation_id],
                map_raw_readiness,
            )
            .optional()?;

        let reasons_json = serde_json::to_string(&readiness.blocked_reasons).map_err(|e| {
            RepositoryError::FieldValueError {
                field: "blocked_reasons".to_string(),
                message: e.to_string(),
            }
        })?;

        tx.execute(
            r#"
            INSERT INTO operation_readiness (
                operation_id, is_ready, blocked_reasons, estimated_wait_time, computed_at
            ) VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(operation_id) DO UPDATE SET
                is_ready = excluded.is_ready,
                blocked_reasons = excluded.blocked_reasons,
                estimated_wait_time = excluded.estimated_wait_time,
                computed_at = excluded.computed_at
            "#,
            params![
                readiness.operation_id,
                if readiness.is_ready { 1 } else { 0 },
                reasons_json,
                readiness.estimated_wait_time,
                format_ts(&readiness.computed_at),
            ],
        )?;

        tx.commit()?;

        previous.map(RawReadiness::into_readiness).transpose()
    }

    /// 删除缓存结论（工序进入终态后调用）
    pub fn delete(&self, operation_id: &str) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            "DELETE FROM operation_readiness WHERE operation_id = ?1",
            params![operation_id],
        )?;
        Ok(affected)
    }
}

// ==========================================
// 行映射
// ==========================================

struct RawReadiness {
    operation_id: String,
    is_ready: bool,
    blocked_reasons: String,
    estimated_wait_time: Option<i64>,
    computed_at: String,
}

fn map_raw_readiness(row: &Row<'_>) -> rusqlite::Result<RawReadiness> {
    Ok(RawReadiness {
        operation_id: row.get(0)?,
        is_ready: row.get::<_, i64>(1)? != 0,
        blocked_reasons: row.get(2)?,
        estimated_wait_time: row.get(3)?,
        computed_at: row.get(4)?,
    })
}

impl RawReadiness {
    fn into_readiness(self) -> RepositoryResult<Readiness> {
        let blocked_reasons: Vec<BlockedReason> = serde_json::from_str(&self.blocked_reasons)
            .map_err(|e| RepositoryError::FieldValueError {
                field: "blocked_reasons".to_string(),
                message: format!("{} ({})", self.blocked_reasons, e),
            })?;
        let computed_at = parse_ts(4, &self.computed_at)?;

        Ok(Readiness {
            operation_id: self.operation_id,
            is_ready: self.is_ready,
            blocked_reasons,
            estimated_wait_time: self.estimated_wait_time,
            computed_at,
        })
    }
}
