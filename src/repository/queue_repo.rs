// ==========================================
// 工序就绪评估系统 - 工作中心队列仓储
// ==========================================
// 表: work_center_queue（派生数据，可随时清空重建）
// 不变式: 同一工作中心 queue_position 从 0 连续；一道工序最多出现在一个队列中
// ==========================================

use crate::domain::readiness::QueueEntry;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::row_mapping::{format_ts, parse_ts};
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult, TransactionBehavior};
use std::sync::{Arc, Mutex};

/// 工作中心队列仓储
pub struct QueueRepository {
    conn: Arc<Mutex<Connection>>,
}

impl QueueRepository {
    /// 从已有连接创建仓储实例
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 原子替换工作中心的全部队列条目
    ///
    /// 同一事务内: 删除本工作中心旧条目 → 删除这些工序在其他队列中的残留 → 插入新条目。
    /// 读者不会观察到重建到一半的队列。
    ///
    /// # 返回
    /// - Ok(usize): 写入条目数
    pub fn replace_for_work_center(
        &self,
        work_center_id: &str,
        entries: &[QueueEntry],
    ) -> RepositoryResult<usize> {
        if let Some(foreign) = entries.iter().find(|e| e.work_center_id != work_center_id) {
            return Err(RepositoryError::QueueEntryMismatch {
                expected: work_center_id.to_string(),
                actual: foreign.work_center_id.clone(),
            });
        }

        let mut conn = self.get_conn()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        tx.execute(
            "DELETE FROM work_center_queue WHERE work_center_id = ?1",
            params![work_center_id],
        )?;

        {
            // 工序改派到本工作中心时，从原队列移除并收紧原队列的位置
            let mut stale = tx.prepare(
                "SELECT work_center_id, queue_position FROM work_center_queue WHERE operation_id = ?1",
            )?;
            let mut purge = tx.prepare("DELETE FROM work_center_queue WHERE operation_id = ?1")?;
            let mut compact = tx.prepare(
                "UPDATE work_center_queue SET queue_position = queue_position - 1 \
                 WHERE work_center_id = ?1 AND queue_position > ?2",
            )?;
            let mut insert = tx.prepare(
                r#"
                INSERT INTO work_center_queue (
                    work_center_id, operation_id, queue_position, priority,
                    estimated_wait_time, snapshot_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
            )?;

            for entry in entries {
                let previous: Option<(String, i32)> = stale
                    .query_row(params![entry.operation_id], |row| Ok((row.get(0)?, row.get(1)?)))
                    .optional()?;
                if let Some((old_work_center_id, old_position)) = previous {
                    purge.execute(params![entry.operation_id])?;
                    compact.execute(params![old_work_center_id, old_position])?;
                    tracing::info!(
                        "工序 {} 已从工作中心 {} 的队列移出（改派至 {}）",
                        entry.operation_id,
                        old_work_center_id,
                        work_center_id
                    );
                }
                insert.execute(params![
                    entry.work_center_id,
                    entry.operation_id,
                    entry.queue_position,
                    entry.priority,
                    entry.estimated_wait_time,
                    format_ts(&entry.snapshot_at),
                ])?;
            }
        }

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        Ok(entries.len())
    }

    /// 查询工作中心队列（按队列位置升序）
    pub fn list_by_work_center(&self, work_center_id: &str) -> RepositoryResult<Vec<QueueEntry>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT work_center_id, operation_id, queue_position, priority,
                   estimated_wait_time, snapshot_at
            FROM work_center_queue
            WHERE work_center_id = ?1
            ORDER BY queue_position ASC
            "#,
        )?;

        let rows = stmt
            .query_map(params![work_center_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i32>(2)?,
                    row.get::<_, i32>(3)?,
                    row.get::<_, i64>(4)?,
                    row.get::<_, String>(5)?,
                ))
            })?
            .collect::<SqliteResult<Vec<_>>>()?;

        let mut entries = Vec::with_capacity(rows.len());
        for (work_center_id, operation_id, queue_position, priority, wait, snapshot_raw) in rows {
            entries.push(QueueEntry {
                work_center_id,
                operation_id,
                queue_position,
                priority,
                estimated_wait_time: wait,
                snapshot_at: parse_ts(5, &snapshot_raw)?,
            });
        }
        Ok(entries)
    }
}
