// ==========================================
// 工序就绪评估系统 - 工作中心只读仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================

use crate::domain::operation::WorkCenter;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::row_mapping::{map_work_center, WORK_CENTER_COLUMNS};
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult};
use std::sync::{Arc, Mutex};

/// 工作中心仓储
/// 职责: 读取 work_center 表及其当前负载
pub struct WorkCenterRepository {
    conn: Arc<Mutex<Connection>>,
}

impl WorkCenterRepository {
    /// 从已有连接创建仓储实例
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 按ID查询工作中心
    pub fn find_by_id(&self, work_center_id: &str) -> RepositoryResult<Option<WorkCenter>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM work_center WHERE work_center_id = ?1",
            WORK_CENTER_COLUMNS
        );
        let wc = conn
            .query_row(&sql, params![work_center_id], map_work_center)
            .optional()?;
        Ok(wc)
    }

    /// 查询全部工作中心ID（用于全量重建）
    pub fn list_ids(&self) -> RepositoryResult<Vec<String>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare("SELECT work_center_id FROM work_center ORDER BY work_center_id")?;
        let ids = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<SqliteResult<Vec<String>>>()?;
        Ok(ids)
    }

    /// 统计工作中心当前占用产能的工序数（SETUP + RUNNING）
    pub fn count_active(&self, work_center_id: &str) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM work_order_operation \
             WHERE work_center_id = ?1 AND status IN ('SETUP', 'RUNNING')",
            params![work_center_id],
            |row| row.get(0),
        )?;
        Ok(count.max(0) as usize)
    }
}
