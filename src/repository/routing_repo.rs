// ==========================================
// 工序就绪评估系统 - 工艺路线依赖图访问
// ==========================================
// 红线: Repository 不含业务逻辑，且对工序/依赖表只读
// ==========================================
// 依赖图规则:
// - 工序存在显式依赖边(operation_dependency)时，以显式边为准
// - 否则隐式前道 = 同一路线中 sequence_number 次小的工序
// ==========================================

use crate::domain::operation::{Operation, PredecessorLink, WorkCenter};
use crate::domain::types::DependencyType;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::signal_repo::{read_signals, SignalReadings};
use crate::repository::row_mapping::{
    format_ts, map_operation, map_work_center, OPERATION_COLUMNS, WORK_CENTER_COLUMNS,
};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult};
use std::sync::{Arc, Mutex};

// ==========================================
// OperationContext - 单次评估所需的一致性输入
// ==========================================
/// 在同一个读事务内加载，评估过程中不再回查数据库
#[derive(Debug, Clone)]
pub struct OperationContext {
    pub operation: Operation,
    pub predecessors: Vec<PredecessorLink>,
    pub work_center: WorkCenter,
    /// 同一工作中心内其他处于 SETUP/RUNNING 的工序
    pub active_at_work_center: Vec<Operation>,
    /// 同库信号表的读数（仅 load_operation_context_with_signals 填充）
    pub signals: Option<SignalReadings>,
}

// ==========================================
// RoutingRepository - 工艺路线/工序只读仓储
// ==========================================
pub struct RoutingRepository {
    conn: Arc<Mutex<Connection>>,
}

impl RoutingRepository {
    /// 从已有连接创建仓储实例
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 按ID查询工序
    pub fn find_operation(&self, operation_id: &str) -> RepositoryResult<Option<Operation>> {
        let conn = self.get_conn()?;
        Ok(query_operation(&conn, operation_id)?)
    }

    /// 查询工单下全部工序（按路线、顺序号排序）
    pub fn find_by_work_order(&self, work_order_id: &str) -> RepositoryResult<Vec<Operation>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM work_order_operation WHERE work_order_id = ?1 \
             ORDER BY work_order_routing_id, sequence_number",
            OPERATION_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let ops = stmt
            .query_map(params![work_order_id], map_operation)?
            .collect::<SqliteResult<Vec<Operation>>>()?;
        Ok(ops)
    }

    /// 工单是否存在（至少有一道工序）
    pub fn work_order_exists(&self, work_order_id: &str) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let found = conn
            .query_row(
                "SELECT 1 FROM work_order_operation WHERE work_order_id = ?1 LIMIT 1",
                params![work_order_id],
                |_row| Ok(true),
            )
            .optional()?
            .unwrap_or(false);
        Ok(found)
    }

    /// 查询工作中心上的全部非终态工序（按到达顺序）
    pub fn find_open_by_work_center(
        &self,
        work_center_id: &str,
    ) -> RepositoryResult<Vec<Operation>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM work_order_operation \
             WHERE work_center_id = ?1 AND status NOT IN ('COMPLETED', 'CANCELLED') \
             ORDER BY created_at, operation_id",
            OPERATION_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let ops = stmt
            .query_map(params![work_center_id], map_operation)?
            .collect::<SqliteResult<Vec<Operation>>>()?;
        Ok(ops)
    }

    /// 统计工作中心自某时刻以来完工的工序数
    pub fn count_completed_since(
        &self,
        work_center_id: &str,
        since: DateTime<Utc>,
    ) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM work_order_operation \
             WHERE work_center_id = ?1 AND status = 'COMPLETED' AND completed_at >= ?2",
            params![work_center_id, format_ts(&since)],
            |row| row.get(0),
        )?;
        Ok(count.max(0) as usize)
    }

    /// 查询前道工序
    pub fn find_predecessors(&self, operation: &Operation) -> RepositoryResult<Vec<PredecessorLink>> {
        let conn = self.get_conn()?;
        Ok(query_predecessors(&conn, operation)?)
    }

    /// 查询直接后继工序
    ///
    /// - 显式依赖边指向本工序的工序
    /// - 同一路线中顺序号次大的工序（仅当它没有显式依赖边时）
    pub fn find_successors(&self, operation: &Operation) -> RepositoryResult<Vec<Operation>> {
        let conn = self.get_conn()?;

        let mut successors = Vec::new();

        let explicit_ids: Vec<String> = {
            let mut stmt = conn.prepare(
                "SELECT operation_id FROM operation_dependency \
                 WHERE depends_on_operation_id = ?1 ORDER BY operation_id",
            )?;
            let ids = stmt
                .query_map(params![operation.id], |row| row.get::<_, String>(0))?
                .collect::<SqliteResult<Vec<String>>>()?;
            ids
        };
        for id in explicit_ids {
            if let Some(op) = query_operation(&conn, &id)? {
                successors.push(op);
            }
        }

        let sql = format!(
            "SELECT {} FROM work_order_operation \
             WHERE work_order_routing_id = ?1 AND sequence_number > ?2 \
             ORDER BY sequence_number ASC LIMIT 1",
            OPERATION_COLUMNS
        );
        let next = conn
            .query_row(
                &sql,
                params![operation.work_order_routing_id, operation.sequence_number],
                map_operation,
            )
            .optional()?;
        if let Some(next) = next {
            if !has_explicit_edges(&conn, &next.id)?
                && !successors.iter().any(|s: &Operation| s.id == next.id)
            {
                successors.push(next);
            }
        }

        Ok(successors)
    }

    /// 在同一个读事务内加载单道工序的评估输入
    ///
    /// # 返回
    /// - Ok(None): 工序不存在
    /// - Err(NotFound): 工序引用的工作中心不存在
    pub fn load_operation_context(
        &self,
        operation_id: &str,
    ) -> RepositoryResult<Option<OperationContext>> {
        self.load_context(operation_id, false)
    }

    /// 同 load_operation_context，并在同一读事务内读取 SQLite 信号表
    pub fn load_operation_context_with_signals(
        &self,
        operation_id: &str,
    ) -> RepositoryResult<Option<OperationContext>> {
        self.load_context(operation_id, true)
    }

    fn load_context(
        &self,
        operation_id: &str,
        with_signals: bool,
    ) -> RepositoryResult<Option<OperationContext>> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let operation = match query_operation(&tx, operation_id)? {
            Some(op) => op,
            None => return Ok(None),
        };

        let work_center = query_work_center(&tx, &operation.work_center_id)?.ok_or_else(|| {
            RepositoryError::NotFound {
                entity: "WorkCenter".to_string(),
                id: operation.work_center_id.clone(),
            }
        })?;

        let predecessors = query_predecessors(&tx, &operation)?;

        let active_at_work_center = {
            let sql = format!(
                "SELECT {} FROM work_order_operation \
                 WHERE work_center_id = ?1 AND status IN ('SETUP', 'RUNNING') AND operation_id <> ?2 \
                 ORDER BY started_at, operation_id",
                OPERATION_COLUMNS
            );
            let mut stmt = tx.prepare(&sql)?;
            let ops = stmt
                .query_map(params![operation.work_center_id, operation.id], map_operation)?
                .collect::<SqliteResult<Vec<Operation>>>()?;
            ops
        };

        let signals = with_signals.then(|| read_signals(&tx, &operation));

        tx.commit()?;

        Ok(Some(OperationContext {
            operation,
            predecessors,
            work_center,
            active_at_work_center,
            signals,
        }))
    }
}

// ==========================================
// 连接级查询（可在事务内复用）
// ==========================================

fn query_operation(conn: &Connection, operation_id: &str) -> SqliteResult<Option<Operation>> {
    let sql = format!(
        "SELECT {} FROM work_order_operation WHERE operation_id = ?1",
        OPERATION_COLUMNS
    );
    conn.query_row(&sql, params![operation_id], map_operation)
        .optional()
}

fn query_work_center(conn: &Connection, work_center_id: &str) -> SqliteResult<Option<WorkCenter>> {
    let sql = format!(
        "SELECT {} FROM work_center WHERE work_center_id = ?1",
        WORK_CENTER_COLUMNS
    );
    conn.query_row(&sql, params![work_center_id], map_work_center)
        .optional()
}

fn has_explicit_edges(conn: &Connection, operation_id: &str) -> SqliteResult<bool> {
    Ok(conn
        .query_row(
            "SELECT 1 FROM operation_dependency WHERE operation_id = ?1 LIMIT 1",
            params![operation_id],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false))
}

fn query_predecessors(
    conn: &Connection,
    operation: &Operation,
) -> RepositoryResult<Vec<PredecessorLink>> {
    let edges: Vec<(String, String, i64)> = {
        let mut stmt = conn.prepare(
            "SELECT depends_on_operation_id, dependency_type, lag_minutes \
             FROM operation_dependency WHERE operation_id = ?1 \
             ORDER BY depends_on_operation_id",
        )?;
        let rows = stmt
            .query_map(params![operation.id], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?))
            })?
            .collect::<SqliteResult<Vec<_>>>()?;
        rows
    };

    if edges.is_empty() {
        let sql = format!(
            "SELECT {} FROM work_order_operation \
             WHERE work_order_routing_id = ?1 AND sequence_number < ?2 \
             ORDER BY sequence_number DESC LIMIT 1",
            OPERATION_COLUMNS
        );
        let prev = conn
            .query_row(
                &sql,
                params![operation.work_order_routing_id, operation.sequence_number],
                map_operation,
            )
            .optional()?;
        return Ok(prev.into_iter().map(PredecessorLink::sequential).collect());
    }

    let mut links = Vec::with_capacity(edges.len());
    for (depends_on_id, dependency_type_raw, lag_minutes) in edges {
        let dependency_type = DependencyType::parse(&dependency_type_raw).ok_or_else(|| {
            RepositoryError::FieldValueError {
                field: "dependency_type".to_string(),
                message: format!("未知依赖类型: {}", dependency_type_raw),
            }
        })?;
        let predecessor = query_operation(conn, &depends_on_id)?.ok_or_else(|| {
            RepositoryError::NotFound {
                entity: "Operation".to_string(),
                id: depends_on_id.clone(),
            }
        })?;
        links.push(PredecessorLink {
            operation: predecessor,
            dependency_type,
            lag_minutes,
        });
    }
    Ok(links)
}
