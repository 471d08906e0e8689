// ==========================================
// 工序就绪评估系统 - SQLite 信号源
// ==========================================
// 读取生产模块写入的信号表:
// - operation_material_signal: 物料齐套
// - operation_tooling_signal: 工装可用
// - quality_hold: 质量冻结（工单级 operation_id 为空，或工序级）
// 约定: 信号表中无记录视为"未声明约束" → 可用 / 无冻结
// ==========================================

use crate::domain::operation::Operation;
use crate::domain::signals::{MaterialSignal, QualityHoldSignal, SignalError, ToolingSignal};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex, MutexGuard};

const MATERIAL_TABLE: &str = "operation_material_signal";
const TOOLING_TABLE: &str = "operation_tooling_signal";

/// SQLite 信号源（物料/工装/质量冻结）
pub struct SqliteSignalRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteSignalRepository {
    /// 从已有连接创建信号源
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> Result<MutexGuard<'_, Connection>, SignalError> {
        self.conn.lock().map_err(|e| SignalError::Unreachable {
            source_name: "sqlite".to_string(),
            message: format!("锁获取失败: {}", e),
        })
    }

    fn read_flag(&self, table: &str, operation_id: &str) -> Result<Option<bool>, SignalError> {
        let conn = self.get_conn()?;
        query_flag(&conn, table, operation_id)
    }
}

impl MaterialSignal for SqliteSignalRepository {
    fn is_material_available(&self, operation: &Operation) -> Result<bool, SignalError> {
        Ok(self
            .read_flag(MATERIAL_TABLE, &operation.id)?
            .unwrap_or(true))
    }
}

impl ToolingSignal for SqliteSignalRepository {
    fn is_tooling_available(&self, operation: &Operation) -> Result<bool, SignalError> {
        Ok(self
            .read_flag(TOOLING_TABLE, &operation.id)?
            .unwrap_or(true))
    }
}

impl QualityHoldSignal for SqliteSignalRepository {
    fn has_open_hold(&self, operation: &Operation) -> Result<bool, SignalError> {
        let conn = self.get_conn()?;
        query_open_hold(&conn, operation)
    }
}

// ==========================================
// 连接级读取（可在快照读事务内复用）
// ==========================================

/// 一次快照内读到的三类信号原始结果
#[derive(Debug, Clone, PartialEq)]
pub struct SignalReadings {
    pub material: Result<bool, SignalError>,
    pub tooling: Result<bool, SignalError>,
    pub quality_hold: Result<bool, SignalError>,
}

/// 在调用方的连接（或事务）上读取全部信号
pub fn read_signals(conn: &Connection, operation: &Operation) -> SignalReadings {
    SignalReadings {
        material: query_flag(conn, MATERIAL_TABLE, &operation.id).map(|f| f.unwrap_or(true)),
        tooling: query_flag(conn, TOOLING_TABLE, &operation.id).map(|f| f.unwrap_or(true)),
        quality_hold: query_open_hold(conn, operation),
    }
}

fn query_flag(conn: &Connection, table: &str, operation_id: &str) -> Result<Option<bool>, SignalError> {
    let sql = format!("SELECT is_available FROM {} WHERE operation_id = ?1", table);
    conn.query_row(&sql, params![operation_id], |row| row.get::<_, i64>(0))
        .optional()
        .map(|flag| flag.map(|v| v != 0))
        .map_err(|e| SignalError::Unreachable {
            source_name: table.to_string(),
            message: e.to_string(),
        })
}

fn query_open_hold(conn: &Connection, operation: &Operation) -> Result<bool, SignalError> {
    let open: i64 = conn
        .query_row(
            r#"
            SELECT COUNT(*) FROM quality_hold
            WHERE is_open = 1
              AND work_order_id = ?1
              AND (operation_id IS NULL OR operation_id = ?2)
            "#,
            params![operation.work_order_id, operation.id],
            |row| row.get(0),
        )
        .map_err(|e| SignalError::Unreachable {
            source_name: "quality_hold".to_string(),
            message: e.to_string(),
        })?;
    Ok(open > 0)
}
