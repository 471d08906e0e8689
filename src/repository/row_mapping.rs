// ==========================================
// 工序就绪评估系统 - 行映射公共函数
// ==========================================
// 职责: 各仓储共用的列解析（时间戳、枚举、SELECT 列清单）
// ==========================================

use crate::domain::operation::{Operation, WorkCenter};
use crate::domain::types::OperationStatus;
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::Row;

/// work_order_operation 的标准列清单（与 map_operation 的下标一一对应）
pub(crate) const OPERATION_COLUMNS: &str = r#"
    operation_id, work_order_routing_id, work_order_id, work_center_id,
    operation_definition_id, sequence_number, status, assigned_user_id,
    priority, started_at, completed_at, estimated_duration_minutes, created_at
"#;

/// work_center 的标准列清单
pub(crate) const WORK_CENTER_COLUMNS: &str = r#"
    work_center_id, name, capacity, is_active, setup_time_minutes, requires_operator
"#;

/// 时间戳统一以 RFC3339 文本存储
pub(crate) fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339()
}

fn conversion_err(idx: usize, msg: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        Type::Text,
        Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, msg)),
    )
}

/// 解析 RFC3339 时间戳列
pub(crate) fn parse_ts(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_err(idx, format!("时间戳格式错误: {} ({})", raw, e)))
}

fn parse_opt_ts(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    match row.get::<_, Option<String>>(idx)? {
        Some(raw) => Ok(Some(parse_ts(idx, &raw)?)),
        None => Ok(None),
    }
}

/// 映射 work_order_operation 行（列顺序见 OPERATION_COLUMNS）
pub(crate) fn map_operation(row: &Row<'_>) -> rusqlite::Result<Operation> {
    let status_raw: String = row.get(6)?;
    let status = OperationStatus::parse(&status_raw)
        .ok_or_else(|| conversion_err(6, format!("未知工序状态: {}", status_raw)))?;
    let created_raw: String = row.get(12)?;

    Ok(Operation {
        id: row.get(0)?,
        work_order_routing_id: row.get(1)?,
        work_order_id: row.get(2)?,
        work_center_id: row.get(3)?,
        operation_definition_id: row.get(4)?,
        sequence_number: row.get(5)?,
        status,
        assigned_user_id: row.get(7)?,
        priority: row.get(8)?,
        started_at: parse_opt_ts(row, 9)?,
        completed_at: parse_opt_ts(row, 10)?,
        estimated_duration_minutes: row.get(11)?,
        created_at: parse_ts(12, &created_raw)?,
    })
}

/// 映射 work_center 行（列顺序见 WORK_CENTER_COLUMNS）
pub(crate) fn map_work_center(row: &Row<'_>) -> rusqlite::Result<WorkCenter> {
    Ok(WorkCenter {
        id: row.get(0)?,
        name: row.get(1)?,
        capacity: row.get(2)?,
        is_active: row.get::<_, i64>(3)? != 0,
        setup_time_minutes: row.get(4)?,
        requires_operator: row.get::<_, i64>(5)? != 0,
    })
}
