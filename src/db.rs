// ==========================================
// 工序就绪评估系统 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为
// - 统一 busy_timeout，减少并发写入时的偶发 busy 错误
// - 建表（幂等），供服务启动与测试共用
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要“每个连接”单独开启
/// - busy_timeout 需要“每个连接”单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 建表（幂等）
///
/// 说明：
/// - work_center / work_order_operation / operation_dependency 及信号表归生产模块所有，
///   这里建表仅保证独立部署与测试可用，本子系统不写入这些表
/// - operation_readiness / work_center_queue 为本子系统独占的派生数据
pub fn ensure_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS config_kv (
            scope_id TEXT NOT NULL,
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (scope_id, key)
        );

        CREATE TABLE IF NOT EXISTS work_center (
            work_center_id TEXT PRIMARY KEY,
            name TEXT NOT NULL DEFAULT '',
            capacity INTEGER NOT NULL DEFAULT 1,
            is_active INTEGER NOT NULL DEFAULT 1,
            setup_time_minutes INTEGER NOT NULL DEFAULT 0,
            requires_operator INTEGER NOT NULL DEFAULT 1
        );

        CREATE TABLE IF NOT EXISTS work_order_operation (
            operation_id TEXT PRIMARY KEY,
            work_order_routing_id TEXT NOT NULL,
            work_order_id TEXT NOT NULL,
            work_center_id TEXT NOT NULL REFERENCES work_center(work_center_id),
            operation_definition_id TEXT NOT NULL,
            sequence_number INTEGER NOT NULL,
            status TEXT NOT NULL DEFAULT 'PENDING',
            assigned_user_id TEXT,
            priority INTEGER NOT NULL DEFAULT 0,
            started_at TEXT,
            completed_at TEXT,
            estimated_duration_minutes INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            UNIQUE (work_order_routing_id, sequence_number)
        );

        CREATE INDEX IF NOT EXISTS idx_operation_work_center
          ON work_order_operation(work_center_id, status);

        CREATE INDEX IF NOT EXISTS idx_operation_work_order
          ON work_order_operation(work_order_id);

        CREATE TABLE IF NOT EXISTS operation_dependency (
            operation_id TEXT NOT NULL REFERENCES work_order_operation(operation_id),
            depends_on_operation_id TEXT NOT NULL REFERENCES work_order_operation(operation_id),
            dependency_type TEXT NOT NULL DEFAULT 'FINISH_TO_START',
            lag_minutes INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (operation_id, depends_on_operation_id)
        );

        CREATE INDEX IF NOT EXISTS idx_dependency_depends_on
          ON operation_dependency(depends_on_operation_id);

        CREATE TABLE IF NOT EXISTS operation_material_signal (
            operation_id TEXT PRIMARY KEY,
            is_available INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS operation_tooling_signal (
            operation_id TEXT PRIMARY KEY,
            is_available INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS quality_hold (
            hold_id TEXT PRIMARY KEY,
            work_order_id TEXT NOT NULL,
            operation_id TEXT,
            is_open INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS operation_readiness (
            operation_id TEXT PRIMARY KEY,
            is_ready INTEGER NOT NULL,
            blocked_reasons TEXT NOT NULL DEFAULT '[]',
            estimated_wait_time INTEGER,
            computed_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS work_center_queue (
            operation_id TEXT PRIMARY KEY,
            work_center_id TEXT NOT NULL,
            queue_position INTEGER NOT NULL,
            priority INTEGER NOT NULL DEFAULT 0,
            estimated_wait_time INTEGER NOT NULL DEFAULT 0,
            snapshot_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_queue_work_center
          ON work_center_queue(work_center_id, queue_position);
        "#,
    )?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [CURRENT_SCHEMA_VERSION],
    )?;
    Ok(())
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> = conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        configure_sqlite_connection(&conn).unwrap();
        assert_eq!(read_schema_version(&conn).unwrap(), None);

        ensure_schema(&conn).unwrap();
        ensure_schema(&conn).unwrap();

        assert_eq!(
            read_schema_version(&conn).unwrap(),
            Some(CURRENT_SCHEMA_VERSION)
        );
    }
}
