// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 提供测试所需的数据库初始化、测试数据写入等功能
// 说明: 工序/工作中心/信号表归生产模块所有，这里直接写表模拟生产模块
// ==========================================

#![allow(dead_code)]

use chrono::{DateTime, Duration, Utc};
use mes_readiness::app::AppState;
use mes_readiness::db::{ensure_schema, open_sqlite_connection};
use mes_readiness::domain::types::{DependencyType, OperationStatus};
use mes_readiness::engine::SignalProviders;
use rusqlite::{params, Connection};
use std::error::Error;
use tempfile::NamedTempFile;

/// 创建临时测试数据库并初始化 schema
///
/// # 返回
/// - NamedTempFile: 临时数据库文件（需要保持存活）
/// - String: 数据库文件路径
pub fn create_test_db() -> Result<(NamedTempFile, String), Box<dyn Error>> {
    let temp_file = NamedTempFile::new()?;
    let db_path = temp_file
        .path()
        .to_str()
        .ok_or("临时文件路径不是合法 UTF-8")?
        .to_string();

    let conn = open_sqlite_connection(&db_path)?;
    ensure_schema(&conn)?;

    Ok((temp_file, db_path))
}

/// 打开测试数据库连接
pub fn open_test_connection(db_path: &str) -> Result<Connection, Box<dyn Error>> {
    Ok(open_sqlite_connection(db_path)?)
}

/// 使用 SQLite 信号表组装 AppState
pub fn build_state(db_path: &str) -> AppState {
    AppState::new(db_path.to_string()).expect("Failed to build AppState")
}

/// 注入信号提供者组装 AppState
pub fn build_state_with_signals(db_path: &str, signals: SignalProviders) -> AppState {
    AppState::with_signals(db_path.to_string(), Some(signals)).expect("Failed to build AppState")
}

// ==========================================
// 工作中心
// ==========================================

pub struct WorkCenterSeed {
    pub id: String,
    pub capacity: i32,
    pub is_active: bool,
    pub setup_time_minutes: i64,
    pub requires_operator: bool,
}

impl WorkCenterSeed {
    /// 默认: 产能 1、启用、无调机时间、不要求操作员
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            capacity: 1,
            is_active: true,
            setup_time_minutes: 0,
            requires_operator: false,
        }
    }

    pub fn capacity(mut self, capacity: i32) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }

    pub fn setup_time(mut self, minutes: i64) -> Self {
        self.setup_time_minutes = minutes;
        self
    }

    pub fn requires_operator(mut self) -> Self {
        self.requires_operator = true;
        self
    }
}

pub fn insert_work_center(conn: &Connection, seed: WorkCenterSeed) -> Result<(), Box<dyn Error>> {
    conn.execute(
        r#"
        INSERT INTO work_center (
            work_center_id, name, capacity, is_active, setup_time_minutes, requires_operator
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
        params![
            seed.id,
            format!("工作中心 {}", seed.id),
            seed.capacity,
            seed.is_active as i64,
            seed.setup_time_minutes,
            seed.requires_operator as i64,
        ],
    )?;
    Ok(())
}

// ==========================================
// 工序
// ==========================================

/// 所有工序的到达时间以此为基准偏移，保证排序可预期
pub fn arrival_base() -> DateTime<Utc> {
    Utc::now() - Duration::hours(12)
}

pub struct OperationSeed {
    pub id: String,
    pub work_order_id: String,
    pub routing_id: String,
    pub work_center_id: String,
    pub definition_id: String,
    pub sequence_number: i32,
    pub status: OperationStatus,
    pub assigned_user_id: Option<String>,
    pub priority: i32,
    pub duration_minutes: i64,
    pub arrival_offset_minutes: i64,
    pub started_minutes_ago: Option<i64>,
}

impl OperationSeed {
    /// 默认: PENDING、优先级 0、时长 30 分钟、路线 ID = "R-" + 工单号
    pub fn new(id: &str, work_order_id: &str, work_center_id: &str, sequence_number: i32) -> Self {
        Self {
            id: id.to_string(),
            work_order_id: work_order_id.to_string(),
            routing_id: format!("R-{}", work_order_id),
            work_center_id: work_center_id.to_string(),
            definition_id: format!("DEF-{}", id),
            sequence_number,
            status: OperationStatus::Pending,
            assigned_user_id: None,
            priority: 0,
            duration_minutes: 30,
            arrival_offset_minutes: sequence_number as i64,
            started_minutes_ago: None,
        }
    }

    pub fn status(mut self, status: OperationStatus) -> Self {
        self.status = status;
        if matches!(status, OperationStatus::Setup | OperationStatus::Running)
            && self.started_minutes_ago.is_none()
        {
            self.started_minutes_ago = Some(0);
        }
        self
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn operator(mut self, user_id: &str) -> Self {
        self.assigned_user_id = Some(user_id.to_string());
        self
    }

    pub fn duration(mut self, minutes: i64) -> Self {
        self.duration_minutes = minutes;
        self
    }

    pub fn arrival(mut self, offset_minutes: i64) -> Self {
        self.arrival_offset_minutes = offset_minutes;
        self
    }

    pub fn definition(mut self, definition_id: &str) -> Self {
        self.definition_id = definition_id.to_string();
        self
    }

    pub fn started_minutes_ago(mut self, minutes: i64) -> Self {
        self.started_minutes_ago = Some(minutes);
        self
    }
}

pub fn insert_operation(conn: &Connection, seed: OperationSeed) -> Result<(), Box<dyn Error>> {
    let now = Utc::now();
    let started_at = seed
        .started_minutes_ago
        .map(|m| (now - Duration::minutes(m)).to_rfc3339());
    let completed_at = if seed.status == OperationStatus::Completed {
        Some(now.to_rfc3339())
    } else {
        None
    };
    let created_at = arrival_base() + Duration::minutes(seed.arrival_offset_minutes);

    conn.execute(
        r#"
        INSERT INTO work_order_operation (
            operation_id, work_order_routing_id, work_order_id, work_center_id,
            operation_definition_id, sequence_number, status, assigned_user_id,
            priority, started_at, completed_at, estimated_duration_minutes, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
        "#,
        params![
            seed.id,
            seed.routing_id,
            seed.work_order_id,
            seed.work_center_id,
            seed.definition_id,
            seed.sequence_number,
            seed.status.as_str(),
            seed.assigned_user_id,
            seed.priority,
            started_at,
            completed_at,
            seed.duration_minutes,
            created_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

/// 模拟生产模块提交状态变更
pub fn set_status(
    conn: &Connection,
    operation_id: &str,
    status: OperationStatus,
) -> Result<(), Box<dyn Error>> {
    let now = Utc::now().to_rfc3339();
    match status {
        OperationStatus::Setup | OperationStatus::Running => conn.execute(
            "UPDATE work_order_operation SET status = ?2, started_at = COALESCE(started_at, ?3) \
             WHERE operation_id = ?1",
            params![operation_id, status.as_str(), now],
        )?,
        OperationStatus::Completed => conn.execute(
            "UPDATE work_order_operation SET status = ?2, completed_at = ?3 WHERE operation_id = ?1",
            params![operation_id, status.as_str(), now],
        )?,
        _ => conn.execute(
            "UPDATE work_order_operation SET status = ?2 WHERE operation_id = ?1",
            params![operation_id, status.as_str()],
        )?,
    };
    Ok(())
}

/// 工序改派到另一个工作中心
pub fn reassign_work_center(
    conn: &Connection,
    operation_id: &str,
    work_center_id: &str,
) -> Result<(), Box<dyn Error>> {
    conn.execute(
        "UPDATE work_order_operation SET work_center_id = ?2 WHERE operation_id = ?1",
        params![operation_id, work_center_id],
    )?;
    Ok(())
}

pub fn assign_operator(
    conn: &Connection,
    operation_id: &str,
    user_id: Option<&str>,
) -> Result<(), Box<dyn Error>> {
    conn.execute(
        "UPDATE work_order_operation SET assigned_user_id = ?2 WHERE operation_id = ?1",
        params![operation_id, user_id],
    )?;
    Ok(())
}

pub fn insert_dependency(
    conn: &Connection,
    operation_id: &str,
    depends_on: &str,
    dependency_type: DependencyType,
    lag_minutes: i64,
) -> Result<(), Box<dyn Error>> {
    conn.execute(
        r#"
        INSERT INTO operation_dependency (operation_id, depends_on_operation_id, dependency_type, lag_minutes)
        VALUES (?1, ?2, ?3, ?4)
        "#,
        params![operation_id, depends_on, dependency_type.as_str(), lag_minutes],
    )?;
    Ok(())
}

// ==========================================
// 外部信号
// ==========================================

pub fn set_material_available(
    conn: &Connection,
    operation_id: &str,
    available: bool,
) -> Result<(), Box<dyn Error>> {
    conn.execute(
        "INSERT OR REPLACE INTO operation_material_signal (operation_id, is_available) VALUES (?1, ?2)",
        params![operation_id, available as i64],
    )?;
    Ok(())
}

pub fn set_tooling_available(
    conn: &Connection,
    operation_id: &str,
    available: bool,
) -> Result<(), Box<dyn Error>> {
    conn.execute(
        "INSERT OR REPLACE INTO operation_tooling_signal (operation_id, is_available) VALUES (?1, ?2)",
        params![operation_id, available as i64],
    )?;
    Ok(())
}

/// 打开质量冻结（operation_id 为 None 表示工单级冻结）
pub fn open_quality_hold(
    conn: &Connection,
    hold_id: &str,
    work_order_id: &str,
    operation_id: Option<&str>,
) -> Result<(), Box<dyn Error>> {
    conn.execute(
        "INSERT INTO quality_hold (hold_id, work_order_id, operation_id, is_open) VALUES (?1, ?2, ?3, 1)",
        params![hold_id, work_order_id, operation_id],
    )?;
    Ok(())
}

pub fn release_quality_hold(conn: &Connection, hold_id: &str) -> Result<(), Box<dyn Error>> {
    conn.execute(
        "UPDATE quality_hold SET is_open = 0 WHERE hold_id = ?1",
        params![hold_id],
    )?;
    Ok(())
}

/// 读取持久化队列 (operation_id, queue_position)，按位置排序
pub fn read_queue(conn: &Connection, work_center_id: &str) -> Result<Vec<(String, i32)>, Box<dyn Error>> {
    let mut stmt = conn.prepare(
        "SELECT operation_id, queue_position FROM work_center_queue \
         WHERE work_center_id = ?1 ORDER BY queue_position",
    )?;
    let rows = stmt
        .query_map(params![work_center_id], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<rusqlite::Result<Vec<(String, i32)>>>()?;
    Ok(rows)
}
