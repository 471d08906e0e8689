// ==========================================
// 工序就绪评估系统 - 工序与工作中心领域模型
// ==========================================
// 所有权: 生产/工艺路线模块（本子系统只读）
// ==========================================

use crate::domain::types::{DependencyType, OperationStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// Operation - 工单工艺路线中的一道工序
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    // ===== 主键与归属 =====
    pub id: String,
    pub work_order_routing_id: String,
    pub work_order_id: String,         // 冗余自工艺路线，便于按工单查询
    pub work_center_id: String,
    pub operation_definition_id: String,

    // ===== 路线位置 =====
    pub sequence_number: i32,          // 路线内唯一

    // ===== 执行状态 =====
    pub status: OperationStatus,
    pub assigned_user_id: Option<String>,
    pub priority: i32,                 // 越大越紧急
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub estimated_duration_minutes: i64,

    // ===== 到达顺序 =====
    pub created_at: DateTime<Utc>,
}

impl Operation {
    /// 估算剩余加工时间（分钟）
    ///
    /// - 终态: 0
    /// - 已开工(SETUP/RUNNING/PAUSED 且有 started_at): 计划时长 - 已耗时，下限 0
    /// - 其他: 完整计划时长
    pub fn remaining_minutes(&self, now: DateTime<Utc>) -> i64 {
        if self.status.is_terminal() {
            return 0;
        }
        let planned = self.estimated_duration_minutes.max(0);
        match self.started_at {
            Some(started) if self.status != OperationStatus::Pending => {
                let elapsed = now.signed_duration_since(started).num_minutes().max(0);
                (planned - elapsed).max(0)
            }
            _ => planned,
        }
    }
}

// ==========================================
// WorkCenter - 工作中心（资源池）
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkCenter {
    pub id: String,
    pub name: String,
    pub capacity: i32,              // 最大并发 SETUP+RUNNING 工序数
    pub is_active: bool,
    pub setup_time_minutes: i64,
    pub requires_operator: bool,    // 是否必须指派操作员
}

// ==========================================
// OperationDependency - 显式依赖边
// ==========================================
// 存在显式依赖边时替代隐式顺序前道（支持并行分支路线）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationDependency {
    pub operation_id: String,
    pub depends_on_operation_id: String,
    pub dependency_type: DependencyType,
    pub lag_minutes: i64,
}

// ==========================================
// PredecessorLink - 前道工序及其约束
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub struct PredecessorLink {
    pub operation: Operation,
    pub dependency_type: DependencyType,
    pub lag_minutes: i64,
}

impl PredecessorLink {
    /// 隐式顺序前道：FINISH_TO_START，无滞后
    pub fn sequential(operation: Operation) -> Self {
        Self {
            operation,
            dependency_type: DependencyType::FinishToStart,
            lag_minutes: 0,
        }
    }

    /// 该前道是否已放行本工序开工
    pub fn is_satisfied(&self) -> bool {
        let status = self.operation.status;
        match self.dependency_type {
            DependencyType::FinishToStart => status == OperationStatus::Completed,
            // 已取消的前道永远不会开工，不能视为放行
            DependencyType::StartToStart => {
                status != OperationStatus::Pending && status != OperationStatus::Cancelled
            }
            DependencyType::FinishToFinish | DependencyType::StartToFinish => true,
        }
    }

    /// 预计还需等待多久才放行（分钟）
    pub fn expected_wait_minutes(&self, now: DateTime<Utc>) -> i64 {
        if self.is_satisfied() {
            return 0;
        }
        match self.dependency_type {
            DependencyType::StartToStart => self.lag_minutes.max(0),
            _ => self.operation.remaining_minutes(now) + self.lag_minutes.max(0),
        }
    }
}
