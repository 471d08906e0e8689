// ==========================================
// 工序就绪评估系统 - 领域类型定义
// ==========================================
// 序列化格式: SCREAMING_SNAKE_CASE (与数据库一致)
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 工序状态 (Operation Status)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationStatus {
    Pending,   // 待开工
    Setup,     // 调机准备中
    Running,   // 加工中
    Paused,    // 暂停
    Completed, // 已完工
    Cancelled, // 已取消
}

impl OperationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationStatus::Pending => "PENDING",
            OperationStatus::Setup => "SETUP",
            OperationStatus::Running => "RUNNING",
            OperationStatus::Paused => "PAUSED",
            OperationStatus::Completed => "COMPLETED",
            OperationStatus::Cancelled => "CANCELLED",
        }
    }

    /// 从数据库字符串解析（未知值返回 None，由调用方决定如何处理）
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "PENDING" => Some(OperationStatus::Pending),
            "SETUP" => Some(OperationStatus::Setup),
            "RUNNING" => Some(OperationStatus::Running),
            "PAUSED" => Some(OperationStatus::Paused),
            "COMPLETED" => Some(OperationStatus::Completed),
            "CANCELLED" => Some(OperationStatus::Cancelled),
            _ => None,
        }
    }

    /// 终态：不参与就绪评估
    pub fn is_terminal(&self) -> bool {
        matches!(self, OperationStatus::Completed | OperationStatus::Cancelled)
    }

    /// 占用工作中心产能的状态
    pub fn occupies_capacity(&self) -> bool {
        matches!(self, OperationStatus::Setup | OperationStatus::Running)
    }

    /// 排队候选状态（等待开工或暂停后等待恢复）
    pub fn is_waiting(&self) -> bool {
        matches!(self, OperationStatus::Pending | OperationStatus::Paused)
    }
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 阻塞原因 (Blocked Reason)
// ==========================================
// 声明顺序即展示/分诊顺序（不是依赖顺序）
// Ord 派生依赖声明顺序，排序时直接使用
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BlockedReason {
    WaitingPredecessor,  // 等待前道工序
    MaterialUnavailable, // 物料未齐套
    WorkCenterBusy,      // 工作中心满载
    OperatorUnavailable, // 未指派操作员
    ToolUnavailable,     // 工装/刀具不可用
    QualityHold,         // 质量冻结
    SetupRequired,       // 工作中心正在为其他工序调机
}

impl BlockedReason {
    /// 全部原因（按固定展示顺序）
    pub const ALL: [BlockedReason; 7] = [
        BlockedReason::WaitingPredecessor,
        BlockedReason::MaterialUnavailable,
        BlockedReason::WorkCenterBusy,
        BlockedReason::OperatorUnavailable,
        BlockedReason::ToolUnavailable,
        BlockedReason::QualityHold,
        BlockedReason::SetupRequired,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BlockedReason::WaitingPredecessor => "WAITING_PREDECESSOR",
            BlockedReason::MaterialUnavailable => "MATERIAL_UNAVAILABLE",
            BlockedReason::WorkCenterBusy => "WORK_CENTER_BUSY",
            BlockedReason::OperatorUnavailable => "OPERATOR_UNAVAILABLE",
            BlockedReason::ToolUnavailable => "TOOL_UNAVAILABLE",
            BlockedReason::QualityHold => "QUALITY_HOLD",
            BlockedReason::SetupRequired => "SETUP_REQUIRED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|r| r.as_str() == s.trim())
    }

    /// 时间型原因：等待即可自然解除，可以估算等待时间
    pub fn is_temporal(&self) -> bool {
        matches!(
            self,
            BlockedReason::WaitingPredecessor | BlockedReason::WorkCenterBusy
        )
    }

    /// i18n 键
    pub fn i18n_key(&self) -> String {
        format!("blocked_reason.{}", self.as_str())
    }
}

impl fmt::Display for BlockedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 依赖类型 (Dependency Type)
// ==========================================
// 仅在存在显式依赖边时使用；隐式顺序前道按 FINISH_TO_START 处理
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DependencyType {
    FinishToStart,  // 前道完工后才能开工（最常见）
    StartToStart,   // 前道开工后才能开工
    FinishToFinish, // 前道完工后才能完工（不阻塞开工）
    StartToFinish,  // 前道开工后才能完工（不阻塞开工）
}

impl DependencyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DependencyType::FinishToStart => "FINISH_TO_START",
            DependencyType::StartToStart => "START_TO_START",
            DependencyType::FinishToFinish => "FINISH_TO_FINISH",
            DependencyType::StartToFinish => "START_TO_FINISH",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "FINISH_TO_START" => Some(DependencyType::FinishToStart),
            "START_TO_START" => Some(DependencyType::StartToStart),
            "FINISH_TO_FINISH" => Some(DependencyType::FinishToFinish),
            "START_TO_FINISH" => Some(DependencyType::StartToFinish),
            _ => None,
        }
    }

    /// 是否约束本工序的开工
    pub fn gates_start(&self) -> bool {
        matches!(
            self,
            DependencyType::FinishToStart | DependencyType::StartToStart
        )
    }
}

impl fmt::Display for DependencyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
