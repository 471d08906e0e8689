// ==========================================
// 工序就绪评估系统 - 就绪结果与队列模型
// ==========================================
// 所有权: 本子系统独占
// 说明: Readiness / QueueEntry 均为派生数据，可随时删除并从
//       Operation / WorkCenter 状态重建
// ==========================================

use crate::domain::operation::Operation;
use crate::domain::types::BlockedReason;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// ==========================================
// Readiness - 单道工序的准入结论
// ==========================================
// 不变式: is_ready == blocked_reasons.is_empty()
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Readiness {
    pub operation_id: String,
    pub is_ready: bool,
    pub blocked_reasons: Vec<BlockedReason>, // 有序、去重
    pub estimated_wait_time: Option<i64>,    // 分钟
    pub computed_at: DateTime<Utc>,
}

impl Readiness {
    /// 由阻塞原因集合构造（唯一构造入口，保证不变式）
    ///
    /// - 原因集合按固定展示顺序输出
    /// - 就绪时等待时间恒为 None
    pub fn from_reasons(
        operation_id: impl Into<String>,
        reasons: BTreeSet<BlockedReason>,
        estimated_wait_time: Option<i64>,
        computed_at: DateTime<Utc>,
    ) -> Self {
        let blocked_reasons: Vec<BlockedReason> = reasons.into_iter().collect();
        let is_ready = blocked_reasons.is_empty();
        Self {
            operation_id: operation_id.into(),
            is_ready,
            estimated_wait_time: if is_ready { None } else { estimated_wait_time },
            blocked_reasons,
            computed_at,
        }
    }

    /// 就绪结论
    pub fn ready(operation_id: impl Into<String>, computed_at: DateTime<Utc>) -> Self {
        Self::from_reasons(operation_id, BTreeSet::new(), None, computed_at)
    }

    /// 是否仅被时间型原因阻塞（前道/产能）
    pub fn is_only_temporally_blocked(&self) -> bool {
        !self.blocked_reasons.is_empty()
            && self.blocked_reasons.iter().all(BlockedReason::is_temporal)
    }

    pub fn has_reason(&self, reason: BlockedReason) -> bool {
        self.blocked_reasons.contains(&reason)
    }
}

// ==========================================
// QueueEntry - 工作中心队列中的一个位置
// ==========================================
// 不变式: 同一工作中心内 queue_position 从 0 开始连续且唯一
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueEntry {
    pub work_center_id: String,
    pub operation_id: String,
    pub queue_position: i32,
    pub priority: i32,
    pub estimated_wait_time: i64, // 排在前面的工序累计时长（分钟）
    pub snapshot_at: DateTime<Utc>,
}

// ==========================================
// 推送/查询用视图
// ==========================================

/// 队列中的就绪工序
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedOperation {
    pub operation_id: String,
    pub queue_position: i32,
    pub readiness: Readiness,
}

/// 被阻塞的工序（无队列位置）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockedOperation {
    pub operation_id: String,
    pub readiness: Readiness,
}

/// 队列统计
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStats {
    pub queue_length: usize,
    pub active_operations: usize,
    pub completed_today: usize,
}

/// 一次重建后的工作中心队列快照
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueSnapshot {
    pub work_center_id: String,
    pub ready_operations: Vec<QueuedOperation>,
    pub blocked_operations: Vec<BlockedOperation>,
    /// 本次重建中由"未就绪"变为"就绪"的工序
    pub newly_ready: Vec<String>,
    pub stats: QueueStats,
    pub snapshot_at: DateTime<Utc>,
}

impl QueueSnapshot {
    /// 队列位置序列（用于校验连续性）
    pub fn positions(&self) -> Vec<i32> {
        self.ready_operations.iter().map(|q| q.queue_position).collect()
    }

    pub fn ready_ids(&self) -> Vec<&str> {
        self.ready_operations
            .iter()
            .map(|q| q.operation_id.as_str())
            .collect()
    }
}

/// 附带就绪结论的工序（拉取接口返回值）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotatedOperation {
    #[serde(flatten)]
    pub operation: Operation,
    pub readiness: Readiness,
    pub queue_position: Option<i32>,
}
