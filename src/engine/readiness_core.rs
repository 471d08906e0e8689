// ==========================================
// 工序就绪评估系统 - 前置条件检查纯函数库
// ==========================================
// 职责: 七项独立前置条件检查 + 结论合成 + 等待时间估算
// 红线: 无状态、无副作用、无 I/O 操作
// ==========================================
// 输入: ReadinessSnapshot（一次性加载的一致性快照）
// 输出: Readiness（原因按固定展示顺序，任意子集可同时失败）
// ==========================================

use crate::domain::operation::{Operation, PredecessorLink, WorkCenter};
use crate::domain::readiness::Readiness;
use crate::domain::signals::SignalState;
use crate::domain::types::{BlockedReason, OperationStatus};
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;

// ==========================================
// ReadinessSnapshot - 单道工序的评估输入
// ==========================================
#[derive(Debug, Clone)]
pub struct ReadinessSnapshot {
    pub operation: Operation,
    pub predecessors: Vec<PredecessorLink>,
    pub work_center: WorkCenter,
    /// 同一工作中心内其他处于 SETUP/RUNNING 的工序
    pub active_at_work_center: Vec<Operation>,
    pub material: SignalState,
    pub tooling: SignalState,
    pub quality_hold: SignalState,
    pub taken_at: DateTime<Utc>,
}

/// 单项检查结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckOutcome {
    pub satisfied: bool,
    pub reason: Option<BlockedReason>,
}

impl CheckOutcome {
    pub fn pass() -> Self {
        Self {
            satisfied: true,
            reason: None,
        }
    }

    pub fn fail(reason: BlockedReason) -> Self {
        Self {
            satisfied: false,
            reason: Some(reason),
        }
    }

    fn from_bool(satisfied: bool, reason: BlockedReason) -> Self {
        if satisfied {
            Self::pass()
        } else {
            Self::fail(reason)
        }
    }
}

/// 前置条件检查函数签名
pub type PreconditionCheck = fn(&ReadinessSnapshot) -> CheckOutcome;

// ==========================================
// ReadinessCore - 纯函数工具类
// ==========================================
pub struct ReadinessCore;

impl ReadinessCore {
    /// 全部检查项（名称用于日志）
    pub const CHECKS: [(&'static str, PreconditionCheck); 7] = [
        ("predecessor", Self::check_predecessors),
        ("material", Self::check_material),
        ("work_center_capacity", Self::check_work_center_capacity),
        ("operator", Self::check_operator),
        ("tooling", Self::check_tooling),
        ("quality_hold", Self::check_quality_hold),
        ("setup", Self::check_setup),
    ];

    /// 前道检查
    ///
    /// # 规则
    /// - 无前道 → 满足
    /// - 每条约束开工的依赖边都已放行 → 满足
    ///   (FINISH_TO_START 要求前道完工；START_TO_START 要求前道已开工)
    pub fn check_predecessors(snapshot: &ReadinessSnapshot) -> CheckOutcome {
        let all_released = snapshot.predecessors.iter().all(PredecessorLink::is_satisfied);
        CheckOutcome::from_bool(all_released, BlockedReason::WaitingPredecessor)
    }

    /// 物料齐套检查（信号未知按不满足处理）
    pub fn check_material(snapshot: &ReadinessSnapshot) -> CheckOutcome {
        CheckOutcome::from_bool(
            snapshot.material.is_satisfied(),
            BlockedReason::MaterialUnavailable,
        )
    }

    /// 工作中心产能检查
    ///
    /// # 规则
    /// - 工作中心停用 → 不满足
    /// - 其他 SETUP/RUNNING 工序数 < capacity → 满足
    pub fn check_work_center_capacity(snapshot: &ReadinessSnapshot) -> CheckOutcome {
        let wc = &snapshot.work_center;
        let active = snapshot.active_at_work_center.len() as i64;
        CheckOutcome::from_bool(
            wc.is_active && active < wc.capacity as i64,
            BlockedReason::WorkCenterBusy,
        )
    }

    /// 操作员检查：已指派，或工作中心不要求操作员
    pub fn check_operator(snapshot: &ReadinessSnapshot) -> CheckOutcome {
        let assigned = snapshot
            .operation
            .assigned_user_id
            .as_deref()
            .map(|u| !u.trim().is_empty())
            .unwrap_or(false);
        CheckOutcome::from_bool(
            assigned || !snapshot.work_center.requires_operator,
            BlockedReason::OperatorUnavailable,
        )
    }

    /// 工装可用检查（信号未知按不满足处理）
    pub fn check_tooling(snapshot: &ReadinessSnapshot) -> CheckOutcome {
        CheckOutcome::from_bool(
            snapshot.tooling.is_satisfied(),
            BlockedReason::ToolUnavailable,
        )
    }

    /// 质量冻结检查（信号未知按不满足处理）
    pub fn check_quality_hold(snapshot: &ReadinessSnapshot) -> CheckOutcome {
        CheckOutcome::from_bool(
            snapshot.quality_hold.is_satisfied(),
            BlockedReason::QualityHold,
        )
    }

    /// 调机冲突检查：工作中心正在为其他工序定义调机
    pub fn check_setup(snapshot: &ReadinessSnapshot) -> CheckOutcome {
        let conflicting = snapshot.active_at_work_center.iter().any(|other| {
            other.status == OperationStatus::Setup
                && other.operation_definition_id != snapshot.operation.operation_definition_id
        });
        CheckOutcome::from_bool(!conflicting, BlockedReason::SetupRequired)
    }

    /// 执行全部检查并合成结论
    pub fn evaluate(snapshot: &ReadinessSnapshot) -> Readiness {
        let reasons: BTreeSet<BlockedReason> = Self::CHECKS
            .iter()
            .filter_map(|(_, check)| check(snapshot).reason)
            .collect();

        let wait = Self::estimate_wait_minutes(snapshot, &reasons);

        Readiness::from_reasons(
            snapshot.operation.id.clone(),
            reasons,
            wait,
            snapshot.taken_at,
        )
    }

    /// 估算等待时间（分钟）
    ///
    /// # 规则
    /// - 仅当全部阻塞原因都是时间型（WAITING_PREDECESSOR / WORK_CENTER_BUSY）时计算
    /// - 前道: 未放行前道中最长的剩余时间（含滞后）
    /// - 产能: 直到空出一个工位的时间
    /// - 两者同时存在取较大值；工作中心停用或产能为 0 时无法估算
    pub fn estimate_wait_minutes(
        snapshot: &ReadinessSnapshot,
        reasons: &BTreeSet<BlockedReason>,
    ) -> Option<i64> {
        if reasons.is_empty() || !reasons.iter().all(BlockedReason::is_temporal) {
            return None;
        }

        let mut wait = 0i64;

        if reasons.contains(&BlockedReason::WaitingPredecessor) {
            let predecessor_wait = snapshot
                .predecessors
                .iter()
                .filter(|link| !link.is_satisfied())
                .map(|link| link.expected_wait_minutes(snapshot.taken_at))
                .max()
                .unwrap_or(0);
            wait = wait.max(predecessor_wait);
        }

        if reasons.contains(&BlockedReason::WorkCenterBusy) {
            let slot_wait = Self::minutes_until_slot_frees(
                &snapshot.work_center,
                &snapshot.active_at_work_center,
                snapshot.taken_at,
            )?;
            wait = wait.max(slot_wait);
        }

        Some(wait)
    }

    /// 直到工作中心空出一个工位的时间（分钟）
    ///
    /// 需要完工的工序数 = active - capacity + 1，取剩余时间第 k 小者
    pub fn minutes_until_slot_frees(
        work_center: &WorkCenter,
        active: &[Operation],
        now: DateTime<Utc>,
    ) -> Option<i64> {
        if !work_center.is_active || work_center.capacity <= 0 {
            return None;
        }
        let capacity = work_center.capacity as usize;
        if active.len() < capacity {
            return Some(0);
        }

        let mut remaining: Vec<i64> = active.iter().map(|op| op.remaining_minutes(now)).collect();
        remaining.sort_unstable();
        let must_finish = active.len() - capacity + 1;
        remaining.get(must_finish - 1).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::DependencyType;
    use chrono::Duration;

    fn work_center(capacity: i32) -> WorkCenter {
        WorkCenter {
            id: "WC1".to_string(),
            name: "CNC-1".to_string(),
            capacity,
            is_active: true,
            setup_time_minutes: 10,
            requires_operator: true,
        }
    }

    fn operation(id: &str, seq: i32, status: OperationStatus) -> Operation {
        let now = Utc::now();
        Operation {
            id: id.to_string(),
            work_order_routing_id: "R1".to_string(),
            work_order_id: "WO1".to_string(),
            work_center_id: "WC1".to_string(),
            operation_definition_id: "DEF-MILL".to_string(),
            sequence_number: seq,
            status,
            assigned_user_id: Some("U1".to_string()),
            priority: 0,
            started_at: None,
            completed_at: None,
            estimated_duration_minutes: 30,
            created_at: now,
        }
    }

    fn snapshot(op: Operation) -> ReadinessSnapshot {
        ReadinessSnapshot {
            operation: op,
            predecessors: vec![],
            work_center: work_center(1),
            active_at_work_center: vec![],
            material: SignalState::Satisfied,
            tooling: SignalState::Satisfied,
            quality_hold: SignalState::Satisfied,
            taken_at: Utc::now(),
        }
    }

    #[test]
    fn test_all_clear_is_ready() {
        let s = snapshot(operation("B", 2, OperationStatus::Pending));
        let r = ReadinessCore::evaluate(&s);
        assert!(r.is_ready);
        assert!(r.blocked_reasons.is_empty());
        assert_eq!(r.estimated_wait_time, None);
    }

    #[test]
    fn test_waiting_predecessor_estimates_remaining_time() {
        let mut s = snapshot(operation("C", 3, OperationStatus::Pending));
        s.predecessors = vec![PredecessorLink::sequential(operation(
            "B",
            2,
            OperationStatus::Pending,
        ))];
        let r = ReadinessCore::evaluate(&s);
        assert!(!r.is_ready);
        assert_eq!(r.blocked_reasons, vec![BlockedReason::WaitingPredecessor]);
        assert_eq!(r.estimated_wait_time, Some(30));
    }

    #[test]
    fn test_non_temporal_reason_clears_wait_estimate() {
        let mut s = snapshot(operation("C", 3, OperationStatus::Pending));
        s.predecessors = vec![PredecessorLink::sequential(operation(
            "B",
            2,
            OperationStatus::Pending,
        ))];
        s.quality_hold = SignalState::Unsatisfied;
        let r = ReadinessCore::evaluate(&s);
        assert_eq!(
            r.blocked_reasons,
            vec![BlockedReason::WaitingPredecessor, BlockedReason::QualityHold]
        );
        assert_eq!(r.estimated_wait_time, None);
    }

    #[test]
    fn test_operator_only_blocker() {
        let mut op = operation("B", 2, OperationStatus::Pending);
        op.assigned_user_id = None;
        let r = ReadinessCore::evaluate(&snapshot(op.clone()));
        assert_eq!(r.blocked_reasons, vec![BlockedReason::OperatorUnavailable]);

        // 工作中心不要求操作员时放行
        let mut s = snapshot(op);
        s.work_center.requires_operator = false;
        assert!(ReadinessCore::evaluate(&s).is_ready);
    }

    #[test]
    fn test_busy_work_center_waits_for_earliest_slot() {
        let now = Utc::now();
        let mut running_a = operation("X", 1, OperationStatus::Running);
        running_a.started_at = Some(now - Duration::minutes(10)); // 剩余 20
        let mut running_b = operation("Y", 1, OperationStatus::Running);
        running_b.started_at = Some(now - Duration::minutes(25)); // 剩余 5

        let mut s = snapshot(operation("B", 2, OperationStatus::Pending));
        s.taken_at = now;
        s.work_center = work_center(2);
        s.active_at_work_center = vec![running_a, running_b];

        let r = ReadinessCore::evaluate(&s);
        assert_eq!(r.blocked_reasons, vec![BlockedReason::WorkCenterBusy]);
        assert_eq!(r.estimated_wait_time, Some(5));
    }

    #[test]
    fn test_inactive_work_center_is_busy_without_estimate() {
        let mut s = snapshot(operation("B", 2, OperationStatus::Pending));
        s.work_center.is_active = false;
        let r = ReadinessCore::evaluate(&s);
        assert_eq!(r.blocked_reasons, vec![BlockedReason::WorkCenterBusy]);
        assert_eq!(r.estimated_wait_time, None);
    }

    #[test]
    fn test_conflicting_setup_blocks() {
        let mut setting_up = operation("S", 1, OperationStatus::Setup);
        setting_up.operation_definition_id = "DEF-DRILL".to_string();

        let mut s = snapshot(operation("B", 2, OperationStatus::Pending));
        s.work_center = work_center(3);
        s.active_at_work_center = vec![setting_up.clone()];
        let r = ReadinessCore::evaluate(&s);
        assert_eq!(r.blocked_reasons, vec![BlockedReason::SetupRequired]);

        // 同一工序定义的调机不冲突
        setting_up.operation_definition_id = "DEF-MILL".to_string();
        s.active_at_work_center = vec![setting_up];
        assert!(ReadinessCore::evaluate(&s).is_ready);
    }

    #[test]
    fn test_unknown_signals_fail_closed() {
        let mut s = snapshot(operation("B", 2, OperationStatus::Pending));
        s.material = SignalState::Unknown("inventory offline".to_string());
        s.tooling = SignalState::Unknown("tool crib offline".to_string());
        let r = ReadinessCore::evaluate(&s);
        assert!(!r.is_ready);
        assert_eq!(
            r.blocked_reasons,
            vec![BlockedReason::MaterialUnavailable, BlockedReason::ToolUnavailable]
        );
    }

    #[test]
    fn test_every_reason_can_fail_together() {
        let mut op = operation("B", 2, OperationStatus::Pending);
        op.assigned_user_id = None;
        let mut setting_up = operation("S", 1, OperationStatus::Setup);
        setting_up.operation_definition_id = "DEF-OTHER".to_string();

        let mut s = snapshot(op);
        s.predecessors = vec![PredecessorLink::sequential(operation(
            "A",
            1,
            OperationStatus::Running,
        ))];
        s.active_at_work_center = vec![setting_up];
        s.material = SignalState::Unsatisfied;
        s.tooling = SignalState::Unsatisfied;
        s.quality_hold = SignalState::Unsatisfied;

        let r = ReadinessCore::evaluate(&s);
        assert_eq!(r.blocked_reasons, BlockedReason::ALL.to_vec());
        assert!(!r.is_ready);
    }

    #[test]
    fn test_start_to_start_predecessor_releases_on_start() {
        let mut s = snapshot(operation("B", 2, OperationStatus::Pending));
        s.predecessors = vec![PredecessorLink {
            operation: operation("A", 1, OperationStatus::Running),
            dependency_type: DependencyType::StartToStart,
            lag_minutes: 0,
        }];
        assert!(ReadinessCore::evaluate(&s).is_ready);
    }

    #[test]
    fn test_slot_estimate_when_over_capacity() {
        let now = Utc::now();
        let mk = |id: &str, elapsed: i64| {
            let mut op = operation(id, 1, OperationStatus::Running);
            op.started_at = Some(now - Duration::minutes(elapsed));
            op
        };
        // 剩余: 25, 15, 5 ; 产能 2 → 需完工 2 道 → 第二小 = 15
        let active = vec![mk("A", 5), mk("B", 15), mk("C", 25)];
        assert_eq!(
            ReadinessCore::minutes_until_slot_frees(&work_center(2), &active, now),
            Some(15)
        );
        assert_eq!(
            ReadinessCore::minutes_until_slot_frees(&work_center(0), &active, now),
            None
        );
    }
}
