// ==========================================
// 工序就绪评估系统 - 工作中心队列管理
// ==========================================
// 职责: 按工作中心重建就绪队列（全量派生，原子替换）
// 红线: 队列位置 0..n-1 连续；准入数量不超过剩余产能
// ==========================================
// 排序: priority DESC → created_at ASC → operation_id ASC
// 准入: 至多 capacity - active(SETUP+RUNNING) 道就绪工序入队，
//       其余改判为 WORK_CENTER_BUSY 并写回就绪缓存
// ==========================================

use crate::domain::operation::{Operation, WorkCenter};
use crate::domain::readiness::{
    AnnotatedOperation, BlockedOperation, QueueEntry, QueueSnapshot, QueueStats, QueuedOperation,
    Readiness,
};
use crate::domain::types::BlockedReason;
use crate::engine::error::{ReadinessError, ReadinessResult};
use crate::engine::events::{OptionalQueuePublisher, QueueEvent, RebuildTrigger};
use crate::engine::readiness::{EvaluationOutcome, ReadinessEvaluator};
use crate::perf::PerfGuard;
use crate::repository::{QueueRepository, RoutingRepository, WorkCenterRepository};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use tracing::instrument;

/// 全量重建汇总
#[derive(Debug, Clone, Default)]
pub struct RebuildSummary {
    pub rebuilt: Vec<QueueSnapshot>,
    /// (work_center_id, 错误描述)
    pub failed: Vec<(String, String)>,
}

impl RebuildSummary {
    pub fn queued_total(&self) -> usize {
        self.rebuilt.iter().map(|s| s.stats.queue_length).sum()
    }
}

// 一次重建的中间结果
struct RebuildOutput {
    snapshot: QueueSnapshot,
    operations: Vec<Operation>,
}

// ==========================================
// WorkCenterQueueManager - 队列管理器
// ==========================================
pub struct WorkCenterQueueManager {
    work_center_repo: Arc<WorkCenterRepository>,
    routing_repo: Arc<RoutingRepository>,
    queue_repo: Arc<QueueRepository>,
    evaluator: Arc<ReadinessEvaluator>,
    publisher: OptionalQueuePublisher,
    // 工作中心级互斥：同一工作中心的重建串行执行
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl WorkCenterQueueManager {
    /// 创建队列管理器
    ///
    /// # 参数
    /// - publisher: 提交后推送队列变更（None 表示不推送）
    pub fn new(
        work_center_repo: Arc<WorkCenterRepository>,
        routing_repo: Arc<RoutingRepository>,
        queue_repo: Arc<QueueRepository>,
        evaluator: Arc<ReadinessEvaluator>,
        publisher: OptionalQueuePublisher,
    ) -> Self {
        Self {
            work_center_repo,
            routing_repo,
            queue_repo,
            evaluator,
            publisher,
            locks: DashMap::new(),
        }
    }

    /// 重建工作中心队列（全部候选工序重新评估）
    pub fn rebuild_queue(&self, work_center_id: &str) -> ReadinessResult<QueueSnapshot> {
        self.rebuild_queue_with(work_center_id, &HashMap::new(), RebuildTrigger::ManualRefresh)
    }

    /// 重建工作中心队列，复用同一传播批次中刚得到的评估结果
    ///
    /// # 参数
    /// - fresh: operation_id → 本批次评估结果（不在其中的候选工序会重新评估）
    /// - trigger: 触发原因（随推送一起下发）
    #[instrument(skip(self, fresh), fields(work_center_id = %work_center_id, trigger = %trigger.as_str()))]
    pub fn rebuild_queue_with(
        &self,
        work_center_id: &str,
        fresh: &HashMap<String, EvaluationOutcome>,
        trigger: RebuildTrigger,
    ) -> ReadinessResult<QueueSnapshot> {
        let output = self.rebuild_locked(work_center_id, fresh)?;
        self.publish(trigger, &output.snapshot);
        Ok(output.snapshot)
    }

    /// 重建并返回附带就绪结论的工序列表（就绪在前按队列顺序，阻塞在后）
    pub fn ready_operations(&self, work_center_id: &str) -> ReadinessResult<Vec<AnnotatedOperation>> {
        let output = self.rebuild_locked(work_center_id, &HashMap::new())?;
        self.publish(RebuildTrigger::Pull, &output.snapshot);

        let mut by_id: HashMap<String, Operation> = output
            .operations
            .into_iter()
            .map(|op| (op.id.clone(), op))
            .collect();

        let snapshot = output.snapshot;
        let mut annotated =
            Vec::with_capacity(snapshot.ready_operations.len() + snapshot.blocked_operations.len());
        for queued in snapshot.ready_operations {
            if let Some(operation) = by_id.remove(&queued.operation_id) {
                annotated.push(AnnotatedOperation {
                    operation,
                    readiness: queued.readiness,
                    queue_position: Some(queued.queue_position),
                });
            }
        }
        for blocked in snapshot.blocked_operations {
            if let Some(operation) = by_id.remove(&blocked.operation_id) {
                annotated.push(AnnotatedOperation {
                    operation,
                    readiness: blocked.readiness,
                    queue_position: None,
                });
            }
        }
        Ok(annotated)
    }

    /// 重建全部工作中心队列（单个失败不影响其他工作中心）
    pub fn rebuild_all_queues(&self) -> ReadinessResult<RebuildSummary> {
        let _perf = PerfGuard::new("rebuild_all_queues");
        let ids = self.work_center_repo.list_ids()?;

        let mut summary = RebuildSummary::default();
        for id in ids {
            match self.rebuild_queue_with(&id, &HashMap::new(), RebuildTrigger::FullResync) {
                Ok(snapshot) => summary.rebuilt.push(snapshot),
                Err(e) => {
                    tracing::error!(work_center_id = %id, error = %e, "工作中心队列重建失败");
                    summary.failed.push((id, e.to_string()));
                }
            }
        }

        tracing::info!(
            rebuilt = summary.rebuilt.len(),
            failed = summary.failed.len(),
            queued_total = summary.queued_total(),
            "全量队列重建完成"
        );
        Ok(summary)
    }

    /// 读取已持久化的队列
    pub fn current_queue(&self, work_center_id: &str) -> ReadinessResult<Vec<QueueEntry>> {
        Ok(self.queue_repo.list_by_work_center(work_center_id)?)
    }

    // ==========================================
    // 内部实现
    // ==========================================

    fn lock_for(&self, work_center_id: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(work_center_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn rebuild_locked(
        &self,
        work_center_id: &str,
        fresh: &HashMap<String, EvaluationOutcome>,
    ) -> ReadinessResult<RebuildOutput> {
        let _perf = PerfGuard::new("rebuild_queue");

        let work_center = self
            .work_center_repo
            .find_by_id(work_center_id)?
            .ok_or_else(|| ReadinessError::not_found("WorkCenter", work_center_id))?;

        let lock = self.lock_for(work_center_id);
        // 锁内只保护单元值，中毒后可直接继续使用
        let _guard = lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        let operations = self.routing_repo.find_open_by_work_center(work_center_id)?;
        let active_count = operations
            .iter()
            .filter(|op| op.status.occupies_capacity())
            .count();

        // === 步骤 1: 评估候选工序 ===
        let mut ready: Vec<(&Operation, EvaluationOutcome)> = Vec::new();
        let mut blocked: Vec<(&Operation, EvaluationOutcome)> = Vec::new();
        for op in operations.iter().filter(|op| op.status.is_waiting()) {
            let outcome = match fresh.get(&op.id) {
                Some(outcome) => outcome.clone(),
                None => match self.evaluator.evaluate_detailed(&op.id) {
                    Ok(outcome) => outcome,
                    // 读取列表后状态已变为终态：本轮不再参与排队
                    Err(ReadinessError::InvalidState { .. }) => continue,
                    Err(e) => return Err(e),
                },
            };
            if outcome.readiness.is_ready {
                ready.push((op, outcome));
            } else {
                blocked.push((op, outcome));
            }
        }

        // === 步骤 2: 排序 ===
        ready.sort_by(|(a, _), (b, _)| queue_order(a, b));

        // === 步骤 3: 准入（剩余产能）===
        let free_slots = free_slots(&work_center, active_count);
        let overflow = if ready.len() > free_slots {
            ready.split_off(free_slots)
        } else {
            Vec::new()
        };

        let snapshot_at = Utc::now();
        let mut cumulative = 0i64;
        let mut entries = Vec::with_capacity(ready.len());
        let mut queued = Vec::with_capacity(ready.len());
        let mut newly_ready = Vec::new();

        for (position, (op, outcome)) in ready.iter().enumerate() {
            entries.push(QueueEntry {
                work_center_id: work_center_id.to_string(),
                operation_id: op.id.clone(),
                queue_position: position as i32,
                priority: op.priority,
                estimated_wait_time: cumulative,
                snapshot_at,
            });
            queued.push(QueuedOperation {
                operation_id: op.id.clone(),
                queue_position: position as i32,
                readiness: outcome.readiness.clone(),
            });
            if outcome.became_ready() {
                newly_ready.push(op.id.clone());
            }
            cumulative += slot_minutes(op, &work_center);
        }

        // 超出产能的就绪工序改判为 WORK_CENTER_BUSY
        let mut blocked_ops: Vec<BlockedOperation> = Vec::with_capacity(blocked.len() + overflow.len());
        for (op, _) in &overflow {
            let reasons: BTreeSet<BlockedReason> = [BlockedReason::WorkCenterBusy].into_iter().collect();
            let readiness = Readiness::from_reasons(op.id.clone(), reasons, Some(cumulative), snapshot_at);
            self.evaluator.persist(&readiness)?;
            tracing::debug!(
                operation_id = %op.id,
                estimated_wait_time = cumulative,
                "就绪工序超出剩余产能，改判为 WORK_CENTER_BUSY"
            );
            cumulative += slot_minutes(op, &work_center);
            blocked_ops.push(BlockedOperation {
                operation_id: op.id.clone(),
                readiness,
            });
        }
        for (op, outcome) in blocked {
            blocked_ops.push(BlockedOperation {
                operation_id: op.id.clone(),
                readiness: outcome.readiness,
            });
        }

        // === 步骤 4: 原子替换 ===
        let written = self.queue_repo.replace_for_work_center(work_center_id, &entries)?;

        let completed_today = self
            .routing_repo
            .count_completed_since(work_center_id, start_of_day(snapshot_at))?;

        tracing::info!(
            work_center_id = %work_center_id,
            queued = written,
            blocked = blocked_ops.len(),
            overflow = overflow.len(),
            active = active_count,
            "工作中心队列重建完成"
        );

        let snapshot = QueueSnapshot {
            work_center_id: work_center_id.to_string(),
            ready_operations: queued,
            blocked_operations: blocked_ops,
            newly_ready,
            stats: QueueStats {
                queue_length: written,
                active_operations: active_count,
                completed_today,
            },
            snapshot_at,
        };

        drop(ready);
        drop(overflow);
        Ok(RebuildOutput {
            snapshot,
            operations,
        })
    }

    // 提交后推送，失败只记录告警
    fn publish(&self, trigger: RebuildTrigger, snapshot: &QueueSnapshot) {
        if let Err(e) = self.publisher.publish(QueueEvent::new(trigger, snapshot.clone())) {
            tracing::warn!(
                work_center_id = %snapshot.work_center_id,
                error = %e,
                "队列变更推送失败（队列已提交）"
            );
        }
    }
}

/// 队列排序: priority DESC → created_at ASC → id ASC
pub fn queue_order(a: &Operation, b: &Operation) -> Ordering {
    b.priority
        .cmp(&a.priority)
        .then_with(|| a.created_at.cmp(&b.created_at))
        .then_with(|| a.id.cmp(&b.id))
}

/// 剩余可准入工位数
pub fn free_slots(work_center: &WorkCenter, active_count: usize) -> usize {
    if !work_center.is_active || work_center.capacity <= 0 {
        return 0;
    }
    (work_center.capacity as usize).saturating_sub(active_count)
}

// 单道工序占用工位的时长（加工 + 调机）
fn slot_minutes(op: &Operation, work_center: &WorkCenter) -> i64 {
    op.estimated_duration_minutes.max(0) + work_center.setup_time_minutes.max(0)
}

fn start_of_day(at: DateTime<Utc>) -> DateTime<Utc> {
    at.date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|naive| naive.and_utc())
        .unwrap_or(at)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::OperationStatus;
    use chrono::Duration;

    fn op(id: &str, priority: i32, base: DateTime<Utc>, created_offset_min: i64) -> Operation {
        Operation {
            id: id.to_string(),
            work_order_routing_id: "R1".to_string(),
            work_order_id: "WO1".to_string(),
            work_center_id: "WC1".to_string(),
            operation_definition_id: "DEF".to_string(),
            sequence_number: 1,
            status: OperationStatus::Pending,
            assigned_user_id: None,
            priority,
            started_at: None,
            completed_at: None,
            estimated_duration_minutes: 20,
            created_at: base + Duration::minutes(created_offset_min),
        }
    }

    #[test]
    fn test_queue_order_priority_then_age_then_id() {
        let base = Utc::now();
        let mut ops = vec![
            op("C", 1, base, 0),
            op("B", 5, base, 10),
            op("A", 1, base, 0),
            op("D", 1, base, -5),
        ];
        ops.sort_by(queue_order);
        let ids: Vec<&str> = ops.iter().map(|o| o.id.as_str()).collect();
        assert_eq!(ids, vec!["B", "D", "A", "C"]);
    }

    #[test]
    fn test_free_slots() {
        let mut wc = WorkCenter {
            id: "WC1".to_string(),
            name: "Lathe".to_string(),
            capacity: 2,
            is_active: true,
            setup_time_minutes: 5,
            requires_operator: false,
        };
        assert_eq!(free_slots(&wc, 0), 2);
        assert_eq!(free_slots(&wc, 1), 1);
        assert_eq!(free_slots(&wc, 3), 0);
        wc.is_active = false;
        assert_eq!(free_slots(&wc, 0), 0);
        assert_eq!(slot_minutes(&op("A", 0, Utc::now(), 0), &wc), 25);
    }
}
