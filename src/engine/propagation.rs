// ==========================================
// 工序就绪评估系统 - 就绪传播服务
// ==========================================
// 职责: 工序状态变更后，重新评估本工序与直接后继，并重建受影响的工作中心队列
// 红线: 尽力而为；单项失败记录日志并继续，最终汇总为 Propagation 错误，
//       不回滚调用方已提交的状态变更
// ==========================================

use crate::domain::readiness::QueueSnapshot;
use crate::engine::error::{ReadinessError, ReadinessResult};
use crate::engine::events::RebuildTrigger;
use crate::engine::queue::WorkCenterQueueManager;
use crate::engine::readiness::{EvaluationOutcome, ReadinessEvaluator};
use crate::perf::PerfGuard;
use crate::repository::RoutingRepository;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::instrument;

/// 一次传播的执行报告
#[derive(Debug, Clone, Default)]
pub struct PropagationReport {
    pub operation_id: String,
    /// 重新评估过的工序（本工序 + 非终态后继）
    pub re_evaluated: Vec<String>,
    /// 跳过的终态后继
    pub skipped_terminal: Vec<String>,
    pub snapshots: Vec<QueueSnapshot>,
}

impl PropagationReport {
    pub fn rebuilt_work_centers(&self) -> Vec<&str> {
        self.snapshots
            .iter()
            .map(|s| s.work_center_id.as_str())
            .collect()
    }
}

pub struct ReadinessPropagationService {
    routing_repo: Arc<RoutingRepository>,
    evaluator: Arc<ReadinessEvaluator>,
    queue_manager: Arc<WorkCenterQueueManager>,
}

impl ReadinessPropagationService {
    pub fn new(
        routing_repo: Arc<RoutingRepository>,
        evaluator: Arc<ReadinessEvaluator>,
        queue_manager: Arc<WorkCenterQueueManager>,
    ) -> Self {
        Self {
            routing_repo,
            evaluator,
            queue_manager,
        }
    }

    /// 工序状态变更入口
    ///
    /// # 流程
    /// 1. 定位工序及其直接后继（显式依赖边 + 隐式下一顺序工序）
    /// 2. 重新评估本工序（终态工序改为删除就绪缓存）和每个非终态后继
    /// 3. 重建所有涉及的工作中心队列
    ///
    /// # 返回
    /// - Err(NotFound): 工序不存在
    /// - Err(Propagation): 部分步骤失败（其余步骤已执行）
    #[instrument(skip(self), fields(operation_id = %operation_id))]
    pub fn on_operation_status_change(&self, operation_id: &str) -> ReadinessResult<PropagationReport> {
        let _perf = PerfGuard::new("on_operation_status_change");

        let operation = self
            .routing_repo
            .find_operation(operation_id)?
            .ok_or_else(|| {
                tracing::warn!("状态变更通知指向不存在的工序");
                ReadinessError::not_found("Operation", operation_id)
            })?;

        let mut report = PropagationReport {
            operation_id: operation_id.to_string(),
            ..Default::default()
        };
        let mut failures: Vec<String> = Vec::new();
        let mut fresh: HashMap<String, EvaluationOutcome> = HashMap::new();
        let mut work_centers: BTreeSet<String> = BTreeSet::new();
        work_centers.insert(operation.work_center_id.clone());

        // === 步骤 1: 本工序 ===
        if operation.status.is_terminal() {
            if let Err(e) = self.evaluator.discard(&operation.id) {
                tracing::error!(error = %e, "删除终态工序就绪缓存失败");
                failures.push(format!("{}: {}", operation.id, e));
            }
        } else {
            match self.evaluator.evaluate_detailed(&operation.id) {
                Ok(outcome) => {
                    report.re_evaluated.push(operation.id.clone());
                    fresh.insert(operation.id.clone(), outcome);
                }
                Err(e) => {
                    tracing::error!(error = %e, "工序就绪评估失败");
                    failures.push(format!("{}: {}", operation.id, e));
                }
            }
        }

        // === 步骤 2: 直接后继 ===
        match self.routing_repo.find_successors(&operation) {
            Ok(successors) => {
                for successor in successors {
                    work_centers.insert(successor.work_center_id.clone());
                    if successor.status.is_terminal() {
                        report.skipped_terminal.push(successor.id.clone());
                        continue;
                    }
                    match self.evaluator.evaluate_detailed(&successor.id) {
                        Ok(outcome) => {
                            report.re_evaluated.push(successor.id.clone());
                            fresh.insert(successor.id.clone(), outcome);
                        }
                        Err(e) => {
                            tracing::error!(successor_id = %successor.id, error = %e, "后继工序就绪评估失败");
                            failures.push(format!("{}: {}", successor.id, e));
                        }
                    }
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "查询后继工序失败");
                failures.push(format!("successors of {}: {}", operation.id, e));
            }
        }

        // === 步骤 3: 重建涉及的工作中心队列 ===
        for work_center_id in &work_centers {
            let trigger = RebuildTrigger::StatusChange {
                operation_id: operation_id.to_string(),
            };
            match self
                .queue_manager
                .rebuild_queue_with(work_center_id, &fresh, trigger)
            {
                Ok(snapshot) => report.snapshots.push(snapshot),
                Err(e) => {
                    tracing::error!(work_center_id = %work_center_id, error = %e, "工作中心队列重建失败");
                    failures.push(format!("{}: {}", work_center_id, e));
                }
            }
        }

        if !failures.is_empty() {
            return Err(ReadinessError::Propagation {
                operation_id: operation_id.to_string(),
                failures,
            });
        }

        tracing::info!(
            re_evaluated = report.re_evaluated.len(),
            skipped_terminal = report.skipped_terminal.len(),
            work_centers = report.snapshots.len(),
            "就绪传播完成"
        );
        Ok(report)
    }
}
