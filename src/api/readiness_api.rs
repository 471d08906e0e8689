// ==========================================
// 工序就绪评估系统 - 就绪 API
// ==========================================
// 职责: 就绪评估、工作中心队列查询/重建、状态变更通知
// 说明: 同步接口；应用层在阻塞线程池中调用
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::domain::readiness::{AnnotatedOperation, QueueSnapshot, Readiness};
use crate::engine::propagation::{PropagationReport, ReadinessPropagationService};
use crate::engine::queue::{RebuildSummary, WorkCenterQueueManager};
use crate::engine::readiness::ReadinessEvaluator;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

// ==========================================
// ReadinessApi
// ==========================================
pub struct ReadinessApi {
    evaluator: Arc<ReadinessEvaluator>,
    queue_manager: Arc<WorkCenterQueueManager>,
    propagation: Arc<ReadinessPropagationService>,
}

impl ReadinessApi {
    pub fn new(
        evaluator: Arc<ReadinessEvaluator>,
        queue_manager: Arc<WorkCenterQueueManager>,
        propagation: Arc<ReadinessPropagationService>,
    ) -> Self {
        Self {
            evaluator,
            queue_manager,
            propagation,
        }
    }

    /// 评估单道工序
    ///
    /// # 返回
    /// - Err(NotFound): 工序不存在
    /// - Err(InvalidState): 工序已完工/取消
    pub fn calculate_operation_readiness(&self, operation_id: &str) -> ApiResult<Readiness> {
        let operation_id = require_id("operation_id", operation_id)?;
        debug!(operation_id, "calculate_operation_readiness");
        Ok(self.evaluator.evaluate(operation_id)?)
    }

    /// 评估工单下全部非终态工序（结果无顺序保证）
    pub fn calculate_work_order_readiness(
        &self,
        work_order_id: &str,
    ) -> ApiResult<HashMap<String, Readiness>> {
        let work_order_id = require_id("work_order_id", work_order_id)?;
        debug!(work_order_id, "calculate_work_order_readiness");
        Ok(self.evaluator.evaluate_work_order(work_order_id)?)
    }

    /// 查询工作中心工序（就绪在前按队列顺序，阻塞在后）
    pub fn get_ready_operations_for_work_center(
        &self,
        work_center_id: &str,
    ) -> ApiResult<Vec<AnnotatedOperation>> {
        let work_center_id = require_id("work_center_id", work_center_id)?;
        debug!(work_center_id, "get_ready_operations_for_work_center");
        Ok(self.queue_manager.ready_operations(work_center_id)?)
    }

    /// 重建工作中心队列
    pub fn update_work_center_queue(&self, work_center_id: &str) -> ApiResult<QueueSnapshot> {
        let work_center_id = require_id("work_center_id", work_center_id)?;
        Ok(self.queue_manager.rebuild_queue(work_center_id)?)
    }

    /// 工序状态变更通知（状态写入由调用方完成，本接口只做传播）
    pub fn on_operation_status_change(&self, operation_id: &str) -> ApiResult<PropagationReport> {
        let operation_id = require_id("operation_id", operation_id)?;
        Ok(self.propagation.on_operation_status_change(operation_id)?)
    }

    /// 全量重建所有工作中心队列（运维）
    pub fn rebuild_all_queues(&self) -> ApiResult<RebuildSummary> {
        Ok(self.queue_manager.rebuild_all_queues()?)
    }
}

fn require_id<'a>(field: &str, value: &'a str) -> ApiResult<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ApiError::InvalidInput(format!("{}不能为空", field)));
    }
    Ok(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_id_trims_and_rejects_blank() {
        assert_eq!(require_id("operation_id", "  OP1 ").unwrap(), "OP1");
        assert!(matches!(
            require_id("operation_id", "   "),
            Err(ApiError::InvalidInput(_))
        ));
    }
}
