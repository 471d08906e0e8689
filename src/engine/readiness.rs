// ==========================================
// 工序就绪评估系统 - 就绪评估引擎
// ==========================================
// 职责: 加载一致性快照 → 读取外部信号 → 调用纯函数检查 → 写入就绪缓存
// 输入: operation_id / work_order_id
// 输出: Readiness（并持久化到 operation_readiness）
// ==========================================

use crate::domain::readiness::Readiness;
use crate::domain::signals::{
    MaterialSignal, QualityHoldSignal, SignalState, StaticSignal, ToolingSignal,
};
use crate::engine::error::{ReadinessError, ReadinessResult};
use crate::engine::readiness_core::{ReadinessCore, ReadinessSnapshot};
use crate::repository::{ReadinessRepository, RoutingRepository, SqliteSignalRepository};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::instrument;

// ==========================================
// SignalProviders - 外部信号提供者集合
// ==========================================
#[derive(Clone)]
pub struct SignalProviders {
    pub material: Arc<dyn MaterialSignal>,
    pub tooling: Arc<dyn ToolingSignal>,
    pub quality_hold: Arc<dyn QualityHoldSignal>,
    // 信号表与工序表同库：在快照读事务内读取，不再单独调用提供者
    in_snapshot: bool,
}

impl SignalProviders {
    /// 外部信号提供者（快照之后各读取一次）
    pub fn new(
        material: Arc<dyn MaterialSignal>,
        tooling: Arc<dyn ToolingSignal>,
        quality_hold: Arc<dyn QualityHoldSignal>,
    ) -> Self {
        Self {
            material,
            tooling,
            quality_hold,
            in_snapshot: false,
        }
    }

    /// 全部放行（未接入外部系统）
    pub fn permissive() -> Self {
        let signal = Arc::new(StaticSignal::permissive());
        Self::new(signal.clone(), signal.clone(), signal)
    }

    /// 使用 SQLite 信号表
    pub fn sqlite(repo: Arc<SqliteSignalRepository>) -> Self {
        Self {
            in_snapshot: true,
            ..Self::new(repo.clone(), repo.clone(), repo)
        }
    }

    /// 信号是否随工序快照在同一读事务内读取
    pub fn reads_in_snapshot(&self) -> bool {
        self.in_snapshot
    }
}

/// 单次评估结果（附带上一次缓存结论，用于识别"变为就绪"）
#[derive(Debug, Clone)]
pub struct EvaluationOutcome {
    pub readiness: Readiness,
    pub previous: Option<Readiness>,
}

impl EvaluationOutcome {
    /// 是否由"未就绪/未评估"变为"就绪"
    pub fn became_ready(&self) -> bool {
        self.readiness.is_ready && !self.previous.as_ref().map(|p| p.is_ready).unwrap_or(false)
    }
}

// ==========================================
// ReadinessEvaluator - 就绪评估器
// ==========================================
pub struct ReadinessEvaluator {
    routing_repo: Arc<RoutingRepository>,
    readiness_repo: Arc<ReadinessRepository>,
    signals: SignalProviders,
}

impl ReadinessEvaluator {
    /// 创建新的评估器
    ///
    /// # 参数
    /// - routing_repo: 工艺路线/工序仓储
    /// - readiness_repo: 就绪缓存仓储
    /// - signals: 外部信号提供者
    pub fn new(
        routing_repo: Arc<RoutingRepository>,
        readiness_repo: Arc<ReadinessRepository>,
        signals: SignalProviders,
    ) -> Self {
        Self {
            routing_repo,
            readiness_repo,
            signals,
        }
    }

    /// 加载评估快照
    ///
    /// # 返回
    /// - Err(NotFound): 工序或其工作中心不存在
    /// - Err(InvalidState): 工序已完工/取消
    pub fn load_snapshot(&self, operation_id: &str) -> ReadinessResult<ReadinessSnapshot> {
        let context = if self.signals.in_snapshot {
            self.routing_repo.load_operation_context_with_signals(operation_id)?
        } else {
            self.routing_repo.load_operation_context(operation_id)?
        }
        .ok_or_else(|| ReadinessError::not_found("Operation", operation_id))?;

        if context.operation.status.is_terminal() {
            return Err(ReadinessError::InvalidState {
                operation_id: operation_id.to_string(),
                status: context.operation.status,
            });
        }

        // 每个信号只读取一次
        let op = &context.operation;
        let (material, tooling, quality_hold) = match &context.signals {
            Some(readings) => (
                SignalState::from_availability(readings.material.clone()),
                SignalState::from_availability(readings.tooling.clone()),
                SignalState::from_hold(readings.quality_hold.clone()),
            ),
            None => (
                SignalState::from_availability(self.signals.material.is_material_available(op)),
                SignalState::from_availability(self.signals.tooling.is_tooling_available(op)),
                SignalState::from_hold(self.signals.quality_hold.has_open_hold(op)),
            ),
        };

        for (name, state) in [
            ("material", &material),
            ("tooling", &tooling),
            ("quality_hold", &quality_hold),
        ] {
            if let SignalState::Unknown(cause) = state {
                tracing::warn!(
                    operation_id = %operation_id,
                    signal = name,
                    cause = %cause,
                    "信号读取失败，按未满足处理"
                );
            }
        }

        Ok(ReadinessSnapshot {
            operation: context.operation,
            predecessors: context.predecessors,
            work_center: context.work_center,
            active_at_work_center: context.active_at_work_center,
            material,
            tooling,
            quality_hold,
            taken_at: Utc::now(),
        })
    }

    /// 评估单道工序并写入就绪缓存
    pub fn evaluate(&self, operation_id: &str) -> ReadinessResult<Readiness> {
        Ok(self.evaluate_detailed(operation_id)?.readiness)
    }

    /// 评估单道工序，返回新结论与缓存中的旧结论
    #[instrument(skip(self), fields(operation_id = %operation_id))]
    pub fn evaluate_detailed(&self, operation_id: &str) -> ReadinessResult<EvaluationOutcome> {
        let snapshot = self.load_snapshot(operation_id)?;
        let readiness = ReadinessCore::evaluate(&snapshot);

        let previous = self.readiness_repo.upsert(&readiness)?;

        tracing::debug!(
            is_ready = readiness.is_ready,
            blocked_reasons = ?readiness.blocked_reasons,
            estimated_wait_time = ?readiness.estimated_wait_time,
            "工序就绪评估完成"
        );

        Ok(EvaluationOutcome {
            readiness,
            previous,
        })
    }

    /// 评估工单下全部非终态工序
    ///
    /// # 返回
    /// - Err(NotFound): 工单不存在
    /// - 终态工序不出现在结果中
    #[instrument(skip(self), fields(work_order_id = %work_order_id))]
    pub fn evaluate_work_order(
        &self,
        work_order_id: &str,
    ) -> ReadinessResult<HashMap<String, Readiness>> {
        let operations = self.routing_repo.find_by_work_order(work_order_id)?;
        if operations.is_empty() {
            return Err(ReadinessError::not_found("WorkOrder", work_order_id));
        }

        let mut result = HashMap::with_capacity(operations.len());
        for op in operations.iter().filter(|op| !op.status.is_terminal()) {
            let readiness = self.evaluate(&op.id)?;
            result.insert(op.id.clone(), readiness);
        }

        tracing::info!(
            evaluated = result.len(),
            total = operations.len(),
            "工单就绪评估完成"
        );
        Ok(result)
    }

    /// 覆盖写入就绪缓存（队列准入改判时使用）
    pub fn persist(&self, readiness: &Readiness) -> ReadinessResult<Option<Readiness>> {
        Ok(self.readiness_repo.upsert(readiness)?)
    }

    /// 删除终态工序的就绪缓存
    pub fn discard(&self, operation_id: &str) -> ReadinessResult<()> {
        let removed = self.readiness_repo.delete(operation_id)?;
        if removed > 0 {
            tracing::debug!(operation_id = %operation_id, "已删除终态工序的就绪缓存");
        }
        Ok(())
    }

    /// 读取就绪缓存
    pub fn cached(&self, operation_id: &str) -> ReadinessResult<Option<Readiness>> {
        Ok(self.readiness_repo.find(operation_id)?)
    }
}
