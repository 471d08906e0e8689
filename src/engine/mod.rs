// ==========================================
// 工序就绪评估系统 - 引擎层
// ==========================================
// 职责: 就绪规则、队列派生、状态变更传播，不拼 SQL
// 红线: 所有阻塞结论必须带原因
// ==========================================

pub mod error;
pub mod events;
pub mod propagation;
pub mod queue;
pub mod readiness;
pub mod readiness_core;

// 重导出核心引擎
pub use error::{ReadinessError, ReadinessResult};
pub use events::{
    NoOpQueuePublisher, OptionalQueuePublisher, QueueEvent, QueueEventPublisher, RebuildTrigger,
};
pub use propagation::{PropagationReport, ReadinessPropagationService};
pub use queue::{RebuildSummary, WorkCenterQueueManager};
pub use readiness::{EvaluationOutcome, ReadinessEvaluator, SignalProviders};
pub use readiness_core::{CheckOutcome, ReadinessCore, ReadinessSnapshot};
