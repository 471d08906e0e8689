// ==========================================
// 工序就绪评估系统 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod operation;
pub mod readiness;
pub mod signals;
pub mod types;

// 重导出核心类型
pub use operation::{Operation, OperationDependency, PredecessorLink, WorkCenter};
pub use readiness::{
    AnnotatedOperation, BlockedOperation, QueueEntry, QueueSnapshot, QueueStats,
    QueuedOperation, Readiness,
};
pub use signals::{
    BlockListSignal, MaterialSignal, QualityHoldSignal, SignalError, SignalState, StaticSignal,
    ToolingSignal, UnreachableSignal,
};
pub use types::{BlockedReason, DependencyType, OperationStatus};
