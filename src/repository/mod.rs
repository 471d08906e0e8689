// ==========================================
// 工序就绪评估系统 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================
// 职责: 提供数据访问接口,屏蔽数据库细节
// 约束: 所有查询使用参数化,防止 SQL 注入
// 约束: 工序/工作中心/信号表只读；仅就绪结果与队列表可写
// ==========================================

pub mod error;
pub mod queue_repo;
pub mod readiness_repo;
pub mod routing_repo;
mod row_mapping;
pub mod signal_repo;
pub mod work_center_repo;

// 重导出核心仓储
pub use error::{RepositoryError, RepositoryResult};
pub use queue_repo::QueueRepository;
pub use readiness_repo::ReadinessRepository;
pub use routing_repo::{OperationContext, RoutingRepository};
pub use signal_repo::SqliteSignalRepository;
pub use work_center_repo::WorkCenterRepository;
