// ==========================================
// 工序就绪评估系统 - 应用层
// ==========================================
// 职责: 组装各层实例，提供带会话校验的动作入口
// ==========================================

pub mod actions;
pub mod state;

// 重导出
pub use actions::{ActionResponse, ErrorResponse, ReadinessActions, Session};
pub use state::{get_default_db_path, ApiSnapshotSource, AppState};
