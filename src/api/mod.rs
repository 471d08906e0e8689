// ==========================================
// 工序就绪评估系统 - API 层
// ==========================================
// 职责: 提供业务 API 接口，供应用层动作调用
// ==========================================

pub mod error;
pub mod readiness_api;

// 重导出核心类型
pub use error::{ApiError, ApiResult};
pub use readiness_api::ReadinessApi;
