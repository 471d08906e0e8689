// ==========================================
// 工序就绪评估系统 - 配置层
// ==========================================
// 存储: config_kv 表
// ==========================================

pub mod config_manager;
pub mod readiness_config;

pub use config_manager::{config_keys, ConfigManager};
pub use readiness_config::ReadinessConfig;
