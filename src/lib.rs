// ==========================================
// 工序就绪评估系统 - 核心库
// ==========================================
// 技术栈: Rust + SQLite + tokio
// 系统定位: 工序准入判断 + 工作中心就绪队列 + 实时推送
// ==========================================

// 初始化国际化系统
rust_i18n::i18n!("locales", fallback = "zh-CN");

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 就绪规则、队列、传播
pub mod engine;

// 实时推送层
pub mod realtime;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA/表结构）
pub mod db;

// 日志系统
pub mod logging;

// 性能统计
pub mod perf;

// 国际化
pub mod i18n;

// API 层 - 业务接口
pub mod api;

// 应用层 - 组装与动作入口
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

pub use domain::{
    AnnotatedOperation, BlockedReason, DependencyType, Operation, OperationStatus, QueueEntry,
    QueueSnapshot, Readiness, WorkCenter,
};

pub use engine::{
    ReadinessError, ReadinessEvaluator, ReadinessPropagationService, SignalProviders,
    WorkCenterQueueManager,
};

pub use api::{ApiError, ReadinessApi};

pub use realtime::{LiveQueuePublisher, QueueMessage, QueueSubscriber};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "工序就绪评估系统";
