// ==========================================
// 工序就绪评估系统 - 引擎层队列事件发布
// ==========================================
// 职责: 定义队列变更发布 trait，实现依赖倒置
// 说明: Engine 层定义 trait，realtime 层实现实时推送
// ==========================================

use crate::domain::readiness::QueueSnapshot;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::sync::Arc;

// ==========================================
// 队列重建触发类型
// ==========================================

/// 触发一次队列重建的原因
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RebuildTrigger {
    /// 工序状态变更（携带变更的工序ID）
    StatusChange { operation_id: String },
    /// 显式调用 updateWorkCenterQueue
    ManualRefresh,
    /// 客户端拉取（断线重连/漏推补偿）
    Pull,
    /// 全量重建（启动或运维）
    FullResync,
}

impl RebuildTrigger {
    pub fn as_str(&self) -> &str {
        match self {
            RebuildTrigger::StatusChange { .. } => "STATUS_CHANGE",
            RebuildTrigger::ManualRefresh => "MANUAL_REFRESH",
            RebuildTrigger::Pull => "PULL",
            RebuildTrigger::FullResync => "FULL_RESYNC",
        }
    }
}

/// 队列变更事件
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueEvent {
    pub trigger: RebuildTrigger,
    pub snapshot: QueueSnapshot,
}

impl QueueEvent {
    pub fn new(trigger: RebuildTrigger, snapshot: QueueSnapshot) -> Self {
        Self { trigger, snapshot }
    }

    pub fn work_center_id(&self) -> &str {
        &self.snapshot.work_center_id
    }
}

// ==========================================
// 事件发布 Trait
// ==========================================

/// 队列变更发布者
///
/// 在队列写事务提交之后调用；发布失败不影响已提交的队列
///
/// # 返回
/// - `Ok(n)`: 收到推送的订阅者数量
/// - `Err`: 发布失败
pub trait QueueEventPublisher: Send + Sync {
    fn publish(&self, event: QueueEvent) -> Result<usize, Box<dyn Error + Send + Sync>>;
}

/// 空操作发布者（单元测试、离线批处理）
#[derive(Debug, Clone, Default)]
pub struct NoOpQueuePublisher;

impl QueueEventPublisher for NoOpQueuePublisher {
    fn publish(&self, event: QueueEvent) -> Result<usize, Box<dyn Error + Send + Sync>> {
        tracing::debug!(
            "NoOpQueuePublisher: 跳过推送 - work_center_id={}, trigger={}",
            event.work_center_id(),
            event.trigger.as_str()
        );
        Ok(0)
    }
}

/// 可选的发布者包装
pub struct OptionalQueuePublisher {
    inner: Option<Arc<dyn QueueEventPublisher>>,
}

impl OptionalQueuePublisher {
    pub fn with_publisher(publisher: Arc<dyn QueueEventPublisher>) -> Self {
        Self {
            inner: Some(publisher),
        }
    }

    pub fn none() -> Self {
        Self { inner: None }
    }

    pub fn publish(&self, event: QueueEvent) -> Result<usize, Box<dyn Error + Send + Sync>> {
        match &self.inner {
            Some(publisher) => publisher.publish(event),
            None => {
                tracing::debug!(
                    "OptionalQueuePublisher: 未配置发布者 - work_center_id={}",
                    event.work_center_id()
                );
                Ok(0)
            }
        }
    }

    pub fn is_configured(&self) -> bool {
        self.inner.is_some()
    }
}

impl Default for OptionalQueuePublisher {
    fn default() -> Self {
        Self::none()
    }
}
