// ==========================================
// 工序就绪评估系统 - 实时推送层
// ==========================================
// 职责: 按工作中心推送队列变更、心跳，以及订阅端重连/补偿
// ==========================================

pub mod message;
pub mod publisher;
pub mod subscriber;

pub use message::QueueMessage;
pub use publisher::{LiveQueuePublisher, LiveSubscription};
pub use subscriber::{
    ConnectivityState, QueueSubscriber, ReconnectBackoff, SnapshotSource, SubscriberUpdate,
    UpdateSource,
};
