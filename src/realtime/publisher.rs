// ==========================================
// 工序就绪评估系统 - 实时队列推送
// ==========================================
// 每个工作中心一个 broadcast 通道；重建提交后推送 queue-update。
// 推送为"发出即忘"：无订阅者或订阅者落后时直接丢弃，客户端靠拉取补偿。
// 心跳由发布者持有的定时任务发送，用于连接状态判断，与数据推送分离。
// ==========================================

use crate::domain::readiness::QueueSnapshot;
use crate::engine::events::{QueueEvent, QueueEventPublisher};
use crate::realtime::message::QueueMessage;
use chrono::Utc;
use dashmap::DashMap;
use std::error::Error;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// 单个工作中心的订阅
pub struct LiveSubscription {
    /// 订阅标识（仅用于日志关联）
    pub subscription_id: String,
    pub work_center_id: String,
    /// 订阅建立时的本地确认消息（不经过广播）
    pub connected: QueueMessage,
    pub receiver: broadcast::Receiver<QueueMessage>,
}

pub struct LiveQueuePublisher {
    channels: DashMap<String, broadcast::Sender<QueueMessage>>,
    buffer: usize,
    heartbeat_seq: AtomicU64,
}

impl std::fmt::Debug for LiveQueuePublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveQueuePublisher")
            .field("channels", &self.channels.len())
            .field("buffer", &self.buffer)
            .finish()
    }
}

impl LiveQueuePublisher {
    /// # 参数
    /// - buffer: 每个通道缓存的消息数，超出后落后的订阅者会收到 Lagged
    pub fn new(buffer: usize) -> Self {
        tracing::info!(buffer, "创建实时队列推送器");
        Self {
            channels: DashMap::new(),
            buffer: buffer.max(1),
            heartbeat_seq: AtomicU64::new(0),
        }
    }

    /// 订阅某工作中心的队列推送
    pub fn subscribe(&self, work_center_id: &str) -> LiveSubscription {
        let receiver = self
            .channels
            .entry(work_center_id.to_string())
            .or_insert_with(|| broadcast::channel(self.buffer).0)
            .subscribe();
        let subscription_id = uuid::Uuid::new_v4().to_string();
        tracing::debug!(
            work_center_id = %work_center_id,
            subscription_id = %subscription_id,
            "新增队列订阅"
        );
        LiveSubscription {
            subscription_id,
            work_center_id: work_center_id.to_string(),
            connected: QueueMessage::Connected {
                work_center_id: work_center_id.to_string(),
            },
            receiver,
        }
    }

    /// 当前订阅者数量
    pub fn subscriber_count(&self, work_center_id: &str) -> usize {
        self.channels
            .get(work_center_id)
            .map(|tx| tx.receiver_count())
            .unwrap_or(0)
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// 推送队列快照，返回收到推送的订阅者数量
    pub fn publish_snapshot(&self, snapshot: QueueSnapshot) -> usize {
        let work_center_id = snapshot.work_center_id.clone();
        let sent = match self.channels.get(&work_center_id) {
            Some(tx) => tx.send(QueueMessage::QueueUpdate(snapshot)).unwrap_or(0),
            None => 0,
        };
        if sent == 0 {
            self.prune(&work_center_id);
        }
        tracing::debug!(work_center_id = %work_center_id, subscribers = sent, "队列快照已推送");
        sent
    }

    /// 向所有通道发送一次心跳，并清理无订阅者的通道
    ///
    /// # 返回
    /// 收到心跳的通道数
    pub fn send_heartbeats(&self) -> usize {
        let sequence = self.heartbeat_seq.fetch_add(1, Ordering::Relaxed) + 1;
        let sent_at = Utc::now();
        let mut delivered = 0;
        for entry in self.channels.iter() {
            let message = QueueMessage::Heartbeat {
                work_center_id: entry.key().clone(),
                sequence,
                sent_at,
            };
            if entry.value().send(message).is_ok() {
                delivered += 1;
            }
        }
        self.channels.retain(|_, tx| tx.receiver_count() > 0);
        delivered
    }

    /// 启动心跳任务；推送器被释放后任务自动退出
    pub fn spawn_heartbeat(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let weak: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(publisher) = weak.upgrade() else {
                    tracing::debug!("推送器已释放，心跳任务退出");
                    break;
                };
                let delivered = publisher.send_heartbeats();
                tracing::trace!(channels = delivered, "心跳已发送");
            }
        })
    }

    fn prune(&self, work_center_id: &str) {
        self.channels
            .remove_if(work_center_id, |_, tx| tx.receiver_count() == 0);
    }
}

impl QueueEventPublisher for LiveQueuePublisher {
    fn publish(&self, event: QueueEvent) -> Result<usize, Box<dyn Error + Send + Sync>> {
        Ok(self.publish_snapshot(event.snapshot))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::readiness::QueueStats;

    fn snapshot(wc: &str, n: usize) -> QueueSnapshot {
        QueueSnapshot {
            work_center_id: wc.to_string(),
            ready_operations: vec![],
            blocked_operations: vec![],
            newly_ready: vec![],
            stats: QueueStats {
                queue_length: n,
                ..Default::default()
            },
            snapshot_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_publish_reaches_only_matching_work_center() {
        let publisher = LiveQueuePublisher::new(8);
        let mut wc1 = publisher.subscribe("WC1");
        let mut wc2 = publisher.subscribe("WC2");
        assert_eq!(wc1.connected.kind(), "connected");

        assert_eq!(publisher.publish_snapshot(snapshot("WC1", 3)), 1);

        match wc1.receiver.recv().await.unwrap() {
            QueueMessage::QueueUpdate(s) => assert_eq!(s.stats.queue_length, 3),
            other => panic!("unexpected message: {:?}", other),
        }
        assert!(wc2.receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_dropped() {
        let publisher = LiveQueuePublisher::new(8);
        assert_eq!(publisher.publish_snapshot(snapshot("WC9", 1)), 0);

        let sub = publisher.subscribe("WC9");
        drop(sub);
        assert_eq!(publisher.publish_snapshot(snapshot("WC9", 1)), 0);
        assert_eq!(publisher.channel_count(), 0);
    }

    #[tokio::test]
    async fn test_heartbeat_prunes_dead_channels() {
        let publisher = LiveQueuePublisher::new(4);
        let mut live = publisher.subscribe("WC1");
        let dead = publisher.subscribe("WC2");
        drop(dead);

        assert_eq!(publisher.send_heartbeats(), 1);
        assert_eq!(publisher.channel_count(), 1);
        match live.receiver.recv().await.unwrap() {
            QueueMessage::Heartbeat { sequence, .. } => assert_eq!(sequence, 1),
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_spawned_heartbeat_stops_with_publisher() {
        let publisher = Arc::new(LiveQueuePublisher::new(4));
        let mut sub = publisher.subscribe("WC1");
        let handle = publisher.spawn_heartbeat(Duration::from_millis(10));

        let msg = tokio::time::timeout(Duration::from_secs(2), sub.receiver.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(msg.kind(), "heartbeat");

        drop(sub);
        drop(publisher);
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
