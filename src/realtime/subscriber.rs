// ==========================================
// 工序就绪评估系统 - 队列订阅客户端
// ==========================================
// 职责:
// - 订阅工作中心推送，断开后按指数退避重连: min(base * 2^n, max)
// - 落后(Lagged)或刚连上时通过拉取接口补齐快照
// - 超过心跳超时未收到任何消息 → Stale；连续两次超时 → 主动重连
// ==========================================

use crate::domain::readiness::QueueSnapshot;
use crate::realtime::message::QueueMessage;
use crate::realtime::publisher::LiveQueuePublisher;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch};

// ==========================================
// 拉取接口（推送丢失时的补偿通道）
// ==========================================
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn fetch_snapshot(&self, work_center_id: &str) -> Result<QueueSnapshot, String>;
}

// ==========================================
// ReconnectBackoff - 指数退避
// ==========================================
#[derive(Debug, Clone)]
pub struct ReconnectBackoff {
    base: Duration,
    max: Duration,
    attempts: u32,
}

impl ReconnectBackoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max,
            attempts: 0,
        }
    }

    /// 记录一次失败并返回下次重连前的等待时间
    pub fn next_delay(&mut self) -> Duration {
        self.attempts = self.attempts.saturating_add(1);
        let factor = 2u32.checked_pow(self.attempts).unwrap_or(u32::MAX);
        self.base.saturating_mul(factor).min(self.max)
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn reset(&mut self) {
        self.attempts = 0;
    }
}

impl Default for ReconnectBackoff {
    fn default() -> Self {
        Self::new(Duration::from_millis(1000), Duration::from_millis(30_000))
    }
}

/// 连接状态
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectivityState {
    Connecting,
    Connected,
    /// 超过心跳超时未收到消息
    Stale { since: DateTime<Utc> },
    Reconnecting { attempt: u32, delay_ms: u64 },
    /// 服务端已关闭
    Closed,
}

/// 快照来源
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateSource {
    Push,
    Pull,
}

#[derive(Debug, Clone)]
pub enum SubscriberUpdate {
    Snapshot {
        snapshot: QueueSnapshot,
        source: UpdateSource,
    },
    Connectivity(ConnectivityState),
}

// ==========================================
// QueueSubscriber
// ==========================================
pub struct QueueSubscriber {
    work_center_id: String,
    publisher: Weak<LiveQueuePublisher>,
    source: Option<Arc<dyn SnapshotSource>>,
    backoff: ReconnectBackoff,
    heartbeat_timeout: Duration,
    receiver: Option<broadcast::Receiver<QueueMessage>>,
    pending_delay: Option<Duration>,
    needs_pull: bool,
    missed_heartbeats: u32,
    state_tx: watch::Sender<ConnectivityState>,
}

impl QueueSubscriber {
    /// # 参数
    /// - source: 拉取补偿通道（None 表示只依赖推送）
    /// - heartbeat_timeout: 超过该时间未收到任何消息视为连接陈旧
    pub fn new(
        publisher: &Arc<LiveQueuePublisher>,
        work_center_id: &str,
        source: Option<Arc<dyn SnapshotSource>>,
        backoff: ReconnectBackoff,
        heartbeat_timeout: Duration,
    ) -> Self {
        let (state_tx, _) = watch::channel(ConnectivityState::Connecting);
        Self {
            work_center_id: work_center_id.to_string(),
            publisher: Arc::downgrade(publisher),
            source,
            backoff,
            heartbeat_timeout,
            receiver: None,
            pending_delay: None,
            needs_pull: false,
            missed_heartbeats: 0,
            state_tx,
        }
    }

    pub fn work_center_id(&self) -> &str {
        &self.work_center_id
    }

    /// 当前连接状态
    pub fn connectivity(&self) -> ConnectivityState {
        self.state_tx.borrow().clone()
    }

    /// 监听连接状态变化（供界面绑定）
    pub fn watch_connectivity(&self) -> watch::Receiver<ConnectivityState> {
        self.state_tx.subscribe()
    }

    fn set_state(&self, state: ConnectivityState) -> SubscriberUpdate {
        self.state_tx.send_replace(state.clone());
        SubscriberUpdate::Connectivity(state)
    }

    fn schedule_reconnect(&mut self) -> SubscriberUpdate {
        self.receiver = None;
        let delay = self.backoff.next_delay();
        self.pending_delay = Some(delay);
        tracing::warn!(
            work_center_id = %self.work_center_id,
            attempt = self.backoff.attempts(),
            delay_ms = delay.as_millis() as u64,
            "队列推送连接断开，准备重连"
        );
        self.set_state(ConnectivityState::Reconnecting {
            attempt: self.backoff.attempts(),
            delay_ms: delay.as_millis() as u64,
        })
    }

    /// 等待下一条更新
    ///
    /// # 返回
    /// - Some(update): 快照或连接状态变化
    /// - None: 服务端已释放，订阅结束
    pub async fn next_update(&mut self) -> Option<SubscriberUpdate> {
        loop {
            // === 连接 ===
            if self.receiver.is_none() {
                if let Some(delay) = self.pending_delay.take() {
                    tokio::time::sleep(delay).await;
                }
                let Some(publisher) = self.publisher.upgrade() else {
                    if self.connectivity() == ConnectivityState::Closed {
                        return None;
                    }
                    return Some(self.set_state(ConnectivityState::Closed));
                };
                let subscription = publisher.subscribe(&self.work_center_id);
                self.backoff.reset();
                self.missed_heartbeats = 0;
                self.needs_pull = true;
                tracing::info!(
                    work_center_id = %self.work_center_id,
                    subscription_id = %subscription.subscription_id,
                    "队列推送已连接"
                );
                self.receiver = Some(subscription.receiver);
                return Some(self.set_state(ConnectivityState::Connected));
            }

            // === 拉取补偿 ===
            if self.needs_pull {
                self.needs_pull = false;
                if let Some(source) = &self.source {
                    match source.fetch_snapshot(&self.work_center_id).await {
                        Ok(snapshot) => {
                            return Some(SubscriberUpdate::Snapshot {
                                snapshot,
                                source: UpdateSource::Pull,
                            })
                        }
                        Err(e) => tracing::warn!(
                            work_center_id = %self.work_center_id,
                            error = %e,
                            "拉取队列快照失败，继续等待推送"
                        ),
                    }
                }
            }

            // === 接收推送 ===
            let received = match self.receiver.as_mut() {
                Some(rx) => tokio::time::timeout(self.heartbeat_timeout, rx.recv()).await,
                None => continue,
            };

            match received {
                Ok(Ok(message)) => {
                    self.missed_heartbeats = 0;
                    let was_stale = matches!(self.connectivity(), ConnectivityState::Stale { .. });
                    match message {
                        QueueMessage::QueueUpdate(snapshot) => {
                            if was_stale {
                                self.set_state(ConnectivityState::Connected);
                            }
                            return Some(SubscriberUpdate::Snapshot {
                                snapshot,
                                source: UpdateSource::Push,
                            });
                        }
                        QueueMessage::Heartbeat { .. } | QueueMessage::Connected { .. } => {
                            if was_stale {
                                return Some(self.set_state(ConnectivityState::Connected));
                            }
                        }
                    }
                }
                Ok(Err(RecvError::Lagged(skipped))) => {
                    tracing::warn!(
                        work_center_id = %self.work_center_id,
                        skipped,
                        "订阅者落后，改为拉取最新快照"
                    );
                    self.needs_pull = true;
                }
                Ok(Err(RecvError::Closed)) => {
                    return Some(self.schedule_reconnect());
                }
                Err(_elapsed) => {
                    self.missed_heartbeats += 1;
                    if self.missed_heartbeats >= 2 {
                        return Some(self.schedule_reconnect());
                    }
                    return Some(self.set_state(ConnectivityState::Stale { since: Utc::now() }));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_and_caps() {
        let mut backoff = ReconnectBackoff::default();
        let delays: Vec<u128> = (0..6).map(|_| backoff.next_delay().as_millis()).collect();
        assert_eq!(delays, vec![2000, 4000, 8000, 16000, 30000, 30000]);
        backoff.reset();
        assert_eq!(backoff.next_delay(), Duration::from_millis(2000));
    }

    #[test]
    fn test_backoff_never_overflows() {
        let mut backoff = ReconnectBackoff::new(Duration::from_millis(1000), Duration::from_secs(30));
        for _ in 0..100 {
            assert!(backoff.next_delay() <= Duration::from_secs(30));
        }
    }
}
