// ==========================================
// 工序就绪评估系统 - 运行参数
// ==========================================

use crate::logging::LogFormat;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 就绪子系统运行参数（来源: config_kv，缺省值见 Default）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadinessConfig {
    /// 心跳间隔（秒）
    pub heartbeat_interval_secs: u64,
    /// 客户端判定连接陈旧的超时（秒），不小于两倍心跳间隔
    pub heartbeat_timeout_secs: u64,
    /// 每个工作中心推送通道的缓存消息数
    pub broadcast_buffer: usize,
    /// 重连退避基数（毫秒）
    pub reconnect_base_ms: u64,
    /// 重连退避上限（毫秒）
    pub reconnect_max_ms: u64,
    /// 队列重建后是否推送
    pub publish_rebuilds: bool,
    pub log_format: LogFormat,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_secs: 15,
            heartbeat_timeout_secs: 45,
            broadcast_buffer: 64,
            reconnect_base_ms: 1_000,
            reconnect_max_ms: 30_000,
            publish_rebuilds: true,
            log_format: LogFormat::Text,
        }
    }
}

impl ReadinessConfig {
    /// 修正互相矛盾的取值
    pub fn normalized(mut self) -> Self {
        let min_timeout = self.heartbeat_interval_secs.saturating_mul(2);
        if self.heartbeat_timeout_secs < min_timeout {
            self.heartbeat_timeout_secs = min_timeout;
        }
        if self.reconnect_max_ms < self.reconnect_base_ms {
            self.reconnect_max_ms = self.reconnect_base_ms;
        }
        self
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_secs(self.heartbeat_timeout_secs)
    }

    pub fn reconnect_base(&self) -> Duration {
        Duration::from_millis(self.reconnect_base_ms)
    }

    pub fn reconnect_max(&self) -> Duration {
        Duration::from_millis(self.reconnect_max_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalized_raises_timeout_and_max() {
        let config = ReadinessConfig {
            heartbeat_interval_secs: 30,
            heartbeat_timeout_secs: 10,
            reconnect_base_ms: 5_000,
            reconnect_max_ms: 100,
            ..Default::default()
        }
        .normalized();
        assert_eq!(config.heartbeat_timeout_secs, 60);
        assert_eq!(config.reconnect_max(), Duration::from_millis(5_000));
    }
}
