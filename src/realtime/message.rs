// ==========================================
// 工序就绪评估系统 - 实时推送消息格式
// ==========================================
// 线上格式（JSON）:
// {"type":"connected","workCenterId":"WC1"}
// {"type":"queue-update","workCenterId":"WC1","readyOperations":[...],...}
// {"type":"heartbeat","workCenterId":"WC1","sequence":3,"sentAt":"..."}
// ==========================================

use crate::domain::readiness::QueueSnapshot;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum QueueMessage {
    Connected {
        #[serde(rename = "workCenterId")]
        work_center_id: String,
    },
    QueueUpdate(QueueSnapshot),
    Heartbeat {
        #[serde(rename = "workCenterId")]
        work_center_id: String,
        sequence: u64,
        #[serde(rename = "sentAt")]
        sent_at: DateTime<Utc>,
    },
}

impl QueueMessage {
    pub fn work_center_id(&self) -> &str {
        match self {
            QueueMessage::Connected { work_center_id } => work_center_id,
            QueueMessage::QueueUpdate(snapshot) => &snapshot.work_center_id,
            QueueMessage::Heartbeat { work_center_id, .. } => work_center_id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            QueueMessage::Connected { .. } => "connected",
            QueueMessage::QueueUpdate(_) => "queue-update",
            QueueMessage::Heartbeat { .. } => "heartbeat",
        }
    }

    /// 序列化为推送文本
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::readiness::QueueStats;

    #[test]
    fn test_queue_update_is_flat_and_tagged() {
        let snapshot = QueueSnapshot {
            work_center_id: "WC1".to_string(),
            ready_operations: vec![],
            blocked_operations: vec![],
            newly_ready: vec![],
            stats: QueueStats {
                queue_length: 0,
                active_operations: 1,
                completed_today: 4,
            },
            snapshot_at: Utc::now(),
        };
        let value = serde_json::to_value(QueueMessage::QueueUpdate(snapshot)).unwrap();
        assert_eq!(value["type"], "queue-update");
        assert_eq!(value["workCenterId"], "WC1");
        assert_eq!(value["stats"]["completedToday"], 4);
        assert!(value["readyOperations"].is_array());
    }

    #[test]
    fn test_connected_and_heartbeat_round_trip() {
        let connected = QueueMessage::Connected {
            work_center_id: "WC2".to_string(),
        };
        let json = connected.to_json().unwrap();
        assert_eq!(json, r#"{"type":"connected","workCenterId":"WC2"}"#);

        let heartbeat: QueueMessage = serde_json::from_str(
            r#"{"type":"heartbeat","workCenterId":"WC2","sequence":9,"sentAt":"2026-01-05T08:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(heartbeat.kind(), "heartbeat");
        assert_eq!(heartbeat.work_center_id(), "WC2");
    }
}
