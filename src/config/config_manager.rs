// ==========================================
// 工序就绪评估系统 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::config::readiness_config::ReadinessConfig;
use crate::db::open_sqlite_connection;
use crate::logging::LogFormat;
use rusqlite::{params, Connection};
use std::error::Error;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> Result<Self, Box<dyn Error>> {
        let conn = open_sqlite_connection(db_path)?;
        crate::db::ensure_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Result<Self, Box<dyn Error>> {
        {
            let conn_guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    fn get_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let result = conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Box::new(e)),
        }
    }

    /// 读取 global scope 的配置值
    pub fn get_global_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        self.get_config_value(key)
    }

    /// 写入 global scope 的配置值（存在则覆盖）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> Result<(), Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value, updated_at) \
             VALUES ('global', ?1, ?2, datetime('now')) \
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
            params![key, value],
        )?;
        Ok(())
    }

    /// 读取并解析配置，缺失或格式错误时使用默认值
    fn get_parsed_or<T>(&self, key: &str, default: T) -> Result<T, Box<dyn Error>>
    where
        T: FromStr + std::fmt::Display,
    {
        let Some(raw) = self.get_config_value(key)? else {
            return Ok(default);
        };
        match raw.trim().parse::<T>() {
            Ok(v) => Ok(v),
            Err(_) => {
                tracing::warn!(
                    config_key = key,
                    raw_value = %raw,
                    default = %default,
                    "配置值格式错误，使用默认值"
                );
                Ok(default)
            }
        }
    }

    fn get_bool_or(&self, key: &str, default: bool) -> Result<bool, Box<dyn Error>> {
        Ok(match self.get_config_value(key)? {
            Some(v) => matches!(
                v.trim().to_lowercase().as_str(),
                "1" | "true" | "yes" | "y" | "on"
            ),
            None => default,
        })
    }

    /// 加载就绪子系统配置
    pub fn load_readiness_config(&self) -> Result<ReadinessConfig, Box<dyn Error>> {
        let defaults = ReadinessConfig::default();

        let log_format = match self.get_config_value(config_keys::LOG_FORMAT)? {
            Some(v) => LogFormat::parse(&v).unwrap_or(defaults.log_format),
            None => defaults.log_format,
        };

        let config = ReadinessConfig {
            heartbeat_interval_secs: self
                .get_parsed_or(config_keys::HEARTBEAT_INTERVAL_SECS, defaults.heartbeat_interval_secs)?
                .max(1),
            heartbeat_timeout_secs: self
                .get_parsed_or(config_keys::HEARTBEAT_TIMEOUT_SECS, defaults.heartbeat_timeout_secs)?,
            broadcast_buffer: self
                .get_parsed_or(config_keys::BROADCAST_BUFFER, defaults.broadcast_buffer)?
                .max(1),
            reconnect_base_ms: self
                .get_parsed_or(config_keys::RECONNECT_BASE_MS, defaults.reconnect_base_ms)?,
            reconnect_max_ms: self
                .get_parsed_or(config_keys::RECONNECT_MAX_MS, defaults.reconnect_max_ms)?,
            publish_rebuilds: self
                .get_bool_or(config_keys::PUBLISH_REBUILDS, defaults.publish_rebuilds)?,
            log_format,
        };

        Ok(config.normalized())
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 实时推送
    pub const HEARTBEAT_INTERVAL_SECS: &str = "readiness.heartbeat_interval_secs";
    pub const HEARTBEAT_TIMEOUT_SECS: &str = "readiness.heartbeat_timeout_secs";
    pub const BROADCAST_BUFFER: &str = "readiness.broadcast_buffer";
    pub const PUBLISH_REBUILDS: &str = "readiness.publish_rebuilds";

    // 客户端重连
    pub const RECONNECT_BASE_MS: &str = "readiness.reconnect_base_ms";
    pub const RECONNECT_MAX_MS: &str = "readiness.reconnect_max_ms";

    // 日志
    pub const LOG_FORMAT: &str = "log_format";
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::ensure_schema;

    fn manager() -> ConfigManager {
        let conn = Connection::open_in_memory().unwrap();
        ensure_schema(&conn).unwrap();
        ConfigManager::from_connection(Arc::new(Mutex::new(conn))).unwrap()
    }

    #[test]
    fn test_defaults_when_table_empty() {
        let config = manager().load_readiness_config().unwrap();
        assert_eq!(config, ReadinessConfig::default());
    }

    #[test]
    fn test_overrides_and_bad_values() {
        let mgr = manager();
        mgr.set_global_config_value(config_keys::HEARTBEAT_INTERVAL_SECS, "5").unwrap();
        mgr.set_global_config_value(config_keys::BROADCAST_BUFFER, "not-a-number").unwrap();
        mgr.set_global_config_value(config_keys::PUBLISH_REBUILDS, "off").unwrap();
        mgr.set_global_config_value(config_keys::LOG_FORMAT, "json").unwrap();

        let config = mgr.load_readiness_config().unwrap();
        assert_eq!(config.heartbeat_interval_secs, 5);
        assert_eq!(config.broadcast_buffer, ReadinessConfig::default().broadcast_buffer);
        assert!(!config.publish_rebuilds);
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn test_set_overwrites_existing_value() {
        let mgr = manager();
        mgr.set_global_config_value("k", "1").unwrap();
        mgr.set_global_config_value("k", "2").unwrap();
        assert_eq!(mgr.get_global_config_value("k").unwrap(), Some("2".to_string()));
    }
}
