// ==========================================
// ConfigManager 集成测试
// ==========================================
// 测试目标: 验证配置读写与 AppState 启动时的参数加载
// ==========================================

mod test_helpers;

use std::time::Duration;

use mes_readiness::config::{config_keys, ConfigManager, ReadinessConfig};
use mes_readiness::logging::LogFormat;
use test_helpers::{build_state, create_test_db};

#[tokio::test]
async fn test_config_manager_creation() {
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");

    let config_manager = ConfigManager::new(&db_path);
    assert!(
        config_manager.is_ok(),
        "ConfigManager should be created successfully"
    );
}

#[tokio::test]
async fn test_defaults_without_overrides() {
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let manager = ConfigManager::new(&db_path).unwrap();

    let config = manager.load_readiness_config().unwrap();
    assert_eq!(config, ReadinessConfig::default());
    assert_eq!(config.heartbeat_interval(), Duration::from_secs(15));
    assert_eq!(config.reconnect_max(), Duration::from_millis(30_000));
}

#[tokio::test]
async fn test_global_value_roundtrip() {
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let manager = ConfigManager::new(&db_path).unwrap();

    assert_eq!(
        manager.get_global_config_value(config_keys::BROADCAST_BUFFER).unwrap(),
        None
    );
    manager
        .set_global_config_value(config_keys::BROADCAST_BUFFER, "128")
        .unwrap();
    assert_eq!(
        manager.get_global_config_value(config_keys::BROADCAST_BUFFER).unwrap(),
        Some("128".to_string())
    );
}

#[tokio::test]
async fn test_contradictory_values_are_normalized() {
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let manager = ConfigManager::new(&db_path).unwrap();
    manager
        .set_global_config_value(config_keys::HEARTBEAT_INTERVAL_SECS, "20")
        .unwrap();
    manager
        .set_global_config_value(config_keys::HEARTBEAT_TIMEOUT_SECS, "5")
        .unwrap();
    manager
        .set_global_config_value(config_keys::RECONNECT_BASE_MS, "4000")
        .unwrap();
    manager
        .set_global_config_value(config_keys::RECONNECT_MAX_MS, "1000")
        .unwrap();

    let config = manager.load_readiness_config().unwrap();
    assert_eq!(config.heartbeat_timeout_secs, 40);
    assert_eq!(config.reconnect_max_ms, 4000);
}

#[tokio::test]
async fn test_app_state_loads_overrides() {
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    {
        let manager = ConfigManager::new(&db_path).unwrap();
        manager
            .set_global_config_value(config_keys::BROADCAST_BUFFER, "8")
            .unwrap();
        manager
            .set_global_config_value(config_keys::LOG_FORMAT, "json")
            .unwrap();
    }

    let state = build_state(&db_path);
    assert_eq!(state.config.broadcast_buffer, 8);
    assert_eq!(state.config.log_format, LogFormat::Json);

    // AppState 持有的 ConfigManager 与启动参数来自同一张表
    assert_eq!(
        state
            .config_manager
            .get_global_config_value(config_keys::BROADCAST_BUFFER)
            .unwrap(),
        Some("8".to_string())
    );
}
