// ==========================================
// 工序就绪评估系统 - 应用状态
// ==========================================
// 职责: 管理应用级别的共享状态和API实例
// ==========================================

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::task::JoinHandle;

use crate::api::ReadinessApi;
use crate::app::actions::ReadinessActions;
use crate::config::{ConfigManager, ReadinessConfig};
use crate::db::{ensure_schema, open_sqlite_connection};
use crate::domain::readiness::QueueSnapshot;
use crate::engine::{
    OptionalQueuePublisher, QueueEventPublisher, ReadinessEvaluator,
    ReadinessPropagationService, SignalProviders, WorkCenterQueueManager,
};
use crate::realtime::{LiveQueuePublisher, QueueSubscriber, ReconnectBackoff, SnapshotSource};
use crate::repository::{
    QueueRepository, ReadinessRepository, RoutingRepository, SqliteSignalRepository,
    WorkCenterRepository,
};

/// 应用状态
///
/// 包含API实例、实时推送器和运行参数
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 运行参数（启动时从 config_kv 加载）
    pub config: ReadinessConfig,

    /// 配置管理器
    pub config_manager: Arc<ConfigManager>,

    /// 就绪API
    pub readiness_api: Arc<ReadinessApi>,

    /// 实时队列推送器
    pub publisher: Arc<LiveQueuePublisher>,
}

impl AppState {
    /// 创建新的AppState实例（外部信号读取 SQLite 信号表）
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    ///
    /// # 返回
    /// - Err(String): 初始化错误
    pub fn new(db_path: String) -> Result<Self, String> {
        Self::with_signals(db_path, None)
    }

    /// 创建AppState，可注入外部信号提供者
    ///
    /// # 说明
    /// 1. 打开共享连接并确保表结构存在
    /// 2. 加载运行参数
    /// 3. 组装 Repository → Engine → API
    pub fn with_signals(db_path: String, signals: Option<SignalProviders>) -> Result<Self, String> {
        tracing::info!("初始化AppState，数据库路径: {}", db_path);

        let mut conn =
            open_sqlite_connection(&db_path).map_err(|e| format!("无法打开数据库: {}", e))?;
        ensure_schema(&conn).map_err(|e| format!("数据库表结构初始化失败: {}", e))?;
        crate::perf::install_sqlite_tracing(&mut conn);
        let conn = Arc::new(Mutex::new(conn));

        // ==========================================
        // 配置
        // ==========================================
        let config_manager = Arc::new(
            ConfigManager::from_connection(conn.clone())
                .map_err(|e| format!("无法创建ConfigManager: {}", e))?,
        );
        let config = config_manager
            .load_readiness_config()
            .map_err(|e| format!("加载配置失败: {}", e))?;

        // ==========================================
        // Repository层
        // ==========================================
        let routing_repo = Arc::new(RoutingRepository::from_connection(conn.clone()));
        let work_center_repo = Arc::new(WorkCenterRepository::from_connection(conn.clone()));
        let readiness_repo = Arc::new(ReadinessRepository::from_connection(conn.clone()));
        let queue_repo = Arc::new(QueueRepository::from_connection(conn.clone()));
        let signals = match signals {
            Some(s) => s,
            None => SignalProviders::sqlite(Arc::new(SqliteSignalRepository::from_connection(
                conn.clone(),
            ))),
        };

        // ==========================================
        // Engine层
        // ==========================================
        let publisher = Arc::new(LiveQueuePublisher::new(config.broadcast_buffer));
        let queue_publisher = if config.publish_rebuilds {
            OptionalQueuePublisher::with_publisher(publisher.clone() as Arc<dyn QueueEventPublisher>)
        } else {
            tracing::info!("已关闭队列变更推送");
            OptionalQueuePublisher::none()
        };

        let evaluator = Arc::new(ReadinessEvaluator::new(
            routing_repo.clone(),
            readiness_repo,
            signals,
        ));
        let queue_manager = Arc::new(WorkCenterQueueManager::new(
            work_center_repo,
            routing_repo.clone(),
            queue_repo,
            evaluator.clone(),
            queue_publisher,
        ));
        let propagation = Arc::new(ReadinessPropagationService::new(
            routing_repo,
            evaluator.clone(),
            queue_manager.clone(),
        ));

        // ==========================================
        // API层
        // ==========================================
        let readiness_api = Arc::new(ReadinessApi::new(evaluator, queue_manager, propagation));

        tracing::info!("AppState初始化完成");

        Ok(Self {
            db_path,
            config,
            config_manager,
            readiness_api,
            publisher,
        })
    }

    /// 带会话校验的动作入口
    pub fn actions(&self) -> ReadinessActions {
        ReadinessActions::new(self.readiness_api.clone())
    }

    /// 启动心跳任务（需在 tokio 运行时内调用）
    pub fn start_heartbeat(&self) -> JoinHandle<()> {
        self.publisher.spawn_heartbeat(self.config.heartbeat_interval())
    }

    /// 创建队列订阅客户端（拉取补偿走 ReadinessApi）
    pub fn subscriber(&self, work_center_id: &str) -> QueueSubscriber {
        let source: Arc<dyn SnapshotSource> =
            Arc::new(ApiSnapshotSource::new(self.readiness_api.clone()));
        QueueSubscriber::new(
            &self.publisher,
            work_center_id,
            Some(source),
            ReconnectBackoff::new(self.config.reconnect_base(), self.config.reconnect_max()),
            self.config.heartbeat_timeout(),
        )
    }
}

/// 通过 ReadinessApi 拉取最新队列快照
pub struct ApiSnapshotSource {
    api: Arc<ReadinessApi>,
}

impl ApiSnapshotSource {
    pub fn new(api: Arc<ReadinessApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl SnapshotSource for ApiSnapshotSource {
    async fn fetch_snapshot(&self, work_center_id: &str) -> Result<QueueSnapshot, String> {
        let api = self.api.clone();
        let work_center_id = work_center_id.to_string();
        tokio::task::spawn_blocking(move || api.update_work_center_queue(&work_center_id))
            .await
            .map_err(|e| format!("任务执行失败: {}", e))?
            .map_err(|e| e.to_string())
    }
}

/// 获取默认数据库路径
///
/// - `MES_READINESS_DB_PATH` 环境变量优先
/// - 否则使用用户数据目录
pub fn get_default_db_path() -> String {
    use std::path::PathBuf;

    if let Ok(path) = std::env::var("MES_READINESS_DB_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./mes_readiness.db");

    if let Some(data_dir) = dirs::data_dir() {
        #[cfg(debug_assertions)]
        {
            path = data_dir.join("mes-readiness-dev");
        }

        #[cfg(not(debug_assertions))]
        {
            path = data_dir.join("mes-readiness");
        }

        std::fs::create_dir_all(&path).ok();
        path = path.join("mes_readiness.db");
    }

    path.to_string_lossy().to_string()
}

