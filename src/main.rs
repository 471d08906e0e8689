// ==========================================
// 工序就绪评估系统 - 运维入口
// ==========================================
// 用法:
//   mes-readiness [db_path]           全量重建所有工作中心队列后退出
//   mes-readiness --watch [db_path]   重建后保持心跳推送，Ctrl-C 退出
// ==========================================

use anyhow::{anyhow, bail, Context};
use mes_readiness::app::{get_default_db_path, AppState};
use mes_readiness::{i18n, logging};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut watch = false;
    let mut db_path: Option<String> = None;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--watch" | "-w" => watch = true,
            other => db_path = Some(other.to_string()),
        }
    }

    match std::env::var("MES_READINESS_LOG_FORMAT")
        .ok()
        .and_then(|v| logging::LogFormat::parse(&v))
    {
        Some(format) => logging::init_with_format(format),
        None => logging::init(),
    }

    tracing::info!("==================================================");
    tracing::info!("{} v{}", mes_readiness::APP_NAME, mes_readiness::VERSION);
    tracing::info!("==================================================");

    let db_path = db_path.unwrap_or_else(get_default_db_path);
    let state = AppState::new(db_path.clone())
        .map_err(|e| anyhow!(e))
        .with_context(|| format!("初始化失败: db_path={}", db_path))?;

    let api = state.readiness_api.clone();
    let summary = tokio::task::spawn_blocking(move || api.rebuild_all_queues())
        .await
        .context("全量重建任务异常退出")?
        .context("全量重建失败")?;

    for snapshot in &summary.rebuilt {
        println!(
            "{}\tqueued={}\tblocked={}\tactive={}\tcompleted_today={}",
            snapshot.work_center_id,
            snapshot.stats.queue_length,
            snapshot.blocked_operations.len(),
            snapshot.stats.active_operations,
            snapshot.stats.completed_today
        );
        for blocked in &snapshot.blocked_operations {
            println!(
                "  {}\t{}",
                blocked.operation_id,
                i18n::describe_readiness(&blocked.readiness)
            );
        }
    }
    for (work_center_id, error) in &summary.failed {
        eprintln!("{}\tFAILED\t{}", work_center_id, error);
    }

    if watch {
        let heartbeat = state.start_heartbeat();
        tracing::info!(
            interval_secs = state.config.heartbeat_interval_secs,
            "心跳推送已启动，按 Ctrl-C 退出"
        );
        tokio::signal::ctrl_c().await.context("等待 Ctrl-C 失败")?;
        heartbeat.abort();
    }

    if !summary.failed.is_empty() {
        bail!("{} 个工作中心队列重建失败", summary.failed.len());
    }
    Ok(())
}
