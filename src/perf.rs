// ==========================================
// 工序就绪评估系统 - 性能统计
// ==========================================
// SQLite profile 回调 + 作用域计时 Guard
// 开关:
// - MES_READINESS_PERF_SQL=1 强制开启（Debug 默认开启，Release 默认关闭）
// - MES_READINESS_SLOW_SQL_MS=50 慢 SQL 阈值（毫秒）
// ==========================================

use rusqlite::Connection;
use std::cell::Cell;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

static PERF_SQL_ENABLED: AtomicBool = AtomicBool::new(false);
static SLOW_SQL_THRESHOLD_MS: AtomicU64 = AtomicU64::new(0);

thread_local! {
    static PERF_DEPTH: Cell<u32> = const { Cell::new(0) };
    static SQL_COUNT: Cell<u64> = const { Cell::new(0) };
    static SLOW_SQL_COUNT: Cell<u64> = const { Cell::new(0) };
}

/// SQL 统计开关
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PerfSettings {
    pub sql_enabled: bool,
    pub slow_sql_ms: u64,
}

impl PerfSettings {
    /// 从环境变量读取
    pub fn from_env() -> Self {
        let sql_enabled = match std::env::var("MES_READINESS_PERF_SQL") {
            Ok(v) => is_true(&v),
            Err(_) => cfg!(debug_assertions),
        };
        let slow_sql_ms = std::env::var("MES_READINESS_SLOW_SQL_MS")
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
            .unwrap_or(if cfg!(debug_assertions) { 50 } else { 200 });
        Self {
            sql_enabled,
            slow_sql_ms,
        }
    }
}

fn is_true(v: &str) -> bool {
    matches!(
        v.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "y" | "on"
    )
}

fn truncate_sql(sql: &str, max_len: usize) -> String {
    let s = sql.trim().replace('\n', " ");
    if s.len() <= max_len {
        return s;
    }
    let mut end = max_len;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &s[..end])
}

/// 按环境变量安装 SQLite 语句统计
pub fn install_sqlite_tracing(conn: &mut Connection) {
    install_sqlite_tracing_with(conn, PerfSettings::from_env());
}

/// 按给定开关安装 SQLite 语句 profile 回调
///
/// 旧式 trace 与 profile 回调共用 SQLite 的 mTrace 标志位，后装者会清掉先装者，
/// 因此只安装 profile，语句计数与慢 SQL 都在其中完成。
pub fn install_sqlite_tracing_with(conn: &mut Connection, settings: PerfSettings) {
    PERF_SQL_ENABLED.store(settings.sql_enabled, Ordering::Relaxed);
    conn.trace(None);

    if !settings.sql_enabled {
        conn.profile(None);
        return;
    }

    SLOW_SQL_THRESHOLD_MS.store(settings.slow_sql_ms, Ordering::Relaxed);
    conn.profile(Some(sql_profile_callback));
}

// 每条语句执行结束时回调一次
fn sql_profile_callback(sql: &str, duration: Duration) {
    if !PERF_SQL_ENABLED.load(Ordering::Relaxed) {
        return;
    }
    let active = PERF_DEPTH.with(|d| d.get() > 0);
    if active {
        SQL_COUNT.with(|c| c.set(c.get().saturating_add(1)));
    }

    let ms = duration.as_millis() as u64;
    let threshold = SLOW_SQL_THRESHOLD_MS.load(Ordering::Relaxed);
    if threshold == 0 || ms < threshold {
        return;
    }

    tracing::warn!(
        target: "slow_sql",
        duration_ms = ms,
        sql = %truncate_sql(sql, 420),
        "slow sql"
    );
    if active {
        SLOW_SQL_COUNT.with(|c| c.set(c.get().saturating_add(1)));
    }
}

/// 性能统计 Guard：记录 elapsed_ms + SQL 语句数 + 慢 SQL 数
///
/// ```ignore
/// let _perf = mes_readiness::perf::PerfGuard::new("rebuild_queue");
/// ```
pub struct PerfGuard {
    op: &'static str,
    start: Instant,
    sql_start: u64,
    slow_sql_start: u64,
}

impl PerfGuard {
    pub fn new(op: &'static str) -> Self {
        PERF_DEPTH.with(|d| d.set(d.get().saturating_add(1)));
        Self {
            op,
            start: Instant::now(),
            sql_start: SQL_COUNT.with(|c| c.get()),
            slow_sql_start: SLOW_SQL_COUNT.with(|c| c.get()),
        }
    }

    /// 当前作用域内已执行的 SQL 语句数
    pub fn sql_count(&self) -> u64 {
        SQL_COUNT.with(|c| c.get()).saturating_sub(self.sql_start)
    }
}

impl Drop for PerfGuard {
    fn drop(&mut self) {
        let elapsed_ms = self.start.elapsed().as_millis() as u64;
        let sql_count = self.sql_count();
        let slow_sql_count = SLOW_SQL_COUNT
            .with(|c| c.get())
            .saturating_sub(self.slow_sql_start);

        tracing::info!(
            target: "perf",
            op = self.op,
            elapsed_ms,
            sql_count,
            slow_sql_count,
            "done"
        );

        PERF_DEPTH.with(|d| d.set(d.get().saturating_sub(1)));
    }
}
