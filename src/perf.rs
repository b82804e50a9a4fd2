// ==========================================
// 电子送货单同步系统 - SQL 性能统计
// ==========================================
// 职责: 单次同步的 SQL 语句数、慢 SQL 数与耗时
// 开关:
// - DELIVERY_NOTE_SYNC_PERF_SQL=1 开启（未设置时仅 Debug 构建开启）
// - DELIVERY_NOTE_SYNC_SLOW_SQL_MS 慢 SQL 阈值（毫秒，默认 200）
// ==========================================

use rusqlite::Connection;
use std::cell::Cell;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

const PERF_SQL_ENV: &str = "DELIVERY_NOTE_SYNC_PERF_SQL";
const SLOW_SQL_ENV: &str = "DELIVERY_NOTE_SYNC_SLOW_SQL_MS";
const DEFAULT_SLOW_SQL_MS: u64 = 200;

static SLOW_SQL_MS: AtomicU64 = AtomicU64::new(DEFAULT_SLOW_SQL_MS);

// 同步在单线程内完成，计数按线程隔离
thread_local! {
    static STATEMENTS: Cell<u64> = const { Cell::new(0) };
    static SLOW_STATEMENTS: Cell<u64> = const { Cell::new(0) };
}

fn bump(counter: &'static std::thread::LocalKey<Cell<u64>>) {
    counter.with(|c| c.set(c.get().saturating_add(1)));
}

fn read(counter: &'static std::thread::LocalKey<Cell<u64>>) -> u64 {
    counter.with(Cell::get)
}

fn flag_enabled(raw: Option<&str>) -> bool {
    match raw {
        Some(v) => matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        None => cfg!(debug_assertions),
    }
}

/// 日志用 SQL 摘要：压缩空白并按字符截断
fn sql_excerpt(sql: &str, max_chars: usize) -> String {
    let flat = sql.split_whitespace().collect::<Vec<_>>().join(" ");
    match flat.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}…", &flat[..idx]),
        None => flat,
    }
}

/// 为新连接挂载语句计数与慢 SQL 日志（未开启时不挂载）
pub fn install_sqlite_tracing(conn: &mut Connection) {
    if !flag_enabled(std::env::var(PERF_SQL_ENV).ok().as_deref()) {
        return;
    }

    let slow_ms = std::env::var(SLOW_SQL_ENV)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(DEFAULT_SLOW_SQL_MS);
    SLOW_SQL_MS.store(slow_ms, Ordering::Relaxed);

    conn.trace(Some(on_statement));
    conn.profile(Some(on_statement_done));
}

fn on_statement(_sql: &str) {
    bump(&STATEMENTS);
}

fn on_statement_done(sql: &str, duration: Duration) {
    let threshold = SLOW_SQL_MS.load(Ordering::Relaxed);
    let ms = duration.as_millis() as u64;
    if threshold == 0 || ms < threshold {
        return;
    }
    bump(&SLOW_STATEMENTS);
    tracing::warn!(
        target: "slow_sql",
        duration_ms = ms,
        sql = %sql_excerpt(sql, 400),
        "慢 SQL"
    );
}

/// 作用域结束时输出本次同步的耗时与 SQL 统计
pub struct PerfGuard {
    op: &'static str,
    start: Instant,
    statements_at_start: u64,
    slow_at_start: u64,
}

impl PerfGuard {
    pub fn new(op: &'static str) -> Self {
        Self {
            op,
            start: Instant::now(),
            statements_at_start: read(&STATEMENTS),
            slow_at_start: read(&SLOW_STATEMENTS),
        }
    }
}

impl Drop for PerfGuard {
    fn drop(&mut self) {
        tracing::info!(
            target: "perf",
            op = self.op,
            elapsed_ms = self.start.elapsed().as_millis() as u64,
            sql_count = read(&STATEMENTS).saturating_sub(self.statements_at_start),
            slow_sql_count = read(&SLOW_STATEMENTS).saturating_sub(self.slow_at_start),
            "同步耗时统计"
        );
    }
}
