// ==========================================
// 电子送货单同步系统 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为
// - 统一 busy_timeout，减少多个同步任务并发写入时的偶发 busy 错误
// - 提供台账表的建表脚本（参考表由外部系统维护，不在此创建）
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 台账表建表脚本（幂等）
///
/// 说明：
/// - 数量类字段以 TEXT 原样保存，卸货费以十进制文本保存，避免浮点误差
/// - flag_erp_apply 由 ERP 回写流程维护，本系统只读
pub const LEDGER_SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS delivery_note_master (
    inven_no TEXT PRIMARY KEY,
    whsal_cd TEXT,
    cmp_cd TEXT,
    ship_type TEXT,
    ship_date TEXT,
    ship_name TEXT,
    ship_contact TEXT,
    ship_dec_no TEXT,
    ship_bank_cd TEXT,
    ship_bank_name TEXT,
    ship_acc_num TEXT,
    ship_acc_dep TEXT,
    trade_type TEXT,
    trade_class TEXT,
    drv_name TEXT,
    drv_call TEXT,
    drv_car_no TEXT,
    drv_rate TEXT,
    drv_bank_name TEXT,
    drv_acc_num TEXT,
    drv_acc_dep TEXT,
    inven_state TEXT,
    regist_date TEXT,
    udt_date TEXT,
    chk_date TEXT
);

CREATE TABLE IF NOT EXISTS delivery_note_detail (
    inven_no TEXT NOT NULL REFERENCES delivery_note_master(inven_no),
    inven_det_no TEXT NOT NULL,
    pro_name TEXT,
    pro_dec_no TEXT,
    good_cd TEXT,
    poj_cd TEXT,
    dan_cd TEXT,
    lv_cd TEXT,
    san_cd TEXT,
    self_good_cd TEXT,
    self_poj_cd TEXT,
    self_dan_cd TEXT,
    self_lv_cd TEXT,
    self_san_cd TEXT,
    eco_cd TEXT,
    unit_quantity TEXT,
    ship_quantity TEXT,
    frt_qy TEXT,
    detail_note TEXT,
    self_good_nm TEXT,
    sug_amt TEXT,
    unloading_cost TEXT NOT NULL DEFAULT '0',
    flag_erp_apply INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (inven_no, inven_det_no)
);

CREATE INDEX IF NOT EXISTS idx_detail_pro_dec_no ON delivery_note_detail(pro_dec_no);
CREATE INDEX IF NOT EXISTS idx_master_ship_date ON delivery_note_master(ship_date);

CREATE TABLE IF NOT EXISTS daily_unloading_cost_total (
    ship_date TEXT NOT NULL,
    chul_code TEXT NOT NULL,
    chcd_code TEXT NOT NULL,
    self_san_cd TEXT NOT NULL,
    self_good_cd TEXT NOT NULL,
    unloading_cost_total TEXT NOT NULL,
    PRIMARY KEY (ship_date, chul_code, chcd_code, self_san_cd, self_good_cd)
);

CREATE TABLE IF NOT EXISTS api_log (
    log_id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id TEXT NOT NULL,
    log_date TEXT NOT NULL,
    log_time TEXT NOT NULL,
    flag_success INTEGER NOT NULL,
    ship_date TEXT NOT NULL,
    page_no INTEGER NOT NULL,
    status TEXT NOT NULL,
    tot_cnt INTEGER NOT NULL,
    response_content TEXT
);
"#;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要“每个连接”单独开启
/// - busy_timeout 需要“每个连接”单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let mut conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    crate::perf::install_sqlite_tracing(&mut conn);
    Ok(conn)
}

/// 创建台账表并写入 schema_version（幂等）
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(LEDGER_SCHEMA_SQL)?;
    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [CURRENT_SCHEMA_VERSION],
    )?;
    Ok(())
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> = conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

// ==========================================
// ConnectionProvider - 连接抽象
// ==========================================
// 用途: 同步核心只依赖此抽象；审计日志需要独立于业务事务的新连接
pub trait ConnectionProvider: Send + Sync {
    /// 打开一个新连接（每次调用返回独立连接）
    fn connect(&self) -> rusqlite::Result<Connection>;
}

/// 基于文件路径的 SQLite 连接提供者
#[derive(Debug, Clone)]
pub struct SqliteConnectionProvider {
    db_path: String,
}

impl SqliteConnectionProvider {
    pub fn new(db_path: impl Into<String>) -> Self {
        Self {
            db_path: db_path.into(),
        }
    }
}

impl ConnectionProvider for SqliteConnectionProvider {
    fn connect(&self) -> rusqlite::Result<Connection> {
        open_sqlite_connection(&self.db_path)
    }
}
