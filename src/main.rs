// ==========================================
// 电子送货单同步系统 - 命令行入口
// ==========================================
// 用法: delivery-note-sync [--ship-date YYYYMMDD] [--page-no N] [--db-path PATH]
//                          [--payload-file FILE] [--init-schema] [--legacy-overwrite]
// 退出码: 同步失败时非 0（失败日志已写入 api_log）
// ==========================================

use anyhow::{Context, Result};
use clap::Parser;
use delivery_note_sync::config::sync_config::{parse_page_no, validate_ship_date};
use delivery_note_sync::db::{init_schema, ConnectionProvider, SqliteConnectionProvider};
use delivery_note_sync::importer::{
    AgroMarketApiSource, DeliveryNoteSync, JsonFileSource, PayloadSource,
};
use delivery_note_sync::{logging, MergePolicy, SyncConfig};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "delivery-note-sync")]
#[command(about = "电子送货单同步: 拉取一页送货单并更新台账与日卸货费汇总", long_about = None)]
struct Cli {
    /// 出货日期 (YYYYMMDD)
    #[arg(long)]
    ship_date: Option<String>,

    /// 页码（从 1 开始）
    #[arg(long)]
    page_no: Option<String>,

    /// SQLite 数据库路径
    #[arg(long)]
    db_path: Option<String>,

    /// 开放 API 服务密钥
    #[arg(long, env = "SERVICE_KEY", hide_env_values = true)]
    service_key: Option<String>,

    /// 从保存的 JSON 文件回放，不访问网络
    #[arg(long)]
    payload_file: Option<PathBuf>,

    /// 同步前创建台账表（幂等）
    #[arg(long, default_value_t = false)]
    init_schema: bool,

    /// 旧版行为: 不检查确认状态，总是覆盖
    #[arg(long, default_value_t = false)]
    legacy_overwrite: bool,
}

impl Cli {
    fn into_config(self) -> Result<(SyncConfig, Option<PathBuf>, bool)> {
        let mut config = SyncConfig::from_env()?;

        if let Some(ship_date) = self.ship_date {
            validate_ship_date(&ship_date)?;
            config.ship_date = ship_date;
        }
        if let Some(page_no) = self.page_no {
            config.page_no = parse_page_no(&page_no)?;
        }
        if let Some(db_path) = self.db_path {
            config.db_path = db_path;
        }
        if let Some(service_key) = self.service_key {
            config.service_key = service_key;
        }
        if self.legacy_overwrite {
            config.merge_policy = MergePolicy::AlwaysOverwrite;
        }

        config.validate()?;
        Ok((config, self.payload_file, self.init_schema))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env 不存在时忽略
    let _ = dotenvy::dotenv();
    logging::init();

    let (config, payload_file, init) = Cli::parse().into_config()?;

    tracing::info!("==================================================");
    tracing::info!("{} v{}", delivery_note_sync::APP_NAME, delivery_note_sync::VERSION);
    tracing::info!("==================================================");
    tracing::info!(
        db_path = %config.db_path,
        ship_date = %config.ship_date,
        page_no = config.page_no,
        policy = %config.merge_policy,
        "同步参数"
    );

    let provider = SqliteConnectionProvider::new(config.db_path.clone());
    if init {
        let conn = provider.connect().context("数据库连接失败")?;
        init_schema(&conn).context("台账表初始化失败")?;
        tracing::info!("台账表已就绪");
    }

    let source: Box<dyn PayloadSource> = match payload_file {
        Some(path) => Box::new(JsonFileSource::new(path)),
        None => Box::new(AgroMarketApiSource::new(
            config.api_base_url.clone(),
            config.require_service_key()?,
        )?),
    };

    let sync = DeliveryNoteSync::new(provider).with_policy(config.merge_policy);
    let outcome = sync.run(source.as_ref(), &config.fetch_request()).await?;

    tracing::info!(
        run_id = %outcome.run_id,
        items = outcome.item_count,
        masters = outcome.masters.written,
        details = outcome.details.written,
        frozen = outcome.masters.frozen + outcome.details.frozen,
        aggregated_keys = outcome.aggregated_keys,
        "同步成功"
    );
    Ok(())
}
