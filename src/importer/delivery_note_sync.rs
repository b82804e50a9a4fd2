// ==========================================
// 电子送货单同步系统 - 同步主流程
// ==========================================
// 流程: 获取 → 信封解析 → 记录构建 → 卸货费计算 → 主表/明细 upsert → 日汇总 → 审计日志
// 事务: 卸货费计算 ~ 成功日志 在同一个 IMMEDIATE 事务内；任一步失败整体回滚
// 红线:
// - 每次调用恰好一条 api_log（失败日志用独立连接写入，不随业务事务回滚）
// - 已确认的主表/已回写 ERP 的明细不得被覆盖（门控在 SQL 内完成）
// ==========================================

use crate::config::sync_config::validate_request;
use crate::db::ConnectionProvider;
use crate::domain::api_log::{ApiRunLog, RunStatus};
use crate::domain::delivery_note::DeliveryNoteBatch;
use crate::domain::types::MergePolicy;
use crate::engine::cost_lookup::{CostLookupEngine, CostLookupStats};
use crate::engine::daily_aggregation::DailyAggregationEngine;
use crate::engine::schema_resolver::RateSchemaCache;
use crate::importer::audit_recorder::AuditRecorder;
use crate::importer::envelope::pick_items;
use crate::importer::error::{FetchError, SyncError, SyncResult};
use crate::importer::payload_source::{FetchRequest, PayloadSource};
use crate::importer::record_builder::RecordBuilder;
use crate::perf::PerfGuard;
use crate::repository::delivery_note_repo::{DeliveryNoteRepository, UpsertStats};
use crate::repository::error::RepositoryError;
use rusqlite::TransactionBehavior;
use serde_json::Value;
use std::time::Instant;
use tracing::{error, info, instrument, warn, Span};
use uuid::Uuid;

/// 一次同步的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOutcome {
    pub run_id: String,
    pub ship_date: String,
    pub page_no: u32,
    /// 响应中的送货单条目数（写入 api_log.tot_cnt）
    pub item_count: usize,
    pub masters: UpsertStats,
    pub details: UpsertStats,
    pub cost: CostLookupStats,
    /// 重算的日汇总行数
    pub aggregated_keys: usize,
    /// 缺少主键而跳过的条目数
    pub skipped: usize,
    pub elapsed_ms: u64,
}

// ==========================================
// DeliveryNoteSync
// ==========================================
pub struct DeliveryNoteSync<'c, P: ConnectionProvider> {
    provider: P,
    schema_cache: &'c RateSchemaCache,
    policy: MergePolicy,
}

impl<P: ConnectionProvider> DeliveryNoteSync<'static, P> {
    /// 使用进程级费率表结构缓存
    pub fn new(provider: P) -> Self {
        Self::with_cache(provider, RateSchemaCache::global())
    }
}

impl<'c, P: ConnectionProvider> DeliveryNoteSync<'c, P> {
    pub fn with_cache(provider: P, schema_cache: &'c RateSchemaCache) -> Self {
        Self {
            provider,
            schema_cache,
            policy: MergePolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: MergePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// 获取并同步一页送货单
    ///
    /// # 返回
    /// - Ok(SyncOutcome): 已提交
    /// - Err(SyncError): 失败（失败日志已写入）
    #[instrument(skip(self, source), fields(run_id, ship_date = %request.ship_date, page_no = request.page_no))]
    pub async fn run<S>(&self, source: &S, request: &FetchRequest) -> SyncResult<SyncOutcome>
    where
        S: PayloadSource + ?Sized,
    {
        let run_id = new_run_id();
        Span::current().record("run_id", run_id.as_str());
        info!(source = %source.describe(), policy = %self.policy, "开始同步送货单");

        if let Err(e) = validate_request(request) {
            return Err(self.fail(&run_id, request, e, None));
        }

        let payload = match source.fetch(request).await {
            Ok(payload) => payload,
            Err(e) => {
                let content = fetch_failure_content(&e);
                return Err(self.fail(&run_id, request, e.into(), Some(content)));
            }
        };

        self.ingest_with_run_id(&run_id, request, &payload)
    }

    /// 同步已获取的响应（不经过数据源）
    #[instrument(skip(self, payload), fields(run_id, ship_date = %request.ship_date, page_no = request.page_no))]
    pub fn ingest_payload(&self, request: &FetchRequest, payload: &Value) -> SyncResult<SyncOutcome> {
        let run_id = new_run_id();
        Span::current().record("run_id", run_id.as_str());

        if let Err(e) = validate_request(request) {
            return Err(self.fail(&run_id, request, e, None));
        }
        self.ingest_with_run_id(&run_id, request, payload)
    }

    fn ingest_with_run_id(
        &self,
        run_id: &str,
        request: &FetchRequest,
        payload: &Value,
    ) -> SyncResult<SyncOutcome> {
        let _perf = PerfGuard::new("delivery_note_sync");
        let start = Instant::now();
        let raw_text = payload.to_string();

        // === 步骤 1: 信封解析 ===
        let items = pick_items(payload);
        if items.is_empty() {
            let err = SyncError::EmptyResult {
                ship_date: request.ship_date.clone(),
                page_no: request.page_no,
            };
            return Err(self.fail(run_id, request, err, Some(raw_text)));
        }
        let item_count = items.len();

        // === 步骤 2: 记录构建 ===
        let mut batch = RecordBuilder.build_batch(&items);
        info!(
            items = item_count,
            masters = batch.masters.len(),
            details = batch.details.len(),
            skipped = batch.skipped,
            "送货单记录构建完成"
        );

        // === 步骤 3~6: 事务内处理 ===
        match self.commit_batch(run_id, request, item_count, &raw_text, &mut batch) {
            Ok((masters, details, cost, aggregated_keys)) => {
                let outcome = SyncOutcome {
                    run_id: run_id.to_string(),
                    ship_date: request.ship_date.clone(),
                    page_no: request.page_no,
                    item_count,
                    masters,
                    details,
                    cost,
                    aggregated_keys,
                    skipped: batch.skipped,
                    elapsed_ms: start.elapsed().as_millis() as u64,
                };
                info!(
                    masters_written = outcome.masters.written,
                    masters_frozen = outcome.masters.frozen,
                    details_written = outcome.details.written,
                    details_frozen = outcome.details.frozen,
                    aggregated_keys = outcome.aggregated_keys,
                    elapsed_ms = outcome.elapsed_ms,
                    "送货单同步完成"
                );
                Ok(outcome)
            }
            Err(e) => Err(self.fail(run_id, request, e, None)),
        }
    }

    fn commit_batch(
        &self,
        run_id: &str,
        request: &FetchRequest,
        item_count: usize,
        raw_text: &str,
        batch: &mut DeliveryNoteBatch,
    ) -> SyncResult<(UpsertStats, UpsertStats, CostLookupStats, usize)> {
        let mut conn = self
            .provider
            .connect()
            .map_err(|e| RepositoryError::DatabaseConnectionError(e.to_string()))?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        // === 步骤 3: 卸货费计算（含费率表结构解析，先于任何写入） ===
        let cost = CostLookupEngine::new(self.schema_cache).populate(&tx, &mut batch.details)?;

        // === 步骤 4: 主表/明细 upsert（先记录写入前的汇总键） ===
        let touched = batch.touched_inven_nos();
        let prior_keys = DailyAggregationEngine::snapshot_keys(&tx, &touched)?;
        let masters = DeliveryNoteRepository::upsert_masters_tx(&tx, &batch.masters, self.policy)?;
        let details = DeliveryNoteRepository::upsert_details_tx(&tx, &batch.details, self.policy)?;
        if masters.frozen > 0 || details.frozen > 0 {
            info!(
                masters_frozen = masters.frozen,
                details_frozen = details.frozen,
                "已确认记录保持不变"
            );
        }

        // === 步骤 5: 日汇总重算 ===
        let aggregated_keys = DailyAggregationEngine::refresh(&tx, &touched, prior_keys)?;

        // === 步骤 6: 成功日志（随事务提交） ===
        let log = ApiRunLog::new(
            run_id,
            RunStatus::Success,
            request.ship_date.as_str(),
            request.page_no,
            item_count,
            raw_text,
        );
        AuditRecorder::record_in_tx(&tx, &log)?;

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        Ok((masters, details, cost, aggregated_keys))
    }

    /// 记录失败并原样返回错误
    ///
    /// content 为空时以错误文本作为 response_content
    fn fail(
        &self,
        run_id: &str,
        request: &FetchRequest,
        err: SyncError,
        content: Option<String>,
    ) -> SyncError {
        if err.is_configuration() {
            error!(error = %err, "配置错误，同步中止");
        } else if matches!(err, SyncError::EmptyResult { .. }) {
            warn!(error = %err, "响应为空，同步中止");
        } else {
            error!(error = %err, "送货单同步失败");
        }

        let content = content.unwrap_or_else(|| err.to_string());
        let log = ApiRunLog::new(
            run_id,
            RunStatus::Fail,
            request.ship_date.as_str(),
            request.page_no,
            0,
            &content,
        );
        AuditRecorder::record_independent(&self.provider, &log);
        err
    }
}

fn new_run_id() -> String {
    Uuid::new_v4().to_string()
}

/// 获取失败时写入审计日志的内容（解码失败保留原始响应片段）
fn fetch_failure_content(err: &FetchError) -> String {
    match err {
        FetchError::Decode {
            message,
            body_excerpt,
        } => format!("{}\n{}", message, body_excerpt),
        other => other.to_string(),
    }
}
