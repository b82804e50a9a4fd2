// ==========================================
// 电子送货单同步系统 - 日卸货费汇总引擎
// ==========================================
// 职责: 本批次涉及的汇总键（写入前 ∪ 写入后）→ 全台账重算 → 覆盖写入
// 红线:
// - 每个受影响的键都按全台账重算，不做增量累加
// - 写入前的键必须在同一事务内、upsert 之前取得；明细移走后旧键重算为 0
// - 求和使用 Decimal，无法解析的卸货费按 0 计
// - 无受影响键时不写任何汇总行（与“合计为 0”区分）
// ==========================================

use crate::domain::daily_cost::{DailyCostKey, DailyCostTotal};
use crate::importer::error::SyncResult;
use crate::importer::field_normalizer::to_decimal;
use crate::repository::daily_cost_repo::{CostContribution, DailyCostRepository};
use rusqlite::Connection;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use tracing::{info, warn};

/// 按键求和（所有请求的键都会出现在结果中，即使合计为 0）
pub fn sum_contributions(
    keys: &[DailyCostKey],
    contributions: &[CostContribution],
) -> Vec<DailyCostTotal> {
    let mut sums: BTreeMap<&DailyCostKey, Decimal> =
        keys.iter().map(|k| (k, Decimal::ZERO)).collect();

    for c in contributions {
        let Some(sum) = sums.get_mut(&c.key) else {
            continue;
        };
        let cost = to_decimal(c.unloading_cost.as_deref());
        *sum = match sum.checked_add(cost) {
            Some(v) => v,
            None => {
                warn!(key = ?c.key, "卸货费合计溢出，忽略该明细");
                *sum
            }
        };
    }

    sums.into_iter()
        .map(|(key, total)| DailyCostTotal {
            key: key.clone(),
            unloading_cost_total: total,
        })
        .collect()
}

/// 合并两组键（去重、排序）
fn merge_keys(mut prior: Vec<DailyCostKey>, current: Vec<DailyCostKey>) -> Vec<DailyCostKey> {
    prior.extend(current);
    prior.sort();
    prior.dedup();
    prior
}

pub struct DailyAggregationEngine;

impl DailyAggregationEngine {
    /// 写入前快照: 这些送货单当前在台账中所属的汇总键
    pub fn snapshot_keys(conn: &Connection, inven_nos: &[String]) -> SyncResult<Vec<DailyCostKey>> {
        if inven_nos.is_empty() {
            return Ok(Vec::new());
        }
        Ok(DailyCostRepository::find_affected_keys(conn, inven_nos)?)
    }

    /// 重算本批次涉及的日汇总
    ///
    /// # 参数
    /// - inven_nos: 本批次涉及的送货单号（去重、排序）
    /// - prior_keys: upsert 前由 snapshot_keys 取得的键
    ///
    /// # 返回
    /// 写入的汇总行数
    pub fn refresh(
        conn: &Connection,
        inven_nos: &[String],
        prior_keys: Vec<DailyCostKey>,
    ) -> SyncResult<usize> {
        if inven_nos.is_empty() && prior_keys.is_empty() {
            info!("本批次无送货单，跳过日汇总");
            return Ok(0);
        }

        let current = DailyCostRepository::find_affected_keys(conn, inven_nos)?;
        let prior_count = prior_keys.len();
        let keys = merge_keys(prior_keys, current);
        if keys.is_empty() {
            info!(
                inven_nos = inven_nos.len(),
                "无受影响汇总键（缺少路由映射或键字段为空），跳过日汇总"
            );
            return Ok(0);
        }

        let contributions = DailyCostRepository::fetch_contributions(conn, &keys)?;
        let totals = sum_contributions(&keys, &contributions);
        let written = DailyCostRepository::upsert_totals_tx(conn, &totals)?;

        info!(
            keys = keys.len(),
            prior_keys = prior_count,
            contributions = contributions.len(),
            written,
            "日卸货费汇总完成"
        );
        Ok(written)
    }
}
