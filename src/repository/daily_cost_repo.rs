// ==========================================
// 电子送货单同步系统 - 日卸货费汇总 Repository
// ==========================================
// 职责: 受影响汇总键探查 / 按键读取台账卸货费 / 汇总值覆盖写入
// 说明: 求和在引擎层以 Decimal 完成，避免 SQLite SUM 走浮点
// ==========================================

use crate::domain::daily_cost::{DailyCostKey, DailyCostTotal};
use crate::repository::error::RepositoryResult;
use crate::repository::rate_repo::value_to_text;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};
use rust_decimal::Decimal;
use std::str::FromStr;

/// 单条 IN 查询的送货单号上限
const MAX_ID_PARAMS: usize = 500;

/// 单条查询的汇总键上限（每键 5 个参数）
const MAX_KEY_PARAMS: usize = 100;

/// 台账 × 路由映射的公共 JOIN
const LEDGER_JOIN: &str = r#"
FROM delivery_note_detail d
JOIN delivery_note_master m ON m.inven_no = d.inven_no
JOIN distribution_code_mapping cm ON cm.pro_dec_no = d.pro_dec_no
"#;

/// 台账中某一明细行对汇总的贡献
#[derive(Debug, Clone)]
pub struct CostContribution {
    pub key: DailyCostKey,
    pub unloading_cost: Option<String>,
}

/// 键列可能来自外部系统的表，存储类型不固定（TEXT/INTEGER/REAL 均可能）
fn key_part(row: &Row, idx: usize) -> rusqlite::Result<Option<String>> {
    Ok(value_to_text(row.get::<_, Value>(idx)?))
}

fn read_key(row: &Row) -> rusqlite::Result<Option<DailyCostKey>> {
    let ship_date = key_part(row, 0)?;
    let chul_code = key_part(row, 1)?;
    let chcd_code = key_part(row, 2)?;
    let self_san_cd = key_part(row, 3)?;
    let self_good_cd = key_part(row, 4)?;

    // 任一键为空则该行不参与汇总
    Ok(match (ship_date, chul_code, chcd_code, self_san_cd, self_good_cd) {
        (Some(ship_date), Some(chul_code), Some(chcd_code), Some(self_san_cd), Some(self_good_cd)) => {
            Some(DailyCostKey {
                ship_date,
                chul_code,
                chcd_code,
                self_san_cd,
                self_good_cd,
            })
        }
        _ => None,
    })
}

pub struct DailyCostRepository;

impl DailyCostRepository {
    /// 查找本批次送货单号涉及的汇总键（去重、排序）
    pub fn find_affected_keys(
        conn: &Connection,
        inven_nos: &[String],
    ) -> RepositoryResult<Vec<DailyCostKey>> {
        let mut keys = Vec::new();

        for chunk in inven_nos.chunks(MAX_ID_PARAMS) {
            let placeholders = vec!["?"; chunk.len()].join(",");
            let sql = format!(
                r#"
                SELECT DISTINCT m.ship_date, cm.chul_code, cm.chcd_code, d.self_san_cd, d.self_good_cd
                {LEDGER_JOIN}
                WHERE d.inven_no IN ({placeholders})
                  AND cm.chul_code IS NOT NULL
                  AND cm.chcd_code IS NOT NULL
                "#
            );
            let mut stmt = conn.prepare(&sql)?;
            let mapped = stmt.query_map(params_from_iter(chunk.iter()), read_key)?;
            for key in mapped {
                if let Some(key) = key? {
                    keys.push(key);
                }
            }
        }

        keys.sort();
        keys.dedup();
        Ok(keys)
    }

    /// 读取全台账中属于指定汇总键的所有明细卸货费
    pub fn fetch_contributions(
        conn: &Connection,
        keys: &[DailyCostKey],
    ) -> RepositoryResult<Vec<CostContribution>> {
        let mut out = Vec::new();

        for chunk in keys.chunks(MAX_KEY_PARAMS) {
            let tuples = vec!["(?,?,?,?,?)"; chunk.len()].join(",");
            let sql = format!(
                r#"
                SELECT m.ship_date, cm.chul_code, cm.chcd_code, d.self_san_cd, d.self_good_cd,
                       d.unloading_cost
                {LEDGER_JOIN}
                WHERE (m.ship_date, cm.chul_code, cm.chcd_code, d.self_san_cd, d.self_good_cd)
                      IN (VALUES {tuples})
                "#
            );
            let params: Vec<&String> = chunk
                .iter()
                .flat_map(|k| {
                    [
                        &k.ship_date,
                        &k.chul_code,
                        &k.chcd_code,
                        &k.self_san_cd,
                        &k.self_good_cd,
                    ]
                })
                .collect();

            let mut stmt = conn.prepare(&sql)?;
            let mapped = stmt.query_map(params_from_iter(params), |row| {
                let key = read_key(row)?;
                let cost: Value = row.get(5)?;
                Ok(key.map(|key| CostContribution {
                    key,
                    unloading_cost: value_to_text(cost),
                }))
            })?;
            for item in mapped {
                if let Some(item) = item? {
                    out.push(item);
                }
            }
        }

        Ok(out)
    }

    /// 覆盖写入汇总值（无确认门控，汇总值始终为派生数据）
    pub fn upsert_totals_tx(conn: &Connection, totals: &[DailyCostTotal]) -> RepositoryResult<usize> {
        if totals.is_empty() {
            return Ok(0);
        }

        let mut stmt = conn.prepare(
            r#"
            INSERT INTO daily_unloading_cost_total (
                ship_date, chul_code, chcd_code, self_san_cd, self_good_cd, unloading_cost_total
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(ship_date, chul_code, chcd_code, self_san_cd, self_good_cd) DO UPDATE SET
                unloading_cost_total = excluded.unloading_cost_total
            "#,
        )?;

        let mut count = 0;
        for total in totals {
            stmt.execute(params![
                total.key.ship_date,
                total.key.chul_code,
                total.key.chcd_code,
                total.key.self_san_cd,
                total.key.self_good_cd,
                total.unloading_cost_total.normalize().to_string(),
            ])?;
            count += 1;
        }
        Ok(count)
    }

    /// 读取全部汇总值（按键排序）
    pub fn list_totals(conn: &Connection) -> RepositoryResult<Vec<DailyCostTotal>> {
        let mut stmt = conn.prepare(
            r#"
            SELECT ship_date, chul_code, chcd_code, self_san_cd, self_good_cd, unloading_cost_total
            FROM daily_unloading_cost_total
            ORDER BY ship_date, chul_code, chcd_code, self_san_cd, self_good_cd
            "#,
        )?;
        let rows = stmt.query_map([], |row| {
            let raw: String = row.get(5)?;
            Ok(DailyCostTotal {
                key: DailyCostKey {
                    ship_date: row.get(0)?,
                    chul_code: row.get(1)?,
                    chcd_code: row.get(2)?,
                    self_san_cd: row.get(3)?,
                    self_good_cd: row.get(4)?,
                },
                unloading_cost_total: Decimal::from_str(raw.trim()).unwrap_or(Decimal::ZERO),
            })
        })?;

        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}
