// ==========================================
// 电子送货单同步系统 - 卸货费计算引擎
// ==========================================
// 职责: 为本批次明细行回填卸货费
// 流程:
// 1. 收集归一化后的品目代码；为空则全部记 0 并返回（不解析费率表结构）
// 2. 一次批量查询取出相关费率行（禁止逐行查询）
// 3. 构建 (品目, 单位数量) → 费率 映射；重复键后写覆盖前写
// 4. 卸货费 = 费率 × 出货数量（Decimal 运算），未命中按费率 0
// 红线: 只回填内存中的明细，不落库
// ==========================================

use crate::domain::delivery_note::ShipmentDetailLine;
use crate::engine::schema_resolver::RateSchemaCache;
use crate::importer::error::SyncResult;
use crate::importer::field_normalizer::{normalize_good_code, normalize_unit_quantity, to_decimal};
use crate::repository::rate_repo::RateRepository;
use rusqlite::Connection;
use rust_decimal::Decimal;
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, info, warn};

/// 费率查找键
pub type RateKey = (Option<String>, Option<String>);

/// 计算统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CostLookupStats {
    pub lines: usize,
    pub matched: usize,
    pub missed: usize,
}

/// 由费率行构建查找表（后写覆盖前写）
pub fn build_rate_map<I>(rows: I) -> HashMap<RateKey, Decimal>
where
    I: IntoIterator<Item = (Option<String>, Option<String>, Option<String>)>,
{
    let mut map = HashMap::new();
    for (good_code, unit_quantity, rate_amount) in rows {
        let key = (
            normalize_good_code(good_code.as_deref()),
            normalize_unit_quantity(unit_quantity.as_deref()),
        );
        map.insert(key, to_decimal(rate_amount.as_deref()));
    }
    map
}

/// 明细行的查找键
pub fn line_key(line: &ShipmentDetailLine) -> RateKey {
    (
        normalize_good_code(line.self_good_cd.as_deref()),
        normalize_unit_quantity(line.unit_quantity.as_deref()),
    )
}

/// 按查找表回填卸货费
pub fn apply_rates(
    lines: &mut [ShipmentDetailLine],
    rates: &HashMap<RateKey, Decimal>,
) -> CostLookupStats {
    let mut stats = CostLookupStats {
        lines: lines.len(),
        ..Default::default()
    };

    for line in lines.iter_mut() {
        let rate = match rates.get(&line_key(line)) {
            Some(rate) => {
                stats.matched += 1;
                *rate
            }
            None => {
                stats.missed += 1;
                Decimal::ZERO
            }
        };
        let ship_quantity = to_decimal(line.ship_quantity.as_deref());

        line.unloading_cost = match rate.checked_mul(ship_quantity) {
            Some(cost) => cost,
            None => {
                warn!(
                    inven_no = %line.inven_no,
                    inven_det_no = %line.inven_det_no,
                    %rate,
                    %ship_quantity,
                    "卸货费计算溢出，按 0 处理"
                );
                Decimal::ZERO
            }
        };
    }

    stats
}

// ==========================================
// CostLookupEngine
// ==========================================
pub struct CostLookupEngine<'a> {
    schema_cache: &'a RateSchemaCache,
}

impl<'a> CostLookupEngine<'a> {
    pub fn new(schema_cache: &'a RateSchemaCache) -> Self {
        Self { schema_cache }
    }

    /// 为明细行回填卸货费
    ///
    /// # 返回
    /// - Err(SchemaUnresolved): 费率表结构无法解析（配置错误，致命）
    /// - Err(Storage): 查询失败
    pub fn populate(
        &self,
        conn: &Connection,
        lines: &mut [ShipmentDetailLine],
    ) -> SyncResult<CostLookupStats> {
        if lines.is_empty() {
            return Ok(CostLookupStats::default());
        }

        let goods: BTreeSet<String> = lines
            .iter()
            .filter_map(|l| normalize_good_code(l.self_good_cd.as_deref()))
            .collect();

        if goods.is_empty() {
            for line in lines.iter_mut() {
                line.unloading_cost = Decimal::ZERO;
            }
            debug!(lines = lines.len(), "明细无品目代码，卸货费全部记 0");
            return Ok(CostLookupStats {
                lines: lines.len(),
                matched: 0,
                missed: lines.len(),
            });
        }

        let schema = self.schema_cache.get_or_resolve(conn)?;
        let goods: Vec<String> = goods.into_iter().collect();
        let rows = RateRepository::fetch_by_good_codes(conn, &schema, &goods)?;
        let rate_rows = rows.len();

        let rates = build_rate_map(
            rows.into_iter()
                .map(|r| (r.good_code, r.unit_quantity, r.rate_amount)),
        );
        let stats = apply_rates(lines, &rates);

        info!(
            goods = goods.len(),
            rate_rows,
            matched = stats.matched,
            missed = stats.missed,
            "卸货费计算完成"
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::rate::RateSchema;
    use std::str::FromStr;

    fn line(good: Option<&str>, qty: Option<&str>, shipped: Option<&str>) -> ShipmentDetailLine {
        ShipmentDetailLine {
            inven_no: "INV".to_string(),
            inven_det_no: "1".to_string(),
            self_good_cd: good.map(String::from),
            unit_quantity: qty.map(String::from),
            ship_quantity: shipped.map(String::from),
            ..Default::default()
        }
    }

    fn rate_row(good: &str, qty: &str, rate: &str) -> (Option<String>, Option<String>, Option<String>) {
        (Some(good.to_string()), Some(qty.to_string()), Some(rate.to_string()))
    }

    #[test]
    fn test_cost_exact_decimal() {
        let rates = build_rate_map(vec![rate_row("A1", "5", "120")]);
        let mut lines = vec![line(Some("A1"), Some("5.0"), Some("3"))];

        let stats = apply_rates(&mut lines, &rates);

        assert_eq!(stats.matched, 1);
        assert_eq!(lines[0].unloading_cost, Decimal::from(360));
    }

    #[test]
    fn test_fractional_cost_has_no_float_drift() {
        let rates = build_rate_map(vec![rate_row("A1", "5", "0.1")]);
        let mut lines = vec![line(Some("A1"), Some("5"), Some("3"))];

        apply_rates(&mut lines, &rates);

        assert_eq!(lines[0].unloading_cost, Decimal::from_str("0.3").unwrap());
    }

    #[test]
    fn test_missing_rate_falls_back_to_zero() {
        let rates = build_rate_map(vec![rate_row("A1", "5", "120")]);
        let mut lines = vec![
            line(Some("A1"), Some("10"), Some("3")),
            line(Some("ZZ"), Some("5"), Some("3")),
            line(None, None, Some("3")),
        ];

        let stats = apply_rates(&mut lines, &rates);

        assert_eq!(stats.missed, 3);
        assert!(lines.iter().all(|l| l.unloading_cost == Decimal::ZERO));
    }

    #[test]
    fn test_duplicate_rate_key_last_wins() {
        let rates = build_rate_map(vec![
            rate_row("A1", "5.00", "100"),
            rate_row(" A1 ", "5", "150"),
        ]);
        assert_eq!(rates.len(), 1);
        assert_eq!(
            rates.get(&(Some("A1".to_string()), Some("5".to_string()))),
            Some(&Decimal::from(150))
        );
    }

    #[test]
    fn test_bad_ship_quantity_gives_zero() {
        let rates = build_rate_map(vec![rate_row("A1", "5", "120")]);
        let mut lines = vec![line(Some("A1"), Some("5"), Some("three"))];

        apply_rates(&mut lines, &rates);

        assert_eq!(lines[0].unloading_cost, Decimal::ZERO);
    }

    #[test]
    fn test_no_goods_skips_schema_resolution() {
        // 无费率表也不报错：没有品目就不需要解析结构
        let conn = Connection::open_in_memory().unwrap();
        let cache = RateSchemaCache::new();
        let engine = CostLookupEngine::new(&cache);
        let mut lines = vec![line(None, Some("5"), Some("3")), line(Some("  "), None, None)];
        lines[0].unloading_cost = Decimal::from(9);

        let stats = engine.populate(&conn, &mut lines).unwrap();

        assert_eq!(stats.missed, 2);
        assert!(cache.cached().is_none());
        assert!(lines.iter().all(|l| l.unloading_cost == Decimal::ZERO));
    }

    #[test]
    fn test_populate_from_reference_table() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            r#"
            CREATE TABLE unloading_rate_code (SELF_GOOD_CD TEXT, UNIT_QTY TEXT, HACA_AMNT TEXT);
            INSERT INTO unloading_rate_code VALUES ('A1', '5', '120');
            INSERT INTO unloading_rate_code VALUES ('B2', '10.0', '80.5');
            "#,
        )
        .unwrap();
        let cache = RateSchemaCache::new();
        let engine = CostLookupEngine::new(&cache);
        let mut lines = vec![
            line(Some("A1"), Some("5.0"), Some("3")),
            line(Some("B2"), Some("10"), Some("2")),
        ];

        let stats = engine.populate(&conn, &mut lines).unwrap();

        assert_eq!(stats.matched, 2);
        assert_eq!(lines[0].unloading_cost, Decimal::from(360));
        assert_eq!(lines[1].unloading_cost, Decimal::from(161));
    }

    #[test]
    fn test_preset_schema_skips_column_probe() {
        // 列名无法被自动识别，只能依赖预置结构
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            r#"
            CREATE TABLE unloading_rate_code (col_a TEXT, col_b TEXT, col_c TEXT);
            INSERT INTO unloading_rate_code VALUES ('A1', '5', '120');
            "#,
        )
        .unwrap();
        let cache = RateSchemaCache::with_schema(RateSchema {
            table: "unloading_rate_code".to_string(),
            good_code_column: "col_a".to_string(),
            unit_quantity_column: "col_b".to_string(),
            rate_amount_column: "col_c".to_string(),
        });
        let mut lines = vec![line(Some("A1"), Some("5"), Some("2"))];

        let stats = CostLookupEngine::new(&cache).populate(&conn, &mut lines).unwrap();

        assert_eq!(stats.matched, 1);
        assert_eq!(lines[0].unloading_cost, Decimal::from(240));
    }
}
