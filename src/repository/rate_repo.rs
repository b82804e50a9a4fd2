// ==========================================
// 电子送货单同步系统 - 卸货费率参考表 Repository
// ==========================================
// 职责: 参考表列名探查 + 按品目批量读取费率
// 红线: 参考表只读；禁止逐行查询
// ==========================================

use crate::domain::rate::{RateRow, RateSchema};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};

/// 参考表默认表名
pub const RATE_TABLE: &str = "unloading_rate_code";

/// 单条 IN 查询的参数上限（低于 SQLite 变量上限）
const MAX_IN_PARAMS: usize = 500;

/// 标识符加双引号转义（列名来自探查结果，仍统一转义）
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// SQLite 动态类型值 → 文本
///
/// 说明：INTEGER/REAL 以十进制文本表示，BLOB 视为缺失
pub fn value_to_text(value: Value) -> Option<String> {
    match value {
        Value::Null | Value::Blob(_) => None,
        Value::Integer(i) => Some(i.to_string()),
        Value::Real(f) => Some(f.to_string()),
        Value::Text(s) => Some(s),
    }
}

pub struct RateRepository;

impl RateRepository {
    /// 列出参考表的实际列名
    pub fn list_columns(conn: &Connection, table: &str) -> RepositoryResult<Vec<String>> {
        // pragma_table_info 的参数不能稳定地使用绑定变量，按字符串字面量转义拼接
        let sql = format!(
            "SELECT name FROM pragma_table_info('{}')",
            table.replace('\'', "''")
        );
        let mut stmt = conn.prepare(&sql)?;
        let columns = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        if columns.is_empty() {
            return Err(RepositoryError::TableNotFound {
                table: table.to_string(),
            });
        }
        Ok(columns)
    }

    /// 按品目代码批量读取费率行
    ///
    /// 说明：品目过多时分块查询，每块一条 SQL
    pub fn fetch_by_good_codes(
        conn: &Connection,
        schema: &RateSchema,
        good_codes: &[String],
    ) -> RepositoryResult<Vec<RateRow>> {
        let mut rows = Vec::new();
        if good_codes.is_empty() {
            return Ok(rows);
        }

        let good_col = quote_ident(&schema.good_code_column);
        let qty_col = quote_ident(&schema.unit_quantity_column);
        let rate_col = quote_ident(&schema.rate_amount_column);
        let table = quote_ident(&schema.table);

        for chunk in good_codes.chunks(MAX_IN_PARAMS) {
            let placeholders = vec!["?"; chunk.len()].join(",");
            // 参考表的品目列可能带空白，比较前统一 TRIM
            let sql = format!(
                "SELECT {good_col}, {qty_col}, {rate_col} FROM {table} WHERE TRIM({good_col}) IN ({placeholders})"
            );
            let mut stmt = conn.prepare(&sql)?;
            let mapped = stmt.query_map(params_from_iter(chunk.iter()), |row| {
                Ok(RateRow {
                    good_code: value_to_text(row.get::<_, Value>(0)?),
                    unit_quantity: value_to_text(row.get::<_, Value>(1)?),
                    rate_amount: value_to_text(row.get::<_, Value>(2)?),
                })
            })?;
            for row in mapped {
                rows.push(row?);
            }
        }

        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> RateSchema {
        RateSchema {
            table: RATE_TABLE.to_string(),
            good_code_column: "self_good_cd".to_string(),
            unit_quantity_column: "unit_quantity".to_string(),
            rate_amount_column: "haca_amnt".to_string(),
        }
    }

    #[test]
    fn test_list_columns_missing_table() {
        let conn = Connection::open_in_memory().unwrap();
        let err = RateRepository::list_columns(&conn, RATE_TABLE).unwrap_err();
        assert!(matches!(err, RepositoryError::TableNotFound { .. }));
    }

    #[test]
    fn test_fetch_by_good_codes_mixed_types() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            r#"
            CREATE TABLE unloading_rate_code (self_good_cd TEXT, unit_quantity, haca_amnt);
            INSERT INTO unloading_rate_code VALUES (' A1 ', 5, 120);
            INSERT INTO unloading_rate_code VALUES ('A1', '10.00', 200.5);
            INSERT INTO unloading_rate_code VALUES ('B2', 5, 99);
            "#,
        )
        .unwrap();

        let rows =
            RateRepository::fetch_by_good_codes(&conn, &schema(), &["A1".to_string()]).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].unit_quantity.as_deref(), Some("5"));
        assert_eq!(rows[0].rate_amount.as_deref(), Some("120"));
        assert_eq!(rows[1].unit_quantity.as_deref(), Some("10.00"));
        assert_eq!(rows[1].rate_amount.as_deref(), Some("200.5"));
    }

    #[test]
    fn test_quote_ident_escapes() {
        assert_eq!(quote_ident("hacaamnt"), "\"hacaamnt\"");
        assert_eq!(quote_ident("a\"b"), "\"a\"\"b\"");
    }
}
