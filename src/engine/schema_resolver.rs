// ==========================================
// 电子送货单同步系统 - 费率表结构解析
// ==========================================
// 职责: 逻辑字段 → 费率表实际列名
// 规则: 列名比较忽略大小写与标点（仅保留字母数字），按候选顺序取第一个命中
// 红线: 任一逻辑字段无法解析即为配置错误，不重试，不取默认值
// 缓存: 进程内解析一次，之后只读，运行期间不失效
// ==========================================

use crate::domain::rate::{RateField, RateSchema};
use crate::importer::error::{SyncError, SyncResult};
use crate::repository::error::RepositoryError;
use crate::repository::rate_repo::{RateRepository, RATE_TABLE};
use rusqlite::Connection;
use std::collections::HashMap;
use std::sync::OnceLock;
use tracing::{debug, info};

/// 列名比较键: 小写 + 仅保留字母数字
pub fn column_key(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(|c| c.to_lowercase())
        .collect()
}

/// 根据实际列名列表解析费率表结构
pub fn resolve_from_columns(table: &str, columns: &[String]) -> SyncResult<RateSchema> {
    let mut existing: HashMap<String, &str> = HashMap::new();
    for col in columns {
        existing.entry(column_key(col)).or_insert(col.as_str());
    }

    let mut resolved: HashMap<RateField, String> = HashMap::new();
    for field in RateField::ALL {
        let matched = field
            .candidates()
            .iter()
            .find_map(|candidate| existing.get(&column_key(candidate)))
            .ok_or_else(|| SyncError::SchemaUnresolved {
                table: table.to_string(),
                field: field.as_str().to_string(),
            })?;
        debug!(field = field.as_str(), column = %matched, "费率表列已解析");
        resolved.insert(field, matched.to_string());
    }

    let mut take = |field: RateField| resolved.remove(&field).unwrap_or_default();
    Ok(RateSchema {
        table: table.to_string(),
        good_code_column: take(RateField::GoodCode),
        unit_quantity_column: take(RateField::UnitQuantity),
        rate_amount_column: take(RateField::RateAmount),
    })
}

/// 探查数据库并解析费率表结构
pub fn resolve_rate_schema(conn: &Connection, table: &str) -> SyncResult<RateSchema> {
    let columns = match RateRepository::list_columns(conn, table) {
        Ok(columns) => columns,
        // 表不存在与列缺失同属配置错误
        Err(RepositoryError::TableNotFound { table }) => {
            return Err(SyncError::SchemaUnresolved {
                table,
                field: RateField::GoodCode.as_str().to_string(),
            })
        }
        Err(e) => return Err(e.into()),
    };
    resolve_from_columns(table, &columns)
}

// ==========================================
// RateSchemaCache - 已解析结构缓存
// ==========================================
// 可注入：测试可构造独立实例或直接预置结构；
// 二进制使用进程级实例 RateSchemaCache::global()
pub struct RateSchemaCache {
    table: &'static str,
    cell: OnceLock<RateSchema>,
}

static GLOBAL_RATE_SCHEMA: RateSchemaCache = RateSchemaCache::new();

impl RateSchemaCache {
    pub const fn new() -> Self {
        Self::for_table(RATE_TABLE)
    }

    pub const fn for_table(table: &'static str) -> Self {
        Self {
            table,
            cell: OnceLock::new(),
        }
    }

    /// 预置已解析的结构（跳过探查）
    pub fn with_schema(schema: RateSchema) -> Self {
        let cell = OnceLock::new();
        let _ = cell.set(schema);
        Self {
            table: RATE_TABLE,
            cell,
        }
    }

    /// 进程级缓存
    pub fn global() -> &'static RateSchemaCache {
        &GLOBAL_RATE_SCHEMA
    }

    /// 已解析则直接返回；否则探查一次并缓存
    ///
    /// 并发首次解析时可能探查多次，结果一致，仅保留第一个
    pub fn get_or_resolve(&self, conn: &Connection) -> SyncResult<RateSchema> {
        if let Some(schema) = self.cell.get() {
            return Ok(schema.clone());
        }

        let schema = resolve_rate_schema(conn, self.table)?;
        info!(
            table = %schema.table,
            good_code = %schema.good_code_column,
            unit_quantity = %schema.unit_quantity_column,
            rate_amount = %schema.rate_amount_column,
            "费率表结构解析完成"
        );
        let _ = self.cell.set(schema.clone());
        Ok(self.cell.get().cloned().unwrap_or(schema))
    }

    pub fn cached(&self) -> Option<&RateSchema> {
        self.cell.get()
    }
}

impl Default for RateSchemaCache {
    fn default() -> Self {
        Self::new()
    }
}
