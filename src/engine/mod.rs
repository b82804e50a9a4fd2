// ==========================================
// 电子送货单同步系统 - 引擎层
// ==========================================
// 职责: 费率表结构解析 / 卸货费计算 / 日汇总重算
// 红线: Engine 不拼业务 SQL，数据访问全部经由 Repository
// ==========================================

pub mod cost_lookup;
pub mod daily_aggregation;
pub mod schema_resolver;

// 重导出核心引擎
pub use cost_lookup::{CostLookupEngine, CostLookupStats};
pub use daily_aggregation::DailyAggregationEngine;
pub use schema_resolver::{resolve_rate_schema, RateSchemaCache};
