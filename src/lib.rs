// ==========================================
// 电子送货单同步系统 - 核心库
// ==========================================
// 职责: 农产品流通开放 API 送货单 → 本地台账同步
// 技术栈: Rust + SQLite
// 系统定位: 定时批处理（单次调用同步一页）
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 计算规则
pub mod engine;

// 导入层 - 外部数据与同步主流程
pub mod importer;

// 配置层 - 同步参数
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一/建表）
pub mod db;

// 日志系统
pub mod logging;

// SQL 性能统计
pub mod perf;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::MergePolicy;

// 领域实体
pub use domain::{
    ApiRunLog, DailyCostKey, DailyCostTotal, DeliveryNoteBatch, RateSchema, RunStatus,
    ShipmentDetailLine, ShipmentMaster,
};

// 引擎
pub use engine::{CostLookupEngine, DailyAggregationEngine, RateSchemaCache};

// 同步
pub use importer::{
    AgroMarketApiSource, DeliveryNoteSync, FetchError, FetchRequest, JsonFileSource,
    PayloadSource, SyncError, SyncOutcome, SyncResult,
};

// 配置
pub use config::SyncConfig;

// 数据库
pub use db::{ConnectionProvider, SqliteConnectionProvider};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "电子送货单同步系统";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
