// ==========================================
// 电子送货单同步系统 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod api_log;
pub mod daily_cost;
pub mod delivery_note;
pub mod rate;
pub mod types;

// 重导出核心类型
pub use api_log::{ApiRunLog, RunStatus, RESPONSE_CONTENT_MAX_CHARS};
pub use daily_cost::{DailyCostKey, DailyCostTotal};
pub use delivery_note::{DeliveryNoteBatch, ShipmentDetailLine, ShipmentMaster};
pub use rate::{RateField, RateRow, RateSchema};
pub use types::MergePolicy;
