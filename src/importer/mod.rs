// ==========================================
// 电子送货单同步系统 - 导入层
// ==========================================
// 职责: 外部送货单数据 → 台账
// 流程: 获取 → 信封解析 → 记录构建 → 计算 → 落库 → 审计
// ==========================================

// 模块声明
pub mod audit_recorder;
pub mod delivery_note_sync;
pub mod envelope;
pub mod error;
pub mod field_normalizer;
pub mod payload_source;
pub mod record_builder;

// 重导出核心类型
pub use audit_recorder::AuditRecorder;
pub use delivery_note_sync::{DeliveryNoteSync, SyncOutcome};
pub use error::{FetchError, SyncError, SyncResult};
pub use payload_source::{AgroMarketApiSource, FetchRequest, JsonFileSource, PayloadSource};
pub use record_builder::RecordBuilder;
