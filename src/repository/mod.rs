// ==========================================
// 电子送货单同步系统 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================
// 职责: 提供数据访问接口,屏蔽数据库细节
// 约束: 所有值使用参数化；仅探查得到的列名以转义标识符拼接
// ==========================================

pub mod api_log_repo;
pub mod daily_cost_repo;
pub mod delivery_note_repo;
pub mod error;
pub mod rate_repo;

// 重导出核心仓储
pub use api_log_repo::ApiLogRepository;
pub use daily_cost_repo::{CostContribution, DailyCostRepository};
pub use delivery_note_repo::{DeliveryNoteRepository, UpsertStats};
pub use error::{RepositoryError, RepositoryResult};
pub use rate_repo::{RateRepository, RATE_TABLE};
