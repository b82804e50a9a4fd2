// ==========================================
// 电子送货单同步系统 - 配置层
// ==========================================
// 职责: 同步参数加载与校验
// 来源: .env / 环境变量 / 命令行参数
// ==========================================

pub mod sync_config;

// 重导出核心配置
pub use sync_config::{default_db_path, env_keys, validate_request, SyncConfig};
