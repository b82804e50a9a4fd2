// ==========================================
// 电子送货单同步系统 - 同步模块错误类型
// ==========================================
// 工具: thiserror 派生宏
// 约定: 字段级解码错误不在此列（就地降级为缺失/零），
//       这里只有批次级错误，每次同步最多产生一个
// ==========================================

use crate::repository::error::RepositoryError;
use thiserror::Error;

/// 外部数据源错误
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP 错误: {status} {reason}")]
    Http { status: u16, reason: String },

    #[error("请求失败: {0}")]
    Transport(String),

    #[error("响应无法解析为 JSON: {message}")]
    Decode {
        message: String,
        /// 原始响应片段（写入审计日志）
        body_excerpt: String,
    },

    #[error("数据文件读取失败: {0}")]
    FileReadError(String),
}

/// 同步模块错误类型
#[derive(Error, Debug)]
pub enum SyncError {
    // ===== 配置错误 =====
    #[error("参考表 {table} 中找不到 {field} 对应的列")]
    SchemaUnresolved { table: String, field: String },

    #[error("配置值格式错误 (key: {key}, value: {value}): {message}")]
    ConfigValueError {
        key: String,
        value: String,
        message: String,
    },

    // ===== 数据源错误 =====
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("响应中未找到送货单数据 (ship_date={ship_date}, page_no={page_no})")]
    EmptyResult { ship_date: String, page_no: u32 },

    // ===== 数据库错误 =====
    #[error("数据库处理失败: {0}")]
    Storage(#[from] RepositoryError),
}

impl SyncError {
    /// 是否为配置类错误（不可重试，需人工修正）
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            SyncError::SchemaUnresolved { .. } | SyncError::ConfigValueError { .. }
        )
    }
}

// 实现 From<rusqlite::Error>
impl From<rusqlite::Error> for SyncError {
    fn from(err: rusqlite::Error) -> Self {
        SyncError::Storage(RepositoryError::from(err))
    }
}

/// Result 类型别名
pub type SyncResult<T> = Result<T, SyncError>;
