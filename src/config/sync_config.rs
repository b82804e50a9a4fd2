// ==========================================
// 电子送货单同步系统 - 同步配置
// ==========================================
// 来源优先级: 命令行参数 > 环境变量（含 .env） > 默认值
// 红线: service_key 为密钥，只允许来自环境/参数，不写日志、不落库
// ==========================================

use crate::domain::types::MergePolicy;
use crate::importer::error::{SyncError, SyncResult};
use crate::importer::payload_source::{FetchRequest, DEFAULT_API_BASE_URL};
use std::fmt;
use std::path::PathBuf;

/// 环境变量键
pub mod env_keys {
    pub const SERVICE_KEY: &str = "SERVICE_KEY";
    pub const SHIP_DATE: &str = "SHIP_DATE";
    pub const PAGE_NO: &str = "PAGE_NO";
    pub const DB_PATH: &str = "DELIVERY_NOTE_SYNC_DB_PATH";
    pub const API_BASE_URL: &str = "AGROMARKET_API_BASE_URL";
}

/// 默认出货日期
pub const DEFAULT_SHIP_DATE: &str = "20251117";

/// 默认页码
pub const DEFAULT_PAGE_NO: u32 = 1;

// ==========================================
// SyncConfig
// ==========================================
#[derive(Clone)]
pub struct SyncConfig {
    pub service_key: String,
    pub ship_date: String,
    pub page_no: u32,
    pub db_path: String,
    pub api_base_url: String,
    pub merge_policy: MergePolicy,
}

// 手动实现 Debug，避免密钥进入日志
impl fmt::Debug for SyncConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncConfig")
            .field("service_key", &"***")
            .field("ship_date", &self.ship_date)
            .field("page_no", &self.page_no)
            .field("db_path", &self.db_path)
            .field("api_base_url", &self.api_base_url)
            .field("merge_policy", &self.merge_policy)
            .finish()
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            service_key: String::new(),
            ship_date: DEFAULT_SHIP_DATE.to_string(),
            page_no: DEFAULT_PAGE_NO,
            db_path: default_db_path(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            merge_policy: MergePolicy::default(),
        }
    }
}

impl SyncConfig {
    /// 从进程环境变量加载（未设置的项取默认值）
    pub fn from_env() -> SyncResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 从任意键值来源加载
    pub fn from_lookup<F>(lookup: F) -> SyncResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let mut config = Self::default();
        if let Some(v) = get(env_keys::SERVICE_KEY) {
            config.service_key = v;
        }
        if let Some(v) = get(env_keys::SHIP_DATE) {
            config.ship_date = v;
        }
        if let Some(v) = get(env_keys::PAGE_NO) {
            config.page_no = parse_page_no(&v)?;
        }
        if let Some(v) = get(env_keys::DB_PATH) {
            config.db_path = v;
        }
        if let Some(v) = get(env_keys::API_BASE_URL) {
            config.api_base_url = v;
        }
        Ok(config)
    }

    /// 校验请求参数
    pub fn validate(&self) -> SyncResult<()> {
        validate_ship_date(&self.ship_date)?;
        validate_page_no(self.page_no)?;
        Ok(())
    }

    /// 调用开放 API 前校验密钥
    pub fn require_service_key(&self) -> SyncResult<&str> {
        if self.service_key.trim().is_empty() {
            return Err(SyncError::ConfigValueError {
                key: env_keys::SERVICE_KEY.to_string(),
                value: String::new(),
                message: "未配置 serviceKey".to_string(),
            });
        }
        Ok(&self.service_key)
    }

    pub fn fetch_request(&self) -> FetchRequest {
        FetchRequest::new(self.ship_date.clone(), self.page_no)
    }
}

/// 页码解析（必须为正整数）
pub fn parse_page_no(value: &str) -> SyncResult<u32> {
    let page_no = value
        .trim()
        .parse::<u32>()
        .map_err(|e| SyncError::ConfigValueError {
            key: env_keys::PAGE_NO.to_string(),
            value: value.to_string(),
            message: e.to_string(),
        })?;
    validate_page_no(page_no)?;
    Ok(page_no)
}

/// 出货日期必须为 8 位数字（YYYYMMDD）
pub fn validate_ship_date(value: &str) -> SyncResult<()> {
    if value.len() == 8 && value.bytes().all(|b| b.is_ascii_digit()) {
        return Ok(());
    }
    Err(SyncError::ConfigValueError {
        key: env_keys::SHIP_DATE.to_string(),
        value: value.to_string(),
        message: "出货日期必须为 8 位数字 (YYYYMMDD)".to_string(),
    })
}

pub fn validate_page_no(page_no: u32) -> SyncResult<()> {
    if page_no >= 1 {
        return Ok(());
    }
    Err(SyncError::ConfigValueError {
        key: env_keys::PAGE_NO.to_string(),
        value: page_no.to_string(),
        message: "页码必须 >= 1".to_string(),
    })
}

/// 校验一次获取请求
pub fn validate_request(request: &FetchRequest) -> SyncResult<()> {
    validate_ship_date(&request.ship_date)?;
    validate_page_no(request.page_no)
}

/// 默认数据库路径
///
/// - 优先使用环境变量 DELIVERY_NOTE_SYNC_DB_PATH
/// - 否则放在用户数据目录下；取不到数据目录时回退到当前目录
pub fn default_db_path() -> String {
    if let Ok(path) = std::env::var(env_keys::DB_PATH) {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./delivery_note_sync.db");

    if let Some(data_dir) = dirs::data_dir() {
        #[cfg(debug_assertions)]
        let dir = data_dir.join("delivery-note-sync-dev");

        #[cfg(not(debug_assertions))]
        let dir = data_dir.join("delivery-note-sync");

        // 目录创建失败时 open 会报错，这里不提前中止
        std::fs::create_dir_all(&dir).ok();
        path = dir.join("delivery_note_sync.db");
    }

    path.to_string_lossy().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = SyncConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.ship_date, DEFAULT_SHIP_DATE);
        assert_eq!(config.page_no, 1);
        assert_eq!(config.api_base_url, DEFAULT_API_BASE_URL);
        assert_eq!(config.merge_policy, MergePolicy::FinalizeGated);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_values_from_lookup() {
        let config = SyncConfig::from_lookup(lookup(&[
            (env_keys::SERVICE_KEY, " abc "),
            (env_keys::SHIP_DATE, "20240101"),
            (env_keys::PAGE_NO, "3"),
            (env_keys::DB_PATH, "/tmp/x.db"),
        ]))
        .unwrap();

        assert_eq!(config.require_service_key().unwrap(), "abc");
        assert_eq!(config.fetch_request(), FetchRequest::new("20240101", 3));
        assert_eq!(config.db_path, "/tmp/x.db");
    }

    #[test]
    fn test_invalid_page_no_rejected() {
        let err = SyncConfig::from_lookup(lookup(&[(env_keys::PAGE_NO, "0")])).unwrap_err();
        assert!(err.is_configuration());
        assert!(parse_page_no("abc").is_err());
        assert!(parse_page_no("-1").is_err());
    }

    #[test]
    fn test_ship_date_format() {
        assert!(validate_ship_date("20251117").is_ok());
        assert!(validate_ship_date("2025-11-17").is_err());
        assert!(validate_ship_date("2025111").is_err());
        assert!(validate_ship_date("２０２５１１１７").is_err());
    }

    #[test]
    fn test_missing_service_key() {
        let config = SyncConfig::from_lookup(lookup(&[])).unwrap();
        assert!(config.require_service_key().unwrap_err().is_configuration());
    }

    #[test]
    fn test_debug_hides_service_key() {
        let config = SyncConfig {
            service_key: "SECRET".to_string(),
            ..SyncConfig::default()
        };
        assert!(!format!("{:?}", config).contains("SECRET"));
    }
}
