// ==========================================
// 电子送货单同步系统 - 外部数据源
// ==========================================
// 职责: 获取送货单原始 JSON（唯一进行网络 I/O 的组件）
// 实现者: AgroMarketApiSource（开放 API）, JsonFileSource（离线回放）
// 红线: serviceKey 不得写入日志
// ==========================================

use crate::domain::api_log::truncate_chars;
use crate::importer::error::FetchError;
use async_trait::async_trait;
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

/// 农产品流通开放 API 默认地址
pub const DEFAULT_API_BASE_URL: &str = "https://at.agromarket.kr/openApi/inven/list.do";

/// 请求超时
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// 解码失败时保留的响应片段长度（字符）
const BODY_EXCERPT_MAX_CHARS: usize = 2000;

/// 一次获取请求
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub ship_date: String, // YYYYMMDD
    pub page_no: u32,
}

impl FetchRequest {
    pub fn new(ship_date: impl Into<String>, page_no: u32) -> Self {
        Self {
            ship_date: ship_date.into(),
            page_no,
        }
    }
}

// ==========================================
// PayloadSource Trait
// ==========================================
#[async_trait]
pub trait PayloadSource: Send + Sync {
    /// 获取一页送货单数据
    ///
    /// # 返回
    /// - Ok(Value): 已解析的 JSON（信封结构由导入层识别）
    /// - Err(FetchError): 网络/HTTP/解码/文件错误
    async fn fetch(&self, request: &FetchRequest) -> Result<Value, FetchError>;

    /// 数据源描述（用于日志，不含密钥）
    fn describe(&self) -> String;
}

/// 响应体 → JSON；失败时携带原始片段
pub fn decode_body(body: &str) -> Result<Value, FetchError> {
    serde_json::from_str(body).map_err(|e| FetchError::Decode {
        message: e.to_string(),
        body_excerpt: truncate_chars(body, BODY_EXCERPT_MAX_CHARS),
    })
}

// ==========================================
// AgroMarketApiSource - 开放 API
// ==========================================
pub struct AgroMarketApiSource {
    http: reqwest::Client,
    base_url: String,
    service_key: String,
}

impl AgroMarketApiSource {
    pub fn new(base_url: impl Into<String>, service_key: impl Into<String>) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS))
            .build()
            .map_err(|e| FetchError::Transport(e.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.into(),
            service_key: service_key.into(),
        })
    }
}

#[async_trait]
impl PayloadSource for AgroMarketApiSource {
    async fn fetch(&self, request: &FetchRequest) -> Result<Value, FetchError> {
        let page_no = request.page_no.to_string();
        debug!(
            base_url = %self.base_url,
            ship_date = %request.ship_date,
            page_no = request.page_no,
            "请求送货单 API"
        );

        let resp = self
            .http
            .get(&self.base_url)
            .query(&[
                ("serviceKey", self.service_key.as_str()),
                ("shipDate", request.ship_date.as_str()),
                ("pageNo", page_no.as_str()),
            ])
            .send()
            .await
            // reqwest 错误文本可能带完整 URL（含 serviceKey），去掉后再上报
            .map_err(|e| FetchError::Transport(e.without_url().to_string()))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| FetchError::Transport(e.without_url().to_string()))?;

        if !status.is_success() {
            warn!(status = status.as_u16(), "送货单 API 返回错误状态");
            return Err(FetchError::Http {
                status: status.as_u16(),
                reason: status
                    .canonical_reason()
                    .map(str::to_string)
                    .unwrap_or_else(|| truncate_chars(&body, 200)),
            });
        }

        let payload = decode_body(&body)?;
        info!(bytes = body.len(), "送货单 API 响应已接收");
        Ok(payload)
    }

    fn describe(&self) -> String {
        format!("api:{}", self.base_url)
    }
}

// ==========================================
// JsonFileSource - 离线回放
// ==========================================
// 用途: 以保存的响应文件重放一次同步（排障/补录）
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl PayloadSource for JsonFileSource {
    async fn fetch(&self, request: &FetchRequest) -> Result<Value, FetchError> {
        debug!(
            path = %self.path.display(),
            ship_date = %request.ship_date,
            page_no = request.page_no,
            "读取送货单数据文件"
        );
        let body = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| FetchError::FileReadError(format!("{}: {}", self.path.display(), e)))?;
        decode_body(&body)
    }

    fn describe(&self) -> String {
        format!("file:{}", self.path.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_body_keeps_excerpt() {
        let err = decode_body("<html>502 Bad Gateway</html>").unwrap_err();
        match err {
            FetchError::Decode { body_excerpt, .. } => {
                assert_eq!(body_excerpt, "<html>502 Bad Gateway</html>")
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_api_source_description_hides_key() {
        let source = AgroMarketApiSource::new(DEFAULT_API_BASE_URL, "SECRET-KEY").unwrap();
        assert!(!source.describe().contains("SECRET-KEY"));
    }

    #[tokio::test]
    async fn test_file_source_missing_file() {
        let source = JsonFileSource::new("/nonexistent/delivery-notes.json");
        let err = source.fetch(&FetchRequest::new("20251117", 1)).await.unwrap_err();
        assert!(matches!(err, FetchError::FileReadError(_)));
    }

    #[tokio::test]
    async fn test_file_source_reads_payload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("payload.json");
        std::fs::write(&path, r#"{"data":{"items":[{"invenNo":"A"}]}}"#).unwrap();

        let value = JsonFileSource::new(&path)
            .fetch(&FetchRequest::new("20251117", 1))
            .await
            .unwrap();
        assert_eq!(value["data"]["items"][0]["invenNo"], "A");
    }
}
