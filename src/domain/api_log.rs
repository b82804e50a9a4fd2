// ==========================================
// 电子送货单同步系统 - API 调用日志领域模型
// ==========================================
// 红线: 每次同步必须且只能追加一条记录（成功/失败均记录）
// 用途: 审计追踪
// 对齐: api_log 表
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// response_content 最大长度（字符）
pub const RESPONSE_CONTENT_MAX_CHARS: usize = 5000;

// ==========================================
// RunStatus - 同步结果状态
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    Success,
    Fail,
}

impl RunStatus {
    /// 落库格式（小写）
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Success => "success",
            RunStatus::Fail => "fail",
        }
    }

    pub fn flag_success(&self) -> i32 {
        match self {
            RunStatus::Success => 1,
            RunStatus::Fail => 0,
        }
    }
}

// ==========================================
// ApiRunLog - API 调用日志
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiRunLog {
    pub run_id: String,            // 同步运行 ID（与 tracing span 关联）
    pub logged_at: NaiveDateTime,  // 记录时间（落库拆分为 log_date/log_time）
    pub status: RunStatus,
    pub ship_date: String,         // 请求的出货日期
    pub page_no: u32,              // 请求的页码
    pub tot_cnt: usize,            // 条目数（失败时为 0）
    pub response_content: String,  // 原始响应/错误文本（截断）
}

impl ApiRunLog {
    pub fn new(
        run_id: impl Into<String>,
        status: RunStatus,
        ship_date: impl Into<String>,
        page_no: u32,
        tot_cnt: usize,
        response_content: &str,
    ) -> Self {
        Self {
            run_id: run_id.into(),
            logged_at: chrono::Local::now().naive_local(),
            status,
            ship_date: ship_date.into(),
            page_no,
            tot_cnt,
            response_content: truncate_chars(response_content, RESPONSE_CONTENT_MAX_CHARS),
        }
    }
}

/// 按字符截断（不会切断多字节字符）
pub fn truncate_chars(value: &str, max_chars: usize) -> String {
    match value.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => value[..byte_idx].to_string(),
        None => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_content_truncated_to_limit() {
        let long = "가".repeat(RESPONSE_CONTENT_MAX_CHARS + 10);
        let log = ApiRunLog::new("r1", RunStatus::Fail, "20251117", 1, 0, &long);
        assert_eq!(log.response_content.chars().count(), RESPONSE_CONTENT_MAX_CHARS);
    }

    #[test]
    fn test_truncate_chars_short_input_untouched() {
        assert_eq!(truncate_chars("abc", 5), "abc");
        assert_eq!(truncate_chars("abcdef", 3), "abc");
        assert_eq!(truncate_chars("", 3), "");
    }

    #[test]
    fn test_run_status_storage_format() {
        assert_eq!(RunStatus::Success.as_str(), "success");
        assert_eq!(RunStatus::Fail.as_str(), "fail");
        assert_eq!(RunStatus::Success.flag_success(), 1);
        assert_eq!(RunStatus::Fail.flag_success(), 0);
    }
}
