// ==========================================
// 电子送货单同步系统 - 领域类型定义
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 合并策略 (Merge Policy)
// ==========================================
// 红线: 默认必须为 FinalizeGated
// 序列化格式: SCREAMING_SNAKE_CASE (与配置一致)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MergePolicy {
    /// 已确认的主表 / 已回写 ERP 的明细行不再覆盖
    #[default]
    FinalizeGated,
    /// 旧版简化模式：冲突时无条件覆盖
    AlwaysOverwrite,
}

impl MergePolicy {
    pub fn is_gated(&self) -> bool {
        matches!(self, MergePolicy::FinalizeGated)
    }
}

impl fmt::Display for MergePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MergePolicy::FinalizeGated => write!(f, "FINALIZE_GATED"),
            MergePolicy::AlwaysOverwrite => write!(f, "ALWAYS_OVERWRITE"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_is_gated() {
        assert_eq!(MergePolicy::default(), MergePolicy::FinalizeGated);
        assert!(MergePolicy::default().is_gated());
        assert!(!MergePolicy::AlwaysOverwrite.is_gated());
    }

    #[test]
    fn test_policy_serde_format() {
        let json = serde_json::to_string(&MergePolicy::AlwaysOverwrite).unwrap();
        assert_eq!(json, "\"ALWAYS_OVERWRITE\"");
        assert_eq!(MergePolicy::FinalizeGated.to_string(), "FINALIZE_GATED");
    }
}
