// ==========================================
// 电子送货单同步系统 - 日卸货费汇总模型
// ==========================================
// 对齐: daily_unloading_cost_total 表
// 说明: 汇总值始终由台账全量重算得出，不允许人工修改
// ==========================================

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 汇总键: (出货日期, 分拨代码, 分拨子代码, 自编产地, 自编品目)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DailyCostKey {
    pub ship_date: String,
    pub chul_code: String,
    pub chcd_code: String,
    pub self_san_cd: String,
    pub self_good_cd: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyCostTotal {
    pub key: DailyCostKey,
    pub unloading_cost_total: Decimal,
}
