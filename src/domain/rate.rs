// ==========================================
// 电子送货单同步系统 - 卸货费率参考表模型
// ==========================================
// 红线: 费率表由外部系统维护，本系统只读
// 说明: 各部署的实际列名不一致，需运行时解析（见 engine::schema_resolver）
// ==========================================

use serde::{Deserialize, Serialize};

/// 费率表的逻辑字段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RateField {
    GoodCode,
    UnitQuantity,
    RateAmount,
}

impl RateField {
    pub const ALL: [RateField; 3] = [
        RateField::GoodCode,
        RateField::UnitQuantity,
        RateField::RateAmount,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RateField::GoodCode => "selfGoodCd",
            RateField::UnitQuantity => "unitQuantity",
            RateField::RateAmount => "hacaamnt",
        }
    }

    /// 候选列名（按优先级）。兼容历史上的多种命名风格。
    pub fn candidates(&self) -> &'static [&'static str] {
        match self {
            RateField::GoodCode => &[
                "selfGoodCd",
                "self_good_cd",
                "SELFGOODCD",
                "SELF_GOOD_CD",
                "selfgoodcd",
                "hacaitem",
            ],
            RateField::UnitQuantity => &[
                "unitQuantity",
                "unit_quantity",
                "UNITQUANTITY",
                "UNIT_QUANTITY",
                "unitqty",
                "unitQty",
                "hacaweit",
            ],
            RateField::RateAmount => &[
                "hacaamnt",
                "haca_amnt",
                "HACAAMNT",
                "HACA_AMNT",
                "hacaAmt",
                "HACAAMT",
                "haca_amount",
            ],
        }
    }
}

/// 已解析的费率表结构（逻辑字段 → 实际列名）
///
/// 解析一次后只读；作为显式值注入各引擎，而非隐藏的全局可变状态。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateSchema {
    pub table: String,
    pub good_code_column: String,
    pub unit_quantity_column: String,
    pub rate_amount_column: String,
}

impl RateSchema {
    pub fn column(&self, field: RateField) -> &str {
        match field {
            RateField::GoodCode => &self.good_code_column,
            RateField::UnitQuantity => &self.unit_quantity_column,
            RateField::RateAmount => &self.rate_amount_column,
        }
    }
}

/// 费率表原始行（列值统一转为文本，归一化由引擎负责）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateRow {
    pub good_code: Option<String>,
    pub unit_quantity: Option<String>,
    pub rate_amount: Option<String>,
}
