// ==========================================
// 电子送货单同步系统 - 送货单领域模型
// ==========================================
// 职责: 送货单主表/明细行的固定结构
// 对齐: delivery_note_master / delivery_note_detail 表
// ==========================================

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// ==========================================
// ShipmentMaster - 送货单主表
// ==========================================
// 红线: chk_date 非空即“已确认”，后续同步不得改动任何业务字段
// 用途: 导入层写入，汇总层只读
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipmentMaster {
    // ===== 主键 =====
    pub inven_no: String, // 送货单号

    // ===== 市场/法人 =====
    pub whsal_cd: Option<String>, // 批发市场代码
    pub cmp_cd: Option<String>,   // 法人代码

    // ===== 出货人 =====
    pub ship_type: Option<String>,
    pub ship_date: Option<String>, // 出货日期 YYYYMMDD
    pub ship_name: Option<String>,
    pub ship_contact: Option<String>,
    pub ship_dec_no: Option<String>,
    pub ship_bank_cd: Option<String>,
    pub ship_bank_name: Option<String>,
    pub ship_acc_num: Option<String>,
    pub ship_acc_dep: Option<String>,

    // ===== 交易 =====
    pub trade_type: Option<String>,
    pub trade_class: Option<String>,

    // ===== 司机 =====
    pub drv_name: Option<String>,
    pub drv_call: Option<String>,
    pub drv_car_no: Option<String>,
    pub drv_rate: Option<String>, // 数值类字段，原样透传
    pub drv_bank_name: Option<String>,
    pub drv_acc_num: Option<String>,
    pub drv_acc_dep: Option<String>,

    // ===== 状态与时间戳 =====
    pub inven_state: Option<String>,
    pub regist_date: Option<String>, // 登记时间
    pub udt_date: Option<String>,    // 修改时间
    pub chk_date: Option<String>,    // 确认时间（非空 = 已确认）
}

impl ShipmentMaster {
    /// 是否处于已确认（冻结）状态
    pub fn is_finalized(&self) -> bool {
        self.chk_date
            .as_deref()
            .map(|v| !v.is_empty())
            .unwrap_or(false)
    }
}

// ==========================================
// ShipmentDetailLine - 送货单明细行
// ==========================================
// 红线: flag_erp_apply 置位后，后续同步不得改动任何字段
// 说明: unloading_cost 由卸货费计算引擎回填，不来自外部 API
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipmentDetailLine {
    // ===== 主键 =====
    pub inven_no: String,
    pub inven_det_no: String,

    // ===== 品名与申报 =====
    pub pro_name: Option<String>,
    pub pro_dec_no: Option<String>, // 生产者申报号（路由映射键）

    // ===== 标准分类代码 =====
    pub good_cd: Option<String>,
    pub poj_cd: Option<String>,
    pub dan_cd: Option<String>,
    pub lv_cd: Option<String>,
    pub san_cd: Option<String>,

    // ===== 自编分类代码 =====
    pub self_good_cd: Option<String>, // 费率表品目键
    pub self_poj_cd: Option<String>,
    pub self_dan_cd: Option<String>,
    pub self_lv_cd: Option<String>,
    pub self_san_cd: Option<String>,
    pub eco_cd: Option<String>,

    // ===== 数量（原样透传）=====
    pub unit_quantity: Option<String>,
    pub ship_quantity: Option<String>,
    pub frt_qy: Option<String>,
    pub detail_note: Option<String>,
    pub self_good_nm: Option<String>,
    pub sug_amt: Option<String>,

    // ===== 派生 =====
    pub unloading_cost: Decimal,
}

/// 一次同步请求的批次内容（由 Record Builder 产出）
#[derive(Debug, Clone, Default)]
pub struct DeliveryNoteBatch {
    pub masters: Vec<ShipmentMaster>,
    pub details: Vec<ShipmentDetailLine>,
    /// 因缺少主键而跳过的条目数（主表 + 明细）
    pub skipped: usize,
}

impl DeliveryNoteBatch {
    /// 本批次涉及的送货单号（主表与明细合并，去重、排序）
    ///
    /// 主表出货日期变化同样会移动其明细所属的汇总键
    pub fn touched_inven_nos(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .masters
            .iter()
            .map(|m| m.inven_no.clone())
            .chain(self.details.iter().map(|d| d.inven_no.clone()))
            .filter(|id| !id.is_empty())
            .collect();
        ids.sort();
        ids.dedup();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_master_finalized_only_when_chk_date_non_empty() {
        let mut master = ShipmentMaster {
            inven_no: "INV1".to_string(),
            ..Default::default()
        };
        assert!(!master.is_finalized());

        master.chk_date = Some(String::new());
        assert!(!master.is_finalized());

        master.chk_date = Some("20251117093000".to_string());
        assert!(master.is_finalized());
    }

    #[test]
    fn test_touched_inven_nos_dedup_sorted() {
        let line = |inven_no: &str, det: &str| ShipmentDetailLine {
            inven_no: inven_no.to_string(),
            inven_det_no: det.to_string(),
            ..Default::default()
        };
        let batch = DeliveryNoteBatch {
            masters: vec![ShipmentMaster {
                inven_no: "C".to_string(),
                ..Default::default()
            }],
            details: vec![line("B", "1"), line("A", "1"), line("B", "2")],
            skipped: 0,
        };
        assert_eq!(
            batch.touched_inven_nos(),
            vec!["A".to_string(), "B".to_string(), "C".to_string()]
        );
    }
}
