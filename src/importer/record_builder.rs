// ==========================================
// 电子送货单同步系统 - 记录构建器
// ==========================================
// 职责: API 条目 → 固定结构的主表/明细记录
// 约定:
// - 字符串字段按存储长度静默截断（按字符计），从不拒绝
// - 数值类字段原样透传，数量的解析只在卸货费计算时进行
// - 缺少主键的条目无法落库，跳过并告警
// ==========================================

use crate::domain::api_log::truncate_chars;
use crate::domain::delivery_note::{DeliveryNoteBatch, ShipmentDetailLine, ShipmentMaster};
use crate::importer::envelope::detail_list;
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use tracing::warn;

/// JSON 标量 → 文本
///
/// - 字符串原样；数字按 JSON 写法；布尔为 true/false
/// - null/缺失为 None；对象/数组为紧凑 JSON
pub fn scalar_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}

/// 取字段并截断到 max_chars
pub fn clip(item: &Map<String, Value>, key: &str, max_chars: usize) -> Option<String> {
    scalar_text(item.get(key)).map(|s| truncate_chars(&s, max_chars))
}

/// 取字段原样透传（不截断）
fn raw(item: &Map<String, Value>, key: &str) -> Option<String> {
    scalar_text(item.get(key))
}

fn required_key(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

pub struct RecordBuilder;

impl RecordBuilder {
    /// 构建主表记录；缺少送货单号时返回 None
    pub fn build_master(&self, item: &Map<String, Value>) -> Option<ShipmentMaster> {
        let inven_no = required_key(clip(item, "invenNo", 50))?;

        Some(ShipmentMaster {
            inven_no,
            whsal_cd: clip(item, "whsalCd", 6),
            cmp_cd: clip(item, "cmpCd", 8),
            ship_type: clip(item, "shipType", 1),
            ship_date: clip(item, "shipDate", 8),
            ship_name: clip(item, "shipName", 200),
            ship_contact: clip(item, "shipContact", 200),
            ship_dec_no: clip(item, "shipDecNo", 12),
            ship_bank_cd: clip(item, "shipBankCd", 255),
            ship_bank_name: clip(item, "shipBankName", 255),
            ship_acc_num: clip(item, "shipAccNum", 255),
            ship_acc_dep: clip(item, "shipAccDep", 255),
            trade_type: clip(item, "tradeType", 1),
            trade_class: clip(item, "tradeClass", 1),
            drv_name: clip(item, "drvName", 255),
            drv_call: clip(item, "drvCall", 255),
            drv_car_no: clip(item, "drvCarNo", 255),
            drv_rate: raw(item, "drvRate"),
            drv_bank_name: clip(item, "drvBankName", 255),
            drv_acc_num: clip(item, "drvAccNum", 255),
            drv_acc_dep: clip(item, "drvAccDep", 255),
            inven_state: clip(item, "invenState", 2),
            regist_date: clip(item, "registDate", 14),
            udt_date: clip(item, "udtDate", 14),
            chk_date: clip(item, "chkDate", 14),
        })
    }

    /// 构建明细记录；缺少明细号时返回 None。卸货费初始为 0，由计算引擎回填。
    pub fn build_detail(
        &self,
        master_inven_no: &str,
        item: &Map<String, Value>,
    ) -> Option<ShipmentDetailLine> {
        let inven_det_no = required_key(clip(item, "invenDetNo", 22))?;

        Some(ShipmentDetailLine {
            inven_no: truncate_chars(master_inven_no, 50),
            inven_det_no,
            pro_name: clip(item, "proName", 255),
            pro_dec_no: clip(item, "proDecNo", 255),
            good_cd: clip(item, "goodCd", 6),
            poj_cd: clip(item, "pojCd", 2),
            dan_cd: clip(item, "danCd", 2),
            lv_cd: clip(item, "lvCd", 2),
            san_cd: clip(item, "sanCd", 6),
            self_good_cd: clip(item, "selfGoodCd", 6),
            self_poj_cd: clip(item, "selfPojCd", 6),
            self_dan_cd: clip(item, "selfDanCd", 6),
            self_lv_cd: clip(item, "selfLvCd", 6),
            self_san_cd: clip(item, "selfSanCd", 6),
            eco_cd: clip(item, "ecoCd", 1),
            unit_quantity: raw(item, "unitQuantity"),
            ship_quantity: raw(item, "shipQuantity"),
            frt_qy: raw(item, "frtQy"),
            detail_note: raw(item, "detailNote"),
            self_good_nm: clip(item, "selfGoodNm", 255),
            sug_amt: raw(item, "sugAmt"),
            unloading_cost: Decimal::ZERO,
        })
    }

    /// 构建整批记录
    pub fn build_batch(&self, items: &[&Map<String, Value>]) -> DeliveryNoteBatch {
        let mut batch = DeliveryNoteBatch::default();

        for (idx, item) in items.iter().enumerate() {
            let lines = detail_list(item);
            let master = match self.build_master(item) {
                Some(master) => master,
                None => {
                    warn!(item_index = idx, detail_count = lines.len(), "送货单缺少 invenNo，已跳过");
                    batch.skipped += 1 + lines.len();
                    continue;
                }
            };

            for (line_idx, line) in lines.iter().enumerate() {
                match self.build_detail(&master.inven_no, line) {
                    Some(detail) => batch.details.push(detail),
                    None => {
                        warn!(
                            inven_no = %master.inven_no,
                            line_index = line_idx,
                            "明细缺少 invenDetNo，已跳过"
                        );
                        batch.skipped += 1;
                    }
                }
            }
            batch.masters.push(master);
        }

        batch
    }
}
