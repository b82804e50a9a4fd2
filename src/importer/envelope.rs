// ==========================================
// 电子送货单同步系统 - 响应信封解析
// ==========================================
// 职责: 从外部 API 响应中取出送货单列表 / 从送货单中取出明细列表
// 约定: 按固定优先级取第一个“列表类型”的候选键，否则视为空
// ==========================================

use serde_json::{Map, Value};

/// 顶层信封候选键（按优先级）
pub const ENVELOPE_KEYS: [&str; 6] = ["body", "data", "list", "items", "result", "rows"];

/// 信封内嵌一层的候选键（按优先级）
pub const NESTED_ENVELOPE_KEYS: [&str; 4] = ["list", "items", "data", "rows"];

/// 明细列表候选键（按优先级）
pub const DETAIL_LIST_KEYS: [&str; 4] = ["detailList", "details", "invenDetails", "invenDetailList"];

/// 取出送货单条目列表
///
/// - 顶层为数组: 直接使用
/// - 顶层为对象: 依次检查 ENVELOPE_KEYS；值为数组则使用，
///   值为对象则再检查一层 NESTED_ENVELOPE_KEYS
/// - 其他情况: 空列表
///
/// 非对象条目会被忽略。
pub fn pick_items(payload: &Value) -> Vec<&Map<String, Value>> {
    let list = match payload {
        Value::Array(items) => Some(items),
        Value::Object(obj) => find_envelope_list(obj),
        _ => None,
    };

    list.map(|items| items.iter().filter_map(Value::as_object).collect())
        .unwrap_or_default()
}

fn find_envelope_list(obj: &Map<String, Value>) -> Option<&Vec<Value>> {
    for key in ENVELOPE_KEYS {
        match obj.get(key) {
            Some(Value::Array(items)) => return Some(items),
            Some(Value::Object(inner)) => {
                let nested = NESTED_ENVELOPE_KEYS
                    .iter()
                    .find_map(|sub| inner.get(*sub).and_then(Value::as_array));
                if nested.is_some() {
                    return nested;
                }
            }
            _ => {}
        }
    }
    None
}

/// 取出送货单的明细列表（无匹配时为空）
pub fn detail_list(item: &Map<String, Value>) -> Vec<&Map<String, Value>> {
    DETAIL_LIST_KEYS
        .iter()
        .find_map(|key| item.get(*key).and_then(Value::as_array))
        .map(|lines| lines.iter().filter_map(Value::as_object).collect())
        .unwrap_or_default()
}
