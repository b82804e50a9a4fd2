// ==========================================
// 电子送货单同步系统 - 字段归一化
// ==========================================
// 职责: 品目代码/数量的比较键归一化，十进制数值转换
// 红线: 入库数据与费率表必须走同一套归一化，否则费率查找落空（按 0 计）
// 约定: 非法数值降级为字符串本身，绝不中断批次
// ==========================================

use rust_decimal::Decimal;
use std::str::FromStr;

/// 解析十进制数（支持普通写法、科学计数法、末尾小数点 "5."）
fn parse_decimal(value: &str) -> Option<Decimal> {
    let value = match value.strip_suffix('.') {
        Some(head) if !head.is_empty() && !head.ends_with('.') => head,
        _ => value,
    };
    Decimal::from_str(value)
        .or_else(|_| Decimal::from_scientific(value))
        .ok()
}

/// 品目代码归一化: TRIM，空串视为缺失
pub fn normalize_good_code(value: Option<&str>) -> Option<String> {
    let trimmed = value?.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// 数量归一化
///
/// - "5.00" → "5"，"5.50" → "5.5"，"5." → "5"，"-0.0" → "0"
/// - 无法解析时返回 TRIM 后的原值（空串视为缺失）
pub fn normalize_unit_quantity(value: Option<&str>) -> Option<String> {
    let trimmed = value?.trim();
    if trimmed.is_empty() {
        return None;
    }

    match parse_decimal(trimmed) {
        Some(d) => Some(d.normalize().to_string()),
        None => Some(trimmed.to_string()),
    }
}

/// 数值转换: 缺失或无法解析时为 0
pub fn to_decimal(value: Option<&str>) -> Decimal {
    value
        .map(str::trim)
        .and_then(parse_decimal)
        .unwrap_or(Decimal::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_unit_quantity_strips_trailing_zeros() {
        assert_eq!(normalize_unit_quantity(Some("5.00")).as_deref(), Some("5"));
        assert_eq!(normalize_unit_quantity(Some("5")).as_deref(), Some("5"));
        assert_eq!(normalize_unit_quantity(Some("5.50")).as_deref(), Some("5.5"));
        assert_eq!(normalize_unit_quantity(Some(" 10.0 ")).as_deref(), Some("10"));
        assert_eq!(normalize_unit_quantity(Some("100")).as_deref(), Some("100"));
        assert_eq!(normalize_unit_quantity(Some("5.")).as_deref(), Some("5"));
    }

    #[test]
    fn test_normalize_unit_quantity_zero_and_scientific() {
        assert_eq!(normalize_unit_quantity(Some("0.000")).as_deref(), Some("0"));
        assert_eq!(normalize_unit_quantity(Some("-0.0")).as_deref(), Some("0"));
        assert_eq!(normalize_unit_quantity(Some("1e3")).as_deref(), Some("1000"));
    }

    #[test]
    fn test_normalize_unit_quantity_falls_back_to_string() {
        assert_eq!(normalize_unit_quantity(Some("abc")).as_deref(), Some("abc"));
        assert_eq!(normalize_unit_quantity(Some(" 5kg ")).as_deref(), Some("5kg"));
        assert_eq!(normalize_unit_quantity(Some("   ")), None);
        assert_eq!(normalize_unit_quantity(None), None);
    }

    #[test]
    fn test_normalize_good_code() {
        assert_eq!(normalize_good_code(Some(" A1 ")).as_deref(), Some("A1"));
        assert_eq!(normalize_good_code(Some("")), None);
        assert_eq!(normalize_good_code(None), None);
    }

    #[test]
    fn test_to_decimal_defaults_to_zero() {
        assert_eq!(to_decimal(Some("3")), Decimal::new(3, 0));
        assert_eq!(to_decimal(Some(" 2.5 ")), Decimal::new(25, 1));
        assert_eq!(to_decimal(Some("x")), Decimal::ZERO);
        assert_eq!(to_decimal(None), Decimal::ZERO);
    }
}
