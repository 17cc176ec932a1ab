// ==========================================
// 库存批量导入 - 数据清洗
// ==========================================
// 职责: NULL 标准化 / 编码归一化 / 数量解析
// ==========================================

/// 标准化 NULL 值（空字符串/空白 → None），非空值保留原样
pub fn normalize_null(value: Option<&String>) -> Option<String> {
    value.and_then(|v| {
        if v.trim().is_empty() {
            None
        } else {
            Some(v.clone())
        }
    })
}

/// 编码归一化键
///
/// 规则: 大小写折叠 + 去除所有空白与标点，仅保留字母数字。
/// 例: `" abc-01 "` → `"abc01"`，`"Bodega Central"` → `"bodegacentral"`
pub fn normalize_code(value: &str) -> String {
    value
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(|c| c.to_lowercase())
        .collect()
}

/// 模糊比对前的轻度清洗（TRIM + UPPER，保留标点）
pub fn fuzzy_key(value: &str) -> String {
    value.trim().to_uppercase()
}

/// 解析数量
///
/// 支持: `1234.5` / `1,234.5` / `12,5`（逗号小数）/ 前后空白
/// 返回 None: 空值、无法解析、NaN/无穷、单个逗号后恰为三位数字（如 `1,234`）
pub fn parse_quantity(value: &str) -> Option<f64> {
    let compact: String = value.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty() {
        return None;
    }

    let canonical = if compact.contains(',') && compact.contains('.') {
        // 千分位逗号
        compact.replace(',', "")
    } else if compact.matches(',').count() == 1 {
        // "1,234" 既可能是千分位也可能是逗号小数，无法判定时拒绝
        let decimals = compact.split(',').nth(1).unwrap_or("");
        if decimals.len() == 3 && decimals.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        // 逗号小数
        compact.replace(',', ".")
    } else {
        compact
    };

    canonical.parse::<f64>().ok().filter(|q| q.is_finite())
}

/// 数量是否满足最小阈值
pub fn is_valid_quantity(quantity: Option<f64>, min_quantity: f64) -> bool {
    matches!(quantity, Some(q) if q > 0.0 && q >= min_quantity)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_null() {
        assert_eq!(normalize_null(Some(&"  ".to_string())), None);
        assert_eq!(normalize_null(None), None);
        assert_eq!(
            normalize_null(Some(&" ABC ".to_string())),
            Some(" ABC ".to_string())
        );
    }

    #[test]
    fn test_normalize_code() {
        assert_eq!(normalize_code("ABC-01 "), "abc01");
        assert_eq!(normalize_code(" abc_01"), "abc01");
        assert_eq!(normalize_code("A.B C/01"), "abc01");
        assert_eq!(normalize_code("---"), "");
    }

    #[test]
    fn test_parse_quantity_formats() {
        assert_eq!(parse_quantity("5"), Some(5.0));
        assert_eq!(parse_quantity(" 12.25 "), Some(12.25));
        assert_eq!(parse_quantity("12,5"), Some(12.5));
        assert_eq!(parse_quantity("1,234.5"), Some(1234.5));
        assert_eq!(parse_quantity("abc"), None);
        assert_eq!(parse_quantity(""), None);
        assert_eq!(parse_quantity("NaN"), None);
        assert_eq!(parse_quantity("inf"), None);
    }

    #[test]
    fn test_parse_quantity_rejects_ambiguous_comma() {
        assert_eq!(parse_quantity("1,234"), None);
        assert_eq!(parse_quantity("12,500"), None);
        assert_eq!(parse_quantity("1,23"), Some(1.23));
        assert_eq!(parse_quantity("1,2345"), Some(1.2345));
        assert_eq!(parse_quantity("1,234.0"), Some(1234.0));
    }

    #[test]
    fn test_is_valid_quantity() {
        assert!(is_valid_quantity(Some(1.0), 0.0001));
        assert!(is_valid_quantity(Some(0.0001), 0.0001));
        assert!(!is_valid_quantity(Some(0.0), 0.0001));
        assert!(!is_valid_quantity(Some(-3.0), 0.0001));
        assert!(!is_valid_quantity(Some(0.00001), 0.0001));
        assert!(!is_valid_quantity(None, 0.0001));
    }
}
