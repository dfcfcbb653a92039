//! 宽松的输入规范化：来自 JavaScript 的参数可能类型不对，
//! 这里统一转换为最接近的合法值，无法转换的返回 None 由调用方忽略。

use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::models::{
    format_number, FilterCount, FilterCounts, FilterDimension, FilterPatch, Severity,
    ValidationIssue,
};

/// 单个标量转文本，数字按整数优先格式化
pub fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => number_text(number),
        _ => None,
    }
}

fn number_text(number: &serde_json::Number) -> Option<String> {
    if let Some(value) = number.as_i64() {
        return Some(value.to_string());
    }
    if let Some(value) = number.as_u64() {
        return Some(value.to_string());
    }
    number
        .as_f64()
        .filter(|value| value.is_finite())
        .map(format_number)
}

/// 值列表：数组逐项转换（跳过无法转换的项），单个标量视为单元素列表，其他类型忽略
pub fn string_list(value: &Value) -> Option<Vec<String>> {
    match value {
        Value::Array(items) => Some(items.iter().filter_map(scalar_text).collect()),
        Value::String(_) | Value::Number(_) => scalar_text(value).map(|text| vec![text]),
        _ => None,
    }
}

/// 页码或条数：数字取整，数字文本也接受
pub fn integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number.as_i64().or_else(|| {
            number
                .as_f64()
                .filter(|value| value.is_finite())
                .map(|value| value.trunc().clamp(i64::MIN as f64, i64::MAX as f64) as i64)
        }),
        Value::String(text) => text.trim().parse::<i64>().ok(),
        _ => None,
    }
}

/// 布尔开关，null 视为 false
pub fn flag(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(flag) => Some(*flag),
        Value::Null => Some(false),
        _ => None,
    }
}

fn field<'a>(object: &'a Map<String, Value>, names: &[&str]) -> Option<&'a Value> {
    names.iter().find_map(|name| object.get(*name))
}

/// 从对象构造部分更新，同时接受下划线与驼峰字段名
pub fn filter_patch(value: &Value) -> Option<FilterPatch> {
    let object = value.as_object()?;
    let mut patch = FilterPatch::default();

    for dimension in FilterDimension::ALL {
        let names: &[&str] = match dimension {
            FilterDimension::Subjects => &["subjects"],
            FilterDimension::Categories => &["categories"],
            FilterDimension::ProductTypes => &["product_types", "productTypes"],
            FilterDimension::Products => &["products"],
            FilterDimension::ModesOfDelivery => &["modes_of_delivery", "modesOfDelivery"],
        };
        if let Some(values) = field(object, names).and_then(string_list) {
            patch.set_dimension(dimension, values);
        }
    }

    patch.search_query = field(object, &["searchQuery", "search_query"]).and_then(scalar_text);
    patch.current_page = field(object, &["currentPage", "current_page", "page"]).and_then(integer);
    patch.page_size = field(object, &["pageSize", "page_size"]).and_then(integer);

    Some(patch)
}

/// 筛选计数：未知维度和无法识别的计数被跳过
pub fn filter_counts(value: &Value) -> Option<FilterCounts> {
    let object = value.as_object()?;
    let mut counts = FilterCounts::new();

    for (name, entries) in object {
        let Some(dimension) = FilterDimension::parse(name) else {
            continue;
        };
        let Some(entries) = entries.as_object() else {
            continue;
        };
        let parsed: BTreeMap<String, FilterCount> = entries
            .iter()
            .filter_map(|(key, entry)| {
                serde_json::from_value::<FilterCount>(entry.clone())
                    .ok()
                    .map(|count| (key.clone(), count))
            })
            .collect();
        counts.insert(dimension, parsed);
    }

    Some(counts)
}

/// 校验问题列表：缺少字段或级别未知的条目被跳过
pub fn validation_issues(value: &Value) -> Option<Vec<ValidationIssue>> {
    let items = value.as_array()?;
    Some(
        items
            .iter()
            .filter_map(|item| {
                let object = item.as_object()?;
                let severity = match object.get("severity")?.as_str()? {
                    "error" => Severity::Error,
                    "warning" => Severity::Warning,
                    _ => return None,
                };
                Some(ValidationIssue {
                    field: object.get("field").and_then(scalar_text).unwrap_or_default(),
                    severity,
                    message: object.get("message").and_then(scalar_text).unwrap_or_default(),
                })
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn string_list_coerces_scalars_and_skips_junk() {
        assert_eq!(
            string_list(&json!(["CM2", 101, 7.0, null, {"x": 1}])),
            Some(vec!["CM2".to_string(), "101".to_string(), "7".to_string()])
        );
        assert_eq!(string_list(&json!("CB1")), Some(vec!["CB1".to_string()]));
        assert_eq!(string_list(&json!({"subjects": []})), None);
        assert_eq!(string_list(&Value::Null), None);
    }

    #[test]
    fn integer_truncates_and_parses_text() {
        assert_eq!(integer(&json!(3.9)), Some(3));
        assert_eq!(integer(&json!("-2")), Some(-2));
        assert_eq!(integer(&json!("abc")), None);
        assert_eq!(integer(&json!(true)), None);
    }

    #[test]
    fn filter_patch_accepts_both_naming_styles() {
        let patch = filter_patch(&json!({
            "subjects": ["CM2"],
            "productTypes": ["Tutorial"],
            "modes_of_delivery": "eBook",
            "searchQuery": "exam",
            "page": 3,
            "categories": 12
        }))
        .unwrap();

        assert_eq!(patch.subjects, Some(vec!["CM2".to_string()]));
        assert_eq!(patch.product_types, Some(vec!["Tutorial".to_string()]));
        assert_eq!(patch.modes_of_delivery, Some(vec!["eBook".to_string()]));
        assert_eq!(patch.categories, Some(vec!["12".to_string()]));
        assert_eq!(patch.products, None);
        assert_eq!(patch.search_query.as_deref(), Some("exam"));
        assert_eq!(patch.current_page, Some(3));
        assert!(filter_patch(&json!([1, 2])).is_none());
    }

    #[test]
    fn filter_counts_skip_unknown_dimensions() {
        let counts = filter_counts(&json!({
            "subjects": {"CM2": 4, "SA1": {"name": "Health", "count": 0}, "bad": "x"},
            "postcode": {"AB1": 1}
        }))
        .unwrap();

        assert_eq!(counts.len(), 1);
        let subjects = &counts[&FilterDimension::Subjects];
        assert_eq!(subjects.len(), 2);
        assert_eq!(subjects["SA1"].count(), 0);
    }

    #[test]
    fn validation_issues_require_known_severity() {
        let issues = validation_issues(&json!([
            {"field": "subjects", "severity": "error", "message": "bad"},
            {"field": "categories", "severity": "info", "message": "skip"},
            {"field": "searchQuery", "severity": "warning"}
        ]))
        .unwrap();

        assert_eq!(issues.len(), 2);
        assert_eq!(issues[1].severity, Severity::Warning);
        assert_eq!(issues[1].message, "");
    }
}
