use filter_common::{FilterCounts, FilterDimension, FilterSelection, ValidationIssue};

use crate::config::StoreConfig;

/// 检查筛选组合，返回按维度顺序排列的问题列表
pub fn validate_selection(
    selection: &FilterSelection,
    counts: &FilterCounts,
    config: &StoreConfig,
) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    // 计数已知且为0的值：筛选后没有商品
    for dimension in FilterDimension::ALL {
        let Some(known) = counts.get(&dimension) else {
            continue;
        };
        for value in selection.values(dimension) {
            if known.get(value).map_or(false, |count| count.count() == 0) {
                issues.push(ValidationIssue::warning(
                    dimension.as_str(),
                    format!("没有商品符合筛选条件 \"{}\"", value),
                ));
            }
        }
    }

    let search = selection.search_query.trim();
    let length = search.chars().count();
    if length > config.max_search_length {
        issues.push(ValidationIssue::error(
            "searchQuery",
            format!("搜索内容不能超过 {} 个字符", config.max_search_length),
        ));
    } else if length > 0 && length < config.min_search_length {
        issues.push(ValidationIssue::warning(
            "searchQuery",
            format!("搜索内容至少需要 {} 个字符", config.min_search_length),
        ));
    }

    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use filter_common::{FilterCount, Severity};
    use std::collections::BTreeMap;

    #[test]
    fn zero_count_selection_is_a_warning() {
        let mut selection = FilterSelection::default();
        selection.replace(FilterDimension::Subjects, vec!["CM2".into(), "SA1".into(), "CB1".into()]);

        let mut subjects = BTreeMap::new();
        subjects.insert("CM2".to_string(), FilterCount::Plain(5));
        subjects.insert(
            "SA1".to_string(),
            FilterCount::Named { name: "Health".into(), count: 0 },
        );
        let mut counts = FilterCounts::new();
        counts.insert(FilterDimension::Subjects, subjects);

        let issues = validate_selection(&selection, &counts, &StoreConfig::default());
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].field, "subjects");
        assert_eq!(issues[0].severity, Severity::Warning);
        assert!(issues[0].message.contains("SA1"));
    }

    #[test]
    fn search_length_limits() {
        let config = StoreConfig::default();
        let mut selection = FilterSelection::default();

        selection.search_query = "x".into();
        let issues = validate_selection(&selection, &FilterCounts::new(), &config);
        assert_eq!(issues[0].severity, Severity::Warning);

        selection.search_query = "y".repeat(config.max_search_length + 1);
        let issues = validate_selection(&selection, &FilterCounts::new(), &config);
        assert_eq!(issues[0].severity, Severity::Error);

        selection.search_query = "actuarial".into();
        assert!(validate_selection(&selection, &FilterCounts::new(), &config).is_empty());
    }
}
