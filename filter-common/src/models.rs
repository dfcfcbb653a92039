use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::hash::Hash;

/// 默认每页条数
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// 筛选维度 - 商品列表可以独立筛选的五个维度
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum FilterDimension {
    /// 科目代码
    Subjects,
    /// 分类
    Categories,
    /// 商品类型（商品组）
    ProductTypes,
    /// 具体商品
    Products,
    /// 交付方式
    ModesOfDelivery,
}

impl FilterDimension {
    pub const ALL: [FilterDimension; 5] = [
        FilterDimension::Subjects,
        FilterDimension::Categories,
        FilterDimension::ProductTypes,
        FilterDimension::Products,
        FilterDimension::ModesOfDelivery,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FilterDimension::Subjects => "subjects",
            FilterDimension::Categories => "categories",
            FilterDimension::ProductTypes => "product_types",
            FilterDimension::Products => "products",
            FilterDimension::ModesOfDelivery => "modes_of_delivery",
        }
    }

    /// 解析维度名称，兼容单数形式和驼峰写法
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim() {
            "subjects" | "subject" => Some(FilterDimension::Subjects),
            "categories" | "category" => Some(FilterDimension::Categories),
            "product_types" | "productTypes" | "product_type" | "group" => {
                Some(FilterDimension::ProductTypes)
            }
            "products" | "product" => Some(FilterDimension::Products),
            "modes_of_delivery" | "modesOfDelivery" | "mode_of_delivery" => {
                Some(FilterDimension::ModesOfDelivery)
            }
            _ => None,
        }
    }
}

impl fmt::Display for FilterDimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 商品标识 - 按值比较，数字标识统一转换为十进制字符串
#[derive(Serialize, Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct ProductId(String);

impl ProductId {
    /// 从文本创建，空白文本返回 None
    pub fn new(raw: impl AsRef<str>) -> Option<Self> {
        let trimmed = raw.as_ref().trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    /// 从数字创建，整数值不带小数部分（123.0 与 "123" 视为同一商品）
    pub fn from_number(value: f64) -> Option<Self> {
        if !value.is_finite() {
            return None;
        }
        Some(Self(format_number(value)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ProductId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawProductId {
            Integer(i64),
            Float(f64),
            Text(String),
        }

        let id = match RawProductId::deserialize(deserializer)? {
            RawProductId::Integer(value) => ProductId::new(value.to_string()),
            RawProductId::Float(value) => ProductId::from_number(value),
            RawProductId::Text(value) => ProductId::new(value),
        };
        id.ok_or_else(|| de::Error::custom("商品标识不能为空"))
    }
}

/// 数字转文本，整数不带小数点
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 9_007_199_254_740_992.0 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

/// 按首次出现的顺序去重
pub fn dedupe<T: Eq + Hash + Clone>(values: impl IntoIterator<Item = T>) -> Vec<T> {
    let mut seen = HashSet::new();
    values
        .into_iter()
        .filter(|value| seen.insert(value.clone()))
        .collect()
}

/// 去除首尾空白、丢弃空值并去重
pub fn normalize_labels(values: impl IntoIterator<Item = String>) -> Vec<String> {
    dedupe(
        values
            .into_iter()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty()),
    )
}

/// 商品标识列表规范化
pub fn normalize_product_ids(values: impl IntoIterator<Item = String>) -> Vec<ProductId> {
    dedupe(values.into_iter().filter_map(ProductId::new))
}

/// 筛选选择 - 商品列表的规范筛选状态
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct FilterSelection {
    /// 科目代码
    pub subjects: Vec<String>,
    /// 分类
    pub categories: Vec<String>,
    /// 商品类型
    pub product_types: Vec<String>,
    /// 商品标识
    pub products: Vec<ProductId>,
    /// 交付方式
    pub modes_of_delivery: Vec<String>,
    /// 搜索文本（已去除首尾空白）
    #[serde(rename = "searchQuery")]
    pub search_query: String,
    /// 模糊搜索得到的商品标识，由外部搜索模块写入
    #[serde(rename = "searchFilterProductIds")]
    pub search_filter_product_ids: Vec<ProductId>,
    /// 当前页码，从1开始
    #[serde(rename = "currentPage")]
    pub current_page: u32,
    /// 每页条数
    #[serde(rename = "pageSize")]
    pub page_size: u32,
}

impl Default for FilterSelection {
    fn default() -> Self {
        Self {
            subjects: Vec::new(),
            categories: Vec::new(),
            product_types: Vec::new(),
            products: Vec::new(),
            modes_of_delivery: Vec::new(),
            search_query: String::new(),
            search_filter_product_ids: Vec::new(),
            current_page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl FilterSelection {
    /// 创建指定每页条数的空选择
    pub fn with_page_size(page_size: u32) -> Self {
        Self {
            page_size: page_size.max(1),
            ..Self::default()
        }
    }

    /// 某个维度的值（文本形式）
    pub fn values(&self, dimension: FilterDimension) -> Vec<&str> {
        match dimension {
            FilterDimension::Products => self.products.iter().map(ProductId::as_str).collect(),
            other => self
                .labels(other)
                .map(|labels| labels.iter().map(String::as_str).collect())
                .unwrap_or_default(),
        }
    }

    /// 某个维度已选值的数量
    pub fn len_of(&self, dimension: FilterDimension) -> usize {
        match dimension {
            FilterDimension::Products => self.products.len(),
            other => self.labels(other).map(Vec::len).unwrap_or(0),
        }
    }

    /// 整体替换某个维度，输入会被去重
    pub fn replace(&mut self, dimension: FilterDimension, values: Vec<String>) {
        match dimension {
            FilterDimension::Products => self.products = normalize_product_ids(values),
            other => {
                if let Some(labels) = self.labels_mut(other) {
                    *labels = normalize_labels(values);
                }
            }
        }
    }

    /// 切换某个值：存在则移除，不存在则追加。空白值忽略，返回是否有变化
    pub fn toggle(&mut self, dimension: FilterDimension, value: &str) -> bool {
        let value = value.trim();
        if value.is_empty() {
            return false;
        }
        if !self.remove(dimension, value) {
            match dimension {
                FilterDimension::Products => {
                    if let Some(id) = ProductId::new(value) {
                        self.products.push(id);
                    }
                }
                other => {
                    if let Some(labels) = self.labels_mut(other) {
                        labels.push(value.to_string());
                    }
                }
            }
        }
        true
    }

    /// 移除某个值，返回是否确实移除
    pub fn remove(&mut self, dimension: FilterDimension, value: &str) -> bool {
        let value = value.trim();
        match dimension {
            FilterDimension::Products => {
                let before = self.products.len();
                self.products.retain(|id| id.as_str() != value);
                before != self.products.len()
            }
            other => match self.labels_mut(other) {
                Some(labels) => {
                    let before = labels.len();
                    labels.retain(|label| label != value);
                    before != labels.len()
                }
                None => false,
            },
        }
    }

    /// 清空某个维度
    pub fn clear(&mut self, dimension: FilterDimension) {
        match dimension {
            FilterDimension::Products => self.products.clear(),
            other => {
                if let Some(labels) = self.labels_mut(other) {
                    labels.clear();
                }
            }
        }
    }

    /// 清空全部筛选维度与搜索条件，分页回到第一页
    pub fn clear_filters(&mut self) {
        for dimension in FilterDimension::ALL {
            self.clear(dimension);
        }
        self.search_query.clear();
        self.search_filter_product_ids.clear();
        self.current_page = 1;
    }

    /// 去除空白后的搜索文本是否非空
    pub fn has_search(&self) -> bool {
        !self.search_query.trim().is_empty()
    }

    /// 五个维度的已选值总数，加上非空搜索计为1
    pub fn active_filter_count(&self) -> usize {
        let values: usize = FilterDimension::ALL
            .iter()
            .map(|dimension| self.len_of(*dimension))
            .sum();
        values + usize::from(self.has_search())
    }

    pub fn has_active_filters(&self) -> bool {
        self.active_filter_count() > 0
    }

    /// 比较筛选条件（集合语义，不关心顺序与分页）
    pub fn same_filters(&self, other: &FilterSelection) -> bool {
        FilterDimension::ALL.iter().all(|dimension| {
            let left: HashSet<&str> = self.values(*dimension).into_iter().collect();
            let right: HashSet<&str> = other.values(*dimension).into_iter().collect();
            left == right
        }) && self.search_query.trim() == other.search_query.trim()
    }

    fn labels(&self, dimension: FilterDimension) -> Option<&Vec<String>> {
        match dimension {
            FilterDimension::Subjects => Some(&self.subjects),
            FilterDimension::Categories => Some(&self.categories),
            FilterDimension::ProductTypes => Some(&self.product_types),
            FilterDimension::ModesOfDelivery => Some(&self.modes_of_delivery),
            FilterDimension::Products => None,
        }
    }

    fn labels_mut(&mut self, dimension: FilterDimension) -> Option<&mut Vec<String>> {
        match dimension {
            FilterDimension::Subjects => Some(&mut self.subjects),
            FilterDimension::Categories => Some(&mut self.categories),
            FilterDimension::ProductTypes => Some(&mut self.product_types),
            FilterDimension::ModesOfDelivery => Some(&mut self.modes_of_delivery),
            FilterDimension::Products => None,
        }
    }
}

/// 部分更新 - 只替换携带了值的字段
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterPatch {
    pub subjects: Option<Vec<String>>,
    pub categories: Option<Vec<String>>,
    pub product_types: Option<Vec<String>>,
    pub products: Option<Vec<String>>,
    pub modes_of_delivery: Option<Vec<String>>,
    pub search_query: Option<String>,
    pub current_page: Option<i64>,
    pub page_size: Option<i64>,
}

impl FilterPatch {
    /// 覆盖全部筛选字段（不含分页）的补丁
    pub fn from_selection(selection: &FilterSelection) -> Self {
        let owned = |values: Vec<&str>| -> Vec<String> {
            values.into_iter().map(str::to_string).collect()
        };
        Self {
            subjects: Some(owned(selection.values(FilterDimension::Subjects))),
            categories: Some(owned(selection.values(FilterDimension::Categories))),
            product_types: Some(owned(selection.values(FilterDimension::ProductTypes))),
            products: Some(owned(selection.values(FilterDimension::Products))),
            modes_of_delivery: Some(owned(selection.values(FilterDimension::ModesOfDelivery))),
            search_query: Some(selection.search_query.clone()),
            current_page: None,
            page_size: None,
        }
    }

    pub fn dimension(&self, dimension: FilterDimension) -> Option<&Vec<String>> {
        match dimension {
            FilterDimension::Subjects => self.subjects.as_ref(),
            FilterDimension::Categories => self.categories.as_ref(),
            FilterDimension::ProductTypes => self.product_types.as_ref(),
            FilterDimension::Products => self.products.as_ref(),
            FilterDimension::ModesOfDelivery => self.modes_of_delivery.as_ref(),
        }
    }

    pub fn set_dimension(&mut self, dimension: FilterDimension, values: Vec<String>) {
        let slot = match dimension {
            FilterDimension::Subjects => &mut self.subjects,
            FilterDimension::Categories => &mut self.categories,
            FilterDimension::ProductTypes => &mut self.product_types,
            FilterDimension::Products => &mut self.products,
            FilterDimension::ModesOfDelivery => &mut self.modes_of_delivery,
        };
        *slot = Some(values);
    }

    pub fn is_empty(&self) -> bool {
        self == &FilterPatch::default()
    }

    /// 补丁是否带有非空筛选条件
    pub fn has_filters(&self) -> bool {
        FilterDimension::ALL.iter().any(|dimension| {
            self.dimension(*dimension)
                .map(|values| values.iter().any(|value| !value.trim().is_empty()))
                .unwrap_or(false)
        }) || self
            .search_query
            .as_deref()
            .map(|query| !query.trim().is_empty())
            .unwrap_or(false)
    }
}

/// 单个筛选值的计数，后端可能返回纯数字或带名称的对象
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum FilterCount {
    Plain(u64),
    Named { name: String, count: u64 },
}

impl FilterCount {
    pub fn count(&self) -> u64 {
        match self {
            FilterCount::Plain(count) => *count,
            FilterCount::Named { count, .. } => *count,
        }
    }
}

/// 维度 -> (值 -> 计数)
pub type FilterCounts = BTreeMap<FilterDimension, BTreeMap<String, FilterCount>>;

/// 校验问题级别
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// 筛选组合的校验问题，只用于界面展示，不阻止后续操作
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    pub field: String,
    pub severity: Severity,
    pub message: String,
}

impl ValidationIssue {
    pub fn error(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            severity: Severity::Error,
            message: message.into(),
        }
    }

    pub fn warning(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            severity: Severity::Warning,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn replace_removes_duplicates_and_blanks() {
        let mut selection = FilterSelection::default();
        selection.replace(
            FilterDimension::Subjects,
            vec!["CM2".into(), " SA1 ".into(), "CM2".into(), "  ".into()],
        );
        assert_eq!(selection.subjects, vec!["CM2".to_string(), "SA1".to_string()]);
    }

    #[test]
    fn numeric_and_text_product_ids_are_the_same_product() {
        let ids: Vec<ProductId> = serde_json::from_str(r#"[123, "123", 123.0, "456"]"#).unwrap();
        assert_eq!(dedupe(ids).len(), 2);
        assert_eq!(ProductId::from_number(42.0).unwrap().as_str(), "42");
        assert_eq!(ProductId::from_number(1.5).unwrap().as_str(), "1.5");
        assert!(ProductId::from_number(f64::NAN).is_none());
        assert!(serde_json::from_str::<ProductId>(r#""   ""#).is_err());
    }

    #[test]
    fn toggle_twice_restores_original() {
        let mut selection = FilterSelection::default();
        selection.replace(FilterDimension::Categories, vec!["Bundle".into()]);
        let original = selection.clone();

        assert!(selection.toggle(FilterDimension::Categories, "Materials"));
        assert_eq!(selection.categories, vec!["Bundle", "Materials"]);
        assert!(selection.toggle(FilterDimension::Categories, "Materials"));
        assert_eq!(selection, original);
        assert!(!selection.toggle(FilterDimension::Categories, "  "));
    }

    #[test]
    fn whitespace_search_is_not_an_active_filter() {
        let mut selection = FilterSelection::default();
        selection.search_query = "   ".into();
        assert_eq!(selection.active_filter_count(), 0);
        assert!(!selection.has_active_filters());
    }

    #[test]
    fn same_filters_ignores_order() {
        let mut left = FilterSelection::default();
        left.replace(FilterDimension::Subjects, vec!["CM2".into(), "SA1".into()]);
        let mut right = FilterSelection::default();
        right.replace(FilterDimension::Subjects, vec!["SA1".into(), "CM2".into()]);
        right.current_page = 4;
        assert!(left.same_filters(&right));

        right.search_query = "exam".into();
        assert!(!left.same_filters(&right));
    }

    #[test]
    fn counts_accept_plain_and_named_entries() {
        let counts: BTreeMap<String, FilterCount> =
            serde_json::from_str(r#"{"CM2": 12, "SA1": {"name": "Health", "count": 3}}"#).unwrap();
        assert_eq!(counts["CM2"].count(), 12);
        assert_eq!(counts["SA1"].count(), 3);
    }

    #[test]
    fn dimension_names_round_trip() {
        for dimension in FilterDimension::ALL {
            assert_eq!(FilterDimension::parse(dimension.as_str()), Some(dimension));
        }
        assert_eq!(FilterDimension::parse("modesOfDelivery"), Some(FilterDimension::ModesOfDelivery));
        assert_eq!(FilterDimension::parse("postal_code"), None);
    }
}
