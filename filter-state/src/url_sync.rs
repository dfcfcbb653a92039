//! 地址栏同步：筛选选择与 URL 查询串之间的双向映射。
//!
//! 参数格式：
//! - 科目：`subject_code` 为第一个，其余依次为 `subject_1`、`subject_2`……
//! - 分类：`category_code`、`category_1`……
//! - 商品类型 `group`、商品 `product`、交付方式 `mode_of_delivery`：逗号连接
//! - 搜索：读取 `search_query`、`q`、`search`，写入 `search_query`

use once_cell::sync::Lazy;
use regex::Regex;
use std::cell::RefCell;
use std::rc::Rc;
use url::form_urlencoded;

use filter_common::{FilterDimension, FilterPatch, FilterSelection};

use crate::error::SyncError;

pub const SUBJECT_CODE: &str = "subject_code";
pub const CATEGORY_CODE: &str = "category_code";
pub const GROUP: &str = "group";
pub const PRODUCT: &str = "product";
pub const MODE_OF_DELIVERY: &str = "mode_of_delivery";
pub const SEARCH_QUERY: &str = "search_query";
/// 读取时按此顺序取第一个非空的搜索参数
pub const SEARCH_ALIASES: [&str; 3] = [SEARCH_QUERY, "q", "search"];

static INDEXED_PARAM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(subject|category)_([0-9]+)$").expect("索引参数正则无效"));

/// 写入地址栏的方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryMode {
    /// 替换当前历史记录
    Replace,
    /// 新增历史记录（导航菜单）
    Push,
}

/// 地址栏查询串的读写
pub trait AddressBar {
    /// 当前查询串（可带前导 `?`），不可用时返回 None
    fn search(&self) -> Option<String>;
    /// 写入查询串（不带 `?`）
    fn write_search(&mut self, query: &str, mode: HistoryMode) -> Result<(), SyncError>;
}

/// 解码结果：完整的筛选条件补丁，以及地址栏中是否确实带有筛选条件
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedQuery {
    pub patch: FilterPatch,
    pub has_filters: bool,
}

/// 取出查询部分：接受裸查询串、带 `?` 的查询串或完整 URL，丢弃片段
pub fn query_part(input: &str) -> &str {
    let without_fragment = input.split('#').next().unwrap_or_default();
    match without_fragment.split_once('?') {
        Some((_, query)) => query,
        None if without_fragment.contains("://") => "",
        None => without_fragment,
    }
}

/// 是否为本模块管理的参数
pub fn is_managed_param(name: &str) -> bool {
    matches!(
        name,
        SUBJECT_CODE | CATEGORY_CODE | GROUP | PRODUCT | MODE_OF_DELIVERY
    ) || SEARCH_ALIASES.contains(&name)
        || INDEXED_PARAM.is_match(name)
}

fn push_indexed(pairs: &mut Vec<(String, String)>, code_key: &str, prefix: &str, values: &[&str]) {
    for (index, value) in values.iter().enumerate() {
        let key = if index == 0 {
            code_key.to_string()
        } else {
            format!("{}_{}", prefix, index)
        };
        pairs.push((key, value.to_string()));
    }
}

fn push_joined(pairs: &mut Vec<(String, String)>, key: &str, values: &[&str]) {
    if !values.is_empty() {
        pairs.push((key.to_string(), values.join(",")));
    }
}

/// 选择 -> 参数列表（顺序固定）
pub fn encode_pairs(selection: &FilterSelection) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    push_indexed(
        &mut pairs,
        SUBJECT_CODE,
        "subject",
        &selection.values(FilterDimension::Subjects),
    );
    push_indexed(
        &mut pairs,
        CATEGORY_CODE,
        "category",
        &selection.values(FilterDimension::Categories),
    );
    push_joined(&mut pairs, GROUP, &selection.values(FilterDimension::ProductTypes));
    push_joined(&mut pairs, PRODUCT, &selection.values(FilterDimension::Products));
    push_joined(
        &mut pairs,
        MODE_OF_DELIVERY,
        &selection.values(FilterDimension::ModesOfDelivery),
    );
    let search = selection.search_query.trim();
    if !search.is_empty() {
        pairs.push((SEARCH_QUERY.to_string(), search.to_string()));
    }
    pairs
}

fn serialize_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> String {
    form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs)
        .finish()
}

/// 选择 -> 查询串（不带 `?`）
pub fn encode_query(selection: &FilterSelection) -> String {
    let pairs = encode_pairs(selection);
    serialize_pairs(pairs.iter().map(|(key, value)| (key.as_str(), value.as_str())))
}

/// 列表接口的查询参数：已提交快照的编码加上分页
pub fn to_api_query(applied: &FilterSelection, page: u32, page_size: u32) -> String {
    let mut pairs = encode_pairs(applied);
    pairs.push(("page".to_string(), page.to_string()));
    pairs.push(("page_size".to_string(), page_size.to_string()));
    serialize_pairs(pairs.iter().map(|(key, value)| (key.as_str(), value.as_str())))
}

fn split_list(value: &str) -> impl Iterator<Item = String> + '_ {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
}

/// 查询串 -> 完整补丁。未知参数被忽略；缺失的维度解码为空列表
pub fn decode_query(input: &str) -> DecodedQuery {
    let mut subject_code = Vec::new();
    let mut category_code = Vec::new();
    let mut indexed_subjects: Vec<(u64, String)> = Vec::new();
    let mut indexed_categories: Vec<(u64, String)> = Vec::new();
    let mut groups = Vec::new();
    let mut products = Vec::new();
    let mut modes = Vec::new();
    let mut searches: Vec<(usize, String)> = Vec::new();

    for (key, value) in form_urlencoded::parse(query_part(input).as_bytes()) {
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        match key.as_ref() {
            SUBJECT_CODE => subject_code.push(value.to_string()),
            CATEGORY_CODE => category_code.push(value.to_string()),
            GROUP => groups.extend(split_list(value)),
            PRODUCT => products.extend(split_list(value)),
            MODE_OF_DELIVERY => modes.extend(split_list(value)),
            other => {
                if let Some(rank) = SEARCH_ALIASES.iter().position(|alias| *alias == other) {
                    searches.push((rank, value.to_string()));
                } else if let Some(captures) = INDEXED_PARAM.captures(other) {
                    // 超出 u64 的序号视为无效参数
                    let Ok(index) = captures[2].parse::<u64>() else {
                        continue;
                    };
                    let target = if &captures[1] == "subject" {
                        &mut indexed_subjects
                    } else {
                        &mut indexed_categories
                    };
                    target.push((index, value.to_string()));
                }
            }
        }
    }

    indexed_subjects.sort_by_key(|(index, _)| *index);
    indexed_categories.sort_by_key(|(index, _)| *index);
    searches.sort_by_key(|(rank, _)| *rank);

    let subjects: Vec<String> = subject_code
        .into_iter()
        .chain(indexed_subjects.into_iter().map(|(_, value)| value))
        .collect();
    let categories: Vec<String> = category_code
        .into_iter()
        .chain(indexed_categories.into_iter().map(|(_, value)| value))
        .collect();
    let search_query = searches
        .into_iter()
        .next()
        .map(|(_, value)| value)
        .unwrap_or_default();

    let patch = FilterPatch {
        subjects: Some(subjects),
        categories: Some(categories),
        product_types: Some(groups),
        products: Some(products),
        modes_of_delivery: Some(modes),
        search_query: Some(search_query),
        current_page: None,
        page_size: None,
    };
    let has_filters = patch.has_filters();
    DecodedQuery { patch, has_filters }
}

/// 用新的筛选参数替换现有查询串中的受管参数，其他参数原样保留
pub fn merge_query(existing: &str, selection: &FilterSelection) -> String {
    let retained: Vec<(String, String)> = form_urlencoded::parse(query_part(existing).as_bytes())
        .filter(|(key, _)| !is_managed_param(key))
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();
    let encoded = encode_pairs(selection);
    serialize_pairs(
        retained
            .iter()
            .chain(encoded.iter())
            .map(|(key, value)| (key.as_str(), value.as_str())),
    )
}

/// 地址栏同步器
pub struct UrlSynchronizer {
    bar: Box<dyn AddressBar>,
}

impl UrlSynchronizer {
    pub fn new(bar: Box<dyn AddressBar>) -> Self {
        Self { bar }
    }

    /// 读取并解码地址栏；地址栏不可用时返回 None
    pub fn read(&self) -> Option<DecodedQuery> {
        let search = self.bar.search();
        if search.is_none() {
            log::debug!("地址栏不可用，跳过读取筛选参数");
        }
        search.map(|query| decode_query(&query))
    }

    /// 将选择写入地址栏；查询串不变时不写入，失败只记录日志
    pub fn write(&mut self, selection: &FilterSelection, mode: HistoryMode) {
        let current = self.bar.search().unwrap_or_default();
        let next = merge_query(&current, selection);
        if next == query_part(&current) {
            return;
        }
        if let Err(e) = self.bar.write_search(&next, mode) {
            log::warn!("同步地址栏失败: {}", e);
        }
    }
}

/// 内存中的地址栏，克隆后共享同一份数据
#[derive(Debug, Clone, Default)]
pub struct MemoryAddressBar {
    inner: Rc<RefCell<MemoryAddressBarInner>>,
}

#[derive(Debug, Default)]
struct MemoryAddressBarInner {
    search: String,
    history: Vec<(HistoryMode, String)>,
}

impl MemoryAddressBar {
    pub fn new(initial: &str) -> Self {
        let bar = Self::default();
        bar.inner.borrow_mut().search = query_part(initial).to_string();
        bar
    }

    /// 当前查询串（不带 `?`）
    pub fn current(&self) -> String {
        self.inner.borrow().search.clone()
    }

    /// 模拟用户在地址栏中跳转（例如浏览器后退）
    pub fn navigate(&self, query: &str) {
        self.inner.borrow_mut().search = query_part(query).to_string();
    }

    /// 所有写入记录
    pub fn history(&self) -> Vec<(HistoryMode, String)> {
        self.inner.borrow().history.clone()
    }
}

impl AddressBar for MemoryAddressBar {
    fn search(&self) -> Option<String> {
        Some(self.inner.borrow().search.clone())
    }

    fn write_search(&mut self, query: &str, mode: HistoryMode) -> Result<(), SyncError> {
        let mut inner = self.inner.borrow_mut();
        inner.search = query.to_string();
        inner.history.push((mode, query.to_string()));
        Ok(())
    }
}
