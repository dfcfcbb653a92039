//! 选择器：对状态的纯派生。组合类选择器带缓存，
//! 相关状态未变化时返回同一个 `Rc`，界面可以用指针比较跳过重绘。

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::cell::RefCell;
use std::rc::Rc;

use filter_common::{FilterCounts, FilterSelection, ProductId, Severity, ValidationIssue};

use crate::store::FilterState;

/// 六个可筛选项：五个维度加搜索文本
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct SelectedFilters {
    pub subjects: Vec<String>,
    pub categories: Vec<String>,
    pub product_types: Vec<String>,
    pub products: Vec<ProductId>,
    pub modes_of_delivery: Vec<String>,
    #[serde(rename = "searchQuery")]
    pub search_query: String,
}

impl SelectedFilters {
    fn from_selection(selection: &FilterSelection) -> Self {
        Self {
            subjects: selection.subjects.clone(),
            categories: selection.categories.clone(),
            product_types: selection.product_types.clone(),
            products: selection.products.clone(),
            modes_of_delivery: selection.modes_of_delivery.clone(),
            search_query: selection.search_query.clone(),
        }
    }

    fn matches(&self, selection: &FilterSelection) -> bool {
        self.subjects == selection.subjects
            && self.categories == selection.categories
            && self.product_types == selection.product_types
            && self.products == selection.products
            && self.modes_of_delivery == selection.modes_of_delivery
            && self.search_query == selection.search_query
    }

    fn active_count(&self) -> usize {
        self.subjects.len()
            + self.categories.len()
            + self.product_types.len()
            + self.products.len()
            + self.modes_of_delivery.len()
            + usize::from(!self.search_query.trim().is_empty())
    }
}

/// 已选筛选条件摘要
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ActiveFilterSummary {
    pub subjects: Vec<String>,
    pub categories: Vec<String>,
    pub product_types: Vec<String>,
    pub products: Vec<ProductId>,
    pub modes_of_delivery: Vec<String>,
    #[serde(rename = "searchQuery")]
    pub search_query: String,
    #[serde(rename = "totalCount")]
    pub total_count: usize,
    #[serde(rename = "hasFilters")]
    pub has_filters: bool,
}

impl ActiveFilterSummary {
    fn from_filters(filters: &SelectedFilters) -> Self {
        let total_count = filters.active_count();
        Self {
            subjects: filters.subjects.clone(),
            categories: filters.categories.clone(),
            product_types: filters.product_types.clone(),
            products: filters.products.clone(),
            modes_of_delivery: filters.modes_of_delivery.clone(),
            search_query: filters.search_query.clone(),
            total_count,
            has_filters: total_count > 0,
        }
    }
}

/// 带缓存的选择器，每个仓库一份
#[derive(Debug, Default)]
pub struct Selectors {
    filters: RefCell<Option<Rc<SelectedFilters>>>,
    summary: RefCell<Option<(Rc<SelectedFilters>, Rc<ActiveFilterSummary>)>>,
}

impl Selectors {
    /// 六个可筛选项，任一项变化才重新计算
    pub fn select_filters(&self, state: &FilterState) -> Rc<SelectedFilters> {
        let mut cache = self.filters.borrow_mut();
        if let Some(cached) = cache.as_ref() {
            if cached.matches(&state.selection) {
                return Rc::clone(cached);
            }
        }
        let fresh = Rc::new(SelectedFilters::from_selection(&state.selection));
        *cache = Some(Rc::clone(&fresh));
        fresh
    }

    /// 摘要依赖 `select_filters` 的结果，输入引用不变时返回同一个对象
    pub fn select_active_filter_summary(&self, state: &FilterState) -> Rc<ActiveFilterSummary> {
        let filters = self.select_filters(state);
        let mut cache = self.summary.borrow_mut();
        if let Some((input, summary)) = cache.as_ref() {
            if Rc::ptr_eq(input, &filters) {
                return Rc::clone(summary);
            }
        }
        let summary = Rc::new(ActiveFilterSummary::from_filters(&filters));
        *cache = Some((filters, Rc::clone(&summary)));
        summary
    }
}

pub fn select_has_active_filters(state: &FilterState) -> bool {
    state.selection.has_active_filters()
}

pub fn select_active_filter_count(state: &FilterState) -> usize {
    state.selection.active_filter_count()
}

pub fn select_validation_errors(state: &FilterState) -> &[ValidationIssue] {
    &state.ui.validation_errors
}

/// 只有 error 级别才算，单纯的 warning 不算
pub fn select_has_validation_errors(state: &FilterState) -> bool {
    state
        .ui
        .validation_errors
        .iter()
        .any(|issue| issue.severity == Severity::Error)
}

/// 当前选择与最近一次提交的快照是否不同
pub fn select_has_pending_changes(state: &FilterState) -> bool {
    !state.selection.same_filters(&state.ui.applied_filters)
}

pub fn select_current_page(state: &FilterState) -> u32 {
    state.selection.current_page
}

pub fn select_page_size(state: &FilterState) -> u32 {
    state.selection.page_size
}

pub fn select_search_filter_product_ids(state: &FilterState) -> &[ProductId] {
    &state.selection.search_filter_product_ids
}

pub fn select_is_loading(state: &FilterState) -> bool {
    state.ui.is_loading
}

pub fn select_is_filter_panel_open(state: &FilterState) -> bool {
    state.ui.is_filter_panel_open
}

pub fn select_error(state: &FilterState) -> Option<&serde_json::Value> {
    state.ui.error.as_ref()
}

pub fn select_filter_counts(state: &FilterState) -> &FilterCounts {
    &state.ui.filter_counts
}

pub fn select_applied_filters(state: &FilterState) -> &FilterSelection {
    &state.ui.applied_filters
}

pub fn select_last_updated(state: &FilterState) -> Option<DateTime<Utc>> {
    state.ui.last_updated
}
