//! 筛选状态仓库：筛选选择与界面元数据的唯一来源，只能通过 [`FilterAction`] 修改。

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::rc::Rc;

use filter_common::models::normalize_product_ids;
use filter_common::{FilterCounts, FilterDimension, FilterPatch, FilterSelection, ValidationIssue};

use crate::clock::Clock;
use crate::config::StoreConfig;
use crate::persistence::{CookieJar, CookiePersistence};
use crate::selectors::{ActiveFilterSummary, SelectedFilters, Selectors};
use crate::url_sync::{AddressBar, HistoryMode, UrlSynchronizer};
use crate::validation::validate_selection;

/// 界面元数据 - 不持久化
#[derive(Serialize, Debug, Clone, PartialEq, Default)]
pub struct UiMeta {
    #[serde(rename = "isFilterPanelOpen")]
    pub is_filter_panel_open: bool,
    #[serde(rename = "isLoading")]
    pub is_loading: bool,
    pub error: Option<serde_json::Value>,
    #[serde(rename = "filterCounts")]
    pub filter_counts: FilterCounts,
    /// 最近一次查询实际使用的筛选快照
    #[serde(rename = "appliedFilters")]
    pub applied_filters: FilterSelection,
    #[serde(rename = "lastUpdated")]
    pub last_updated: Option<DateTime<Utc>>,
    #[serde(rename = "validationErrors")]
    pub validation_errors: Vec<ValidationIssue>,
}

/// 完整状态
#[derive(Serialize, Debug, Clone, PartialEq, Default)]
pub struct FilterState {
    #[serde(flatten)]
    pub selection: FilterSelection,
    #[serde(flatten)]
    pub ui: UiMeta,
}

impl FilterState {
    /// 按配置创建空状态
    pub fn initial(config: &StoreConfig) -> Self {
        let selection = FilterSelection::with_page_size(config.default_page_size);
        Self {
            ui: UiMeta {
                applied_filters: selection.clone(),
                ..UiMeta::default()
            },
            selection,
        }
    }
}

/// 所有修改操作的封闭集合
#[derive(Debug, Clone, PartialEq)]
pub enum FilterAction {
    SetSubjects(Vec<String>),
    SetCategories(Vec<String>),
    SetProductTypes(Vec<String>),
    SetProducts(Vec<String>),
    SetModesOfDelivery(Vec<String>),
    /// 面板内切换单个值
    Toggle { dimension: FilterDimension, value: String },
    RemoveFilter { dimension: FilterDimension, value: String },
    ClearFilterType(FilterDimension),
    SetSearchQuery(String),
    SetSearchFilterProductIds(Vec<String>),
    SetMultipleFilters(FilterPatch),
    /// 与 SetMultipleFilters 相同，但来源是地址栏，不会回写地址栏
    RestoreFromUrl(FilterPatch),
    SetCurrentPage(i64),
    SetPageSize(i64),
    NavSelectSubject(String),
    NavSelectProductGroup(String),
    NavSelectProduct(String),
    NavSelectModeOfDelivery(String),
    NavViewAllProducts,
    ResetFilters,
    ApplyFilters,
    SetFilterCounts(FilterCounts),
    SetLoading(bool),
    SetError(Option<serde_json::Value>),
    SetFilterPanelOpen(bool),
    ToggleFilterPanel,
    SetValidationErrors(Vec<ValidationIssue>),
    ClearValidationErrors,
}

/// 操作类型（不含参数），持久化与地址栏同步按类型穷举判断
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    SetSubjects,
    SetCategories,
    SetProductTypes,
    SetProducts,
    SetModesOfDelivery,
    Toggle,
    RemoveFilter,
    ClearFilterType,
    SetSearchQuery,
    SetSearchFilterProductIds,
    SetMultipleFilters,
    RestoreFromUrl,
    SetCurrentPage,
    SetPageSize,
    NavSelectSubject,
    NavSelectProductGroup,
    NavSelectProduct,
    NavSelectModeOfDelivery,
    NavViewAllProducts,
    ResetFilters,
    ApplyFilters,
    SetFilterCounts,
    SetLoading,
    SetError,
    SetFilterPanelOpen,
    ToggleFilterPanel,
    SetValidationErrors,
    ClearValidationErrors,
}

impl FilterAction {
    pub fn kind(&self) -> ActionKind {
        match self {
            FilterAction::SetSubjects(_) => ActionKind::SetSubjects,
            FilterAction::SetCategories(_) => ActionKind::SetCategories,
            FilterAction::SetProductTypes(_) => ActionKind::SetProductTypes,
            FilterAction::SetProducts(_) => ActionKind::SetProducts,
            FilterAction::SetModesOfDelivery(_) => ActionKind::SetModesOfDelivery,
            FilterAction::Toggle { .. } => ActionKind::Toggle,
            FilterAction::RemoveFilter { .. } => ActionKind::RemoveFilter,
            FilterAction::ClearFilterType(_) => ActionKind::ClearFilterType,
            FilterAction::SetSearchQuery(_) => ActionKind::SetSearchQuery,
            FilterAction::SetSearchFilterProductIds(_) => ActionKind::SetSearchFilterProductIds,
            FilterAction::SetMultipleFilters(_) => ActionKind::SetMultipleFilters,
            FilterAction::RestoreFromUrl(_) => ActionKind::RestoreFromUrl,
            FilterAction::SetCurrentPage(_) => ActionKind::SetCurrentPage,
            FilterAction::SetPageSize(_) => ActionKind::SetPageSize,
            FilterAction::NavSelectSubject(_) => ActionKind::NavSelectSubject,
            FilterAction::NavSelectProductGroup(_) => ActionKind::NavSelectProductGroup,
            FilterAction::NavSelectProduct(_) => ActionKind::NavSelectProduct,
            FilterAction::NavSelectModeOfDelivery(_) => ActionKind::NavSelectModeOfDelivery,
            FilterAction::NavViewAllProducts => ActionKind::NavViewAllProducts,
            FilterAction::ResetFilters => ActionKind::ResetFilters,
            FilterAction::ApplyFilters => ActionKind::ApplyFilters,
            FilterAction::SetFilterCounts(_) => ActionKind::SetFilterCounts,
            FilterAction::SetLoading(_) => ActionKind::SetLoading,
            FilterAction::SetError(_) => ActionKind::SetError,
            FilterAction::SetFilterPanelOpen(_) => ActionKind::SetFilterPanelOpen,
            FilterAction::ToggleFilterPanel => ActionKind::ToggleFilterPanel,
            FilterAction::SetValidationErrors(_) => ActionKind::SetValidationErrors,
            FilterAction::ClearValidationErrors => ActionKind::ClearValidationErrors,
        }
    }

    /// 针对某个维度的整体替换
    pub fn set_dimension(dimension: FilterDimension, values: Vec<String>) -> Self {
        match dimension {
            FilterDimension::Subjects => FilterAction::SetSubjects(values),
            FilterDimension::Categories => FilterAction::SetCategories(values),
            FilterDimension::ProductTypes => FilterAction::SetProductTypes(values),
            FilterDimension::Products => FilterAction::SetProducts(values),
            FilterDimension::ModesOfDelivery => FilterAction::SetModesOfDelivery(values),
        }
    }
}

impl ActionKind {
    /// 是否触发 cookie 写入；界面类操作永远不写
    pub fn persists(self) -> bool {
        match self {
            ActionKind::SetSubjects
            | ActionKind::SetCategories
            | ActionKind::SetProductTypes
            | ActionKind::SetProducts
            | ActionKind::SetModesOfDelivery
            | ActionKind::Toggle
            | ActionKind::RemoveFilter
            | ActionKind::ClearFilterType
            | ActionKind::SetSearchQuery
            | ActionKind::SetMultipleFilters
            | ActionKind::RestoreFromUrl
            | ActionKind::SetCurrentPage
            | ActionKind::SetPageSize
            | ActionKind::NavSelectSubject
            | ActionKind::NavSelectProductGroup
            | ActionKind::NavSelectProduct
            | ActionKind::NavSelectModeOfDelivery
            | ActionKind::NavViewAllProducts
            | ActionKind::ResetFilters
            | ActionKind::ApplyFilters => true,
            ActionKind::SetSearchFilterProductIds
            | ActionKind::SetFilterCounts
            | ActionKind::SetLoading
            | ActionKind::SetError
            | ActionKind::SetFilterPanelOpen
            | ActionKind::ToggleFilterPanel
            | ActionKind::SetValidationErrors
            | ActionKind::ClearValidationErrors => false,
        }
    }

    /// 地址栏写入方式；导航操作新增历史记录，其余替换当前记录
    pub fn url_write(self) -> Option<HistoryMode> {
        match self {
            ActionKind::NavSelectSubject
            | ActionKind::NavSelectProductGroup
            | ActionKind::NavSelectProduct
            | ActionKind::NavSelectModeOfDelivery
            | ActionKind::NavViewAllProducts => Some(HistoryMode::Push),
            ActionKind::SetSubjects
            | ActionKind::SetCategories
            | ActionKind::SetProductTypes
            | ActionKind::SetProducts
            | ActionKind::SetModesOfDelivery
            | ActionKind::Toggle
            | ActionKind::RemoveFilter
            | ActionKind::ClearFilterType
            | ActionKind::SetSearchQuery
            | ActionKind::SetMultipleFilters
            | ActionKind::ResetFilters => Some(HistoryMode::Replace),
            ActionKind::RestoreFromUrl
            | ActionKind::SetCurrentPage
            | ActionKind::SetPageSize
            | ActionKind::SetSearchFilterProductIds
            | ActionKind::ApplyFilters
            | ActionKind::SetFilterCounts
            | ActionKind::SetLoading
            | ActionKind::SetError
            | ActionKind::SetFilterPanelOpen
            | ActionKind::ToggleFilterPanel
            | ActionKind::SetValidationErrors
            | ActionKind::ClearValidationErrors => None,
        }
    }
}

/// 将部分更新应用到选择上；未携带页码时回到第一页
pub fn apply_patch(selection: &mut FilterSelection, patch: &FilterPatch, config: &StoreConfig) {
    for dimension in FilterDimension::ALL {
        if let Some(values) = patch.dimension(dimension) {
            selection.replace(dimension, values.clone());
        }
    }
    if let Some(query) = &patch.search_query {
        selection.search_query = query.trim().to_string();
    }
    if let Some(size) = patch.page_size {
        selection.page_size = config.clamp_page_size(size);
    }
    selection.current_page = patch.current_page.map_or(1, |page| config.clamp_page(page));
}

/// 导航选择：只保留 `keep` 维度，替换 `target` 维度，其余维度清空
fn nav_select(
    selection: &mut FilterSelection,
    target: FilterDimension,
    value: &str,
    keep: &[FilterDimension],
) {
    let value = value.trim();
    if value.is_empty() {
        return;
    }
    for dimension in FilterDimension::ALL {
        if dimension != target && !keep.contains(&dimension) {
            selection.clear(dimension);
        }
    }
    selection.replace(target, vec![value.to_string()]);
    selection.current_page = 1;
}

/// 纯函数 reducer：在副本上应用操作并返回新状态，永不失败
pub fn reduce(
    state: &FilterState,
    action: &FilterAction,
    config: &StoreConfig,
    now: DateTime<Utc>,
) -> FilterState {
    let mut next = state.clone();

    match action {
        FilterAction::SetSubjects(values)
        | FilterAction::SetCategories(values)
        | FilterAction::SetProductTypes(values)
        | FilterAction::SetProducts(values)
        | FilterAction::SetModesOfDelivery(values) => {
            let dimension = match action.kind() {
                ActionKind::SetSubjects => FilterDimension::Subjects,
                ActionKind::SetCategories => FilterDimension::Categories,
                ActionKind::SetProductTypes => FilterDimension::ProductTypes,
                ActionKind::SetProducts => FilterDimension::Products,
                _ => FilterDimension::ModesOfDelivery,
            };
            next.selection.replace(dimension, values.clone());
            next.selection.current_page = 1;
        }
        FilterAction::Toggle { dimension, value } => {
            if next.selection.toggle(*dimension, value) {
                next.selection.current_page = 1;
            }
        }
        FilterAction::RemoveFilter { dimension, value } => {
            if next.selection.remove(*dimension, value) {
                next.selection.current_page = 1;
            }
        }
        FilterAction::ClearFilterType(dimension) => {
            next.selection.clear(*dimension);
            next.selection.current_page = 1;
        }
        FilterAction::SetSearchQuery(query) => {
            next.selection.search_query = query.trim().to_string();
            next.selection.current_page = 1;
        }
        FilterAction::SetSearchFilterProductIds(ids) => {
            next.selection.search_filter_product_ids = normalize_product_ids(ids.clone());
        }
        FilterAction::SetMultipleFilters(patch) | FilterAction::RestoreFromUrl(patch) => {
            apply_patch(&mut next.selection, patch, config);
        }
        FilterAction::SetCurrentPage(page) => {
            next.selection.current_page = config.clamp_page(*page);
        }
        FilterAction::SetPageSize(size) => {
            next.selection.page_size = config.clamp_page_size(*size);
            next.selection.current_page = 1;
        }
        FilterAction::NavSelectSubject(code) => {
            nav_select(&mut next.selection, FilterDimension::Subjects, code, &[]);
        }
        FilterAction::NavSelectProductGroup(label) => {
            nav_select(
                &mut next.selection,
                FilterDimension::ProductTypes,
                label,
                &[FilterDimension::Subjects],
            );
        }
        FilterAction::NavSelectProduct(id) => {
            nav_select(
                &mut next.selection,
                FilterDimension::Products,
                id,
                &[FilterDimension::Subjects],
            );
        }
        FilterAction::NavSelectModeOfDelivery(mode) => {
            nav_select(
                &mut next.selection,
                FilterDimension::ModesOfDelivery,
                mode,
                &[FilterDimension::Subjects],
            );
        }
        FilterAction::NavViewAllProducts | FilterAction::ResetFilters => {
            next.selection.clear_filters();
        }
        FilterAction::ApplyFilters => {
            next.ui.applied_filters = next.selection.clone();
        }
        FilterAction::SetFilterCounts(counts) => {
            next.ui.filter_counts = counts.clone();
        }
        FilterAction::SetLoading(loading) => {
            next.ui.is_loading = *loading;
            if *loading {
                next.ui.error = None;
            }
        }
        FilterAction::SetError(error) => {
            next.ui.error = error.clone();
            next.ui.is_loading = false;
        }
        FilterAction::SetFilterPanelOpen(open) => {
            next.ui.is_filter_panel_open = *open;
        }
        FilterAction::ToggleFilterPanel => {
            next.ui.is_filter_panel_open = !next.ui.is_filter_panel_open;
        }
        FilterAction::SetValidationErrors(issues) => {
            next.ui.validation_errors = issues.clone();
        }
        FilterAction::ClearValidationErrors => {
            next.ui.validation_errors.clear();
        }
    }

    let stamped = matches!(
        action.kind(),
        ActionKind::ApplyFilters | ActionKind::SetFilterCounts
    );
    if stamped || next.selection != state.selection {
        next.ui.last_updated = Some(now);
    }
    next
}

/// 状态初始值的来源
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitialSource {
    Defaults,
    Cookie,
    Url,
}

/// 筛选状态仓库
pub struct FilterStore {
    state: Rc<FilterState>,
    config: StoreConfig,
    clock: Box<dyn Clock>,
    persistence: Option<CookiePersistence>,
    url_sync: Option<UrlSynchronizer>,
    selectors: Selectors,
    source: InitialSource,
}

impl FilterStore {
    /// 仅在内存中工作的仓库，不读写 cookie 与地址栏
    pub fn in_memory(config: StoreConfig, clock: Box<dyn Clock>) -> Self {
        Self {
            state: Rc::new(FilterState::initial(&config)),
            config,
            clock,
            persistence: None,
            url_sync: None,
            selectors: Selectors::default(),
            source: InitialSource::Defaults,
        }
    }

    /// 启动时构建仓库：地址栏中的筛选条件优先，其次是 cookie，最后是默认值
    pub fn bootstrap(
        config: StoreConfig,
        cookies: Box<dyn CookieJar>,
        address_bar: Box<dyn AddressBar>,
        clock: Box<dyn Clock>,
    ) -> Self {
        let now = clock.now();
        let mut persistence = config
            .persist_enabled
            .then(|| CookiePersistence::new(cookies, &config));
        let mut url_sync = config.sync_url.then(|| UrlSynchronizer::new(address_bar));

        let restored = persistence.as_mut().and_then(|p| p.restore(now));
        let from_url = url_sync
            .as_ref()
            .and_then(UrlSynchronizer::read)
            .filter(|decoded| decoded.has_filters);

        let mut state = FilterState::initial(&config);
        let mut source = InitialSource::Defaults;

        if let Some(patch) = &restored {
            apply_patch(&mut state.selection, patch, &config);
            source = InitialSource::Cookie;
        }
        if let Some(decoded) = &from_url {
            // 地址栏表示完整的筛选条件，保留 cookie 中的每页条数
            state.selection.clear_filters();
            apply_patch(&mut state.selection, &decoded.patch, &config);
            source = InitialSource::Url;
        }
        state.ui.applied_filters = state.selection.clone();
        if source != InitialSource::Defaults {
            state.ui.last_updated = Some(now);
        }

        log::info!(
            "筛选状态初始化完成，来源: {:?}，已选条件: {}",
            source,
            state.selection.active_filter_count()
        );

        if source == InitialSource::Cookie {
            if let Some(sync) = url_sync.as_mut() {
                sync.write(&state.selection, HistoryMode::Replace);
            }
        }

        Self {
            state: Rc::new(state),
            config,
            clock,
            persistence,
            url_sync,
            selectors: Selectors::default(),
            source,
        }
    }

    pub fn state(&self) -> &FilterState {
        &self.state
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn initial_source(&self) -> InitialSource {
        self.source
    }

    /// 派发操作：reducer 生成新状态后整体替换，随后同步地址栏并按需写 cookie
    pub fn dispatch(&mut self, action: FilterAction) {
        let now = self.clock.now();
        let next = reduce(&self.state, &action, &self.config, now);
        if next == *self.state {
            return;
        }
        self.state = Rc::new(next);

        let kind = action.kind();
        if let (Some(sync), Some(mode)) = (self.url_sync.as_mut(), kind.url_write()) {
            sync.write(&self.state.selection, mode);
        }
        if kind.persists() {
            if let Some(persistence) = self.persistence.as_mut() {
                persistence.persist(&self.state.selection, now);
            }
        }
    }

    /// 浏览器前进/后退后，从地址栏恢复筛选条件
    pub fn sync_from_url(&mut self) {
        let Some(decoded) = self.url_sync.as_ref().and_then(UrlSynchronizer::read) else {
            return;
        };
        self.dispatch(FilterAction::RestoreFromUrl(decoded.patch));
    }

    /// 校验当前筛选组合并写入校验结果
    pub fn validate(&mut self) {
        let issues = validate_selection(
            &self.state.selection,
            &self.state.ui.filter_counts,
            &self.config,
        );
        self.dispatch(FilterAction::SetValidationErrors(issues));
    }

    /// 删除持久化的筛选 cookie
    pub fn clear_cookies(&mut self) {
        if let Some(persistence) = self.persistence.as_mut() {
            persistence.clear();
        }
    }

    /// 当前选择对应的地址栏查询串
    pub fn url_query(&self) -> String {
        crate::url_sync::encode_query(&self.state.selection)
    }

    /// 提供给列表接口的查询串（基于已提交的快照）
    pub fn api_query(&self) -> String {
        crate::url_sync::to_api_query(
            &self.state.ui.applied_filters,
            self.state.selection.current_page,
            self.state.selection.page_size,
        )
    }

    pub fn select_filters(&self) -> Rc<SelectedFilters> {
        self.selectors.select_filters(&self.state)
    }

    pub fn select_active_filter_summary(&self) -> Rc<ActiveFilterSummary> {
        self.selectors.select_active_filter_summary(&self.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 0).unwrap()
    }

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    fn run(actions: Vec<FilterAction>) -> FilterState {
        let config = StoreConfig::default();
        actions
            .iter()
            .fold(FilterState::initial(&config), |state, action| {
                reduce(&state, action, &config, now())
            })
    }

    #[test]
    fn setters_dedupe_and_reset_page() {
        let state = run(vec![
            FilterAction::SetCurrentPage(5),
            FilterAction::SetSubjects(strings(&["CM2", "CM2", "SA1"])),
            FilterAction::SetProducts(strings(&["101", " 101 ", "202"])),
        ]);
        assert_eq!(state.selection.subjects, strings(&["CM2", "SA1"]));
        assert_eq!(state.selection.products.len(), 2);
        assert_eq!(state.selection.current_page, 1);
        assert_eq!(state.ui.last_updated, Some(now()));
    }

    #[test]
    fn nav_select_subject_clears_conflicting_dimensions() {
        let state = run(vec![
            FilterAction::SetSubjects(strings(&["SA1", "CB2"])),
            FilterAction::SetCategories(strings(&["Bundle"])),
            FilterAction::SetProductTypes(strings(&["Tutorial"])),
            FilterAction::SetProducts(strings(&["77"])),
            FilterAction::SetModesOfDelivery(strings(&["eBook"])),
            FilterAction::SetCurrentPage(3),
            FilterAction::NavSelectSubject("CM2".into()),
        ]);
        assert_eq!(state.selection.subjects, strings(&["CM2"]));
        assert!(state.selection.categories.is_empty());
        assert!(state.selection.product_types.is_empty());
        assert!(state.selection.products.is_empty());
        assert!(state.selection.modes_of_delivery.is_empty());
        assert_eq!(state.selection.current_page, 1);
    }

    #[test]
    fn nav_select_product_group_keeps_subjects() {
        let state = run(vec![
            FilterAction::SetSubjects(strings(&["CM2"])),
            FilterAction::SetCategories(strings(&["Bundle"])),
            FilterAction::NavSelectProductGroup("Revision".into()),
        ]);
        assert_eq!(state.selection.subjects, strings(&["CM2"]));
        assert_eq!(state.selection.product_types, strings(&["Revision"]));
        assert!(state.selection.categories.is_empty());
    }

    fn populated() -> Vec<FilterAction> {
        vec![
            FilterAction::SetSubjects(strings(&["CM2", "SA1"])),
            FilterAction::SetCategories(strings(&["Bundle"])),
            FilterAction::SetProductTypes(strings(&["Tutorial"])),
            FilterAction::SetProducts(strings(&["77", "88"])),
            FilterAction::SetModesOfDelivery(strings(&["eBook", "Printed"])),
            FilterAction::SetSearchQuery("mock".into()),
            FilterAction::SetCurrentPage(4),
        ]
    }

    #[test]
    fn nav_select_product_keeps_subjects_only() {
        let mut actions = populated();
        actions.push(FilterAction::NavSelectProduct("101".into()));
        let state = run(actions);

        assert_eq!(state.selection.subjects, strings(&["CM2", "SA1"]));
        assert_eq!(state.selection.values(FilterDimension::Products), vec!["101"]);
        assert!(state.selection.categories.is_empty());
        assert!(state.selection.product_types.is_empty());
        assert!(state.selection.modes_of_delivery.is_empty());
        assert_eq!(state.selection.search_query, "mock");
        assert_eq!(state.selection.current_page, 1);
    }

    #[test]
    fn nav_select_mode_of_delivery_keeps_subjects_only() {
        let mut actions = populated();
        actions.push(FilterAction::NavSelectModeOfDelivery("Online".into()));
        let state = run(actions);

        assert_eq!(state.selection.subjects, strings(&["CM2", "SA1"]));
        assert_eq!(state.selection.modes_of_delivery, strings(&["Online"]));
        assert!(state.selection.categories.is_empty());
        assert!(state.selection.product_types.is_empty());
        assert!(state.selection.products.is_empty());
        assert_eq!(state.selection.search_query, "mock");
        assert_eq!(state.selection.current_page, 1);
    }

    #[test]
    fn blank_nav_value_is_ignored() {
        let before = run(vec![FilterAction::SetCategories(strings(&["Bundle"]))]);
        let after = reduce(
            &before,
            &FilterAction::NavSelectSubject("   ".into()),
            &StoreConfig::default(),
            now(),
        );
        assert_eq!(after, before);
    }

    #[test]
    fn view_all_products_clears_everything() {
        let state = run(vec![
            FilterAction::SetSubjects(strings(&["CM2"])),
            FilterAction::SetSearchQuery("mock exam".into()),
            FilterAction::SetSearchFilterProductIds(strings(&["5", "6"])),
            FilterAction::SetCurrentPage(4),
            FilterAction::NavViewAllProducts,
        ]);
        assert_eq!(state.selection.active_filter_count(), 0);
        assert!(state.selection.search_filter_product_ids.is_empty());
        assert_eq!(state.selection.current_page, 1);
    }

    #[test]
    fn pagination_clamps_out_of_range_values() {
        let state = run(vec![FilterAction::SetPageSize(0)]);
        assert_eq!(state.selection.page_size, 1);
        let state = run(vec![FilterAction::SetCurrentPage(3), FilterAction::SetPageSize(5000)]);
        assert_eq!(state.selection.page_size, 100);
        assert_eq!(state.selection.current_page, 1);
        let state = run(vec![FilterAction::SetCurrentPage(-8)]);
        assert_eq!(state.selection.current_page, 1);
    }

    #[test]
    fn search_query_is_trimmed() {
        let state = run(vec![FilterAction::SetSearchQuery("  actuarial  ".into())]);
        assert_eq!(state.selection.search_query, "actuarial");
    }

    #[test]
    fn apply_filters_snapshots_live_selection() {
        let state = run(vec![
            FilterAction::SetSubjects(strings(&["CM2"])),
            FilterAction::ApplyFilters,
            FilterAction::SetSubjects(strings(&["SA1"])),
        ]);
        assert_eq!(state.ui.applied_filters.subjects, strings(&["CM2"]));
        assert_eq!(state.selection.subjects, strings(&["SA1"]));
    }

    #[test]
    fn loading_and_error_are_mutually_exclusive() {
        let state = run(vec![
            FilterAction::SetLoading(true),
            FilterAction::SetError(Some(serde_json::json!({"detail": "timeout"}))),
        ]);
        assert!(!state.ui.is_loading);
        assert!(state.ui.error.is_some());

        let state = reduce(&state, &FilterAction::SetLoading(true), &StoreConfig::default(), now());
        assert!(state.ui.is_loading);
        assert!(state.ui.error.is_none());
    }

    #[test]
    fn ui_only_actions_do_not_touch_selection_or_timestamp() {
        let state = run(vec![
            FilterAction::ToggleFilterPanel,
            FilterAction::SetLoading(true),
            FilterAction::SetValidationErrors(vec![ValidationIssue::warning("subjects", "empty")]),
        ]);
        assert!(state.ui.is_filter_panel_open);
        assert_eq!(state.ui.validation_errors.len(), 1);
        assert_eq!(state.ui.last_updated, None);
    }

    #[test]
    fn set_multiple_filters_replaces_only_carried_fields() {
        let patch = FilterPatch {
            categories: Some(strings(&["Bundle"])),
            search_query: Some(" cm2 ".into()),
            current_page: Some(2),
            ..FilterPatch::default()
        };
        let state = run(vec![
            FilterAction::SetSubjects(strings(&["CM2"])),
            FilterAction::SetMultipleFilters(patch),
        ]);
        assert_eq!(state.selection.subjects, strings(&["CM2"]));
        assert_eq!(state.selection.categories, strings(&["Bundle"]));
        assert_eq!(state.selection.search_query, "cm2");
        assert_eq!(state.selection.current_page, 2);
    }

    #[test]
    fn persistence_whitelist_excludes_ui_kinds() {
        assert!(ActionKind::NavSelectSubject.persists());
        assert!(ActionKind::ApplyFilters.persists());
        assert!(!ActionKind::SetLoading.persists());
        assert!(!ActionKind::ToggleFilterPanel.persists());
        assert!(!ActionKind::SetFilterCounts.persists());
        assert_eq!(ActionKind::RestoreFromUrl.url_write(), None);
        assert_eq!(ActionKind::NavSelectProduct.url_write(), Some(HistoryMode::Push));
        assert_eq!(ActionKind::Toggle.url_write(), Some(HistoryMode::Replace));
    }
}
