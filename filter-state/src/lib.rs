use serde::Serialize;
use std::cell::RefCell;
use std::rc::Rc;
use wasm_bindgen::prelude::*;

use filter_common::{normalize, FilterDimension};

// 导出模块
pub mod browser;
pub mod clock;
pub mod config;
pub mod error;
pub mod logging;
pub mod persistence;
pub mod selectors;
pub mod store;
pub mod url_sync;
pub mod validation;

pub use config::StoreConfig;
pub use error::{ConfigError, PersistError, SyncError};
pub use selectors::{ActiveFilterSummary, SelectedFilters};
pub use store::{ActionKind, FilterAction, FilterState, FilterStore, InitialSource};

#[cfg(feature = "wee_alloc")]
#[global_allocator]
static ALLOC: wee_alloc::WeeAlloc = wee_alloc::WeeAlloc::INIT;

/// 初始化函数 - 设置错误处理与控制台日志
#[wasm_bindgen(start)]
pub fn start() {
    console_error_panic_hook::set_once();
    logging::init(log::LevelFilter::Info);
}

/// 版本信息
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

/// 序列化为普通 JS 对象（映射转为对象而不是 Map）
fn to_js<T: Serialize + ?Sized>(value: &T) -> Result<JsValue, JsValue> {
    value
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(|e| JsValue::from_str(&format!("序列化失败: {}", e)))
}

/// JS 参数转 JSON，无法识别时返回 Null 由规范化逻辑忽略
fn from_js(value: JsValue) -> serde_json::Value {
    serde_wasm_bindgen::from_value(value).unwrap_or(serde_json::Value::Null)
}

fn dimension_arg(name: &str) -> Option<FilterDimension> {
    let dimension = FilterDimension::parse(name);
    if dimension.is_none() {
        log::warn!("未知的筛选维度: {}", name);
    }
    dimension
}

/// 按 `Rc` 指针缓存转换结果，输入是同一个 `Rc` 时直接返回上次的值
struct RcMemo<T, V> {
    slot: RefCell<Option<(Rc<T>, V)>>,
}

impl<T, V: Clone> RcMemo<T, V> {
    fn new() -> Self {
        Self {
            slot: RefCell::new(None),
        }
    }

    fn get_or_try_insert<E>(
        &self,
        input: Rc<T>,
        convert: impl FnOnce(&T) -> Result<V, E>,
    ) -> Result<V, E> {
        let mut slot = self.slot.borrow_mut();
        if let Some((cached, value)) = slot.as_ref() {
            if Rc::ptr_eq(cached, &input) {
                return Ok(value.clone());
            }
        }
        let value = convert(&input)?;
        *slot = Some((input, value.clone()));
        Ok(value)
    }
}

/// 筛选状态 JS 接口 - 页面持有一个实例
#[wasm_bindgen]
pub struct FilterStoreJS {
    store: FilterStore,
    filters: RcMemo<SelectedFilters, JsValue>,
    summary: RcMemo<ActiveFilterSummary, JsValue>,
}

impl FilterStoreJS {
    fn set_list(&mut self, dimension: FilterDimension, values: JsValue) {
        match normalize::string_list(&from_js(values)) {
            Some(values) => self.store.dispatch(FilterAction::set_dimension(dimension, values)),
            None => log::debug!("忽略无效的 {} 参数", dimension),
        }
    }
}

#[wasm_bindgen]
impl FilterStoreJS {
    /// 创建仓库：读取 cookie 与地址栏恢复筛选条件。配置为 JSON 字符串，可省略
    #[wasm_bindgen(constructor)]
    pub fn new(config_json: Option<String>) -> Result<FilterStoreJS, JsValue> {
        let config = match config_json.as_deref().map(str::trim) {
            Some(json) if !json.is_empty() => StoreConfig::from_json(json),
            _ => Ok(StoreConfig::default()),
        }
        .map_err(|e| {
            log::error!("筛选配置无效: {}", e);
            JsValue::from(js_sys::Error::new(&e.to_string()))
        })?;

        let store = FilterStore::bootstrap(
            config,
            Box::new(browser::DocumentCookieJar),
            Box::new(browser::BrowserAddressBar),
            Box::new(clock::SystemClock),
        );
        Ok(FilterStoreJS {
            store,
            filters: RcMemo::new(),
            summary: RcMemo::new(),
        })
    }

    #[wasm_bindgen(js_name = setSubjects)]
    pub fn set_subjects(&mut self, codes: JsValue) {
        self.set_list(FilterDimension::Subjects, codes);
    }

    #[wasm_bindgen(js_name = setCategories)]
    pub fn set_categories(&mut self, categories: JsValue) {
        self.set_list(FilterDimension::Categories, categories);
    }

    #[wasm_bindgen(js_name = setProductTypes)]
    pub fn set_product_types(&mut self, product_types: JsValue) {
        self.set_list(FilterDimension::ProductTypes, product_types);
    }

    #[wasm_bindgen(js_name = setProducts)]
    pub fn set_products(&mut self, products: JsValue) {
        self.set_list(FilterDimension::Products, products);
    }

    #[wasm_bindgen(js_name = setModesOfDelivery)]
    pub fn set_modes_of_delivery(&mut self, modes: JsValue) {
        self.set_list(FilterDimension::ModesOfDelivery, modes);
    }

    /// 面板内切换单个值，维度名如 "subjects"、"product_types"
    #[wasm_bindgen(js_name = toggleFilter)]
    pub fn toggle_filter(&mut self, dimension: &str, value: JsValue) {
        let dimension = dimension_arg(dimension);
        let value = normalize::scalar_text(&from_js(value));
        let (Some(dimension), Some(value)) = (dimension, value) else {
            return;
        };
        self.store.dispatch(FilterAction::Toggle { dimension, value });
    }

    #[wasm_bindgen(js_name = removeFilter)]
    pub fn remove_filter(&mut self, dimension: &str, value: JsValue) {
        let dimension = dimension_arg(dimension);
        let value = normalize::scalar_text(&from_js(value));
        let (Some(dimension), Some(value)) = (dimension, value) else {
            return;
        };
        self.store.dispatch(FilterAction::RemoveFilter { dimension, value });
    }

    #[wasm_bindgen(js_name = clearFilterType)]
    pub fn clear_filter_type(&mut self, dimension: &str) {
        if let Some(dimension) = dimension_arg(dimension) {
            self.store.dispatch(FilterAction::ClearFilterType(dimension));
        }
    }

    #[wasm_bindgen(js_name = setSearchQuery)]
    pub fn set_search_query(&mut self, query: JsValue) {
        let query = normalize::scalar_text(&from_js(query)).unwrap_or_default();
        self.store.dispatch(FilterAction::SetSearchQuery(query));
    }

    #[wasm_bindgen(js_name = setSearchFilterProductIds)]
    pub fn set_search_filter_product_ids(&mut self, ids: JsValue) {
        if let Some(ids) = normalize::string_list(&from_js(ids)) {
            self.store.dispatch(FilterAction::SetSearchFilterProductIds(ids));
        }
    }

    #[wasm_bindgen(js_name = setMultipleFilters)]
    pub fn set_multiple_filters(&mut self, filters: JsValue) {
        if let Some(patch) = normalize::filter_patch(&from_js(filters)) {
            self.store.dispatch(FilterAction::SetMultipleFilters(patch));
        }
    }

    #[wasm_bindgen(js_name = setCurrentPage)]
    pub fn set_current_page(&mut self, page: JsValue) {
        if let Some(page) = normalize::integer(&from_js(page)) {
            self.store.dispatch(FilterAction::SetCurrentPage(page));
        }
    }

    #[wasm_bindgen(js_name = setPageSize)]
    pub fn set_page_size(&mut self, size: JsValue) {
        if let Some(size) = normalize::integer(&from_js(size)) {
            self.store.dispatch(FilterAction::SetPageSize(size));
        }
    }

    #[wasm_bindgen(js_name = navSelectSubject)]
    pub fn nav_select_subject(&mut self, code: JsValue) {
        if let Some(code) = normalize::scalar_text(&from_js(code)) {
            self.store.dispatch(FilterAction::NavSelectSubject(code));
        }
    }

    #[wasm_bindgen(js_name = navSelectProductGroup)]
    pub fn nav_select_product_group(&mut self, label: JsValue) {
        if let Some(label) = normalize::scalar_text(&from_js(label)) {
            self.store.dispatch(FilterAction::NavSelectProductGroup(label));
        }
    }

    #[wasm_bindgen(js_name = navSelectProduct)]
    pub fn nav_select_product(&mut self, id: JsValue) {
        if let Some(id) = normalize::scalar_text(&from_js(id)) {
            self.store.dispatch(FilterAction::NavSelectProduct(id));
        }
    }

    #[wasm_bindgen(js_name = navSelectModeOfDelivery)]
    pub fn nav_select_mode_of_delivery(&mut self, mode: JsValue) {
        if let Some(mode) = normalize::scalar_text(&from_js(mode)) {
            self.store.dispatch(FilterAction::NavSelectModeOfDelivery(mode));
        }
    }

    #[wasm_bindgen(js_name = navViewAllProducts)]
    pub fn nav_view_all_products(&mut self) {
        self.store.dispatch(FilterAction::NavViewAllProducts);
    }

    #[wasm_bindgen(js_name = resetFilters)]
    pub fn reset_filters(&mut self) {
        self.store.dispatch(FilterAction::ResetFilters);
    }

    #[wasm_bindgen(js_name = applyFilters)]
    pub fn apply_filters(&mut self) {
        self.store.dispatch(FilterAction::ApplyFilters);
    }

    #[wasm_bindgen(js_name = setFilterCounts)]
    pub fn set_filter_counts(&mut self, counts: JsValue) {
        if let Some(counts) = normalize::filter_counts(&from_js(counts)) {
            self.store.dispatch(FilterAction::SetFilterCounts(counts));
        }
    }

    #[wasm_bindgen(js_name = setLoading)]
    pub fn set_loading(&mut self, loading: JsValue) {
        if let Some(loading) = normalize::flag(&from_js(loading)) {
            self.store.dispatch(FilterAction::SetLoading(loading));
        }
    }

    #[wasm_bindgen(js_name = setError)]
    pub fn set_error(&mut self, error: JsValue) {
        let error = match from_js(error) {
            serde_json::Value::Null => None,
            payload => Some(payload),
        };
        self.store.dispatch(FilterAction::SetError(error));
    }

    #[wasm_bindgen(js_name = setFilterPanelOpen)]
    pub fn set_filter_panel_open(&mut self, open: JsValue) {
        if let Some(open) = normalize::flag(&from_js(open)) {
            self.store.dispatch(FilterAction::SetFilterPanelOpen(open));
        }
    }

    #[wasm_bindgen(js_name = toggleFilterPanel)]
    pub fn toggle_filter_panel(&mut self) {
        self.store.dispatch(FilterAction::ToggleFilterPanel);
    }

    #[wasm_bindgen(js_name = setValidationErrors)]
    pub fn set_validation_errors(&mut self, errors: JsValue) {
        if let Some(issues) = normalize::validation_issues(&from_js(errors)) {
            self.store.dispatch(FilterAction::SetValidationErrors(issues));
        }
    }

    #[wasm_bindgen(js_name = clearValidationErrors)]
    pub fn clear_validation_errors(&mut self) {
        self.store.dispatch(FilterAction::ClearValidationErrors);
    }

    /// 按当前计数与配置校验筛选组合
    #[wasm_bindgen]
    pub fn validate(&mut self) {
        self.store.validate();
    }

    /// 浏览器前进/后退（popstate）后调用
    #[wasm_bindgen(js_name = syncFromUrl)]
    pub fn sync_from_url(&mut self) {
        self.store.sync_from_url();
    }

    #[wasm_bindgen(js_name = clearCookies)]
    pub fn clear_cookies(&mut self) {
        self.store.clear_cookies();
    }

    //===== 选择器 =====

    #[wasm_bindgen]
    pub fn state(&self) -> Result<JsValue, JsValue> {
        to_js(self.store.state())
    }

    /// 筛选条件未变化时返回同一个 JS 对象
    #[wasm_bindgen(js_name = filters)]
    pub fn filters(&self) -> Result<JsValue, JsValue> {
        self.filters
            .get_or_try_insert(self.store.select_filters(), |filters| to_js(filters))
    }

    /// 摘要未变化时返回同一个 JS 对象
    #[wasm_bindgen(js_name = activeFilterSummary)]
    pub fn active_filter_summary(&self) -> Result<JsValue, JsValue> {
        self.summary
            .get_or_try_insert(self.store.select_active_filter_summary(), |summary| to_js(summary))
    }

    #[wasm_bindgen(js_name = hasActiveFilters)]
    pub fn has_active_filters(&self) -> bool {
        selectors::select_has_active_filters(self.store.state())
    }

    #[wasm_bindgen(js_name = activeFilterCount)]
    pub fn active_filter_count(&self) -> usize {
        selectors::select_active_filter_count(self.store.state())
    }

    #[wasm_bindgen(js_name = hasPendingChanges)]
    pub fn has_pending_changes(&self) -> bool {
        selectors::select_has_pending_changes(self.store.state())
    }

    #[wasm_bindgen(js_name = validationErrors)]
    pub fn validation_errors(&self) -> Result<JsValue, JsValue> {
        to_js(selectors::select_validation_errors(self.store.state()))
    }

    #[wasm_bindgen(js_name = hasValidationErrors)]
    pub fn has_validation_errors(&self) -> bool {
        selectors::select_has_validation_errors(self.store.state())
    }

    #[wasm_bindgen(js_name = currentPage)]
    pub fn current_page(&self) -> u32 {
        selectors::select_current_page(self.store.state())
    }

    #[wasm_bindgen(js_name = pageSize)]
    pub fn page_size(&self) -> u32 {
        selectors::select_page_size(self.store.state())
    }

    #[wasm_bindgen(js_name = isLoading)]
    pub fn is_loading(&self) -> bool {
        selectors::select_is_loading(self.store.state())
    }

    #[wasm_bindgen(js_name = isFilterPanelOpen)]
    pub fn is_filter_panel_open(&self) -> bool {
        selectors::select_is_filter_panel_open(self.store.state())
    }

    #[wasm_bindgen]
    pub fn error(&self) -> Result<JsValue, JsValue> {
        to_js(&selectors::select_error(self.store.state()))
    }

    #[wasm_bindgen(js_name = filterCounts)]
    pub fn filter_counts(&self) -> Result<JsValue, JsValue> {
        to_js(selectors::select_filter_counts(self.store.state()))
    }

    #[wasm_bindgen(js_name = appliedFilters)]
    pub fn applied_filters(&self) -> Result<JsValue, JsValue> {
        to_js(selectors::select_applied_filters(self.store.state()))
    }

    #[wasm_bindgen(js_name = searchFilterProductIds)]
    pub fn search_filter_product_ids(&self) -> Result<JsValue, JsValue> {
        to_js(selectors::select_search_filter_product_ids(self.store.state()))
    }

    /// 最近更新时间（毫秒时间戳），从未更新时为 undefined
    #[wasm_bindgen(js_name = lastUpdated)]
    pub fn last_updated(&self) -> Option<f64> {
        selectors::select_last_updated(self.store.state()).map(|at| at.timestamp_millis() as f64)
    }

    /// 当前选择对应的地址栏查询串
    #[wasm_bindgen(js_name = urlQuery)]
    pub fn url_query(&self) -> String {
        self.store.url_query()
    }

    /// 列表接口请求参数（基于已提交的快照）
    #[wasm_bindgen(js_name = apiQuery)]
    pub fn api_query(&self) -> String {
        self.store.api_query()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::cell::Cell;

    #[test]
    fn memo_converts_once_per_selector_result() {
        let clock = clock::FixedClock::new(Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap());
        let mut store = FilterStore::in_memory(StoreConfig::default(), Box::new(clock));
        let memo: RcMemo<SelectedFilters, usize> = RcMemo::new();
        let conversions = Cell::new(0);
        let convert = |_: &SelectedFilters| -> Result<usize, ()> {
            conversions.set(conversions.get() + 1);
            Ok(conversions.get())
        };

        let first = memo.get_or_try_insert(store.select_filters(), convert).unwrap();
        store.dispatch(FilterAction::SetLoading(true));
        let again = memo.get_or_try_insert(store.select_filters(), convert).unwrap();
        assert_eq!(first, again);
        assert_eq!(conversions.get(), 1);

        store.dispatch(FilterAction::SetSubjects(vec!["CM2".into()]));
        let changed = memo.get_or_try_insert(store.select_filters(), convert).unwrap();
        assert_eq!(changed, 2);
    }

    #[test]
    fn memo_keeps_previous_value_when_conversion_fails() {
        let memo: RcMemo<u32, &str> = RcMemo::new();
        let input = Rc::new(7);
        assert_eq!(memo.get_or_try_insert(Rc::clone(&input), |_| Ok::<_, ()>("seven")), Ok("seven"));
        assert_eq!(memo.get_or_try_insert(Rc::new(8), |_| Err::<&str, _>("boom")), Err("boom"));
        assert_eq!(memo.get_or_try_insert(input, |_| Err::<&str, _>("unused")), Ok("seven"));
    }
}
