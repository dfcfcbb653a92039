//! 浏览器实现：`document.cookie` 与 `window.history`。只在 wasm 环境下可用。

use wasm_bindgen::{JsCast, JsValue};
use web_sys::HtmlDocument;

use crate::error::{PersistError, SyncError};
use crate::persistence::CookieJar;
use crate::url_sync::{AddressBar, HistoryMode};

fn js_error(value: JsValue) -> String {
    value
        .as_string()
        .unwrap_or_else(|| format!("{:?}", value))
}

fn html_document() -> Result<HtmlDocument, PersistError> {
    web_sys::window()
        .and_then(|window| window.document())
        .and_then(|document| document.dyn_into::<HtmlDocument>().ok())
        .ok_or_else(|| PersistError::Unavailable("document 不存在".to_string()))
}

/// 基于 `document.cookie` 的 cookie 存储
#[derive(Debug, Default, Clone, Copy)]
pub struct DocumentCookieJar;

impl CookieJar for DocumentCookieJar {
    fn read_all(&self) -> Result<String, PersistError> {
        html_document()?
            .cookie()
            .map_err(|e| PersistError::Unavailable(js_error(e)))
    }

    fn write(&mut self, set_cookie: &str) -> Result<(), PersistError> {
        html_document()?
            .set_cookie(set_cookie)
            .map_err(|e| PersistError::Write(js_error(e)))
    }
}

/// 基于 `window.location` 与 `window.history` 的地址栏
#[derive(Debug, Default, Clone, Copy)]
pub struct BrowserAddressBar;

impl AddressBar for BrowserAddressBar {
    fn search(&self) -> Option<String> {
        web_sys::window()?.location().search().ok()
    }

    fn write_search(&mut self, query: &str, mode: HistoryMode) -> Result<(), SyncError> {
        let window = web_sys::window().ok_or(SyncError::Unavailable)?;
        let location = window.location();
        let path = location
            .pathname()
            .map_err(|e| SyncError::History(js_error(e)))?;
        let hash = location.hash().map_err(|e| SyncError::History(js_error(e)))?;
        let url = if query.is_empty() {
            format!("{}{}", path, hash)
        } else {
            format!("{}?{}{}", path, query, hash)
        };

        let history = window
            .history()
            .map_err(|e| SyncError::History(js_error(e)))?;
        let result = match mode {
            HistoryMode::Replace => history.replace_state_with_url(&JsValue::NULL, "", Some(&url)),
            HistoryMode::Push => history.push_state_with_url(&JsValue::NULL, "", Some(&url)),
        };
        result.map_err(|e| SyncError::History(js_error(e)))
    }
}
