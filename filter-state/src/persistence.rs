//! cookie 持久化：把筛选选择的一部分写入 cookie，回访时自动恢复。

use chrono::{DateTime, Duration, Utc};
use percent_encoding::{percent_decode_str, utf8_percent_encode, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use filter_common::{FilterDimension, FilterPatch, FilterSelection, ProductId};

use crate::config::StoreConfig;
use crate::error::PersistError;

/// 类似 `document.cookie` 的读写接口
pub trait CookieJar {
    /// 读取全部 cookie，格式为 `a=1; b=2`
    fn read_all(&self) -> Result<String, PersistError>;
    /// 写入一条 Set-Cookie 形式的记录
    fn write(&mut self, set_cookie: &str) -> Result<(), PersistError>;
}

/// cookie 中保存的内容
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PersistedFilters {
    #[serde(default)]
    pub subjects: Vec<String>,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub product_types: Vec<String>,
    #[serde(default)]
    pub products: Vec<ProductId>,
    #[serde(default)]
    pub modes_of_delivery: Vec<String>,
    #[serde(rename = "searchQuery", default)]
    pub search_query: String,
    #[serde(rename = "currentPage", default)]
    pub current_page: Option<i64>,
    #[serde(rename = "pageSize", default)]
    pub page_size: Option<i64>,
    /// 保存时间（毫秒时间戳）
    #[serde(rename = "savedAt")]
    pub saved_at: i64,
}

impl PersistedFilters {
    pub fn capture(selection: &FilterSelection, now: DateTime<Utc>) -> Self {
        Self {
            subjects: selection.subjects.clone(),
            categories: selection.categories.clone(),
            product_types: selection.product_types.clone(),
            products: selection.products.clone(),
            modes_of_delivery: selection.modes_of_delivery.clone(),
            search_query: selection.search_query.clone(),
            current_page: Some(i64::from(selection.current_page)),
            page_size: Some(i64::from(selection.page_size)),
            saved_at: now.timestamp_millis(),
        }
    }

    /// 保存时间早于有效期的内容视为过期
    pub fn is_stale(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        // savedAt 来自 cookie，可能是任意值
        now.timestamp_millis().saturating_sub(self.saved_at) > max_age.num_milliseconds()
    }

    pub fn into_patch(self) -> FilterPatch {
        let mut patch = FilterPatch {
            search_query: Some(self.search_query),
            current_page: self.current_page,
            page_size: self.page_size,
            ..FilterPatch::default()
        };
        patch.set_dimension(FilterDimension::Subjects, self.subjects);
        patch.set_dimension(FilterDimension::Categories, self.categories);
        patch.set_dimension(FilterDimension::ProductTypes, self.product_types);
        patch.set_dimension(
            FilterDimension::Products,
            self.products.iter().map(ProductId::to_string).collect(),
        );
        patch.set_dimension(FilterDimension::ModesOfDelivery, self.modes_of_delivery);
        patch
    }
}

/// JSON 序列化后百分号编码，保证 cookie 值中没有分号、逗号和空白
pub fn encode_cookie_value(payload: &PersistedFilters) -> Result<String, PersistError> {
    let json = serde_json::to_string(payload)?;
    Ok(utf8_percent_encode(&json, NON_ALPHANUMERIC).to_string())
}

pub fn decode_cookie_value(raw: &str) -> Result<PersistedFilters, PersistError> {
    let json = percent_decode_str(raw.trim()).decode_utf8()?;
    Ok(serde_json::from_str(&json)?)
}

/// 从 `a=1; b=2` 中查找指定名称的值
pub fn find_cookie<'a>(cookies: &'a str, name: &str) -> Option<&'a str> {
    cookies.split(';').find_map(|entry| {
        let (key, value) = entry.trim().split_once('=')?;
        (key.trim() == name).then_some(value.trim())
    })
}

fn http_date(at: DateTime<Utc>) -> String {
    at.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// cookie 持久化中间件
pub struct CookiePersistence {
    jar: Box<dyn CookieJar>,
    name: String,
    max_age: Duration,
    secure: bool,
}

impl CookiePersistence {
    pub fn new(jar: Box<dyn CookieJar>, config: &StoreConfig) -> Self {
        Self {
            jar,
            name: config.cookie_name.clone(),
            max_age: config.cookie_max_age(),
            secure: config.secure_cookie,
        }
    }

    /// 启动时读取一次。过期或损坏的内容被丢弃并清除 cookie
    pub fn restore(&mut self, now: DateTime<Utc>) -> Option<FilterPatch> {
        match self.load() {
            Ok(Some(payload)) if payload.is_stale(now, self.max_age) => {
                log::info!("筛选 cookie 已过期 (savedAt={})，忽略", payload.saved_at);
                self.clear();
                None
            }
            Ok(Some(payload)) => Some(payload.into_patch()),
            Ok(None) => None,
            Err(e @ (PersistError::Payload(_) | PersistError::Encoding(_))) => {
                log::warn!("筛选 cookie 内容无效，已丢弃: {}", e);
                self.clear();
                None
            }
            Err(e) => {
                log::warn!("读取筛选 cookie 失败: {}", e);
                None
            }
        }
    }

    fn load(&self) -> Result<Option<PersistedFilters>, PersistError> {
        let cookies = self.jar.read_all()?;
        match find_cookie(&cookies, &self.name) {
            Some(raw) if !raw.is_empty() => decode_cookie_value(raw).map(Some),
            _ => Ok(None),
        }
    }

    /// 写入当前选择，失败只记录日志
    pub fn persist(&mut self, selection: &FilterSelection, now: DateTime<Utc>) {
        let payload = PersistedFilters::capture(selection, now);
        let result = encode_cookie_value(&payload)
            .map(|value| self.set_cookie(&value, now))
            .and_then(|header| self.jar.write(&header));
        if let Err(e) = result {
            log::warn!("保存筛选 cookie 失败: {}", e);
        }
    }

    /// 删除持久化的 cookie
    pub fn clear(&mut self) {
        let header = format!(
            "{}=; Path=/; Max-Age=0; Expires=Thu, 01 Jan 1970 00:00:00 GMT; SameSite=Strict",
            self.name
        );
        if let Err(e) = self.jar.write(&header) {
            log::warn!("清除筛选 cookie 失败: {}", e);
        }
    }

    fn set_cookie(&self, value: &str, now: DateTime<Utc>) -> String {
        let mut header = format!(
            "{}={}; Path=/; Max-Age={}",
            self.name,
            value,
            self.max_age.num_seconds()
        );
        // 超出可表示范围时只保留 Max-Age
        if let Some(expires) = now.checked_add_signed(self.max_age) {
            header.push_str("; Expires=");
            header.push_str(&http_date(expires));
        }
        header.push_str("; SameSite=Strict");
        if self.secure {
            header.push_str("; Secure");
        }
        header
    }
}

/// 内存中的 cookie 存储，克隆后共享同一份数据
#[derive(Debug, Clone, Default)]
pub struct MemoryCookieJar {
    inner: Rc<RefCell<MemoryCookieJarInner>>,
}

#[derive(Debug, Default)]
struct MemoryCookieJarInner {
    cookies: BTreeMap<String, String>,
    writes: Vec<String>,
    fail_writes: bool,
}

impl MemoryCookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// 预置一个 cookie
    pub fn insert(&self, name: &str, value: &str) {
        self.inner
            .borrow_mut()
            .cookies
            .insert(name.to_string(), value.to_string());
    }

    pub fn get(&self, name: &str) -> Option<String> {
        self.inner.borrow().cookies.get(name).cloned()
    }

    /// 所有写入过的 Set-Cookie 记录
    pub fn writes(&self) -> Vec<String> {
        self.inner.borrow().writes.clone()
    }

    /// 模拟存储配额耗尽等写入失败
    pub fn fail_writes(&self, fail: bool) {
        self.inner.borrow_mut().fail_writes = fail;
    }
}

impl CookieJar for MemoryCookieJar {
    fn read_all(&self) -> Result<String, PersistError> {
        let inner = self.inner.borrow();
        Ok(inner
            .cookies
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect::<Vec<_>>()
            .join("; "))
    }

    fn write(&mut self, set_cookie: &str) -> Result<(), PersistError> {
        let mut inner = self.inner.borrow_mut();
        if inner.fail_writes {
            return Err(PersistError::Write("存储空间不足".to_string()));
        }
        let mut parts = set_cookie.split(';');
        let (name, value) = parts
            .next()
            .and_then(|pair| pair.trim().split_once('='))
            .ok_or_else(|| PersistError::Write(format!("无效的 cookie: {}", set_cookie)))?;
        let expired = parts.any(|attribute| {
            attribute
                .trim()
                .strip_prefix("Max-Age=")
                .and_then(|age| age.parse::<i64>().ok())
                .map_or(false, |age| age <= 0)
        });
        let (name, value) = (name.trim().to_string(), value.trim().to_string());
        if expired {
            inner.cookies.remove(&name);
        } else {
            inner.cookies.insert(name, value);
        }
        inner.writes.push(set_cookie.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 15, 8, 0, 0).unwrap()
    }

    fn persistence(jar: &MemoryCookieJar, secure: bool) -> CookiePersistence {
        let config = StoreConfig {
            secure_cookie: secure,
            ..StoreConfig::default()
        };
        CookiePersistence::new(Box::new(jar.clone()), &config)
    }

    fn sample() -> FilterSelection {
        let mut selection = FilterSelection::default();
        selection.replace(FilterDimension::Subjects, vec!["CM2".into()]);
        selection.replace(FilterDimension::Products, vec!["42".into()]);
        selection.search_query = "exam; pack".into();
        selection.current_page = 3;
        selection
    }

    #[test]
    fn persists_and_restores_whitelisted_fields() {
        let jar = MemoryCookieJar::new();
        let mut cookies = persistence(&jar, false);
        cookies.persist(&sample(), now());

        let header = jar.writes().pop().unwrap();
        assert!(header.starts_with("admin3_filters="));
        assert!(header.contains("; Max-Age=2592000; "));
        assert!(header.contains("Expires=Wed, 15 Jul 2026 08:00:00 GMT"));
        assert!(header.ends_with("SameSite=Strict"));

        let patch = cookies.restore(now() + Duration::days(1)).unwrap();
        assert_eq!(patch.subjects, Some(vec!["CM2".to_string()]));
        assert_eq!(patch.products, Some(vec!["42".to_string()]));
        assert_eq!(patch.search_query.as_deref(), Some("exam; pack"));
        assert_eq!(patch.current_page, Some(3));
        assert_eq!(patch.page_size, Some(20));
    }

    #[test]
    fn secure_flag_is_added_when_configured() {
        let jar = MemoryCookieJar::new();
        persistence(&jar, true).persist(&sample(), now());
        assert!(jar.writes()[0].ends_with("; Secure"));
    }

    #[test]
    fn stale_payload_is_discarded_and_cleared() {
        let jar = MemoryCookieJar::new();
        let mut cookies = persistence(&jar, false);
        cookies.persist(&sample(), now() - Duration::days(31));

        assert!(cookies.restore(now()).is_none());
        assert!(jar.get("admin3_filters").is_none());
    }

    #[test]
    fn future_dated_payload_is_still_restored() {
        let jar = MemoryCookieJar::new();
        let mut cookies = persistence(&jar, false);
        cookies.persist(&sample(), now() + Duration::hours(2));

        let patch = cookies.restore(now()).unwrap();
        assert_eq!(patch.subjects, Some(vec!["CM2".to_string()]));
    }

    #[test]
    fn extreme_saved_at_is_stale() {
        let payload = PersistedFilters {
            saved_at: i64::MIN,
            ..PersistedFilters::capture(&sample(), now())
        };
        assert!(payload.is_stale(now(), Duration::days(30)));

        let jar = MemoryCookieJar::new();
        let raw = r#"{"subjects":["CM2"],"savedAt":-9223372036854775808}"#;
        jar.insert("admin3_filters", &utf8_percent_encode(raw, NON_ALPHANUMERIC).to_string());
        assert!(persistence(&jar, false).restore(now()).is_none());
        assert!(jar.get("admin3_filters").is_none());
    }

    #[test]
    fn expires_is_omitted_past_the_last_representable_date() {
        let jar = MemoryCookieJar::new();
        let late = DateTime::<Utc>::MAX_UTC - Duration::days(1);
        persistence(&jar, false).persist(&sample(), late);

        let header = jar.writes().pop().unwrap();
        assert!(header.contains("; Max-Age=2592000; SameSite=Strict"));
        assert!(!header.contains("Expires="));
    }

    #[test]
    fn malformed_payload_is_discarded() {
        let jar = MemoryCookieJar::new();
        jar.insert("admin3_filters", "%7Bnot-json");
        assert!(persistence(&jar, false).restore(now()).is_none());
        assert!(jar.get("admin3_filters").is_none());
    }

    #[test]
    fn numeric_product_ids_in_payload_are_accepted() {
        let raw = r#"{"products":[101,"202"],"savedAt":1781510400000}"#;
        let payload = decode_cookie_value(&utf8_percent_encode(raw, NON_ALPHANUMERIC).to_string()).unwrap();
        assert_eq!(payload.products, vec![ProductId::new("101").unwrap(), ProductId::new("202").unwrap()]);
        assert_eq!(payload.current_page, None);
    }

    #[test]
    fn write_failures_are_swallowed() {
        let jar = MemoryCookieJar::new();
        jar.fail_writes(true);
        persistence(&jar, false).persist(&sample(), now());
        assert!(jar.writes().is_empty());
    }

    #[test]
    fn find_cookie_matches_exact_name() {
        let cookies = "other_admin3_filters=1; admin3_filters=abc; theme=dark";
        assert_eq!(find_cookie(cookies, "admin3_filters"), Some("abc"));
        assert_eq!(find_cookie(cookies, "missing"), None);
    }
}
