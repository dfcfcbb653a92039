use chrono::Duration;
use serde::Deserialize;

use crate::error::ConfigError;

/// 默认 cookie 名称
pub const DEFAULT_COOKIE_NAME: &str = "admin3_filters";

const MAX_COOKIE_AGE_DAYS: i64 = 3650;

/// 筛选状态配置，由页面以 JSON 传入，缺省字段取默认值
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    /// 持久化 cookie 名称
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
    /// cookie 有效天数，同时用于判断已保存内容是否过期
    #[serde(default = "default_cookie_max_age_days")]
    pub cookie_max_age_days: i64,
    /// 是否为 cookie 加上 Secure 标记（生产环境）
    #[serde(default)]
    pub secure_cookie: bool,
    /// 默认每页条数
    #[serde(default = "default_page_size")]
    pub default_page_size: u32,
    /// 每页条数下限
    #[serde(default = "default_min_page_size")]
    pub min_page_size: u32,
    /// 每页条数上限
    #[serde(default = "default_max_page_size")]
    pub max_page_size: u32,
    /// 搜索文本的建议最短长度
    #[serde(default = "default_min_search_length")]
    pub min_search_length: usize,
    /// 搜索文本的最大长度
    #[serde(default = "default_max_search_length")]
    pub max_search_length: usize,
    /// 是否启用 cookie 持久化
    #[serde(default = "default_enabled")]
    pub persist_enabled: bool,
    /// 是否同步地址栏
    #[serde(default = "default_enabled")]
    pub sync_url: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            cookie_name: default_cookie_name(),
            cookie_max_age_days: default_cookie_max_age_days(),
            secure_cookie: false,
            default_page_size: default_page_size(),
            min_page_size: default_min_page_size(),
            max_page_size: default_max_page_size(),
            min_search_length: default_min_search_length(),
            max_search_length: default_max_search_length(),
            persist_enabled: true,
            sync_url: true,
        }
    }
}

impl StoreConfig {
    /// 解析并校验 JSON 配置
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: StoreConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cookie_name.trim().is_empty() {
            return Err(ConfigError::EmptyCookieName);
        }
        if !(1..=MAX_COOKIE_AGE_DAYS).contains(&self.cookie_max_age_days) {
            return Err(ConfigError::CookieMaxAge);
        }
        if self.min_page_size == 0 || self.min_page_size > self.max_page_size {
            return Err(ConfigError::PageSizeBounds {
                min: self.min_page_size,
                max: self.max_page_size,
            });
        }
        if !(self.min_page_size..=self.max_page_size).contains(&self.default_page_size) {
            return Err(ConfigError::DefaultPageSize {
                value: self.default_page_size,
                min: self.min_page_size,
                max: self.max_page_size,
            });
        }
        if self.min_search_length > self.max_search_length {
            return Err(ConfigError::SearchLengthBounds {
                min: self.min_search_length,
                max: self.max_search_length,
            });
        }
        Ok(())
    }

    /// 页码下限为1
    pub fn clamp_page(&self, page: i64) -> u32 {
        page.clamp(1, i64::from(u32::MAX)) as u32
    }

    /// 每页条数限制在配置范围内
    pub fn clamp_page_size(&self, size: i64) -> u32 {
        size.clamp(i64::from(self.min_page_size), i64::from(self.max_page_size)) as u32
    }

    pub fn cookie_max_age(&self) -> Duration {
        Duration::days(self.cookie_max_age_days)
    }
}

fn default_cookie_name() -> String {
    DEFAULT_COOKIE_NAME.to_string()
}

fn default_cookie_max_age_days() -> i64 {
    30
}

fn default_page_size() -> u32 {
    filter_common::DEFAULT_PAGE_SIZE
}

fn default_min_page_size() -> u32 {
    1
}

fn default_max_page_size() -> u32 {
    100
}

fn default_min_search_length() -> usize {
    2
}

fn default_max_search_length() -> usize {
    200
}

fn default_enabled() -> bool {
    true
}
