use thiserror::Error;

/// 配置错误 - 唯一会暴露给调用方的错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("解析配置失败: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("每页条数范围无效: 最小 {min}, 最大 {max}")]
    PageSizeBounds { min: u32, max: u32 },
    #[error("默认每页条数 {value} 不在 [{min}, {max}] 范围内")]
    DefaultPageSize { value: u32, min: u32, max: u32 },
    #[error("搜索长度范围无效: 最小 {min}, 最大 {max}")]
    SearchLengthBounds { min: usize, max: usize },
    #[error("cookie 名称不能为空")]
    EmptyCookieName,
    #[error("cookie 有效期必须在 1 到 3650 天之间")]
    CookieMaxAge,
}

/// cookie 读写错误，只记录日志，不影响内存中的状态
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("cookie 存储不可用: {0}")]
    Unavailable(String),
    #[error("写入 cookie 失败: {0}")]
    Write(String),
    #[error("cookie 内容编码无效: {0}")]
    Encoding(#[from] std::str::Utf8Error),
    #[error("cookie 内容解析失败: {0}")]
    Payload(#[from] serde_json::Error),
}

/// 地址栏同步错误
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("地址栏不可用")]
    Unavailable,
    #[error("更新浏览历史失败: {0}")]
    History(String),
}
