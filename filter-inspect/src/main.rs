use chrono::{DateTime, TimeZone, Utc};
use clap::{Arg, ArgAction, Command};
use std::fs;

use filter_common::normalize;
use filter_state::clock::FixedClock;
use filter_state::persistence::{
    decode_cookie_value, encode_cookie_value, MemoryCookieJar, PersistedFilters,
};
use filter_state::url_sync::MemoryAddressBar;
use filter_state::{selectors, FilterAction, FilterStore, StoreConfig};

// 主函数
fn main() {
    // 设置命令行参数
    let matches = Command::new("筛选状态检查器")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Admin3")
        .about("解析筛选地址与 cookie，输出恢复后的筛选状态和查询参数")
        .arg(Arg::new("url")
            .short('u')
            .long("url")
            .value_name("URL")
            .help("页面地址或查询串，例如 '?subject_code=CM2&group=Tutorial'"))
        .arg(Arg::new("cookie")
            .short('c')
            .long("cookie")
            .value_name("COOKIE_VALUE")
            .help("筛选 cookie 的值（百分号编码的 JSON）或原始 JSON"))
        .arg(Arg::new("config")
            .long("config")
            .value_name("CONFIG_FILE")
            .help("JSON 配置文件路径"))
        .arg(Arg::new("counts")
            .long("counts")
            .value_name("COUNTS_JSON")
            .help("筛选计数 JSON，用于校验筛选组合"))
        .arg(Arg::new("now")
            .long("now")
            .value_name("EPOCH_MS")
            .value_parser(clap::value_parser!(i64))
            .help("当前时间（毫秒时间戳），默认为系统时间"))
        .arg(Arg::new("verbose")
            .short('v')
            .long("verbose")
            .help("输出完整状态")
            .action(ArgAction::SetTrue))
        .get_matches();

    let url = matches.get_one::<String>("url").cloned().unwrap_or_default();
    let cookie = matches.get_one::<String>("cookie").cloned();
    let config_path = matches.get_one::<String>("config");
    let counts = matches.get_one::<String>("counts");
    let verbose = matches.get_flag("verbose");

    let now = match matches.get_one::<i64>("now") {
        Some(ms) => match Utc.timestamp_millis_opt(*ms).single() {
            Some(now) => now,
            None => {
                eprintln!("错误: 无效的时间戳 {}", ms);
                std::process::exit(1);
            }
        },
        None => Utc::now(),
    };

    let config = match load_config(config_path.map(String::as_str)) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("错误: {}", e);
            std::process::exit(1);
        }
    };

    match inspect(config, &url, cookie.as_deref(), counts.map(String::as_str), now, verbose) {
        Ok(_) => {}
        Err(e) => {
            eprintln!("错误: {}", e);
            std::process::exit(1);
        }
    }
}

// 读取配置文件，未指定时使用默认配置
fn load_config(path: Option<&str>) -> Result<StoreConfig, String> {
    let Some(path) = path else {
        return Ok(StoreConfig::default());
    };
    let json = fs::read_to_string(path).map_err(|e| format!("无法读取配置文件 '{}': {}", path, e))?;
    StoreConfig::from_json(&json).map_err(|e| e.to_string())
}

// 原始 JSON 需要先编码成 cookie 值
fn cookie_value(raw: &str) -> Result<String, String> {
    let trimmed = raw.trim();
    if !trimmed.starts_with('{') {
        return Ok(trimmed.to_string());
    }
    let payload: PersistedFilters =
        serde_json::from_str(trimmed).map_err(|e| format!("解析 cookie JSON 失败: {}", e))?;
    encode_cookie_value(&payload).map_err(|e| e.to_string())
}

fn print_json<T: serde::Serialize>(label: &str, value: &T) -> Result<(), String> {
    let json = serde_json::to_string_pretty(value).map_err(|e| format!("序列化{}失败: {}", label, e))?;
    println!("{}:\n{}", label, json);
    Ok(())
}

fn format_time(at: DateTime<Utc>) -> String {
    at.to_rfc3339()
}

// 在内存中启动仓库并输出结果
fn inspect(
    config: StoreConfig,
    url: &str,
    cookie: Option<&str>,
    counts: Option<&str>,
    now: DateTime<Utc>,
    verbose: bool,
) -> Result<(), String> {
    let jar = MemoryCookieJar::new();
    if let Some(raw) = cookie {
        let value = cookie_value(raw)?;
        match decode_cookie_value(&value) {
            Ok(payload) => {
                let saved_at = Utc
                    .timestamp_millis_opt(payload.saved_at)
                    .single()
                    .map(format_time)
                    .unwrap_or_else(|| payload.saved_at.to_string());
                println!("cookie 保存时间: {}", saved_at);
                if payload.is_stale(now, config.cookie_max_age()) {
                    println!("cookie 已过期，将被忽略");
                }
            }
            Err(e) => println!("cookie 无法解析，将被忽略: {}", e),
        }
        jar.insert(&config.cookie_name, &value);
    }

    let bar = MemoryAddressBar::new(url);
    let mut store = FilterStore::bootstrap(
        config,
        Box::new(jar.clone()),
        Box::new(bar.clone()),
        Box::new(FixedClock::new(now)),
    );
    println!("初始状态来源: {:?}", store.initial_source());

    if let Some(counts) = counts {
        let value: serde_json::Value =
            serde_json::from_str(counts).map_err(|e| format!("解析计数失败: {}", e))?;
        let counts = normalize::filter_counts(&value).ok_or("计数必须是 JSON 对象")?;
        store.dispatch(FilterAction::SetFilterCounts(counts));
    }
    store.validate();

    print_json("筛选摘要", &*store.select_active_filter_summary())?;
    println!("地址栏查询串: ?{}", bar.current());
    println!("规范查询串: ?{}", store.url_query());
    println!("接口查询参数: ?{}", store.api_query());

    let issues = selectors::select_validation_errors(store.state());
    if issues.is_empty() {
        println!("校验通过");
    } else {
        for issue in issues {
            println!("[{:?}] {}: {}", issue.severity, issue.field, issue.message);
        }
    }

    if verbose {
        print_json("完整状态", store.state())?;
        for header in jar.writes() {
            println!("Set-Cookie: {}", header);
        }
    }

    Ok(())
}
