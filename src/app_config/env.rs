use std::env;
use std::str::FromStr;

use rust_decimal::Decimal;

/// 读取布尔开关环境变量, 未设置时使用默认值
pub fn env_is_true(key: &str, default: bool) -> bool {
    env::var(key)
        .map(|v| v == "true" || v == "1")
        .unwrap_or(default)
}

/// 读取字符串环境变量, 未设置时使用默认值
pub fn env_or_default(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

/// 读取十进制环境变量, 未设置或解析失败时使用默认值
pub fn env_decimal_or(key: &str, default: Decimal) -> Decimal {
    env::var(key)
        .ok()
        .and_then(|v| Decimal::from_str(&v).ok())
        .unwrap_or(default)
}

/// 读取整数环境变量, 未设置或解析失败时使用默认值
pub fn env_usize_or(key: &str, default: usize) -> usize {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(default)
}

/// 读取逗号分隔的列表环境变量
pub fn env_list_or(key: &str, default: &[&str]) -> Vec<String> {
    match env::var(key) {
        Ok(v) if !v.trim().is_empty() => v
            .split(',')
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .collect(),
        _ => default.iter().map(|s| s.to_string()).collect(),
    }
}
