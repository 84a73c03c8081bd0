use std::sync::OnceLock;

use chrono::{DateTime, TimeZone};
use regex::Regex;

/// 辅助函数：检查字符串是否为合法的 SQL 标识符（表名、字段名）
pub fn is_valid_identifier(name: &str) -> bool {
    static IDENT: OnceLock<Regex> = OnceLock::new();
    IDENT
        .get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier regex"))
        .is_match(name)
}

/// 辅助函数：检查表前缀是否合法（允许为空）
pub fn is_valid_prefix(prefix: &str) -> bool {
    prefix.is_empty() || is_valid_identifier(prefix)
}

/// 最近更新统计窗口：昨天 00:00 开始，持续 48 小时
///
/// 返回 `(start, end)` 的 unix 时间戳（秒），两端均包含。
pub fn recent_window<Tz: TimeZone>(now: &DateTime<Tz>) -> (i64, i64) {
    let start = now
        .date_naive()
        .pred_opt()
        .and_then(|day| day.and_hms_opt(0, 0, 0))
        .and_then(|naive| now.timezone().from_local_datetime(&naive).earliest())
        .map(|dt| dt.timestamp())
        .unwrap_or_else(|| now.timestamp() - 86_400);

    (start, start + 48 * 60 * 60 - 1)
}

/// 辅助函数：格式化当前本地时间
pub fn now_string() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}
