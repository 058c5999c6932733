// ==========================================
// 表格批量导入管道 - 数据清洗器实现
// ==========================================
// 职责: TRIM / NULL 标准化 / 数值、日期、枚举的规范化
// 红线: 无法规范化的值原样保留，交由校验服务判定，不做隐式纠正
// ==========================================

use chrono::{NaiveDate, NaiveDateTime};

/// 日期输入格式（按顺序尝试）
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y%m%d", "%Y/%m/%d", "%d.%m.%Y"];

/// 日期时间输入格式（取日期部分）
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y/%m/%d %H:%M:%S"];

pub struct DataCleaner;

impl DataCleaner {
    /// TRIM
    pub fn clean_text(&self, value: &str) -> String {
        value.trim().to_string()
    }

    /// 空白 → None
    pub fn normalize_null(&self, value: Option<&str>) -> Option<String> {
        value.and_then(|v| {
            let trimmed = v.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        })
    }

    /// 解析数值（允许千分位逗号与空格）
    pub fn parse_number(&self, value: &str) -> Option<f64> {
        let compact: String = value
            .trim()
            .chars()
            .filter(|c| *c != ',' && *c != ' ' && *c != '\u{a0}')
            .collect();
        if compact.is_empty() {
            return None;
        }
        compact.parse::<f64>().ok().filter(|n| n.is_finite())
    }

    /// 解析日期（多格式兼容；日期时间取日期部分）
    pub fn parse_date(&self, value: &str) -> Option<NaiveDate> {
        let trimmed = value.trim();

        for fmt in DATE_FORMATS {
            if let Ok(date) = NaiveDate::parse_from_str(trimmed, fmt) {
                return Some(date);
            }
        }

        for fmt in DATETIME_FORMATS {
            if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, fmt) {
                return Some(dt.date());
            }
        }

        chrono::DateTime::parse_from_rfc3339(trimmed)
            .ok()
            .map(|dt| dt.date_naive())
    }

    /// 枚举匹配（忽略大小写），返回规范选项
    pub fn match_enum<'a>(&self, value: &str, options: &'a [String]) -> Option<&'a str> {
        let needle = value.trim().to_lowercase();
        options
            .iter()
            .find(|opt| opt.to_lowercase() == needle)
            .map(String::as_str)
    }
}
