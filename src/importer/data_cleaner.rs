// ==========================================
// 供应商 WIP 跟踪系统 - 数据清洗器
// ==========================================
// 职责: TRIM / NULL 标准化 / 数值与日期宽松解析
// ==========================================

use chrono::{Duration, NaiveDate};

pub struct DataCleaner;

impl DataCleaner {
    /// 空白视为 None
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

    /// 整数宽松解析
    ///
    /// 接受: 千分位逗号、首尾空白、整值小数（"12.0"）
    pub fn parse_int(&self, value: &str) -> Option<i64> {
        let cleaned: String = value
            .chars()
            .filter(|c| *c != ',' && !c.is_whitespace())
            .collect();
        if cleaned.is_empty() {
            return None;
        }
        if let Ok(v) = cleaned.parse::<i64>() {
            return Some(v);
        }
        match cleaned.parse::<f64>() {
            Ok(v) if v.is_finite() && v.fract() == 0.0 => Some(v as i64),
            _ => None,
        }
    }

    /// 数量类字段：解析失败记 0
    pub fn parse_quantity(&self, value: Option<&str>) -> i64 {
        value.and_then(|v| self.parse_int(v)).unwrap_or(0)
    }

    /// 日期宽松解析（YYYY-MM-DD / YYYY/MM/DD / YYYYMMDD / 带时间部分 / Excel 序列号）
    pub fn parse_date(&self, value: &str) -> Option<NaiveDate> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return None;
        }
        let date_part = trimmed
            .split(|c| c == ' ' || c == 'T')
            .next()
            .unwrap_or(trimmed);
        for format in ["%Y-%m-%d", "%Y/%m/%d", "%Y%m%d", "%Y.%m.%d"] {
            if let Ok(date) = NaiveDate::parse_from_str(date_part, format) {
                return Some(date);
            }
        }
        // Excel 日期序列号（1900 日期系统）
        match self.parse_int(trimmed) {
            Some(serial) if (1..=2_958_465).contains(&serial) => {
                NaiveDate::from_ymd_opt(1899, 12, 30).map(|base| base + Duration::days(serial))
            }
            _ => None,
        }
    }
}
