// ==========================================
// 供应商 WIP 跟踪系统 - 日装片分析模型
// ==========================================
// 用途: 追赶批处理按日写入的装片量统计
// 对齐: daily_analysis 表（按日期追加）
// ==========================================

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// 单个封装形式桶的日装片量
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageBucketCount {
    pub bucket: String,
    pub quantity: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyAnalysisRow {
    pub analysis_date: NaiveDate,
    pub supplier: String,
    pub buckets: Vec<PackageBucketCount>, // 顺序与配置一致
}

impl DailyAnalysisRow {
    pub fn total(&self) -> i64 {
        self.buckets.iter().map(|b| b.quantity).sum()
    }

    pub fn bucket(&self, name: &str) -> Option<i64> {
        self.buckets
            .iter()
            .find(|b| b.bucket == name)
            .map(|b| b.quantity)
    }
}
