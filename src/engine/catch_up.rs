// ==========================================
// 供应商 WIP 跟踪系统 - 日装片分析追赶任务
// ==========================================
// 职责: 从最新分析日期逐日推进到昨天，每日写一行装片量
// 口径:
// - 累计装片量 = [起始列, 结束列] 按列位置求和
// - 当日装片量 = D+1 累计 - D+2 累计（按 工单号+封装形式 左连接，缺失记 0）
// - 按封装形式汇总后按桶精确匹配，未命中记 0
// 失败:
// - 缺少 D+1 或 D+2 进度表 → 停止，不报错
// - 某日处理失败 → 停止并记录，已推进的日期照常写入
// - 写库失败 → 整段丢弃，错误返回
// ==========================================

use crate::config::CatchUpConfig;
use crate::domain::{DailyAnalysisRow, PackageBucketCount};
use crate::importer::data_cleaner::DataCleaner;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::file_parser::{parse_workbook, ExtractFormat, RawTable};
use crate::repository::{DailyAnalysisRepository, RepositoryResult};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

// ==========================================
// DailyExtractStore - 日进度表存储
// ==========================================
pub trait DailyExtractStore: Send + Sync {
    /// 读取某日进度表；不存在返回 Ok(None)
    fn load(&self, date: NaiveDate) -> ImportResult<Option<RawTable>>;
}

/// 目录实现: {dir}/{prefix}{YYYY-MM-DD}.xlsx|csv
pub struct DirectoryDailyStore {
    dir: PathBuf,
    prefix: String,
    sheet: Option<String>,
    header_row: usize,
}

impl DirectoryDailyStore {
    pub fn from_config(config: &CatchUpConfig) -> Self {
        Self {
            dir: config.extract_dir.clone(),
            prefix: config.file_prefix.clone(),
            sheet: config.sheet.clone(),
            header_row: config.header_row,
        }
    }

    pub fn path_for(&self, date: NaiveDate, ext: &str) -> PathBuf {
        self.dir
            .join(format!("{}{}.{}", self.prefix, date.format("%Y-%m-%d"), ext))
    }
}

impl DailyExtractStore for DirectoryDailyStore {
    fn load(&self, date: NaiveDate) -> ImportResult<Option<RawTable>> {
        for (ext, format) in [("xlsx", ExtractFormat::Xlsx), ("csv", ExtractFormat::Csv)] {
            let path = self.path_for(date, ext);
            if !path.exists() {
                continue;
            }
            let bytes = std::fs::read(&path)?;
            // CSV 没有工作表概念
            let sheet = match format {
                ExtractFormat::Xlsx => self.sheet.as_deref(),
                ExtractFormat::Csv => None,
            };
            return parse_workbook(&bytes, format, sheet, self.header_row).map(Some);
        }
        Ok(None)
    }
}

// ==========================================
// CatchUpReport
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatchUpStop {
    UpToDate,
    NoSeed,
    MissingExtract(NaiveDate),
    ProcessingFailed { date: NaiveDate, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatchUpReport {
    pub start: Option<NaiveDate>,
    pub rows: Vec<DailyAnalysisRow>,
    pub stop: CatchUpStop,
}

// ==========================================
// CatchUpController
// ==========================================
pub struct CatchUpController {
    config: CatchUpConfig,
    store: Box<dyn DailyExtractStore>,
    repo: Arc<DailyAnalysisRepository>,
}

impl CatchUpController {
    pub fn new(
        config: CatchUpConfig,
        store: Box<dyn DailyExtractStore>,
        repo: Arc<DailyAnalysisRepository>,
    ) -> Self {
        Self {
            config,
            store,
            repo,
        }
    }

    pub fn catch_up(&self, today: NaiveDate, now: DateTime<Utc>) -> RepositoryResult<CatchUpReport> {
        let start = match self.repo.last_date()? {
            Some(date) => date,
            None => match self.config.initial_date {
                Some(date) => date,
                None => {
                    info!("日装片分析表为空且未配置起始日期，跳过");
                    return Ok(CatchUpReport {
                        start: None,
                        rows: Vec::new(),
                        stop: CatchUpStop::NoSeed,
                    });
                }
            },
        };

        let target = today - Duration::days(1);
        let mut current = start;
        let mut rows = Vec::new();
        let mut stop = CatchUpStop::UpToDate;

        while current < target {
            let day1 = current + Duration::days(1);
            let day2 = current + Duration::days(2);

            let tables = self.store.load(day1).and_then(|t1| {
                self.store.load(day2).map(|t2| (t1, t2))
            });
            let (t1, t2) = match tables {
                Ok((Some(t1), Some(t2))) => (t1, t2),
                Ok(_) => {
                    warn!(day1 = %day1, day2 = %day2, "缺少进度表，停止追赶");
                    stop = CatchUpStop::MissingExtract(day1);
                    break;
                }
                Err(e) => {
                    error!(date = %day1, error = %e, "读取进度表失败");
                    stop = CatchUpStop::ProcessingFailed {
                        date: day1,
                        message: e.to_string(),
                    };
                    break;
                }
            };

            match daily_die_attach(&t1, &t2, &self.config) {
                Ok(buckets) => {
                    info!(date = %day1, total = buckets.iter().map(|b| b.quantity).sum::<i64>(), "日装片量计算完成");
                    rows.push(DailyAnalysisRow {
                        analysis_date: day1,
                        supplier: self.config.supplier.clone(),
                        buckets,
                    });
                    current = day1;
                }
                Err(e) => {
                    error!(date = %day1, error = %e, "日装片量计算失败");
                    stop = CatchUpStop::ProcessingFailed {
                        date: day1,
                        message: e.to_string(),
                    };
                    break;
                }
            }
        }

        if !rows.is_empty() {
            self.repo.insert_batch(&rows, now)?;
        }
        Ok(CatchUpReport {
            start: Some(start),
            rows,
            stop,
        })
    }
}

// ==========================================
// 装片量计算
// ==========================================

struct DieAttachColumns {
    run_card: usize,
    package: usize,
    start: usize,
    end: usize,
}

fn locate_columns(table: &RawTable, config: &CatchUpConfig) -> ImportResult<DieAttachColumns> {
    let required = [
        config.run_card_column.as_str(),
        config.package_column.as_str(),
        config.cumulative_start_column.as_str(),
        config.cumulative_end_column.as_str(),
    ];
    let missing = table.missing_columns(&required);
    if !missing.is_empty() {
        return Err(ImportError::MissingColumns {
            supplier: config.supplier.clone(),
            columns: missing.into_iter().map(str::to_string).collect(),
        });
    }
    let index = |name: &str| table.column_index(name).unwrap_or_default();
    let columns = DieAttachColumns {
        run_card: index(&config.run_card_column),
        package: index(&config.package_column),
        start: index(&config.cumulative_start_column),
        end: index(&config.cumulative_end_column),
    };
    if columns.end < columns.start {
        return Err(ImportError::FieldMappingError {
            row: 0,
            message: format!(
                "累计区间列顺序错误: {} 在 {} 之前",
                config.cumulative_end_column, config.cumulative_start_column
            ),
        });
    }
    Ok(columns)
}

/// (工单号, 封装形式, 累计装片量)
fn cumulative_rows(table: &RawTable, config: &CatchUpConfig) -> ImportResult<Vec<(String, String, i64)>> {
    let columns = locate_columns(table, config)?;
    let cleaner = DataCleaner;
    Ok(table
        .rows
        .iter()
        .map(|row| {
            let total = (columns.start..=columns.end)
                .map(|idx| cleaner.parse_quantity(Some(table.cell(row, idx))))
                .sum::<i64>();
            (
                table.cell(row, columns.run_card).to_string(),
                table.cell(row, columns.package).to_string(),
                total,
            )
        })
        .collect())
}

/// 计算一日各封装形式桶的装片量
pub fn daily_die_attach(
    day1: &RawTable,
    day2: &RawTable,
    config: &CatchUpConfig,
) -> ImportResult<Vec<PackageBucketCount>> {
    let mut later: HashMap<(String, String), i64> = HashMap::new();
    for (run_card, package, total) in cumulative_rows(day2, config)? {
        *later.entry((run_card, package)).or_insert(0) += total;
    }

    let mut by_package: HashMap<String, i64> = HashMap::new();
    for (run_card, package, total) in cumulative_rows(day1, config)? {
        let next = later
            .get(&(run_card, package.clone()))
            .copied()
            .unwrap_or(0);
        *by_package.entry(package).or_insert(0) += total - next;
    }

    Ok(config
        .buckets
        .iter()
        .map(|bucket| PackageBucketCount {
            bucket: bucket.name.clone(),
            quantity: by_package.get(&bucket.package).copied().unwrap_or(0),
        })
        .collect())
}
