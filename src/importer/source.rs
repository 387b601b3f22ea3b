// ==========================================
// 供应商 WIP 跟踪系统 - 进度表获取
// ==========================================
// 职责: 提供 (路由标签, 文件字节) 给流水线
// 实现: 目录收件箱
//   {inbox}/{类别目录}/{供应商}/{供应商}_{YYYYMMDD}.{xlsx|csv}
// 文件不存在视为本周期无数据
// ==========================================

use crate::domain::{SupplierKind, WipCategory};
use crate::importer::error::{ImportError, ImportResult};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// 路由标签（邮件分类/门户抓取给出）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoutingTag {
    pub supplier: SupplierKind,
    pub category: WipCategory,
}

impl RoutingTag {
    pub fn for_supplier(supplier: SupplierKind) -> Self {
        Self {
            supplier,
            category: supplier.category(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SupplierExtract {
    pub tag: RoutingTag,
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub snapshot_date: NaiveDate,
}

impl SupplierExtract {
    /// 从文件读取；文件名需符合 {供应商}_{YYYYMMDD}.{ext}
    pub fn from_path(path: &Path) -> ImportResult<Self> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| ImportError::FileNotFound(path.display().to_string()))?
            .to_string();
        let (supplier, snapshot_date) = parse_extract_file_name(&file_name)?;
        let bytes = std::fs::read(path)?;
        Ok(Self {
            tag: RoutingTag::for_supplier(supplier),
            file_name,
            bytes,
            snapshot_date,
        })
    }
}

/// 解析文件名中的供应商与快照日期
pub fn parse_extract_file_name(file_name: &str) -> ImportResult<(SupplierKind, NaiveDate)> {
    let stem = file_name
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .unwrap_or(file_name);
    let (name, date) = stem.rsplit_once('_').ok_or_else(|| ImportError::FieldMappingError {
        row: 0,
        message: format!("文件名不符合 供应商_YYYYMMDD 格式: {}", file_name),
    })?;
    let supplier = SupplierKind::from_name(name).ok_or_else(|| ImportError::FieldMappingError {
        row: 0,
        message: format!("未知供应商: {}", name),
    })?;
    let snapshot_date =
        NaiveDate::parse_from_str(date, "%Y%m%d").map_err(|_| ImportError::DateFormatError {
            row: 0,
            field: "file_name".to_string(),
            value: date.to_string(),
        })?;
    Ok((supplier, snapshot_date))
}

pub fn category_folder(category: WipCategory) -> &'static str {
    match category {
        WipCategory::Fab => "晶圆进度表",
        WipCategory::Assembly => "封装进度表",
    }
}

// ==========================================
// ExtractSource - 获取接口
// ==========================================
#[async_trait]
pub trait ExtractSource: Send + Sync {
    fn name(&self) -> &str;

    /// 获取指定日期的全部供应商进度表
    async fn fetch(&self, date: NaiveDate) -> ImportResult<Vec<SupplierExtract>>;
}

pub struct DirectoryExtractSource {
    inbox: PathBuf,
}

impl DirectoryExtractSource {
    pub fn new(inbox: impl Into<PathBuf>) -> Self {
        Self {
            inbox: inbox.into(),
        }
    }

    /// 某供应商某日进度表的候选路径（xlsx 优先）
    pub fn candidate_paths(&self, supplier: SupplierKind, date: NaiveDate) -> Vec<PathBuf> {
        let dir = self
            .inbox
            .join(category_folder(supplier.category()))
            .join(supplier.display_name());
        let stem = format!("{}_{}", supplier.display_name(), date.format("%Y%m%d"));
        ["xlsx", "csv"]
            .iter()
            .map(|ext| dir.join(format!("{}.{}", stem, ext)))
            .collect()
    }
}

#[async_trait]
impl ExtractSource for DirectoryExtractSource {
    fn name(&self) -> &str {
        "directory-inbox"
    }

    async fn fetch(&self, date: NaiveDate) -> ImportResult<Vec<SupplierExtract>> {
        let mut extracts = Vec::new();
        for supplier in SupplierKind::ALL {
            let mut found = None;
            for path in self.candidate_paths(supplier, date) {
                if tokio::fs::try_exists(&path).await.unwrap_or(false) {
                    found = Some(path);
                    break;
                }
            }
            let Some(path) = found else {
                debug!(supplier = %supplier, date = %date, "收件箱无进度表");
                continue;
            };

            let bytes = tokio::fs::read(&path).await?;
            let file_name = path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default()
                .to_string();
            info!(supplier = %supplier, file = %file_name, size = bytes.len(), "读取进度表");
            extracts.push(SupplierExtract {
                tag: RoutingTag::for_supplier(supplier),
                file_name,
                bytes,
                snapshot_date: date,
            });
        }
        Ok(extracts)
    }
}
