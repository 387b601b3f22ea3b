// ==========================================
// 供应商 WIP 跟踪系统 - 供应商标准化器
// ==========================================
// 职责: 供应商进度表 → WipCandidate 列表
// 分发: SupplierNormalizer 按供应商选择策略（封闭集合）
// 失败: 列缺失/解析错误/panic 一律返回 None（本周期无数据）
// ==========================================

pub mod column_mapped;
pub mod common;
pub mod fab;
pub mod pivot;

use crate::config::{StageModel, SupplierProfile};
use crate::domain::{SupplierKind, WipCandidate};
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::file_parser::{parse_workbook, ExtractFormat, RawTable};
use chrono::NaiveDate;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::{error, info, warn};

/// 标准化上下文
#[derive(Debug, Clone, Copy)]
pub struct NormalizeContext<'a> {
    pub supplier: SupplierKind,
    pub snapshot_date: NaiveDate,
    pub stage_model: &'a StageModel,
}

/// 一次进度表的工作表集合
#[derive(Debug, Clone, Default)]
pub struct SheetSet {
    pub primary: RawTable,
    pub stock: Option<RawTable>,
}

/// 按供应商配置读取工作表
///
/// 库存工作表为可选：不存在时跳过
pub fn load_sheets(
    bytes: &[u8],
    format: ExtractFormat,
    profile: &SupplierProfile,
) -> ImportResult<SheetSet> {
    let primary = parse_workbook(bytes, format, profile.sheet.as_deref(), profile.header_row)?;

    let stock = match (&profile.stock_sheet, format) {
        (Some(spec), ExtractFormat::Xlsx) => {
            match parse_workbook(bytes, format, Some(&spec.sheet), spec.header_row) {
                Ok(table) => Some(table),
                Err(ImportError::SheetNotFound(_)) | Err(ImportError::HeaderRowMissing(_)) => None,
                Err(e) => return Err(e),
            }
        }
        _ => None,
    };

    Ok(SheetSet { primary, stock })
}

// ==========================================
// SupplierNormalizer - 供应商策略
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupplierNormalizer {
    Jcet,
    Xinfeng,
    YaxinGuizhou,
    YaxinZhejiang,
    Rsmc,
}

impl From<SupplierKind> for SupplierNormalizer {
    fn from(kind: SupplierKind) -> Self {
        match kind {
            SupplierKind::Jcet => SupplierNormalizer::Jcet,
            SupplierKind::Xinfeng => SupplierNormalizer::Xinfeng,
            SupplierKind::YaxinGuizhou => SupplierNormalizer::YaxinGuizhou,
            SupplierKind::YaxinZhejiang => SupplierNormalizer::YaxinZhejiang,
            SupplierKind::Rsmc => SupplierNormalizer::Rsmc,
        }
    }
}

impl SupplierNormalizer {
    /// 标准化；None 表示本周期该供应商无可用数据
    pub fn normalize(
        &self,
        sheets: &SheetSet,
        profile: &SupplierProfile,
        ctx: &NormalizeContext<'_>,
    ) -> Option<Vec<WipCandidate>> {
        if sheets.primary.is_empty() {
            info!(supplier = %ctx.supplier, "进度表无数据行");
            return None;
        }

        let result = catch_unwind(AssertUnwindSafe(|| self.try_normalize(sheets, profile, ctx)));
        match result {
            Ok(Ok(candidates)) => {
                info!(
                    supplier = %ctx.supplier,
                    count = candidates.len(),
                    "进度表标准化完成"
                );
                Some(candidates)
            }
            Ok(Err(ImportError::MissingColumns { supplier, columns })) => {
                warn!(supplier = %supplier, columns = ?columns, "进度表缺少必需列");
                None
            }
            Ok(Err(e)) => {
                error!(supplier = %ctx.supplier, error = %e, "进度表标准化失败");
                None
            }
            Err(_) => {
                error!(supplier = %ctx.supplier, "进度表标准化过程 panic");
                None
            }
        }
    }

    fn try_normalize(
        &self,
        sheets: &SheetSet,
        profile: &SupplierProfile,
        ctx: &NormalizeContext<'_>,
    ) -> ImportResult<Vec<WipCandidate>> {
        match self {
            SupplierNormalizer::Jcet
            | SupplierNormalizer::YaxinGuizhou
            | SupplierNormalizer::YaxinZhejiang => {
                column_mapped::normalize(&sheets.primary, profile, ctx)
            }
            SupplierNormalizer::Xinfeng => pivot::normalize(&sheets.primary, profile, ctx),
            SupplierNormalizer::Rsmc => {
                fab::normalize(&sheets.primary, sheets.stock.as_ref(), profile, ctx)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::wip_fields::{default_profile, default_stage_model};

    fn ctx(model: &StageModel, supplier: SupplierKind) -> NormalizeContext<'_> {
        NormalizeContext {
            supplier,
            snapshot_date: NaiveDate::from_ymd_opt(2025, 5, 20).unwrap(),
            stage_model: model,
        }
    }

    #[test]
    fn test_empty_table_is_none() {
        let model = default_stage_model();
        let profile = default_profile(SupplierKind::Jcet);
        let sheets = load_sheets("订单号,研磨\n".as_bytes(), ExtractFormat::Csv, &profile).unwrap();
        let result =
            SupplierNormalizer::Jcet.normalize(&sheets, &profile, &ctx(&model, SupplierKind::Jcet));
        assert!(result.is_none());
    }

    #[test]
    fn test_shape_mismatch_is_none() {
        let model = default_stage_model();
        let profile = default_profile(SupplierKind::Xinfeng);
        let sheets = load_sheets("a,b\n1,2\n".as_bytes(), ExtractFormat::Csv, &profile).unwrap();
        let result = SupplierNormalizer::Xinfeng.normalize(
            &sheets,
            &profile,
            &ctx(&model, SupplierKind::Xinfeng),
        );
        assert!(result.is_none());
    }

    #[test]
    fn test_pivot_without_pivot_spec_is_none() {
        let model = default_stage_model();
        let profile = default_profile(SupplierKind::Jcet);
        let sheets = load_sheets("订单号\nSO-1\n".as_bytes(), ExtractFormat::Csv, &profile).unwrap();
        let result = SupplierNormalizer::Xinfeng.normalize(
            &sheets,
            &profile,
            &ctx(&model, SupplierKind::Xinfeng),
        );
        assert!(result.is_none());
    }

    #[test]
    fn test_dispatch_from_kind() {
        for kind in SupplierKind::ALL {
            let normalizer = SupplierNormalizer::from(kind);
            assert_eq!(
                normalizer == SupplierNormalizer::Rsmc,
                kind == SupplierKind::Rsmc
            );
        }
    }
}
