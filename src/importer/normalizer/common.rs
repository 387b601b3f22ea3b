// ==========================================
// 供应商 WIP 跟踪系统 - 标准化公共工具
// ==========================================

use crate::config::{column_target, CanonicalField, ColumnTarget, SupplierProfile};
use crate::domain::{StageQuantities, WipCandidate};
use crate::importer::data_cleaner::DataCleaner;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::file_parser::{RawRow, RawTable};
use crate::importer::normalizer::NormalizeContext;

/// 校验必需列存在
pub fn ensure_columns(table: &RawTable, required: &[&str], supplier: &str) -> ImportResult<()> {
    let missing = table.missing_columns(required);
    if missing.is_empty() {
        Ok(())
    } else {
        Err(ImportError::MissingColumns {
            supplier: supplier.to_string(),
            columns: missing.into_iter().map(str::to_string).collect(),
        })
    }
}

/// 标量字段写入候选记录（空白单元格保持 None）
pub fn assign_field(candidate: &mut WipCandidate, field: CanonicalField, value: &str) {
    let value = value.trim();
    if value.is_empty() {
        return;
    }
    let slot = match field {
        CanonicalField::LotId => &mut candidate.lot_id,
        CanonicalField::PurchaseOrder => &mut candidate.purchase_order,
        CanonicalField::ItemName => &mut candidate.item_name,
        CanonicalField::Quantity => &mut candidate.quantity,
        CanonicalField::Status => &mut candidate.status,
        CanonicalField::Stage => &mut candidate.stage,
        CanonicalField::LayerCount => &mut candidate.layer_count,
        CanonicalField::RemainLayer => &mut candidate.remain_layer,
        CanonicalField::ForecastDate => &mut candidate.forecast_date,
        CanonicalField::WarehouseStock => &mut candidate.warehouse_stock,
        CanonicalField::OnlineTotal => &mut candidate.online_total,
        CanonicalField::HoldInfo => &mut candidate.hold_info,
    };
    *slot = Some(value.to_string());
}

/// 按列映射把一行转换为候选记录
///
/// 映射到同一工序的多列求和；标量字段映射重复时后者覆盖前者。
pub fn map_row(
    table: &RawTable,
    row: &RawRow,
    columns: &[(usize, &str)],
    ctx: &NormalizeContext<'_>,
    stages: &[&str],
) -> WipCandidate {
    let cleaner = DataCleaner;
    let mut candidate = WipCandidate::new(
        row.row_number,
        ctx.supplier.category(),
        ctx.supplier.display_name(),
        ctx.snapshot_date,
        StageQuantities::zeroed(stages),
    );

    for (idx, canonical) in columns {
        let value = table.cell(row, *idx);
        match column_target(canonical) {
            ColumnTarget::Field(field) => assign_field(&mut candidate, field, value),
            ColumnTarget::Stage(stage) => {
                let quantity = cleaner.parse_quantity(Some(value));
                candidate.stage_quantities.add(stage, quantity);
            }
        }
    }
    candidate
}

/// 解析列映射到列位置（调用前已校验列存在）
pub fn resolve_columns<'a>(
    table: &RawTable,
    columns: impl Iterator<Item = (&'a String, &'a String)>,
) -> Vec<(usize, &'a str)> {
    columns
        .filter_map(|(raw, canonical)| {
            table
                .column_index(raw)
                .map(|idx| (idx, canonical.as_str()))
        })
        .collect()
}

/// 主键替换（数据修补表）
pub fn apply_substitution(candidate: &mut WipCandidate, profile: &SupplierProfile) {
    if let Some(key) = candidate.lot_id.as_deref() {
        candidate.lot_id = Some(profile.substitute_key(key.trim()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assign_field_skips_blank() {
        let mut candidate = WipCandidate::new(
            1,
            crate::domain::WipCategory::Fab,
            "荣芯",
            chrono::NaiveDate::from_ymd_opt(2025, 5, 20).unwrap(),
            StageQuantities::default(),
        );
        assign_field(&mut candidate, CanonicalField::HoldInfo, "  ");
        assert_eq!(candidate.hold_info, None);
        assign_field(&mut candidate, CanonicalField::HoldInfo, " QA hold ");
        assert_eq!(candidate.hold_info.as_deref(), Some("QA hold"));
    }
}
