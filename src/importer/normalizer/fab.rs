// ==========================================
// 供应商 WIP 跟踪系统 - 晶圆厂进度表标准化
// ==========================================
// 适用: 荣芯
// 工作表:
// - WIP Report: 在制 lot，交期 = 源表日期 + WIP 偏移
// - Stock (可选): 成品库存，状态 stock，交期 = 源表日期 + 库存偏移 + WIP 偏移
// 规则: 采购单号为空的 lot 为试产，采购单号与品名均记为 Trail
// ==========================================

use crate::config::{StockSheetSpec, SupplierProfile};
use crate::domain::{StageQuantities, WipCandidate};
use crate::importer::data_cleaner::DataCleaner;
use crate::importer::error::ImportResult;
use crate::importer::file_parser::RawTable;
use crate::importer::normalizer::common::{
    apply_substitution, ensure_columns, map_row, resolve_columns,
};
use crate::importer::normalizer::NormalizeContext;
use chrono::Duration;

pub const TRIAL_MARKER: &str = "Trail";

pub fn normalize(
    wip: &RawTable,
    stock: Option<&RawTable>,
    profile: &SupplierProfile,
    ctx: &NormalizeContext<'_>,
) -> ImportResult<Vec<WipCandidate>> {
    ensure_columns(wip, &profile.required_columns(), ctx.supplier.display_name())?;

    let columns = resolve_columns(wip, profile.columns.iter());
    let mut candidates: Vec<WipCandidate> = wip
        .rows
        .iter()
        .map(|row| {
            let mut candidate = map_row(wip, row, &columns, ctx, &[]);
            if candidate.purchase_order.is_none() {
                candidate.purchase_order = Some(TRIAL_MARKER.to_string());
                candidate.item_name = Some(TRIAL_MARKER.to_string());
            }
            shift_forecast(&mut candidate, profile.forecast_offset_days);
            apply_substitution(&mut candidate, profile);
            candidate
        })
        .collect();

    if let (Some(table), Some(spec)) = (stock, profile.stock_sheet.as_ref()) {
        candidates.extend(normalize_stock(table, spec, profile, ctx)?);
    }
    Ok(candidates)
}

fn normalize_stock(
    table: &RawTable,
    spec: &StockSheetSpec,
    profile: &SupplierProfile,
    ctx: &NormalizeContext<'_>,
) -> ImportResult<Vec<WipCandidate>> {
    let required: Vec<&str> = spec.columns.keys().map(String::as_str).collect();
    ensure_columns(table, &required, ctx.supplier.display_name())?;

    let columns = resolve_columns(table, spec.columns.iter());
    Ok(table
        .rows
        .iter()
        .map(|row| {
            let mut candidate = map_row(table, row, &columns, ctx, &[]);
            candidate.status = Some("stock".to_string());
            candidate.stage_quantities = StageQuantities::default();
            shift_forecast(
                &mut candidate,
                spec.forecast_offset_days + profile.forecast_offset_days,
            );
            apply_substitution(&mut candidate, profile);
            candidate
        })
        .collect())
}

/// 源表日期加偏移；无法解析的日期置空
fn shift_forecast(candidate: &mut WipCandidate, offset_days: i64) {
    let cleaner = DataCleaner;
    candidate.forecast_date = candidate
        .forecast_date
        .as_deref()
        .and_then(|v| cleaner.parse_date(v))
        .map(|date| (date + Duration::days(offset_days)).format("%Y-%m-%d").to_string());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::wip_fields::{default_profile, default_stage_model};
    use crate::domain::SupplierKind;
    use crate::importer::file_parser::{parse_workbook, ExtractFormat};
    use chrono::NaiveDate;

    #[test]
    fn test_wip_and_stock_sheets() {
        let model = default_stage_model();
        let profile = default_profile(SupplierKind::Rsmc);
        let wip_csv = "Lot ID,PO No,Customer Device,Wafer Qty,Stage,Total Layer,Remain Layer,Forecast Out Date,Hold Reason\n\
L1,PO-9,DEV-A,25,M3,10,4,2025-05-25,\n\
L2,,DEV-B,25,PO,12,12,,\n";
        let stock_csv = "\"Customer\nDevice\",Lot ID,Qty,Date\nDEV-A,L0,25,2025-05-18\n";
        let wip = parse_workbook(wip_csv.as_bytes(), ExtractFormat::Csv, None, 0).unwrap();
        let stock = parse_workbook(stock_csv.as_bytes(), ExtractFormat::Csv, None, 0).unwrap();
        let ctx = NormalizeContext {
            supplier: SupplierKind::Rsmc,
            snapshot_date: NaiveDate::from_ymd_opt(2025, 5, 20).unwrap(),
            stage_model: &model,
        };

        let candidates = normalize(&wip, Some(&stock), &profile, &ctx).unwrap();
        assert_eq!(candidates.len(), 3);

        let l1 = &candidates[0];
        assert_eq!(l1.forecast_date.as_deref(), Some("2025-06-01"));
        assert_eq!(l1.stage.as_deref(), Some("M3"));
        assert!(l1.stage_quantities.is_empty());

        let l2 = &candidates[1];
        assert_eq!(l2.purchase_order.as_deref(), Some(TRIAL_MARKER));
        assert_eq!(l2.item_name.as_deref(), Some(TRIAL_MARKER));
        assert_eq!(l2.forecast_date, None);

        let l0 = &candidates[2];
        assert_eq!(l0.status.as_deref(), Some("stock"));
        assert_eq!(l0.item_name.as_deref(), Some("DEV-A"));
        // 库存 3 天叠加 WIP 7 天
        assert_eq!(l0.forecast_date.as_deref(), Some("2025-05-28"));
    }
}
