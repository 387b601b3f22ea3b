// ==========================================
// 供应商 WIP 跟踪系统 - 宽表进度表标准化
// ==========================================
// 适用: 长电科技 / 贵州亚芯 / 浙江亚芯
// 形态: 一行一个订单，工序为列
// ==========================================

use crate::config::SupplierProfile;
use crate::domain::WipCandidate;
use crate::importer::error::ImportResult;
use crate::importer::file_parser::RawTable;
use crate::importer::normalizer::common::{
    apply_substitution, ensure_columns, map_row, resolve_columns,
};
use crate::importer::normalizer::NormalizeContext;

pub fn normalize(
    table: &RawTable,
    profile: &SupplierProfile,
    ctx: &NormalizeContext<'_>,
) -> ImportResult<Vec<WipCandidate>> {
    ensure_columns(table, &profile.required_columns(), ctx.supplier.display_name())?;

    let stages = ctx.stage_model.stage_names();
    let columns = resolve_columns(table, profile.columns.iter());

    Ok(table
        .rows
        .iter()
        .map(|row| {
            let mut candidate = map_row(table, row, &columns, ctx, &stages);
            apply_substitution(&mut candidate, profile);
            candidate
        })
        .collect())
}
