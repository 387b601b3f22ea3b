// ==========================================
// 供应商 WIP 跟踪系统 - 长表进度表透视
// ==========================================
// 适用: 江苏芯丰
// 形态: (订单, 工序, 数量) 一行一条
// 规则:
// - 按 (订单, 工序) 汇总，重复行累加
// - 在线合计 = 全部工序数量之和（不含源表合计工序）
// - 未映射的工序只计入在线合计
// ==========================================

use crate::config::{column_target, ColumnTarget, SupplierProfile};
use crate::domain::{StageQuantities, WipCandidate};
use crate::importer::data_cleaner::DataCleaner;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::file_parser::RawTable;
use crate::importer::normalizer::common::{apply_substitution, ensure_columns};
use crate::importer::normalizer::NormalizeContext;
use std::collections::HashMap;

struct OrderAccumulator {
    row_number: usize,
    key: String,
    quantities: StageQuantities,
    online_total: i64,
}

pub fn normalize(
    table: &RawTable,
    profile: &SupplierProfile,
    ctx: &NormalizeContext<'_>,
) -> ImportResult<Vec<WipCandidate>> {
    let pivot = profile.pivot.as_ref().ok_or_else(|| {
        ImportError::InternalError(format!("{} 缺少透视配置", ctx.supplier.config_key()))
    })?;
    ensure_columns(table, &profile.required_columns(), ctx.supplier.display_name())?;

    let key_idx = column_index(table, &pivot.key_column)?;
    let step_idx = column_index(table, &pivot.step_column)?;
    let qty_idx = column_index(table, &pivot.quantity_column)?;

    let cleaner = DataCleaner;
    let stages = ctx.stage_model.stage_names();
    let mut orders: Vec<OrderAccumulator> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for row in &table.rows {
        let key = table.cell(row, key_idx).trim().to_string();
        let step = table.cell(row, step_idx).trim();
        if pivot.total_step.as_deref() == Some(step) {
            continue;
        }
        let quantity = cleaner.parse_quantity(Some(table.cell(row, qty_idx)));

        let slot = *index.entry(key.clone()).or_insert_with(|| {
            orders.push(OrderAccumulator {
                row_number: row.row_number,
                key,
                quantities: StageQuantities::zeroed(&stages),
                online_total: 0,
            });
            orders.len() - 1
        });
        let order = &mut orders[slot];
        order.online_total += quantity;

        if let Some(target) = profile.columns.get(step) {
            if let ColumnTarget::Stage(stage) = column_target(target) {
                order.quantities.add(stage, quantity);
            }
        }
    }

    Ok(orders
        .into_iter()
        .map(|order| {
            let mut candidate = WipCandidate::new(
                order.row_number,
                ctx.supplier.category(),
                ctx.supplier.display_name(),
                ctx.snapshot_date,
                order.quantities,
            );
            candidate.lot_id = Some(order.key);
            candidate.online_total = Some(order.online_total.to_string());
            apply_substitution(&mut candidate, profile);
            candidate
        })
        .collect())
}

fn column_index(table: &RawTable, name: &str) -> ImportResult<usize> {
    table
        .column_index(name)
        .ok_or_else(|| ImportError::FieldMappingError {
            row: 0,
            message: format!("列不存在: {}", name),
        })
}
