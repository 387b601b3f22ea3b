// ==========================================
// 供应商 WIP 跟踪系统 - 数据质量校验器
// ==========================================
// 职责: 候选记录 → 标准记录 / 拒绝明细
// 规则:
// - 主键为空（trim 后）→ MissingKey
// - 剩余层数 > 总层数 → LayerOverflow (field = remainLayer)
// - 工序数量、仓库库存、在线数量为负 → NegativeQuantity (field = 工序名/字段名)
// - 数量类字段解析失败记 0；标识/日期/层数解析失败记 None
// 红线: 纯函数，不落库
// ==========================================

use crate::domain::wip::{
    CanonicalWipRecord, Rejection, RejectionKind, ValidationOutcome, WipCandidate,
};
use crate::domain::WipStatus;
use crate::importer::data_cleaner::DataCleaner;
use tracing::warn;

pub struct WipValidator {
    cleaner: DataCleaner,
}

impl Default for WipValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl WipValidator {
    pub fn new() -> Self {
        Self {
            cleaner: DataCleaner,
        }
    }

    /// 校验单条候选记录
    pub fn validate(&self, candidate: &WipCandidate) -> Result<CanonicalWipRecord, Rejection> {
        let key_field = candidate.category.key_field();
        let lot_id = match self.cleaner.normalize_null(candidate.lot_id.as_deref()) {
            Some(id) => id,
            None => {
                return Err(Rejection {
                    row_number: candidate.row_number,
                    supplier: candidate.supplier.clone(),
                    key: None,
                    kind: RejectionKind::MissingKey,
                    field: key_field.to_string(),
                    value: candidate.lot_id.clone(),
                    message: format!("{} 为空", key_field),
                });
            }
        };

        let layer_count = self.parse_optional_int(candidate.layer_count.as_deref());
        let remain_layer = self.parse_optional_int(candidate.remain_layer.as_deref());
        if let (Some(total), Some(remain)) = (layer_count, remain_layer) {
            if remain > total {
                return Err(Rejection {
                    row_number: candidate.row_number,
                    supplier: candidate.supplier.clone(),
                    key: Some(lot_id),
                    kind: RejectionKind::LayerOverflow,
                    field: "remainLayer".to_string(),
                    value: Some(remain.to_string()),
                    message: format!("剩余层数 {} 大于总层数 {}", remain, total),
                });
            }
        }

        let warehouse_stock = self
            .cleaner
            .parse_quantity(candidate.warehouse_stock.as_deref());
        let online_total = self.cleaner.parse_quantity(candidate.online_total.as_deref());
        let negative = candidate
            .stage_quantities
            .iter()
            .map(|count| (count.stage.as_str(), count.quantity))
            .chain([
                ("warehouseStock", warehouse_stock),
                ("onlineTotal", online_total),
            ])
            .find(|(_, quantity)| *quantity < 0);
        if let Some((field, quantity)) = negative {
            return Err(Rejection {
                row_number: candidate.row_number,
                supplier: candidate.supplier.clone(),
                key: Some(lot_id),
                kind: RejectionKind::NegativeQuantity,
                field: field.to_string(),
                value: Some(quantity.to_string()),
                message: format!("{} 数量为负: {}", field, quantity),
            });
        }

        Ok(CanonicalWipRecord {
            category: candidate.category,
            supplier: candidate.supplier.clone(),
            lot_id,
            purchase_order: self.cleaner.normalize_null(candidate.purchase_order.as_deref()),
            item_name: self.cleaner.normalize_null(candidate.item_name.as_deref()),
            quantity: self.parse_optional_int(candidate.quantity.as_deref()),
            status: WipStatus::from_label(candidate.status.as_deref()),
            stage_quantities: candidate.stage_quantities.clone(),
            layer_count,
            remain_layer,
            current_position: None,
            current_stage: self.cleaner.normalize_null(candidate.stage.as_deref()),
            forecast_date: candidate
                .forecast_date
                .as_deref()
                .and_then(|v| self.cleaner.parse_date(v)),
            next_day_forecast: None,
            three_day_forecast: None,
            seven_day_forecast: None,
            warehouse_stock,
            online_total,
            hold_info: self.cleaner.normalize_null(candidate.hold_info.as_deref()),
            snapshot_date: candidate.snapshot_date,
            finished_at: None,
        })
    }

    /// 批量校验，拒绝记录逐条记录日志
    pub fn validate_batch(&self, candidates: &[WipCandidate]) -> ValidationOutcome {
        let mut outcome = ValidationOutcome::default();
        for candidate in candidates {
            match self.validate(candidate) {
                Ok(record) => outcome.valid.push(record),
                Err(rejection) => {
                    warn!(
                        supplier = %rejection.supplier,
                        row = rejection.row_number,
                        lot_id = rejection.key.as_deref().unwrap_or(""),
                        field = %rejection.field,
                        value = rejection.value.as_deref().unwrap_or(""),
                        "记录校验未通过: {}",
                        rejection.message
                    );
                    outcome.invalid.push(rejection);
                }
            }
        }
        outcome
    }

    fn parse_optional_int(&self, value: Option<&str>) -> Option<i64> {
        value.and_then(|v| self.cleaner.parse_int(v))
    }
}
