// ==========================================
// 供应商 WIP 跟踪系统 - 工序推断与交期预测引擎
// ==========================================
// 职责: 推断当前工序、预测交期、计算 1/3/7 日可出货量
// 红线: 纯函数，输入记录 → 输出记录，不读库不写库
// ==========================================
// 当前工序:
// - 仓库库存 > 0 → STOCK（在制状态改为 stock）
// - 否则按工艺顺序倒序扫描，取第一个数量 > 0 的工序
// - 全为 0 → 工序模型首道工序
// 交期:
// - today + 当前工序交期（未知记 0）+ 供应商偏移
// - 除未开工工序外数量合计为 0 → 无交期
// 可出货量:
// - 交期 ≤ h 天的工序数量之和；没有任何此类工序 → None
// ==========================================

use crate::config::StageModel;
use crate::domain::{CanonicalWipRecord, WipCategory, WipStatus, STOCK_STAGE};
use chrono::{Duration, NaiveDate};

/// 可出货量预测窗口（天）
pub const FORECAST_HORIZONS: [i64; 3] = [1, 3, 7];

pub struct StageForecastEngine<'a> {
    model: &'a StageModel,
}

impl<'a> StageForecastEngine<'a> {
    pub fn new(model: &'a StageModel) -> Self {
        Self { model }
    }

    /// 推断工序与交期
    ///
    /// # 参数
    /// - offset_days: 供应商交期偏移（如快递天数）
    /// - today: 快照日期
    pub fn infer(
        &self,
        mut record: CanonicalWipRecord,
        offset_days: i64,
        today: NaiveDate,
    ) -> CanonicalWipRecord {
        if let (Some(total), Some(remain)) = (record.layer_count, record.remain_layer) {
            record.current_position = Some(total.saturating_sub(remain));
        }

        // 晶圆厂保留源表工序与交期
        if record.category == WipCategory::Fab {
            return record;
        }

        let current_stage = self.current_stage(&record);
        if current_stage == STOCK_STAGE && record.status == WipStatus::InProgress {
            record.status = WipStatus::Stock;
        }

        record.forecast_date = self.forecast_date(&record, &current_stage, offset_days, today);
        record.next_day_forecast = self.horizon_quantity(&record, FORECAST_HORIZONS[0]);
        record.three_day_forecast = self.horizon_quantity(&record, FORECAST_HORIZONS[1]);
        record.seven_day_forecast = self.horizon_quantity(&record, FORECAST_HORIZONS[2]);
        record.current_stage = Some(current_stage);
        record
    }

    pub fn current_stage(&self, record: &CanonicalWipRecord) -> String {
        if record.warehouse_stock > 0 {
            return STOCK_STAGE.to_string();
        }
        record
            .stage_quantities
            .iter()
            .rev()
            .find(|count| count.quantity > 0)
            .map(|count| count.stage.clone())
            .or_else(|| self.model.first_stage().map(str::to_string))
            .or_else(|| {
                record
                    .stage_quantities
                    .iter()
                    .next()
                    .map(|count| count.stage.clone())
            })
            .unwrap_or_default()
    }

    fn forecast_date(
        &self,
        record: &CanonicalWipRecord,
        current_stage: &str,
        offset_days: i64,
        today: NaiveDate,
    ) -> Option<NaiveDate> {
        let started = record
            .stage_quantities
            .iter()
            .filter(|count| !self.model.is_excluded(&count.stage))
            .fold(0i64, |acc, count| acc.saturating_add(count.quantity));
        if started == 0 {
            return None;
        }
        let lead = self.model.lead_time(current_stage).unwrap_or(0);
        let days = Duration::try_days(lead.saturating_add(offset_days))?;
        today.checked_add_signed(days)
    }

    fn horizon_quantity(&self, record: &CanonicalWipRecord, horizon: i64) -> Option<i64> {
        let mut contributing = record
            .stage_quantities
            .iter()
            .filter(|count| {
                self.model
                    .lead_time(&count.stage)
                    .is_some_and(|lead| lead <= horizon)
            })
            .peekable();
        contributing.peek()?;
        Some(contributing.fold(0i64, |acc, count| acc.saturating_add(count.quantity)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::wip_fields::default_stage_model;
    use crate::config::StageDef;
    use crate::domain::StageQuantities;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 5, 20).unwrap()
    }

    fn simple_model() -> StageModel {
        let stages = [("grinding", 12), ("dicing", 11), ("dieAttach", 9), ("plating", 4)];
        StageModel {
            stages: stages
                .iter()
                .map(|(name, lead_days)| StageDef {
                    name: name.to_string(),
                    lead_days: *lead_days,
                })
                .collect(),
            forecast_exclusions: vec!["grinding".to_string(), "dicing".to_string()],
        }
    }

    fn record(model: &StageModel, quantities: &[(&str, i64)]) -> CanonicalWipRecord {
        let mut q = StageQuantities::zeroed(&model.stage_names());
        for (stage, qty) in quantities {
            q.add(stage, *qty);
        }
        CanonicalWipRecord {
            category: WipCategory::Assembly,
            supplier: "长电科技".to_string(),
            lot_id: "SO-1".to_string(),
            purchase_order: None,
            item_name: None,
            quantity: None,
            status: WipStatus::InProgress,
            stage_quantities: q,
            layer_count: None,
            remain_layer: None,
            current_position: None,
            current_stage: None,
            forecast_date: None,
            next_day_forecast: None,
            three_day_forecast: None,
            seven_day_forecast: None,
            warehouse_stock: 0,
            online_total: 0,
            hold_info: None,
            snapshot_date: today(),
            finished_at: None,
        }
    }

    #[test]
    fn test_reverse_scan_picks_latest_nonzero_stage() {
        let model = simple_model();
        let engine = StageForecastEngine::new(&model);
        let r = engine.infer(record(&model, &[("dieAttach", 5)]), 0, today());
        assert_eq!(r.current_stage.as_deref(), Some("dieAttach"));
        assert_eq!(r.forecast_date, Some(today() + Duration::days(9)));

        let r = engine.infer(record(&model, &[("grinding", 2), ("plating", 1)]), 0, today());
        assert_eq!(r.current_stage.as_deref(), Some("plating"));
    }

    #[test]
    fn test_all_zero_falls_back_to_first_stage() {
        let model = simple_model();
        let r = StageForecastEngine::new(&model).infer(record(&model, &[]), 0, today());
        assert_eq!(r.current_stage.as_deref(), Some("grinding"));
        assert_eq!(r.forecast_date, None);
    }

    #[test]
    fn test_forecast_none_when_only_excluded_stages_hold_units() {
        let model = simple_model();
        let r = StageForecastEngine::new(&model).infer(
            record(&model, &[("grinding", 3), ("dicing", 4)]),
            2,
            today(),
        );
        assert_eq!(r.current_stage.as_deref(), Some("dicing"));
        assert_eq!(r.forecast_date, None);
    }

    #[test]
    fn test_supplier_offset_added_to_forecast() {
        let model = default_stage_model();
        let r = StageForecastEngine::new(&model).infer(record(&model, &[("包装", 10)]), 2, today());
        assert_eq!(r.forecast_date, Some(today() + Duration::days(3)));
    }

    #[test]
    fn test_warehouse_stock_means_stock_stage() {
        let model = default_stage_model();
        let mut input = record(&model, &[("键合", 4)]);
        input.warehouse_stock = 100;
        let r = StageForecastEngine::new(&model).infer(input, 0, today());
        assert_eq!(r.current_stage.as_deref(), Some(STOCK_STAGE));
        assert_eq!(r.status, WipStatus::Stock);
        // STOCK 不在交期表中，按 0 天计
        assert_eq!(r.forecast_date, Some(today()));
        assert!(r.indicates_completion());
    }

    #[test]
    fn test_horizon_buckets() {
        let model = default_stage_model();
        let r = StageForecastEngine::new(&model).infer(
            record(&model, &[("包装", 10), ("打印", 5), ("键合", 7), ("研磨", 1)]),
            0,
            today(),
        );
        assert_eq!(r.next_day_forecast, Some(10));
        assert_eq!(r.three_day_forecast, Some(15));
        assert_eq!(r.seven_day_forecast, Some(22));

        let model = simple_model();
        let r = StageForecastEngine::new(&model).infer(record(&model, &[("plating", 3)]), 0, today());
        assert_eq!(r.next_day_forecast, None);
        assert_eq!(r.three_day_forecast, None);
        assert_eq!(r.seven_day_forecast, Some(3));
    }

    #[test]
    fn test_extreme_values_saturate() {
        let model = default_stage_model();
        let r = StageForecastEngine::new(&model).infer(
            record(&model, &[("包装", i64::MAX), ("打印", i64::MAX)]),
            i64::MAX,
            today(),
        );
        assert_eq!(r.current_stage.as_deref(), Some("包装"));
        assert_eq!(r.next_day_forecast, Some(i64::MAX));
        assert_eq!(r.three_day_forecast, Some(i64::MAX));
        // 偏移超出日期范围时无交期
        assert_eq!(r.forecast_date, None);

        let mut fab = record(&model, &[]);
        fab.category = WipCategory::Fab;
        fab.layer_count = Some(i64::MIN);
        fab.remain_layer = Some(1);
        let r = StageForecastEngine::new(&model).infer(fab, 0, today());
        assert_eq!(r.current_position, Some(i64::MIN));
    }

    #[test]
    fn test_fab_only_derives_position() {
        let model = default_stage_model();
        let mut input = record(&model, &[]);
        input.category = WipCategory::Fab;
        input.stage_quantities = StageQuantities::default();
        input.layer_count = Some(10);
        input.remain_layer = Some(4);
        input.current_stage = Some("M3".to_string());
        input.forecast_date = NaiveDate::from_ymd_opt(2025, 6, 1);

        let r = StageForecastEngine::new(&model).infer(input.clone(), 7, today());
        assert_eq!(r.current_position, Some(6));
        assert_eq!(r.current_stage.as_deref(), Some("M3"));
        assert_eq!(r.forecast_date, input.forecast_date);
        assert_eq!(r.next_day_forecast, None);
    }
}
