// ==========================================
// 供应商 WIP 跟踪系统 - 引擎层
// ==========================================
// 职责: 工序推断/交期预测、对账落库、日装片追赶、流水线编排
// ==========================================

pub mod catch_up;
pub mod pipeline;
pub mod reconciler;
pub mod stage_forecast;

pub use catch_up::{
    daily_die_attach, CatchUpController, CatchUpReport, CatchUpStop, DailyExtractStore,
    DirectoryDailyStore,
};
pub use pipeline::{ExtractReport, PreparedBatch, WipPipeline};
pub use reconciler::Reconciler;
pub use stage_forecast::{StageForecastEngine, FORECAST_HORIZONS};
