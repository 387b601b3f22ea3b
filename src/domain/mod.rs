// ==========================================
// 供应商 WIP 跟踪系统 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod analysis;
pub mod types;
pub mod wip;

// 重导出核心类型
pub use analysis::{DailyAnalysisRow, PackageBucketCount};
pub use types::{SupplierKind, WipCategory, WipStatus};
pub use wip::{
    CanonicalWipRecord, ReconcileStats, Rejection, RejectionKind, StageCount, StageQuantities,
    ValidationOutcome, WipCandidate, STOCK_STAGE,
};
