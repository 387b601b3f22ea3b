// ==========================================
// 供应商 WIP 跟踪系统 - 应用层
// ==========================================
// 职责: 应用状态组装、定时任务调度
// ==========================================

pub mod scheduler;
pub mod state;

// 重导出
pub use scheduler::{JobGate, JobGuard, Scheduler};
pub use state::AppState;
