// ==========================================
// 供应商 WIP 跟踪系统 - 数据仓储层
// ==========================================
// 职责: 数据访问,不含业务逻辑
// 存储: SQLite（连接以 Arc<Mutex<Connection>> 注入）
// ==========================================

pub mod analysis_repo;
pub mod error;
pub mod wip_repo;

pub use analysis_repo::DailyAnalysisRepository;
pub use error::{RepositoryError, RepositoryResult};
pub use wip_repo::{HistoryEntry, StoredState, WipRepository, WipSummary};
