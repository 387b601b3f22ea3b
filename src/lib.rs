// ==========================================
// 供应商 WIP 跟踪系统 - 核心库
// ==========================================
// 职责: 供应商进度表标准化、工序/交期推断、对账落库、日装片追赶
// 技术栈: Rust + SQLite + tokio
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 业务规则
pub mod engine;

// 导入层 - 外部数据
pub mod importer;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 流水线错误
pub mod error;

// 日志系统
pub mod logging;

// 应用层 - 状态组装与调度
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{SupplierKind, WipCategory, WipStatus};

// 领域实体
pub use domain::{CanonicalWipRecord, DailyAnalysisRow, Rejection, StageQuantities, WipCandidate};

// 引擎
pub use engine::{CatchUpController, Reconciler, StageForecastEngine, WipPipeline};

// 配置
pub use config::{AppConfig, StageModel, SupplierProfile};

// 错误
pub use error::{PipelineError, PipelineResult};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "供应商 WIP 跟踪系统";
