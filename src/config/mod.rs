// ==========================================
// 供应商 WIP 跟踪系统 - 配置层
// ==========================================
// 职责: 供应商进度表布局、封装工序模型、运行参数
// 存储: TOML 文件（缺省为内置默认值）
// ==========================================

pub mod app_config;
pub mod error;
pub mod wip_fields;

pub use app_config::{AppConfig, CatchUpConfig, PackageBucket, CONFIG_ENV_VAR};
pub use error::{ConfigError, ConfigResult};
pub use wip_fields::{
    column_target, CanonicalField, ColumnTarget, PivotSpec, StageDef, StageModel,
    StockSheetSpec, SupplierProfile,
};
