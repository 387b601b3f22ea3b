// ==========================================
// 供应商 WIP 跟踪系统 - 导入层
// ==========================================
// 职责: 进度表获取、解析、标准化、校验
// 支持: Excel (.xlsx), CSV
// ==========================================

// 模块声明
pub mod data_cleaner;
pub mod dq_validator;
pub mod error;
pub mod file_parser;
pub mod normalizer;
pub mod source;

// 重导出核心类型
pub use data_cleaner::DataCleaner;
pub use dq_validator::WipValidator;
pub use error::{ImportError, ImportResult};
pub use file_parser::{parse_workbook, ExtractFormat, RawRow, RawTable};
pub use normalizer::{load_sheets, NormalizeContext, SheetSet, SupplierNormalizer};
pub use source::{
    parse_extract_file_name, DirectoryExtractSource, ExtractSource, RoutingTag, SupplierExtract,
};
