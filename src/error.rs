// ==========================================
// 供应商 WIP 跟踪系统 - 流水线错误类型
// ==========================================
// 职责: 汇总导入/仓储/配置三层错误，供编排层与命令行使用
// ==========================================

use crate::config::ConfigError;
use crate::importer::ImportError;
use crate::repository::RepositoryError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Import(#[from] ImportError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("进度表获取超时 ({seconds}s): {source_name}")]
    AcquisitionTimeout { source_name: String, seconds: u64 },

    #[error("供应商类别不匹配: {supplier} 不属于 {category}")]
    CategoryMismatch { supplier: String, category: String },

    #[error("工作线程失败: {0}")]
    WorkerJoin(String),
}

impl From<tokio::task::JoinError> for PipelineError {
    fn from(err: tokio::task::JoinError) -> Self {
        PipelineError::WorkerJoin(err.to_string())
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;
