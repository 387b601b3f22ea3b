// ==========================================
// 供应商 WIP 跟踪系统 - 配置错误类型
// ==========================================
// 工具: thiserror 派生宏
// ==========================================

use thiserror::Error;

/// 配置层错误类型
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("配置文件读取失败 ({path}): {message}")]
    ConfigReadError { path: String, message: String },

    #[error("配置文件解析失败 ({path}): {message}")]
    ConfigParseError { path: String, message: String },

    #[error("供应商配置缺失: {0}")]
    MissingProfile(String),

    #[error("供应商配置无效 (profile: {profile}): {message}")]
    InvalidProfile { profile: String, message: String },

    #[error("工序模型无效: {0}")]
    InvalidStageModel(String),
}

/// Result 类型别名
pub type ConfigResult<T> = Result<T, ConfigError>;
