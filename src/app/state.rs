// ==========================================
// 供应商 WIP 跟踪系统 - 应用状态
// ==========================================
// 职责: 组装共享连接、仓储、流水线与追赶任务
// ==========================================

use std::sync::{Arc, Mutex};

use crate::config::AppConfig;
use crate::db::{init_schema, open_sqlite_connection, read_schema_version, CURRENT_SCHEMA_VERSION};
use crate::engine::{CatchUpController, DirectoryDailyStore, Reconciler, WipPipeline};
use crate::error::PipelineResult;
use crate::repository::{DailyAnalysisRepository, RepositoryError, WipRepository};

/// 应用状态
///
/// 所有仓储共享同一个 SQLite 连接
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub wip_repo: Arc<WipRepository>,
    pub analysis_repo: Arc<DailyAnalysisRepository>,
    pub pipeline: Arc<WipPipeline>,
    pub catch_up: Arc<CatchUpController>,
}

impl AppState {
    pub fn new(config: AppConfig) -> PipelineResult<Self> {
        tracing::info!("初始化AppState，数据库路径: {}", config.db_path);

        let conn = open_sqlite_connection(&config.db_path).map_err(RepositoryError::from)?;
        init_schema(&conn).map_err(RepositoryError::from)?;
        match read_schema_version(&conn).map_err(RepositoryError::from)? {
            Some(v) if v > CURRENT_SCHEMA_VERSION => {
                tracing::warn!(
                    db_version = v,
                    expected = CURRENT_SCHEMA_VERSION,
                    "数据库 schema_version 高于当前程序版本"
                );
            }
            _ => {}
        }
        let conn = Arc::new(Mutex::new(conn));

        let config = Arc::new(config);
        let wip_repo = Arc::new(WipRepository::from_connection(conn.clone()));
        let analysis_repo = Arc::new(DailyAnalysisRepository::from_connection(conn));

        let pipeline = Arc::new(WipPipeline::new(
            config.clone(),
            Reconciler::new(wip_repo.clone()),
        ));
        let catch_up = Arc::new(CatchUpController::new(
            config.catch_up.clone(),
            Box::new(DirectoryDailyStore::from_config(&config.catch_up)),
            analysis_repo.clone(),
        ));

        Ok(Self {
            config,
            wip_repo,
            analysis_repo,
            pipeline,
            catch_up,
        })
    }
}
