// ==========================================
// 供应商 WIP 跟踪系统 - 进度表处理流水线
// ==========================================
// 流程: 解析 → 标准化 → 校验 → 工序/交期推断 → 对账落库
// 并发:
// - 同一周期内各供应商的 解析..推断 在阻塞线程池并行
// - 对账按进度表顺序串行，每份进度表一个事务
// ==========================================

use crate::config::AppConfig;
use crate::domain::{CanonicalWipRecord, ReconcileStats, Rejection, WipCategory};
use crate::engine::reconciler::Reconciler;
use crate::engine::stage_forecast::StageForecastEngine;
use crate::error::{PipelineError, PipelineResult};
use crate::importer::{
    load_sheets, ExtractFormat, ExtractSource, NormalizeContext, RoutingTag, SupplierExtract,
    SupplierNormalizer, WipValidator,
};
use chrono::{NaiveDate, Utc};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, info_span, warn};
use uuid::Uuid;

/// 单份进度表的处理报告
#[derive(Debug, Clone)]
pub struct ExtractReport {
    pub batch_id: String,
    pub tag: RoutingTag,
    pub file_name: String,
    pub snapshot_date: NaiveDate,
    /// 未得到数据（空文件/读取失败/列缺失/标准化异常）
    pub skipped: bool,
    pub accepted: usize,
    pub rejected: Vec<Rejection>,
    pub stats: ReconcileStats,
}

/// 推断完成、待落库的批次
#[derive(Debug, Clone)]
pub struct PreparedBatch {
    pub batch_id: String,
    pub tag: RoutingTag,
    pub file_name: String,
    pub snapshot_date: NaiveDate,
    pub skipped: bool,
    pub records: Vec<CanonicalWipRecord>,
    pub rejected: Vec<Rejection>,
}

pub struct WipPipeline {
    config: Arc<AppConfig>,
    reconciler: Reconciler,
}

impl WipPipeline {
    pub fn new(config: Arc<AppConfig>, reconciler: Reconciler) -> Self {
        Self { config, reconciler }
    }

    /// 解析 → 标准化 → 校验 → 推断（纯计算，不访问数据库）
    pub fn prepare(config: &AppConfig, extract: &SupplierExtract) -> PipelineResult<PreparedBatch> {
        let batch_id = Uuid::new_v4().to_string();
        let supplier = extract.tag.supplier;
        let span = info_span!("ingest", batch_id = %batch_id, supplier = %supplier);
        let _enter = span.enter();

        if extract.tag.category != supplier.category() {
            return Err(PipelineError::CategoryMismatch {
                supplier: supplier.to_string(),
                category: extract.tag.category.to_string(),
            });
        }

        let mut batch = PreparedBatch {
            batch_id,
            tag: extract.tag,
            file_name: extract.file_name.clone(),
            snapshot_date: extract.snapshot_date,
            skipped: true,
            records: Vec::new(),
            rejected: Vec::new(),
        };

        if extract.bytes.is_empty() {
            info!(file = %extract.file_name, "进度表为空文件");
            return Ok(batch);
        }

        let profile = config.profile(supplier)?;
        // 读取失败视为本周期无数据，不影响其他供应商
        let sheets = match ExtractFormat::from_file_name(&extract.file_name)
            .and_then(|format| load_sheets(&extract.bytes, format, profile))
        {
            Ok(sheets) => sheets,
            Err(e) => {
                warn!(file = %extract.file_name, error = %e, "进度表读取失败，跳过");
                return Ok(batch);
            }
        };

        let ctx = NormalizeContext {
            supplier,
            snapshot_date: extract.snapshot_date,
            stage_model: &config.assembly,
        };
        let Some(candidates) = SupplierNormalizer::from(supplier).normalize(&sheets, profile, &ctx)
        else {
            return Ok(batch);
        };

        let outcome = WipValidator::new().validate_batch(&candidates);
        let engine = StageForecastEngine::new(&config.assembly);
        let offset = match supplier.category() {
            WipCategory::Assembly => profile.forecast_offset_days,
            // 晶圆厂偏移已在标准化时计入
            WipCategory::Fab => 0,
        };

        batch.skipped = false;
        batch.rejected = outcome.invalid;
        batch.records = outcome
            .valid
            .into_iter()
            .map(|record| engine.infer(record, offset, extract.snapshot_date))
            .collect();

        info!(
            candidates = candidates.len(),
            accepted = batch.records.len(),
            rejected = batch.rejected.len(),
            "进度表预处理完成"
        );
        Ok(batch)
    }

    /// 批次落库
    pub fn commit(&self, batch: PreparedBatch) -> PipelineResult<ExtractReport> {
        commit_batch(&self.reconciler, batch)
    }

    /// 处理单份进度表（同步）
    pub fn process_extract(&self, extract: &SupplierExtract) -> PipelineResult<ExtractReport> {
        let batch = Self::prepare(&self.config, extract)?;
        self.commit(batch)
    }

    /// 一个周期: 并行预处理，串行落库；单份失败不影响其他进度表
    pub async fn run_cycle(
        &self,
        extracts: Vec<SupplierExtract>,
    ) -> Vec<PipelineResult<ExtractReport>> {
        info!(count = extracts.len(), "开始处理周期");

        let tasks = extracts.into_iter().map(|extract| {
            let config = Arc::clone(&self.config);
            tokio::task::spawn_blocking(move || Self::prepare(&config, &extract))
        });
        let prepared = join_all(tasks).await;

        let mut reports = Vec::with_capacity(prepared.len());
        for joined in prepared {
            let batch = match joined {
                Ok(Ok(batch)) => batch,
                Ok(Err(e)) => {
                    warn!(error = %e, "进度表预处理失败");
                    reports.push(Err(e));
                    continue;
                }
                Err(e) => {
                    reports.push(Err(PipelineError::from(e)));
                    continue;
                }
            };

            let reconciler = self.reconciler.clone();
            let committed =
                tokio::task::spawn_blocking(move || commit_batch(&reconciler, batch)).await;
            reports.push(committed.map_err(PipelineError::from).and_then(|r| r));
        }

        info!(
            total = reports.len(),
            success = reports.iter().filter(|r| r.is_ok()).count(),
            failed = reports.iter().filter(|r| r.is_err()).count(),
            "处理周期完成"
        );
        reports
    }

    /// 从获取源拉取并处理；获取有超时
    pub async fn run_from_source(
        &self,
        source: &dyn ExtractSource,
        date: NaiveDate,
    ) -> PipelineResult<Vec<PipelineResult<ExtractReport>>> {
        let seconds = self.config.acquisition_timeout_secs;
        let extracts = tokio::time::timeout(Duration::from_secs(seconds), source.fetch(date))
            .await
            .map_err(|_| PipelineError::AcquisitionTimeout {
                source_name: source.name().to_string(),
                seconds,
            })??;

        if extracts.is_empty() {
            info!(source = source.name(), date = %date, "本周期无进度表");
            return Ok(Vec::new());
        }
        Ok(self.run_cycle(extracts).await)
    }
}

fn commit_batch(reconciler: &Reconciler, batch: PreparedBatch) -> PipelineResult<ExtractReport> {
    let stats = if batch.skipped || batch.records.is_empty() {
        ReconcileStats::default()
    } else {
        reconciler.reconcile(
            batch.tag.category,
            &batch.records,
            &batch.batch_id,
            Utc::now(),
        )?
    };
    Ok(ExtractReport {
        batch_id: batch.batch_id,
        tag: batch.tag,
        file_name: batch.file_name,
        snapshot_date: batch.snapshot_date,
        skipped: batch.skipped,
        accepted: batch.records.len(),
        rejected: batch.rejected,
        stats,
    })
}
