// ==========================================
// 供应商 WIP 跟踪系统 - 命令行入口
// ==========================================
// 子命令:
// - ingest   处理指定进度表文件
// - cycle    从收件箱处理某日全部进度表
// - catch-up 推进日装片分析
// - serve    定时执行 cycle + catch-up，Ctrl-C 停止
// - summary  查询汇总/延期/交期分布
// ==========================================

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use supplier_wip::app::{AppState, Scheduler};
use supplier_wip::engine::ExtractReport;
use supplier_wip::importer::{DirectoryExtractSource, SupplierExtract};
use supplier_wip::{logging, AppConfig, PipelineResult, WipCategory};
use tokio::sync::watch;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "supplier-wip")]
#[command(about = "供应商 WIP 跟踪系统")]
#[command(version)]
struct Cli {
    /// 配置文件路径
    #[arg(short, long, global = true, env = "SUPPLIER_WIP_CONFIG")]
    config: Option<PathBuf>,

    /// 以 JSON 行输出日志
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 处理指定进度表文件（文件名: 供应商_YYYYMMDD.xlsx|csv）
    Ingest {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// 从收件箱处理某日全部进度表
    Cycle {
        /// 快照日期，默认今天
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// 推进日装片分析
    CatchUp {
        /// 默认今天
        #[arg(long)]
        today: Option<NaiveDate>,
    },
    /// 定时执行
    Serve,
    /// 查询汇总
    Summary {
        #[arg(long, default_value = "ASSEMBLY")]
        category: String,
        #[arg(long, default_value_t = 0)]
        delayed_days: i64,
        #[arg(long, default_value_t = 7)]
        forecast_days: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    if cli.json_logs {
        logging::init_json();
    } else {
        logging::init();
    }

    info!("==================================================");
    info!("{} v{}", supplier_wip::APP_NAME, supplier_wip::VERSION);
    info!("==================================================");

    let config = AppConfig::resolve(cli.config.as_deref()).context("加载配置失败")?;
    let state = Arc::new(AppState::new(config).context("初始化AppState失败")?);

    match cli.command {
        Command::Ingest { files } => {
            let mut extracts = Vec::with_capacity(files.len());
            for path in &files {
                let extract = SupplierExtract::from_path(path)
                    .with_context(|| format!("读取进度表失败: {}", path.display()))?;
                extracts.push(extract);
            }
            let reports = state.pipeline.run_cycle(extracts).await;
            print_reports(&reports);
        }
        Command::Cycle { date } => {
            let date = date.unwrap_or_else(|| Local::now().date_naive());
            let reports = run_cycle(&state, date).await?;
            print_reports(&reports);
        }
        Command::CatchUp { today } => {
            let today = today.unwrap_or_else(|| Local::now().date_naive());
            run_catch_up(&state, today).await?;
        }
        Command::Serve => serve(state).await?,
        Command::Summary {
            category,
            delayed_days,
            forecast_days,
        } => {
            let category = WipCategory::parse(&category)
                .with_context(|| format!("未知类别: {}", category))?;
            print_summary(&state, category, delayed_days, forecast_days)?;
        }
    }
    Ok(())
}

async fn run_cycle(state: &AppState, date: NaiveDate) -> Result<Vec<PipelineResult<ExtractReport>>> {
    let source = DirectoryExtractSource::new(state.config.inbox_dir.clone());
    let reports = state.pipeline.run_from_source(&source, date).await?;
    Ok(reports)
}

async fn run_catch_up(state: &Arc<AppState>, today: NaiveDate) -> Result<()> {
    let catch_up = Arc::clone(&state.catch_up);
    let report = tokio::task::spawn_blocking(move || catch_up.catch_up(today, Utc::now()))
        .await
        .context("追赶任务异常结束")??;
    info!(rows = report.rows.len(), stop = ?report.stop, "日装片追赶完成");
    for row in &report.rows {
        println!("{}\t{}\t{}", row.analysis_date, row.supplier, row.total());
    }
    Ok(())
}

async fn serve(state: Arc<AppState>) -> Result<()> {
    let (tx, rx) = watch::channel(false);
    let interval = Duration::from_secs(state.config.cycle_interval_secs);
    let scheduler = Scheduler::new("wip-cycle", interval);

    let job_state = Arc::clone(&state);
    let handle = tokio::spawn(scheduler.run(
        move || {
            let state = Arc::clone(&job_state);
            async move {
                let today = Local::now().date_naive();
                match run_cycle(&state, today).await {
                    Ok(reports) => {
                        for failed in reports.iter().filter_map(|r| r.as_ref().err()) {
                            warn!(error = %failed, "进度表处理失败");
                        }
                    }
                    Err(e) => error!(error = %e, "处理周期失败"),
                }
                if let Err(e) = run_catch_up(&state, today).await {
                    error!(error = %e, "日装片追赶失败");
                }
            }
        },
        rx,
    ));

    tokio::signal::ctrl_c().await.context("监听 Ctrl-C 失败")?;
    info!("收到停止信号");
    let _ = tx.send(true);
    let runs = handle.await.context("调度器异常结束")?;
    info!(runs, "服务已停止");
    Ok(())
}

fn print_reports(reports: &[PipelineResult<ExtractReport>]) {
    for report in reports {
        match report {
            Ok(r) if r.skipped => println!("{}\t{}\tskipped", r.tag.supplier, r.file_name),
            Ok(r) => println!(
                "{}\t{}\taccepted={} rejected={} inserted={} updated={} completed={} stale={}",
                r.tag.supplier,
                r.file_name,
                r.accepted,
                r.rejected.len(),
                r.stats.inserted,
                r.stats.updated,
                r.stats.completed,
                r.stats.stale
            ),
            Err(e) => println!("error\t{}", e),
        }
    }
}

fn print_summary(
    state: &AppState,
    category: WipCategory,
    delayed_days: i64,
    forecast_days: i64,
) -> Result<()> {
    let today = Local::now().date_naive();
    let summary = state.wip_repo.summary(category)?;
    println!(
        "{}\ttotal={} in_progress={} completed={} avg_completion={}",
        summary.category,
        summary.total_count,
        summary.in_progress_count,
        summary.completed_count,
        summary
            .avg_completion_rate
            .map(|r| format!("{:.2}%", r))
            .unwrap_or_else(|| "-".to_string())
    );

    let delayed = state.wip_repo.delayed_items(category, today, delayed_days)?;
    println!("delayed: {}", delayed.len());
    for record in &delayed {
        println!(
            "  {}\t{}\t{}",
            record.supplier,
            record.lot_id,
            record
                .forecast_date
                .map(|d| d.to_string())
                .unwrap_or_default()
        );
    }

    for (date, count) in state
        .wip_repo
        .completion_forecast(category, today, forecast_days)?
    {
        println!("forecast {}\t{}", date, count);
    }
    Ok(())
}
