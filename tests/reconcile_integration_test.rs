// ==========================================
// 对账落库集成测试
// ==========================================
// 测试目标: 幂等、完成单调、过期快照、批次原子性、查询口径
// ==========================================


use chrono::Utc;
use std::sync::Arc;
use supplier_wip::domain::{CanonicalWipRecord, StageQuantities};
use supplier_wip::engine::Reconciler;
use supplier_wip::repository::{RepositoryError, WipRepository};
use supplier_wip::{SupplierKind, WipCategory, WipStatus};
use test_helpers::*;

fn jcet_extract(day: u32, rows: &[String]) -> supplier_wip::importer::SupplierExtract {
    csv_extract(SupplierKind::Jcet, date(2025, 5, day), &jcet_csv(rows))
}

fn fab_record(lot_id: &str, layer_count: i64, remain_layer: i64) -> CanonicalWipRecord {
    CanonicalWipRecord {
        category: WipCategory::Fab,
        supplier: "荣芯".to_string(),
        lot_id: lot_id.to_string(),
        purchase_order: Some("PO-1".to_string()),
        item_name: Some("DEV-A".to_string()),
        quantity: Some(25),
        status: WipStatus::InProgress,
        stage_quantities: StageQuantities::default(),
        layer_count: Some(layer_count),
        remain_layer: Some(remain_layer),
        current_position: Some(layer_count - remain_layer),
        current_stage: Some("M1".to_string()),
        forecast_date: Some(date(2025, 6, 1)),
        next_day_forecast: None,
        three_day_forecast: None,
        seven_day_forecast: None,
        warehouse_stock: 0,
        online_total: 0,
        hold_info: None,
        snapshot_date: date(2025, 5, 20),
        finished_at: None,
    }
}

// ==========================================
// 测试用例
// ==========================================

#[test]
fn test_reprocessing_same_extract_is_idempotent() {
    let inbox = tempfile::tempdir().unwrap();
    let (_db, state) = create_test_state(inbox.path()).unwrap();
    let extract = jcet_extract(
        20,
        &[
            jcet_row("SO-1", &[("装片", 100)], 0),
            jcet_row("SO-2", &[], 30),
        ],
    );

    let first = state.pipeline.process_extract(&extract).unwrap();
    assert_eq!(first.stats.inserted, 2);
    let snapshot = state.wip_repo.list(WipCategory::Assembly, None).unwrap();

    let second = state.pipeline.process_extract(&extract).unwrap();
    assert_eq!(second.stats.inserted, 0);
    assert_eq!(second.stats.updated, 1);
    // 已完成的 SO-2 只写历史
    assert_eq!(second.stats.completed, 1);

    assert_eq!(
        state.wip_repo.list(WipCategory::Assembly, None).unwrap(),
        snapshot
    );
    // 同一快照日期的历史被覆盖而不是追加
    assert_eq!(state.wip_repo.count_history().unwrap(), 2);
}

#[test]
fn test_completion_is_monotonic() {
    let inbox = tempfile::tempdir().unwrap();
    let (_db, state) = create_test_state(inbox.path()).unwrap();

    state
        .pipeline
        .process_extract(&jcet_extract(20, &[jcet_row("SO-1", &[], 80)]))
        .unwrap();
    let done = state
        .wip_repo
        .find(WipCategory::Assembly, "长电科技", "SO-1")
        .unwrap()
        .unwrap();
    let finished_at = done.finished_at.unwrap();

    // 次日进度表又出现在制数量
    let report = state
        .pipeline
        .process_extract(&jcet_extract(21, &[jcet_row("SO-1", &[("装片", 10)], 0)]))
        .unwrap();
    assert_eq!(report.stats.updated, 0);
    assert_eq!(report.stats.completed, 1);

    let after = state
        .wip_repo
        .find(WipCategory::Assembly, "长电科技", "SO-1")
        .unwrap()
        .unwrap();
    assert_eq!(after.finished_at, Some(finished_at));
    assert_eq!(after.current_stage.as_deref(), Some("STOCK"));
    assert_eq!(after.snapshot_date, date(2025, 5, 20));

    let history = state
        .wip_repo
        .history(WipCategory::Assembly, "长电科技", "SO-1")
        .unwrap();
    assert_eq!(history.len(), 2);
}

#[test]
fn test_stale_snapshot_does_not_overwrite() {
    let inbox = tempfile::tempdir().unwrap();
    let (_db, state) = create_test_state(inbox.path()).unwrap();

    state
        .pipeline
        .process_extract(&jcet_extract(21, &[jcet_row("SO-1", &[("包装", 10)], 0)]))
        .unwrap();
    let report = state
        .pipeline
        .process_extract(&jcet_extract(20, &[jcet_row("SO-1", &[("装片", 10)], 0)]))
        .unwrap();
    assert_eq!(report.stats.stale, 1);
    assert_eq!(report.stats.updated, 0);

    let current = state
        .wip_repo
        .find(WipCategory::Assembly, "长电科技", "SO-1")
        .unwrap()
        .unwrap();
    assert_eq!(current.current_stage.as_deref(), Some("包装"));
    assert_eq!(current.snapshot_date, date(2025, 5, 21));
}

#[test]
fn test_failed_record_rolls_back_whole_batch() {
    let (_db, db_path) = create_test_db().unwrap();
    let repo = Arc::new(WipRepository::new(&db_path).unwrap());
    let reconciler = Reconciler::new(repo.clone());

    // 第二条绕过校验，剩余层数大于总层数，由表约束拦截
    let batch = vec![
        fab_record("RL-1", 10, 4),
        fab_record("RL-2", 10, 12),
        fab_record("RL-3", 10, 1),
    ];
    let err = reconciler
        .reconcile(WipCategory::Fab, &batch, "batch-1", Utc::now())
        .unwrap_err();
    assert!(matches!(err, RepositoryError::CheckConstraintViolation(_)));

    assert_eq!(repo.count(WipCategory::Fab).unwrap(), 0);
    assert_eq!(repo.count_history().unwrap(), 0);

    // 修正后重跑成功
    let batch = vec![fab_record("RL-1", 10, 4), fab_record("RL-3", 10, 1)];
    let stats = reconciler
        .reconcile(WipCategory::Fab, &batch, "batch-2", Utc::now())
        .unwrap();
    assert_eq!(stats.inserted, 2);
}

#[test]
fn test_same_lot_id_is_partitioned_by_supplier() {
    let inbox = tempfile::tempdir().unwrap();
    let (_db, state) = create_test_state(inbox.path()).unwrap();

    state
        .pipeline
        .process_extract(&jcet_extract(20, &[jcet_row("SO-1", &[("装片", 1)], 0)]))
        .unwrap();
    let xinfeng = csv_extract(
        SupplierKind::Xinfeng,
        date(2025, 5, 20),
        &xinfeng_csv(&[("SO-1", "键合", 2)]),
    );
    let report = state.pipeline.process_extract(&xinfeng).unwrap();
    assert_eq!(report.stats.inserted, 1);

    assert_eq!(state.wip_repo.count(WipCategory::Assembly).unwrap(), 2);
    assert_eq!(
        state
            .wip_repo
            .list(WipCategory::Assembly, Some("江苏芯丰"))
            .unwrap()
            .len(),
        1
    );
}

#[test]
fn test_summary_and_forecast_queries() {
    let (_db, db_path) = create_test_db().unwrap();
    let repo = Arc::new(WipRepository::new(&db_path).unwrap());
    let reconciler = Reconciler::new(repo.clone());

    let mut late = fab_record("RL-1", 10, 4);
    late.forecast_date = Some(date(2025, 5, 10));
    let mut soon = fab_record("RL-2", 10, 9);
    soon.forecast_date = Some(date(2025, 5, 22));
    let mut done = fab_record("RL-3", 10, 0);
    done.status = WipStatus::Completed;
    done.forecast_date = Some(date(2025, 5, 22));

    reconciler
        .reconcile(WipCategory::Fab, &[late, soon, done], "batch-1", Utc::now())
        .unwrap();

    let summary = repo.summary(WipCategory::Fab).unwrap();
    assert_eq!(summary.total_count, 3);
    assert_eq!(summary.completed_count, 1);
    assert_eq!(summary.in_progress_count, 2);
    // (60 + 10 + 100) / 3
    assert_eq!(summary.avg_completion_rate, Some(56.67));

    let today = date(2025, 5, 20);
    let delayed = repo.delayed_items(WipCategory::Fab, today, 0).unwrap();
    assert_eq!(delayed.len(), 1);
    assert_eq!(delayed[0].lot_id, "RL-1");
    assert!(repo
        .delayed_items(WipCategory::Fab, today, 30)
        .unwrap()
        .is_empty());

    let forecast = repo.completion_forecast(WipCategory::Fab, today, 7).unwrap();
    assert_eq!(forecast.get(&date(2025, 5, 22)), Some(&1));
    assert_eq!(forecast.len(), 1);
}
