// ==========================================
// 供应商 WIP 跟踪系统 - 对账引擎（插入/更新/完成）
// ==========================================
// 规则:
// - 键 (supplier, lot_id)，表由类别决定
// - 不存在 → 插入；存在 → 覆盖可变字段
// - 完成判定成立时写 finished_at（只写一次）
// - 已完成的记录不再更新，仅写快照历史，计入 completed
// - 已落库快照日期晚于本批 → 当前视图不动，仅写快照历史，计入 stale
// - 整批一个事务，任一失败整体回滚
// ==========================================

use crate::domain::{CanonicalWipRecord, ReconcileStats, WipCategory};
use crate::repository::{RepositoryError, RepositoryResult, WipRepository};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, error, info};

#[derive(Clone)]
pub struct Reconciler {
    repo: Arc<WipRepository>,
}

impl Reconciler {
    pub fn new(repo: Arc<WipRepository>) -> Self {
        Self { repo }
    }

    pub fn repository(&self) -> &WipRepository {
        &self.repo
    }

    pub fn reconcile(
        &self,
        category: WipCategory,
        batch: &[CanonicalWipRecord],
        batch_id: &str,
        now: DateTime<Utc>,
    ) -> RepositoryResult<ReconcileStats> {
        let result = self.repo.with_transaction(|tx| {
            let mut stats = ReconcileStats::default();
            for record in batch {
                if record.category != category {
                    return Err(RepositoryError::FieldValueError {
                        field: "category".to_string(),
                        message: format!(
                            "记录类别 {} 与批次类别 {} 不一致 (lot_id={})",
                            record.category, category, record.lot_id
                        ),
                    });
                }

                match WipRepository::find_state(tx, category, &record.supplier, &record.lot_id)? {
                    Some(state) if state.finished_at.is_some() => {
                        debug!(supplier = %record.supplier, lot_id = %record.lot_id, "已完成记录，仅写历史");
                        stats.completed += 1;
                    }
                    Some(state) if state.snapshot_date > record.snapshot_date => {
                        debug!(
                            supplier = %record.supplier,
                            lot_id = %record.lot_id,
                            stored = %state.snapshot_date,
                            incoming = %record.snapshot_date,
                            "过期快照，仅写历史"
                        );
                        stats.stale += 1;
                    }
                    Some(_) => {
                        let finished_at = completion_stamp(record, now);
                        WipRepository::update_current(tx, record, finished_at, now)?;
                        stats.updated += 1;
                        if finished_at.is_some() {
                            stats.completed += 1;
                        }
                    }
                    None => {
                        let finished_at = completion_stamp(record, now);
                        WipRepository::insert_current(tx, record, finished_at, now)?;
                        stats.inserted += 1;
                        if finished_at.is_some() {
                            stats.completed += 1;
                        }
                    }
                }

                WipRepository::upsert_history(tx, record, batch_id, now)?;
            }
            Ok(stats)
        });

        match &result {
            Ok(stats) => info!(
                batch_id,
                category = %category,
                inserted = stats.inserted,
                updated = stats.updated,
                completed = stats.completed,
                stale = stats.stale,
                "对账批次已提交"
            ),
            Err(e) => error!(batch_id, category = %category, error = %e, "对账批次已回滚"),
        }
        result
    }
}

fn completion_stamp(record: &CanonicalWipRecord, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    record.indicates_completion().then_some(now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_schema;
    use crate::domain::{StageQuantities, WipStatus};
    use chrono::NaiveDate;
    use rusqlite::Connection;
    use std::sync::Mutex;

    fn reconciler() -> Reconciler {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        Reconciler::new(Arc::new(WipRepository::from_connection(Arc::new(Mutex::new(
            conn,
        )))))
    }

    fn fab(lot_id: &str, day: u32) -> CanonicalWipRecord {
        CanonicalWipRecord {
            category: WipCategory::Fab,
            supplier: "荣芯".to_string(),
            lot_id: lot_id.to_string(),
            purchase_order: Some("PO-1".to_string()),
            item_name: Some("DEV-A".to_string()),
            quantity: Some(25),
            status: WipStatus::InProgress,
            stage_quantities: StageQuantities::default(),
            layer_count: Some(10),
            remain_layer: Some(4),
            current_position: Some(6),
            current_stage: Some("M3".to_string()),
            forecast_date: NaiveDate::from_ymd_opt(2025, 6, 1),
            next_day_forecast: None,
            three_day_forecast: None,
            seven_day_forecast: None,
            warehouse_stock: 0,
            online_total: 0,
            hold_info: None,
            snapshot_date: NaiveDate::from_ymd_opt(2025, 5, day).unwrap(),
            finished_at: None,
        }
    }

    #[test]
    fn test_insert_then_update() {
        let r = reconciler();
        let stats = r
            .reconcile(WipCategory::Fab, &[fab("L1", 20)], "b1", Utc::now())
            .unwrap();
        assert_eq!(stats.inserted, 1);

        let mut next = fab("L1", 21);
        next.remain_layer = Some(2);
        let stats = r
            .reconcile(WipCategory::Fab, &[next], "b2", Utc::now())
            .unwrap();
        assert_eq!(stats.inserted, 0);
        assert_eq!(stats.updated, 1);

        let stored = r.repository().find(WipCategory::Fab, "荣芯", "L1").unwrap().unwrap();
        assert_eq!(stored.remain_layer, Some(2));
        assert_eq!(r.repository().history(WipCategory::Fab, "荣芯", "L1").unwrap().len(), 2);
    }

    #[test]
    fn test_stale_snapshot_only_recorded_in_history() {
        let r = reconciler();
        r.reconcile(WipCategory::Fab, &[fab("L1", 21)], "b1", Utc::now())
            .unwrap();

        let mut older = fab("L1", 20);
        older.remain_layer = Some(9);
        let stats = r
            .reconcile(WipCategory::Fab, &[older], "b0", Utc::now())
            .unwrap();
        assert_eq!(stats.stale, 1);
        assert_eq!(stats.updated, 0);

        let stored = r.repository().find(WipCategory::Fab, "荣芯", "L1").unwrap().unwrap();
        assert_eq!(stored.remain_layer, Some(4));
        assert_eq!(r.repository().count_history().unwrap(), 2);
    }

    #[test]
    fn test_category_mismatch_rolls_back() {
        let r = reconciler();
        let mut wrong = fab("L2", 20);
        wrong.category = WipCategory::Assembly;
        let err = r
            .reconcile(WipCategory::Fab, &[fab("L1", 20), wrong], "b1", Utc::now())
            .unwrap_err();
        assert!(matches!(err, RepositoryError::FieldValueError { .. }));
        assert_eq!(r.repository().count(WipCategory::Fab).unwrap(), 0);
        assert_eq!(r.repository().count_history().unwrap(), 0);
    }
}
