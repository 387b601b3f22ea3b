// ==========================================
// 供应商 WIP 跟踪系统 - WIP 领域模型
// ==========================================
// 职责: 标准 WIP 记录、导入中间结构、拒绝明细、对账统计
// ==========================================

use crate::domain::types::{WipCategory, WipStatus};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// 成品库存阶段名（仓库库存 > 0 时的当前工序）
pub const STOCK_STAGE: &str = "STOCK";

// ==========================================
// StageQuantities - 有序工序数量
// ==========================================
// 顺序 = 供应商物理工艺顺序，序列化后保持不变
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageCount {
    pub stage: String,
    pub quantity: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StageQuantities(Vec<StageCount>);

impl StageQuantities {
    /// 按工序列表初始化，全部数量为 0
    pub fn zeroed<S: AsRef<str>>(stages: &[S]) -> Self {
        Self(
            stages
                .iter()
                .map(|s| StageCount {
                    stage: s.as_ref().to_string(),
                    quantity: 0,
                })
                .collect(),
        )
    }

    pub fn get(&self, stage: &str) -> Option<i64> {
        self.0.iter().find(|c| c.stage == stage).map(|c| c.quantity)
    }

    /// 累加到指定工序；工序不存在时追加到末尾
    pub fn add(&mut self, stage: &str, quantity: i64) {
        match self.0.iter_mut().find(|c| c.stage == stage) {
            Some(count) => count.quantity += quantity,
            None => self.0.push(StageCount {
                stage: stage.to_string(),
                quantity,
            }),
        }
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &StageCount> {
        self.0.iter()
    }

    pub fn total(&self) -> i64 {
        self.0
            .iter()
            .fold(0i64, |acc, c| acc.saturating_add(c.quantity))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// 末道工序（工艺终点）
    pub fn terminal(&self) -> Option<&StageCount> {
        self.0.last()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }
}

// ==========================================
// WipCandidate - 导入中间结构体
// ==========================================
// 用途: 标准化器输出，校验器输入
// 标量字段保留源文本，由校验器做类型转换；工序数量已由标准化器汇总
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WipCandidate {
    pub row_number: usize, // 源表行号（用于拒绝明细）
    pub category: WipCategory,
    pub supplier: String,
    pub snapshot_date: NaiveDate,

    pub lot_id: Option<String>,
    pub purchase_order: Option<String>,
    pub item_name: Option<String>,
    pub quantity: Option<String>,
    pub status: Option<String>,
    pub stage: Option<String>, // 源表直接给出的工序（晶圆厂）

    pub stage_quantities: StageQuantities,
    pub layer_count: Option<String>,
    pub remain_layer: Option<String>,
    pub forecast_date: Option<String>,
    pub warehouse_stock: Option<String>,
    pub online_total: Option<String>,
    pub hold_info: Option<String>,
}

impl WipCandidate {
    pub fn new(
        row_number: usize,
        category: WipCategory,
        supplier: &str,
        snapshot_date: NaiveDate,
        stage_quantities: StageQuantities,
    ) -> Self {
        Self {
            row_number,
            category,
            supplier: supplier.to_string(),
            snapshot_date,
            lot_id: None,
            purchase_order: None,
            item_name: None,
            quantity: None,
            status: None,
            stage: None,
            stage_quantities,
            layer_count: None,
            remain_layer: None,
            forecast_date: None,
            warehouse_stock: None,
            online_total: None,
            hold_info: None,
        }
    }
}

// ==========================================
// CanonicalWipRecord - 标准 WIP 记录
// ==========================================
// 每次进度表导入生成一次完整快照，不做部分构造
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalWipRecord {
    // ===== 主键 =====
    pub category: WipCategory,
    pub supplier: String, // 键空间分区
    pub lot_id: String,   // 晶圆厂为 lot 号，封装厂为订单号

    // ===== 描述信息 =====
    pub purchase_order: Option<String>,
    pub item_name: Option<String>,
    pub quantity: Option<i64>,
    pub status: WipStatus,

    // ===== 工序 =====
    pub stage_quantities: StageQuantities,
    pub layer_count: Option<i64>,
    pub remain_layer: Option<i64>,
    pub current_position: Option<i64>, // 派生: layer_count - remain_layer
    pub current_stage: Option<String>, // 派生

    // ===== 预测 =====
    pub forecast_date: Option<NaiveDate>,
    pub next_day_forecast: Option<i64>,
    pub three_day_forecast: Option<i64>,
    pub seven_day_forecast: Option<i64>,

    // ===== 库存 =====
    pub warehouse_stock: i64,
    pub online_total: i64,
    pub hold_info: Option<String>,

    // ===== 快照元信息 =====
    pub snapshot_date: NaiveDate,
    pub finished_at: Option<DateTime<Utc>>, // 仅由对账器写入
}

impl CanonicalWipRecord {
    /// 是否表示已完成
    ///
    /// 规则:
    /// - 状态为库存或显式完成
    /// - 当前工序为 STOCK
    /// - 数量全部落在末道工序
    pub fn indicates_completion(&self) -> bool {
        if self.status.is_terminal() {
            return true;
        }
        if self.current_stage.as_deref() == Some(STOCK_STAGE) {
            return true;
        }
        match self.stage_quantities.terminal() {
            Some(last) => last.quantity > 0 && self.stage_quantities.total() == last.quantity,
            None => false,
        }
    }
}

// ==========================================
// Rejection - 校验拒绝明细
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectionKind {
    MissingKey,        // 主键缺失
    LayerOverflow,     // 剩余层数大于总层数
    NegativeQuantity,  // 工序数量/库存/在线数量为负
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejection {
    pub row_number: usize,
    pub supplier: String,
    pub key: Option<String>,
    pub kind: RejectionKind,
    pub field: String,
    pub value: Option<String>,
    pub message: String,
}

/// 批次校验结果（有效数据, 无效数据）
#[derive(Debug, Clone, Default)]
pub struct ValidationOutcome {
    pub valid: Vec<CanonicalWipRecord>,
    pub invalid: Vec<Rejection>,
}

// ==========================================
// ReconcileStats - 对账统计
// ==========================================
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileStats {
    pub inserted: usize,
    pub updated: usize,
    pub completed: usize,
    pub stale: usize, // 快照日期早于已落库快照，仅写历史
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_with(stages: &[(&str, i64)]) -> CanonicalWipRecord {
        let mut quantities = StageQuantities::default();
        for (stage, qty) in stages {
            quantities.add(stage, *qty);
        }
        CanonicalWipRecord {
            category: WipCategory::Assembly,
            supplier: "长电科技".to_string(),
            lot_id: "SO-1".to_string(),
            purchase_order: None,
            item_name: None,
            quantity: None,
            status: WipStatus::InProgress,
            stage_quantities: quantities,
            layer_count: None,
            remain_layer: None,
            current_position: None,
            current_stage: None,
            forecast_date: None,
            next_day_forecast: None,
            three_day_forecast: None,
            seven_day_forecast: None,
            warehouse_stock: 0,
            online_total: 0,
            hold_info: None,
            snapshot_date: NaiveDate::from_ymd_opt(2025, 5, 20).unwrap(),
            finished_at: None,
        }
    }

    #[test]
    fn test_stage_quantities_add_is_additive() {
        let mut q = StageQuantities::zeroed(&["研磨", "电镀"]);
        q.add("电镀", 3);
        q.add("电镀", 4);
        assert_eq!(q.get("电镀"), Some(7));
        assert_eq!(q.total(), 7);
        assert_eq!(q.len(), 2);
    }

    #[test]
    fn test_stage_quantities_json_keeps_order() {
        let mut q = StageQuantities::zeroed(&["包装", "研磨"]);
        q.add("研磨", 2);
        let json = q.to_json().unwrap();
        assert!(json.find("包装").unwrap() < json.find("研磨").unwrap());
        assert_eq!(StageQuantities::from_json(&json).unwrap(), q);
    }

    #[test]
    fn test_completion_when_drained_into_terminal_stage() {
        let record = record_with(&[("研磨", 0), ("装片", 0), ("待入库", 12)]);
        assert!(record.indicates_completion());

        let record = record_with(&[("研磨", 1), ("装片", 0), ("待入库", 12)]);
        assert!(!record.indicates_completion());

        let record = record_with(&[("研磨", 0), ("待入库", 0)]);
        assert!(!record.indicates_completion());
    }

    #[test]
    fn test_completion_by_status_or_stock_stage() {
        let mut record = record_with(&[("研磨", 5)]);
        record.status = WipStatus::Stock;
        assert!(record.indicates_completion());

        let mut record = record_with(&[("研磨", 5)]);
        record.current_stage = Some(STOCK_STAGE.to_string());
        assert!(record.indicates_completion());
    }
}
