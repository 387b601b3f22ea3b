// ==========================================
// 供应商 WIP 跟踪系统 - 进度表字段配置
// ==========================================
// 职责: 供应商列映射、工序顺序、工序交期表
// 红线: 只读配置，必须在处理任何记录前加载完成
// ==========================================

use crate::config::error::{ConfigError, ConfigResult};
use crate::domain::types::SupplierKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ==========================================
// CanonicalField - 标准字段（非工序）
// ==========================================
// 列映射的目标若不是标准字段，则视为工序名
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CanonicalField {
    LotId,
    PurchaseOrder,
    ItemName,
    Quantity,
    Status,
    Stage,
    LayerCount,
    RemainLayer,
    ForecastDate,
    WarehouseStock,
    OnlineTotal,
    HoldInfo,
}

impl CanonicalField {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "lotId" => Some(CanonicalField::LotId),
            "purchaseOrder" => Some(CanonicalField::PurchaseOrder),
            "itemName" => Some(CanonicalField::ItemName),
            "quantity" => Some(CanonicalField::Quantity),
            "status" => Some(CanonicalField::Status),
            "stage" => Some(CanonicalField::Stage),
            "layerCount" => Some(CanonicalField::LayerCount),
            "remainLayer" => Some(CanonicalField::RemainLayer),
            "forecastDate" => Some(CanonicalField::ForecastDate),
            "warehouseStock" => Some(CanonicalField::WarehouseStock),
            "onlineTotal" => Some(CanonicalField::OnlineTotal),
            "holdInfo" => Some(CanonicalField::HoldInfo),
            _ => None,
        }
    }
}

/// 列映射目标
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnTarget<'a> {
    Field(CanonicalField),
    Stage(&'a str),
}

pub fn column_target(canonical: &str) -> ColumnTarget<'_> {
    match CanonicalField::parse(canonical) {
        Some(field) => ColumnTarget::Field(field),
        None => ColumnTarget::Stage(canonical),
    }
}

// ==========================================
// StageModel - 封装工序模型
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageDef {
    pub name: String,
    pub lead_days: i64, // 距离完成的天数
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageModel {
    /// 物理工艺顺序（首道工序为默认当前工序）
    pub stages: Vec<StageDef>,
    /// 未开工工序：这些工序之外数量和为 0 时不给出交期
    #[serde(default)]
    pub forecast_exclusions: Vec<String>,
}

impl StageModel {
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn lead_time(&self, stage: &str) -> Option<i64> {
        self.stages
            .iter()
            .find(|s| s.name == stage)
            .map(|s| s.lead_days)
    }

    pub fn first_stage(&self) -> Option<&str> {
        self.stages.first().map(|s| s.name.as_str())
    }

    pub fn contains(&self, stage: &str) -> bool {
        self.stages.iter().any(|s| s.name == stage)
    }

    pub fn is_excluded(&self, stage: &str) -> bool {
        self.forecast_exclusions.iter().any(|s| s == stage)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.stages.is_empty() {
            return Err(ConfigError::InvalidStageModel("工序列表为空".to_string()));
        }
        let mut seen = std::collections::HashSet::new();
        for stage in &self.stages {
            if !seen.insert(stage.name.as_str()) {
                return Err(ConfigError::InvalidStageModel(format!(
                    "工序重复: {}",
                    stage.name
                )));
            }
            if stage.lead_days < 0 {
                return Err(ConfigError::InvalidStageModel(format!(
                    "工序交期为负数: {}={}",
                    stage.name, stage.lead_days
                )));
            }
        }
        Ok(())
    }
}

// ==========================================
// SupplierProfile - 供应商进度表布局
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PivotSpec {
    pub key_column: String,
    pub step_column: String,
    pub quantity_column: String,
    /// 源表自带的合计工序（不参与在线合计）
    #[serde(default)]
    pub total_step: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockSheetSpec {
    pub sheet: String,
    #[serde(default)]
    pub header_row: usize,
    pub columns: BTreeMap<String, String>,
    /// 叠加在供应商交期偏移之上
    #[serde(default)]
    pub forecast_offset_days: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupplierProfile {
    /// 工作表名（None = 第一个工作表）
    #[serde(default)]
    pub sheet: Option<String>,
    /// 表头所在行（0 起）
    #[serde(default)]
    pub header_row: usize,
    /// 源列名 → 标准字段/工序；多列映射到同一工序时求和
    pub columns: BTreeMap<String, String>,
    /// 主键静态替换表（数据修补，待供应商修正后移除）
    #[serde(default)]
    pub substitutions: BTreeMap<String, String>,
    /// 交期额外偏移天数（如快递时间）
    #[serde(default)]
    pub forecast_offset_days: i64,
    /// 长表透视（lot, 工序, 数量）
    #[serde(default)]
    pub pivot: Option<PivotSpec>,
    /// 成品库存工作表（晶圆厂）
    #[serde(default)]
    pub stock_sheet: Option<StockSheetSpec>,
}

impl SupplierProfile {
    /// 必须存在的源列（透视模式下为三元组列）
    pub fn required_columns(&self) -> Vec<&str> {
        match &self.pivot {
            Some(pivot) => vec![
                pivot.key_column.as_str(),
                pivot.step_column.as_str(),
                pivot.quantity_column.as_str(),
            ],
            None => self.columns.keys().map(String::as_str).collect(),
        }
    }

    pub fn substitute_key(&self, key: &str) -> String {
        self.substitutions
            .get(key)
            .cloned()
            .unwrap_or_else(|| key.to_string())
    }

    pub fn validate(&self, kind: SupplierKind, model: &StageModel) -> ConfigResult<()> {
        let profile = kind.config_key().to_string();
        let maps_key = self.pivot.is_some() || self.columns.values().any(|t| t == "lotId");
        if !maps_key {
            return Err(ConfigError::InvalidProfile {
                profile,
                message: "缺少映射到 lotId 的源列".to_string(),
            });
        }
        if kind.category() == crate::domain::WipCategory::Assembly {
            for target in self.columns.values() {
                if let ColumnTarget::Stage(stage) = column_target(target) {
                    if !model.contains(stage) {
                        return Err(ConfigError::InvalidProfile {
                            profile,
                            message: format!("映射目标工序不存在: {}", stage),
                        });
                    }
                }
            }
        }
        Ok(())
    }
}

// ==========================================
// 默认配置
// ==========================================

fn cols(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(raw, canonical)| (raw.to_string(), canonical.to_string()))
        .collect()
}

pub fn default_stage_model() -> StageModel {
    let stages = [
        ("研磨", 12),
        ("切割", 11),
        ("待装片", 10),
        ("装片", 9),
        ("银胶固化", 8),
        ("等离子清洗1", 8),
        ("键合", 7),
        ("三目检", 6),
        ("等离子清洗2", 6),
        ("塑封", 5),
        ("后固化", 5),
        ("回流焊", 4),
        ("电镀", 4),
        ("打印", 3),
        ("后切割", 3),
        ("切筋成型", 3),
        ("外观检", 2),
        ("测编打印", 2),
        ("包装", 1),
        ("待入库", 1),
    ];
    StageModel {
        stages: stages
            .iter()
            .map(|(name, lead_days)| StageDef {
                name: name.to_string(),
                lead_days: *lead_days,
            })
            .collect(),
        forecast_exclusions: vec!["研磨".to_string(), "切割".to_string(), "待装片".to_string()],
    }
}

pub fn default_profile(kind: SupplierKind) -> SupplierProfile {
    match kind {
        SupplierKind::Jcet => SupplierProfile {
            sheet: Some("Sheet1".to_string()),
            header_row: 0,
            columns: cols(&[
                ("订单号", "lotId"),
                ("研磨", "研磨"),
                ("切割", "切割"),
                ("装片", "装片"),
                ("键合", "键合"),
                ("塑封", "塑封"),
                ("后固化", "后固化"),
                ("电镀", "电镀"),
                ("打印", "打印"),
                ("后切割", "后切割"),
                ("外观检", "外观检"),
                ("测试", "测编打印"),
                ("编带", "测编打印"),
                ("包装", "包装"),
                ("待入库", "待入库"),
                ("在线合计", "onlineTotal"),
                ("仓库库存", "warehouseStock"),
            ]),
            substitutions: BTreeMap::new(),
            forecast_offset_days: 2,
            pivot: None,
            stock_sheet: None,
        },
        SupplierKind::Xinfeng => SupplierProfile {
            sheet: Some("Sheet1".to_string()),
            header_row: 0,
            columns: cols(&[
                ("研磨", "研磨"),
                ("划片", "切割"),
                ("待装片", "待装片"),
                ("装片", "装片"),
                ("银胶固化", "银胶固化"),
                ("等离子清洗1", "等离子清洗1"),
                ("键合", "键合"),
                ("三目检", "三目检"),
                ("等离子清洗2", "等离子清洗2"),
                ("塑封", "塑封"),
                ("后固化", "后固化"),
                ("回流焊", "回流焊"),
                ("电镀1", "电镀"),
                ("电镀2", "电镀"),
                ("打印1", "打印"),
                ("打印2", "打印"),
                ("后切割", "后切割"),
                ("切筋成型", "切筋成型"),
                ("外观检", "外观检"),
                ("测编打印", "测编打印"),
                ("包装", "包装"),
                ("待入库", "待入库"),
            ]),
            substitutions: BTreeMap::new(),
            forecast_offset_days: 0,
            pivot: Some(PivotSpec {
                key_column: "customerSoCode".to_string(),
                step_column: "stepName".to_string(),
                quantity_column: "currentqty".to_string(),
                total_step: Some("TOTAL(TOTAL)".to_string()),
            }),
            stock_sheet: None,
        },
        SupplierKind::YaxinGuizhou => SupplierProfile {
            sheet: None,
            header_row: 1,
            columns: cols(&[
                ("客户订单号", "lotId"),
                ("装片1", "装片"),
                ("装片2", "装片"),
                ("装片3", "装片"),
                ("PLASMA", "等离子清洗1"),
                ("键合1", "键合"),
                ("键合2", "键合"),
                ("塑封", "塑封"),
                ("注胶", "后固化"),
                ("电镀", "电镀"),
                ("烘烤", "电镀"),
                ("打印", "打印"),
                ("成型分离", "切筋成型"),
                ("测试", "测编打印"),
                ("包装", "包装"),
            ]),
            substitutions: cols(&[
                ("HX-20250508005", "HX-20250513004"),
                ("HX-20250508004", "HX-20250513003"),
                ("HX-20250508002", "HX-20250513001"),
                ("HX-20250508003", "HX-20250513002"),
            ]),
            forecast_offset_days: 0,
            pivot: None,
            stock_sheet: None,
        },
        SupplierKind::YaxinZhejiang => SupplierProfile {
            sheet: None,
            header_row: 0,
            columns: cols(&[
                ("客户订单号", "lotId"),
                ("装片", "装片"),
                ("装片2", "装片"),
                ("装片3", "装片"),
                ("前固化", "银胶固化"),
                ("前固化2", "银胶固化"),
                ("前固化3", "银胶固化"),
                ("PLASMA1", "等离子清洗1"),
                ("键合", "键合"),
                ("键合检验", "三目检"),
                ("键合检验2", "三目检"),
                ("塑封", "塑封"),
                ("后固化", "后固化"),
                ("电镀", "电镀"),
                ("去溢料", "电镀"),
                ("打印", "打印"),
                ("切筋", "切筋成型"),
                ("切筋打弯(高站高)", "切筋成型"),
                ("编带检", "外观检"),
                ("条检", "外观检"),
                ("外检", "外观检"),
                ("测试", "测编打印"),
                ("包装", "包装"),
            ]),
            substitutions: BTreeMap::new(),
            forecast_offset_days: 0,
            pivot: None,
            stock_sheet: None,
        },
        SupplierKind::Rsmc => SupplierProfile {
            sheet: Some("WIP Report".to_string()),
            header_row: 0,
            columns: cols(&[
                ("Lot ID", "lotId"),
                ("PO No", "purchaseOrder"),
                ("Customer Device", "itemName"),
                ("Wafer Qty", "quantity"),
                ("Stage", "stage"),
                ("Total Layer", "layerCount"),
                ("Remain Layer", "remainLayer"),
                ("Forecast Out Date", "forecastDate"),
                ("Hold Reason", "holdInfo"),
            ]),
            substitutions: BTreeMap::new(),
            forecast_offset_days: 7,
            pivot: None,
            stock_sheet: Some(StockSheetSpec {
                sheet: "Stock".to_string(),
                header_row: 0,
                columns: cols(&[
                    ("Customer\nDevice", "itemName"),
                    ("Lot ID", "lotId"),
                    ("Qty", "quantity"),
                    ("Date", "forecastDate"),
                ]),
                forecast_offset_days: 3,
            }),
        },
    }
}

pub fn default_profiles() -> BTreeMap<String, SupplierProfile> {
    SupplierKind::ALL
        .iter()
        .map(|kind| (kind.config_key().to_string(), default_profile(*kind)))
        .collect()
}
