// ==========================================
// 供应商 WIP 跟踪系统 - 领域类型定义
// ==========================================
// 职责: 供应商枚举、WIP 类别、批次状态
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// WIP 类别 (WIP Category)
// ==========================================
// 晶圆厂按 lot 号建键，封装厂按订单号建键
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WipCategory {
    Fab,      // 晶圆厂
    Assembly, // 封装厂
}

impl WipCategory {
    /// 当前视图表名
    pub fn current_table(&self) -> &'static str {
        match self {
            WipCategory::Fab => "wip_fab",
            WipCategory::Assembly => "wip_assy",
        }
    }

    /// 主键字段名（用于拒绝明细）
    pub fn key_field(&self) -> &'static str {
        match self {
            WipCategory::Fab => "lotId",
            WipCategory::Assembly => "orderNumber",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WipCategory::Fab => "FAB",
            WipCategory::Assembly => "ASSEMBLY",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "FAB" | "fab" | "晶圆厂" | "晶圆进度表" => Some(WipCategory::Fab),
            "ASSEMBLY" | "assembly" | "封装厂" | "封装进度表" => Some(WipCategory::Assembly),
            _ => None,
        }
    }
}

impl fmt::Display for WipCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 供应商 (Supplier Kind)
// ==========================================
// 封闭集合: 每个变体对应一种进度表解析策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SupplierKind {
    Jcet,          // 长电科技
    Xinfeng,       // 江苏芯丰
    YaxinGuizhou,  // 贵州亚芯
    YaxinZhejiang, // 浙江亚芯
    Rsmc,          // 荣芯
}

impl SupplierKind {
    pub const ALL: [SupplierKind; 5] = [
        SupplierKind::Jcet,
        SupplierKind::Xinfeng,
        SupplierKind::YaxinGuizhou,
        SupplierKind::YaxinZhejiang,
        SupplierKind::Rsmc,
    ];

    /// 落库使用的供应商名称
    pub fn display_name(&self) -> &'static str {
        match self {
            SupplierKind::Jcet => "长电科技",
            SupplierKind::Xinfeng => "江苏芯丰",
            SupplierKind::YaxinGuizhou => "贵州亚芯",
            SupplierKind::YaxinZhejiang => "浙江亚芯",
            SupplierKind::Rsmc => "荣芯",
        }
    }

    /// 配置文件中的 profile 键
    pub fn config_key(&self) -> &'static str {
        match self {
            SupplierKind::Jcet => "jcet",
            SupplierKind::Xinfeng => "xinfeng",
            SupplierKind::YaxinGuizhou => "yaxin_guizhou",
            SupplierKind::YaxinZhejiang => "yaxin_zhejiang",
            SupplierKind::Rsmc => "rsmc",
        }
    }

    pub fn category(&self) -> WipCategory {
        match self {
            SupplierKind::Rsmc => WipCategory::Fab,
            _ => WipCategory::Assembly,
        }
    }

    /// 从分类标签中的供应商名解析（中文名或配置键均可）
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|k| k.display_name() == name || k.config_key() == name)
    }
}

impl fmt::Display for SupplierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

// ==========================================
// 批次状态 (WIP Status)
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WipStatus {
    InProgress,    // 在制
    Stock,         // 成品库存
    Completed,     // 源表显式完成
    Label(String), // 供应商自定义状态
}

impl WipStatus {
    /// 解析源表状态文本；空白视为在制
    pub fn from_label(raw: Option<&str>) -> Self {
        let value = raw.map(str::trim).unwrap_or("");
        match value {
            "" => WipStatus::InProgress,
            v if v.eq_ignore_ascii_case("in_progress") || v == "在制" => WipStatus::InProgress,
            v if v.eq_ignore_ascii_case("stock") || v == "库存" => WipStatus::Stock,
            v if v.eq_ignore_ascii_case("completed")
                || v.eq_ignore_ascii_case("finished")
                || v.eq_ignore_ascii_case("shipped")
                || v == "完成"
                || v == "已完成" =>
            {
                WipStatus::Completed
            }
            v => WipStatus::Label(v.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            WipStatus::InProgress => "in_progress",
            WipStatus::Stock => "stock",
            WipStatus::Completed => "completed",
            WipStatus::Label(label) => label.as_str(),
        }
    }

    /// 是否为完成信号
    pub fn is_terminal(&self) -> bool {
        matches!(self, WipStatus::Stock | WipStatus::Completed)
    }
}

impl fmt::Display for WipStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
