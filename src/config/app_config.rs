// ==========================================
// 供应商 WIP 跟踪系统 - 运行配置
// ==========================================
// 职责: TOML 配置加载、查找顺序、默认值、校验
// 查找顺序:
// 1. 命令行 --config
// 2. 环境变量 SUPPLIER_WIP_CONFIG
// 3. {config_dir}/supplier-wip/config.toml
// 4. 内置默认值
// ==========================================

use crate::config::error::{ConfigError, ConfigResult};
use crate::config::wip_fields::{
    default_profiles, default_stage_model, StageModel, SupplierProfile,
};
use crate::domain::types::SupplierKind;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const CONFIG_ENV_VAR: &str = "SUPPLIER_WIP_CONFIG";

// ==========================================
// CatchUpConfig - 日装片分析追赶任务
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageBucket {
    pub name: String,    // 落库桶名
    pub package: String, // 源表封装形式（精确匹配）
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatchUpConfig {
    pub supplier: String,
    pub extract_dir: PathBuf,
    /// 文件名前缀，完整文件名为 {prefix}{YYYY-MM-DD}.xlsx|csv
    pub file_prefix: String,
    pub sheet: Option<String>,
    pub header_row: usize,
    pub run_card_column: String,
    pub package_column: String,
    /// 累计装片量区间（按列位置，含两端）
    pub cumulative_start_column: String,
    pub cumulative_end_column: String,
    pub buckets: Vec<PackageBucket>,
    /// 分析表为空时的起点
    pub initial_date: Option<NaiveDate>,
}

impl Default for CatchUpConfig {
    fn default() -> Self {
        let buckets = [
            ("SOP8_12R", "SOP8(12R)"),
            ("SOP8", "SOP8"),
            ("DFN8", "DFN8L(2X2X0.5-P0.5)"),
            ("SOP16_12R", "SOP16(12R)"),
            ("SOP16", "SOP16"),
            ("SOP14_12R", "SOP14(12R)"),
            ("SOP14", "SOP14"),
            ("TSSOP20L", "TSSOP20L"),
            ("SOT26_14R", "SOT26(14R)"),
            ("SOT25_20R", "SOT25(20R)"),
            ("SOT25_14R", "SOT25(14R)"),
            ("SSOP24", "SSOP24"),
            ("ESSOP10", "ESSOP10"),
            ("QFN20", "QFN20L(3X3X0.5-P0.4)"),
            ("LQFP32", "LQFP32L(7X7)"),
        ];
        Self {
            supplier: "池州华宇".to_string(),
            extract_dir: PathBuf::from("downloads/processed/封装进度表/池州华宇"),
            file_prefix: "苏州华芯微电子股份有限公司的封装产品进展表".to_string(),
            sheet: Some("Sheet1".to_string()),
            header_row: 0,
            run_card_column: "工单号(Run card No)".to_string(),
            package_column: "封装形式(Package)".to_string(),
            cumulative_start_column: "研磨(Grinding)".to_string(),
            cumulative_end_column: "装片1(DB1)".to_string(),
            buckets: buckets
                .iter()
                .map(|(name, package)| PackageBucket {
                    name: name.to_string(),
                    package: package.to_string(),
                })
                .collect(),
            initial_date: None,
        }
    }
}

// ==========================================
// AppConfig - 顶层配置
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub db_path: String,
    /// 目录收件箱: {inbox}/{category}/{supplier}/{supplier}_{YYYYMMDD}.{xlsx|csv}
    pub inbox_dir: PathBuf,
    pub cycle_interval_secs: u64,
    pub acquisition_timeout_secs: u64,
    pub assembly: StageModel,
    /// 键为 SupplierKind::config_key
    pub suppliers: BTreeMap<String, SupplierProfile>,
    pub catch_up: CatchUpConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: "supplier_wip.db".to_string(),
            inbox_dir: PathBuf::from("downloads/processed"),
            cycle_interval_secs: 1800,
            acquisition_timeout_secs: 60,
            assembly: default_stage_model(),
            suppliers: default_profiles(),
            catch_up: CatchUpConfig::default(),
        }
    }
}

impl AppConfig {
    /// 从 TOML 文本解析并校验
    pub fn from_toml_str(raw: &str, origin: &str) -> ConfigResult<Self> {
        let config: AppConfig =
            toml::from_str(raw).map_err(|e| ConfigError::ConfigParseError {
                path: origin.to_string(),
                message: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> ConfigResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::ConfigReadError {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_toml_str(&raw, &path.display().to_string())
    }

    /// 按查找顺序解析配置；显式指定的路径不存在时报错
    pub fn resolve(cli_path: Option<&Path>) -> ConfigResult<Self> {
        if let Some(path) = cli_path {
            info!(path = %path.display(), "使用命令行指定的配置文件");
            return Self::load(path);
        }

        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            info!(path = %path, "使用环境变量指定的配置文件");
            return Self::load(Path::new(&path));
        }

        if let Some(path) = default_config_path() {
            if path.exists() {
                info!(path = %path.display(), "使用用户配置目录中的配置文件");
                return Self::load(&path);
            }
            debug!(path = %path.display(), "用户配置文件不存在");
        }

        info!("未找到配置文件，使用内置默认配置");
        let config = Self::default();
        config.validate()?;
        Ok(config)
    }

    pub fn profile(&self, kind: SupplierKind) -> ConfigResult<&SupplierProfile> {
        self.suppliers
            .get(kind.config_key())
            .ok_or_else(|| ConfigError::MissingProfile(kind.config_key().to_string()))
    }

    pub fn validate(&self) -> ConfigResult<()> {
        self.assembly.validate()?;
        for (key, profile) in &self.suppliers {
            let kind = SupplierKind::from_name(key).ok_or_else(|| ConfigError::InvalidProfile {
                profile: key.clone(),
                message: "未知供应商".to_string(),
            })?;
            profile.validate(kind, &self.assembly)?;
        }
        if self.catch_up.buckets.is_empty() {
            return Err(ConfigError::InvalidProfile {
                profile: "catch_up".to_string(),
                message: "封装形式桶为空".to_string(),
            });
        }
        Ok(())
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("supplier-wip").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        config.validate().unwrap();
        assert_eq!(config.suppliers.len(), SupplierKind::ALL.len());
        assert_eq!(config.catch_up.buckets.len(), 15);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = AppConfig::from_toml_str(
            r#"
db_path = "/tmp/wip.db"
cycle_interval_secs = 60

[catch_up]
initial_date = "2025-05-01"
"#,
            "inline",
        )
        .unwrap();
        assert_eq!(config.db_path, "/tmp/wip.db");
        assert_eq!(config.cycle_interval_secs, 60);
        assert_eq!(config.acquisition_timeout_secs, 60);
        assert_eq!(config.assembly, default_stage_model());
        assert_eq!(
            config.catch_up.initial_date,
            NaiveDate::from_ymd_opt(2025, 5, 1)
        );
        assert_eq!(config.catch_up.supplier, "池州华宇");
    }

    #[test]
    fn test_unknown_supplier_profile_rejected() {
        let err = AppConfig::from_toml_str(
            r#"
[suppliers.acme]
columns = { "Lot" = "lotId" }
"#,
            "inline",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidProfile { .. }));
    }

    #[test]
    fn test_malformed_toml_is_parse_error() {
        let err = AppConfig::from_toml_str("db_path = ", "inline").unwrap_err();
        assert!(matches!(err, ConfigError::ConfigParseError { .. }));
    }

    #[test]
    fn test_load_and_resolve_explicit_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "db_path = \"explicit.db\"").unwrap();
        let config = AppConfig::resolve(Some(file.path())).unwrap();
        assert_eq!(config.db_path, "explicit.db");

        let missing = AppConfig::resolve(Some(Path::new("/nonexistent/supplier-wip.toml")));
        assert!(matches!(missing, Err(ConfigError::ConfigReadError { .. })));
    }

    #[test]
    fn test_profile_lookup() {
        let config = AppConfig::default();
        let profile = config.profile(SupplierKind::Jcet).unwrap();
        assert_eq!(profile.forecast_offset_days, 2);

        let mut config = AppConfig::default();
        config.suppliers.remove("rsmc");
        assert!(matches!(
            config.profile(SupplierKind::Rsmc),
            Err(ConfigError::MissingProfile(_))
        ));
    }
}
