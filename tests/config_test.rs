// ==========================================
// 配置集成测试
// ==========================================
// 测试目标: TOML 配置覆盖内置默认值后对流水线生效
// ==========================================


use std::io::Write;
use supplier_wip::app::AppState;
use supplier_wip::config::{AppConfig, ConfigError};
use supplier_wip::{PipelineError, SupplierKind, WipCategory};
use test_helpers::*;

fn write_config(body: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "{}", body).unwrap();
    file
}

#[test]
fn test_supplier_profile_override_drives_pipeline() {
    let (_db, db_path) = create_test_db().unwrap();
    let file = write_config(&format!(
        r#"
db_path = "{db_path}"

[suppliers.jcet]
columns = {{ "Order" = "lotId", "DB" = "装片", "Pack" = "包装", "Stock" = "warehouseStock" }}
forecast_offset_days = 5
"#
    ));

    let config = AppConfig::resolve(Some(file.path())).unwrap();
    assert_eq!(config.suppliers.len(), 1);
    let state = AppState::new(config).unwrap();

    let extract = csv_extract(
        SupplierKind::Jcet,
        date(2025, 5, 20),
        "Order,DB,Pack,Stock\nSO-1,10,0,0\n",
    );
    let report = state.pipeline.process_extract(&extract).unwrap();
    assert_eq!(report.stats.inserted, 1);

    let record = state
        .wip_repo
        .find(WipCategory::Assembly, "长电科技", "SO-1")
        .unwrap()
        .unwrap();
    // 装片交期 9 天 + 覆盖后的偏移 5 天
    assert_eq!(record.forecast_date, Some(date(2025, 6, 3)));

    // 未配置的供应商报配置错误
    let rsmc = csv_extract(SupplierKind::Rsmc, date(2025, 5, 20), RSMC_HEADER);
    let err = state.pipeline.process_extract(&rsmc).unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Config(ConfigError::MissingProfile(_))
    ));
}

#[test]
fn test_stage_model_override_is_validated() {
    let file = write_config(
        r#"
[assembly]
stages = [
    { name = "装片", lead_days = 3 },
    { name = "装片", lead_days = 1 },
]
"#,
    );
    let err = AppConfig::resolve(Some(file.path())).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidStageModel(_)));
}

#[test]
fn test_profile_mapping_to_unknown_stage_is_rejected() {
    let file = write_config(
        r#"
[suppliers.jcet]
columns = { "Order" = "lotId", "DB" = "不存在的工序" }
"#,
    );
    let err = AppConfig::resolve(Some(file.path())).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidProfile { .. }));
}
