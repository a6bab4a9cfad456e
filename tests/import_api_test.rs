// ==========================================
// ImportApi 端到端测试
// ==========================================
// 测试目标: SQLite 存储 + CSV 表目录下的完整导入（异步外观）
// ==========================================

mod test_helpers;

use parameterized_import::api::{ApiError, ImportApi};
use parameterized_import::config::{config_keys, ConfigManager};
use parameterized_import::domain::{Value, ValueType};
use parameterized_import::logging;
use parameterized_import::repository::{
    MetadataRepository, MetadataStore, ResultRepository, SelectionRangeRepository,
};
use test_helpers::*;

fn seed_ranges(db_path: &str) {
    let repo = SelectionRangeRepository::new(db_path).unwrap();
    let mut ranges = research_ranges();
    ranges.extend(series_ranges("S1", MEASUREMENTS));
    assert_eq!(repo.insert_ranges(&ranges).unwrap(), 4);
}

#[tokio::test]
async fn test_import_from_csv_into_sqlite() {
    logging::init_test();
    let (dir, db_path) = create_test_db().unwrap();
    write_scenario_csv(&dir).unwrap();
    seed_ranges(&db_path);

    let api = ImportApi::new(db_path.clone(), dir.path());
    let response = api.run_import(SCOPE).await.unwrap();

    assert!(response.is_success(), "fatal: {:?}", response.fatal_error);
    assert_eq!(response.series_created, vec!["Dataset/S1".to_string()]);
    assert_eq!(response.records_written, 4);
    assert!(response.research_updated);

    let results = ResultRepository::new(&db_path, 16).unwrap();
    assert_eq!(results.count_records(SCOPE).unwrap(), 4);
    let records = results.list_records(SCOPE, 1).unwrap();
    assert_eq!(records[3].value, Value::Double(3.0));
    assert_eq!(records[3].parameter_value_indices, vec![2, 2]);

    let metadata = MetadataRepository::new(&db_path).unwrap();
    let existing = metadata.list_existing_series(SCOPE).unwrap();
    assert_eq!(existing.len(), 1);
    assert_eq!(existing[0].name, "Dataset/S1");
    let voltage = existing[0]
        .parameters
        .iter()
        .find(|p| p.name == "Voltage")
        .unwrap();
    assert_eq!(voltage.value_type, ValueType::Int32);
    assert_eq!(voltage.values, vec![Value::Int32(1), Value::Int32(2)]);
    assert_eq!(metadata.load_research_fields(SCOPE).unwrap().len(), 2);

    let report = api.get_import_report(&response.report_id).await.unwrap();
    assert_eq!(report.series_created, response.series_created);
    assert!(report.finished_at.is_some());
}

#[tokio::test]
async fn test_second_run_writes_nothing() {
    let (dir, db_path) = create_test_db().unwrap();
    write_scenario_csv(&dir).unwrap();
    seed_ranges(&db_path);

    let api = ImportApi::new(db_path.clone(), dir.path());
    api.run_import(SCOPE).await.unwrap();
    let second = api.run_import(SCOPE).await.unwrap();

    assert!(second.is_success());
    assert!(second.series_created.is_empty());
    assert!(!second.research_updated);
    assert_eq!(second.records_written, 0);

    let results = ResultRepository::new(&db_path, 16).unwrap();
    assert_eq!(results.count_records(SCOPE).unwrap(), 4);
    let reports = MetadataRepository::new(&db_path)
        .unwrap()
        .list_import_reports(SCOPE)
        .unwrap();
    assert_eq!(reports.len(), 1);
}

#[tokio::test]
async fn test_concurrent_runs_on_same_scope_import_once() {
    let (dir, db_path) = create_test_db().unwrap();
    write_scenario_csv(&dir).unwrap();
    seed_ranges(&db_path);

    let api = ImportApi::new(db_path.clone(), dir.path());
    let (a, b) = tokio::join!(api.run_import(SCOPE), api.run_import(SCOPE));
    let (a, b) = (a.unwrap(), b.unwrap());

    assert!(a.is_success() && b.is_success());
    assert_eq!(a.series_created.len() + b.series_created.len(), 1);
    let results = ResultRepository::new(&db_path, 16).unwrap();
    assert_eq!(results.count_records(SCOPE).unwrap(), 4);
}

#[tokio::test]
async fn test_configured_dataset_folder_names_series() {
    let (dir, db_path) = create_test_db().unwrap();
    write_scenario_csv(&dir).unwrap();
    seed_ranges(&db_path);
    ConfigManager::new(&db_path)
        .unwrap()
        .set_config_value(config_keys::DATASET_FOLDER, "Runs")
        .unwrap();

    let response = ImportApi::new(db_path, dir.path())
        .run_import(SCOPE)
        .await
        .unwrap();
    assert_eq!(response.series_created, vec!["Runs/S1".to_string()]);
}

#[tokio::test]
async fn test_missing_table_file_skips_series() {
    let (dir, db_path) = create_test_db().unwrap();
    seed_ranges(&db_path);

    let response = ImportApi::new(db_path, dir.path())
        .run_import(SCOPE)
        .await
        .unwrap();
    assert!(response.is_success());
    assert!(response.series_created.is_empty());
    assert_eq!(response.series_skipped.len(), 1);
    assert!(response.series_skipped[0].reason.contains(MEASUREMENTS));
    // Research 表缺失只记诊断
    assert!(response.diagnostics.iter().any(|d| d.contains(INFO)));
}

#[tokio::test]
async fn test_unknown_report_is_not_found() {
    let (dir, db_path) = create_test_db().unwrap();
    let api = ImportApi::new(db_path, dir.path());

    let err = api.get_import_report("no-such-report").await.unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));
    let err = api.get_import_report("  ").await.unwrap_err();
    assert!(matches!(err, ApiError::InvalidInput(_)));
}

#[test]
fn test_blocking_orchestrator_reports_progress() {
    let (dir, db_path) = create_test_db().unwrap();
    write_scenario_csv(&dir).unwrap();
    seed_ranges(&db_path);

    let progress = std::sync::Arc::new(RecordingProgress::default());
    let orchestrator = ImportApi::new(db_path, dir.path())
        .with_progress(progress.clone())
        .build_orchestrator()
        .unwrap();
    assert_eq!(orchestrator.settings().dataset_folder, "Dataset");

    let report = orchestrator.run_import(SCOPE);
    assert!(report.is_success());
    assert_eq!(*progress.steps.lock().unwrap(), vec![(1, 1)]);
    assert!(progress
        .messages
        .lock()
        .unwrap()
        .iter()
        .any(|m| m.contains("已持久化 1 个序列")));
}
