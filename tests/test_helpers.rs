// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 提供内存协作者、场景表与选区构造、临时数据库初始化
// ==========================================

#![allow(dead_code)]

use parameterized_import::config::ImportSettings;
use parameterized_import::db::{init_schema, open_sqlite_connection};
use parameterized_import::domain::{
    ExistingSeries, Field, ImportReport, NewSeries, ParameterDefinition, QuantityContainerRecord,
    QuantityDefinition, ResearchDelta, SelectionRange, TableSnapshot, ValueType,
};
use parameterized_import::engine::{
    ImportCollaborators, InProcessDatasetLock, PipelineOrchestrator, ProgressSink,
};
use parameterized_import::repository::{
    path_in_scope, MemoryTableSource, MetadataStore, RepositoryError, RepositoryResult,
    ResultStore, SelectionSource,
};
use std::collections::{BTreeMap, HashMap};
use std::error::Error;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

pub const SCOPE: &str = "Base";
pub const MEASUREMENTS: &str = "Measurements";
pub const INFO: &str = "Info";

// ==========================================
// 内存选区来源
// ==========================================
#[derive(Default)]
pub struct MemorySelectionSource {
    ranges: Mutex<Vec<SelectionRange>>,
}

impl MemorySelectionSource {
    pub fn add(&self, ranges: impl IntoIterator<Item = SelectionRange>) {
        self.ranges.lock().unwrap().extend(ranges);
    }
}

impl SelectionSource for MemorySelectionSource {
    fn list_selection_ranges(&self, scope: &str) -> RepositoryResult<Vec<SelectionRange>> {
        Ok(self
            .ranges
            .lock()
            .unwrap()
            .iter()
            .filter(|r| path_in_scope(&r.path, scope, "/"))
            .cloned()
            .collect())
    }
}

// ==========================================
// 内存元数据存储
// ==========================================
#[derive(Default)]
struct ScopeState {
    series: Vec<NewSeries>,
    parameters: BTreeMap<String, ParameterDefinition>,
    quantities: BTreeMap<String, QuantityDefinition>,
    research: BTreeMap<String, Field>,
}

#[derive(Default)]
pub struct MemoryMetadataStore {
    scopes: Mutex<HashMap<String, ScopeState>>,
    reports: Mutex<BTreeMap<String, ImportReport>>,
    persist_calls: AtomicUsize,
}

impl MemoryMetadataStore {
    /// 预置一个已持久化序列（用于回放测试）
    pub fn seed(&self, scope: &str, existing: ExistingSeries) {
        let mut scopes = self.scopes.lock().unwrap();
        let state = scopes.entry(scope.to_string()).or_default();
        for p in &existing.parameters {
            state.parameters.insert(p.name.clone(), p.clone());
        }
        for q in &existing.quantities {
            state.quantities.insert(q.name.clone(), q.clone());
        }
        state.series.push(NewSeries {
            name: existing.name.clone(),
            index: existing.index,
            metadata: Vec::new(),
            parameter_names: existing.parameters.iter().map(|p| p.name.clone()).collect(),
            constant_parameters: Vec::new(),
            quantity_names: existing.quantities.iter().map(|q| q.name.clone()).collect(),
            record_count: 0,
        });
    }

    pub fn persist_calls(&self) -> usize {
        self.persist_calls.load(Ordering::SeqCst)
    }

    pub fn series(&self, scope: &str) -> Vec<NewSeries> {
        self.scopes
            .lock()
            .unwrap()
            .get(scope)
            .map(|s| s.series.clone())
            .unwrap_or_default()
    }

    pub fn parameter(&self, scope: &str, name: &str) -> Option<ParameterDefinition> {
        self.scopes
            .lock()
            .unwrap()
            .get(scope)
            .and_then(|s| s.parameters.get(name).cloned())
    }

    pub fn quantity(&self, scope: &str, name: &str) -> Option<QuantityDefinition> {
        self.scopes
            .lock()
            .unwrap()
            .get(scope)
            .and_then(|s| s.quantities.get(name).cloned())
    }

    pub fn report_count(&self) -> usize {
        self.reports.lock().unwrap().len()
    }
}

impl MetadataStore for MemoryMetadataStore {
    fn list_existing_series(&self, scope: &str) -> RepositoryResult<Vec<ExistingSeries>> {
        let scopes = self.scopes.lock().unwrap();
        let Some(state) = scopes.get(scope) else {
            return Ok(Vec::new());
        };
        let mut existing: Vec<ExistingSeries> = state
            .series
            .iter()
            .map(|s| ExistingSeries {
                name: s.name.clone(),
                index: s.index,
                parameters: s
                    .parameter_names
                    .iter()
                    .filter_map(|n| state.parameters.get(n).cloned())
                    .collect(),
                quantities: s
                    .quantity_names
                    .iter()
                    .filter_map(|n| state.quantities.get(n).cloned())
                    .collect(),
            })
            .collect();
        existing.sort_by_key(|s| s.index);
        Ok(existing)
    }

    fn load_research_fields(&self, scope: &str) -> RepositoryResult<Vec<Field>> {
        Ok(self
            .scopes
            .lock()
            .unwrap()
            .get(scope)
            .map(|s| s.research.values().cloned().collect())
            .unwrap_or_default())
    }

    fn persist_series(
        &self,
        scope: &str,
        series: &[NewSeries],
        parameters: &[ParameterDefinition],
        quantities: &[QuantityDefinition],
        research: Option<&ResearchDelta>,
    ) -> RepositoryResult<()> {
        self.persist_calls.fetch_add(1, Ordering::SeqCst);
        let mut scopes = self.scopes.lock().unwrap();
        let state = scopes.entry(scope.to_string()).or_default();

        if let Some(dup) = series
            .iter()
            .find(|n| state.series.iter().any(|s| s.name == n.name))
        {
            return Err(RepositoryError::UniqueConstraintViolation(dup.name.clone()));
        }
        state.series.extend(series.iter().cloned());
        for p in parameters {
            state.parameters.insert(p.name.clone(), p.clone());
        }
        for q in quantities {
            state.quantities.insert(q.name.clone(), q.clone());
        }
        if let Some(delta) = research {
            for f in &delta.fields {
                state.research.insert(f.name.clone(), f.clone());
            }
        }
        Ok(())
    }

    fn save_import_report(&self, report: &ImportReport) -> RepositoryResult<()> {
        self.reports
            .lock()
            .unwrap()
            .insert(report.report_id.clone(), report.clone());
        Ok(())
    }

    fn get_import_report(&self, report_id: &str) -> RepositoryResult<Option<ImportReport>> {
        Ok(self.reports.lock().unwrap().get(report_id).cloned())
    }
}

// ==========================================
// 内存结果存储
// ==========================================
#[derive(Default)]
pub struct MemoryResultStore {
    pending: Mutex<Vec<(String, QuantityContainerRecord)>>,
    committed: Mutex<Vec<(String, QuantityContainerRecord)>>,
    flushes: AtomicUsize,
    failing: AtomicBool,
}

impl MemoryResultStore {
    /// 之后的每次写入都失败
    pub fn fail_writes(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    pub fn records(&self) -> Vec<QuantityContainerRecord> {
        self.committed
            .lock()
            .unwrap()
            .iter()
            .map(|(_, r)| r.clone())
            .collect()
    }

    pub fn records_of_series(&self, series_index: u32) -> Vec<QuantityContainerRecord> {
        self.records()
            .into_iter()
            .filter(|r| r.series_index == series_index)
            .collect()
    }

    pub fn flushes(&self) -> usize {
        self.flushes.load(Ordering::SeqCst)
    }

    pub fn pending(&self) -> usize {
        self.pending.lock().unwrap().len()
    }
}

impl ResultStore for MemoryResultStore {
    fn append_quantity_container(
        &self,
        scope: &str,
        record: QuantityContainerRecord,
    ) -> RepositoryResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(RepositoryError::InternalError("磁盘已满".to_string()));
        }
        self.pending.lock().unwrap().push((scope.to_string(), record));
        Ok(())
    }

    fn flush(&self) -> RepositoryResult<usize> {
        let drained: Vec<_> = self.pending.lock().unwrap().drain(..).collect();
        let count = drained.len();
        self.committed.lock().unwrap().extend(drained);
        self.flushes.fetch_add(1, Ordering::SeqCst);
        Ok(count)
    }
}

// ==========================================
// 记录型进度上报
// ==========================================
#[derive(Default)]
pub struct RecordingProgress {
    pub messages: Mutex<Vec<String>>,
    pub steps: Mutex<Vec<(usize, usize)>>,
}

impl ProgressSink for RecordingProgress {
    fn report(&self, message: &str) {
        self.messages.lock().unwrap().push(message.to_string());
    }

    fn report_progress(&self, done: usize, total: usize) {
        self.steps.lock().unwrap().push((done, total));
    }
}

// ==========================================
// 测试装配
// ==========================================
pub struct Harness {
    pub selections: Arc<MemorySelectionSource>,
    pub tables: Arc<MemoryTableSource>,
    pub metadata: Arc<MemoryMetadataStore>,
    pub results: Arc<MemoryResultStore>,
    pub progress: Arc<RecordingProgress>,
    pub lock: Arc<InProcessDatasetLock>,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            selections: Arc::new(MemorySelectionSource::default()),
            tables: Arc::new(MemoryTableSource::new()),
            metadata: Arc::new(MemoryMetadataStore::default()),
            results: Arc::new(MemoryResultStore::default()),
            progress: Arc::new(RecordingProgress::default()),
            lock: Arc::new(InProcessDatasetLock::new()),
        }
    }

    /// 场景数据: Info 表 + Measurements 表 + 序列 S1 的全部选区
    pub fn with_scenario() -> Self {
        let harness = Self::new();
        harness.tables.insert(info_table());
        harness.tables.insert(scenario_table(MEASUREMENTS));
        harness.selections.add(research_ranges());
        harness.selections.add(series_ranges("S1", MEASUREMENTS));
        harness
    }

    pub fn orchestrator(&self) -> PipelineOrchestrator {
        let collaborators = ImportCollaborators::new(
            self.selections.clone(),
            self.tables.clone(),
            self.metadata.clone(),
            self.results.clone(),
        )
        .with_progress(self.progress.clone())
        .with_lock(self.lock.clone());
        PipelineOrchestrator::new(collaborators, ImportSettings::default())
    }

    pub fn run(&self) -> ImportReport {
        self.orchestrator().run_import(SCOPE)
    }
}

// ==========================================
// 场景构造
// ==========================================

/// P_Voltage / P_Current / Q_Power [W]，4 行数据
pub fn scenario_table(name: &str) -> TableSnapshot {
    TableSnapshot::from_rows(
        name,
        &[
            &["P_Voltage", "P_Current", "Q_Power [W]"],
            &["1", "0.5", "0.5"],
            &["2", "0.5", "1.0"],
            &["1", "1.5", "1.5"],
            &["2", "1.5", "3.0"],
        ],
    )
}

pub fn info_table() -> TableSnapshot {
    TableSnapshot::from_rows(INFO, &[&["Operator", "Lab"], &["Alice", "L1"]])
}

pub fn research_ranges() -> Vec<SelectionRange> {
    vec![SelectionRange::new("Base/Study/Info", INFO)
        .with_columns(1, 2)
        .with_type(ValueType::String)
        .entire_column()]
}

/// 序列的三个选区: Voltage(INT32)、Current(DOUBLE)、Power(DOUBLE)，均选整列
pub fn series_ranges(series: &str, table: &str) -> Vec<SelectionRange> {
    vec![
        parameter_range(series, table, "Voltage", 1, ValueType::Int32),
        parameter_range(series, table, "Current", 2, ValueType::Double),
        quantity_range(series, table, "Power", 3, ValueType::Double),
    ]
}

pub fn parameter_range(
    series: &str,
    table: &str,
    name: &str,
    column: u32,
    value_type: ValueType,
) -> SelectionRange {
    SelectionRange::new(format!("Base/Study/{}/Parameter/{}", series, name), table)
        .with_columns(column, column)
        .with_type(value_type)
        .entire_column()
}

pub fn quantity_range(
    series: &str,
    table: &str,
    name: &str,
    column: u32,
    value_type: ValueType,
) -> SelectionRange {
    SelectionRange::new(format!("Base/Study/{}/Quantity/{}", series, name), table)
        .with_columns(column, column)
        .with_type(value_type)
        .entire_column()
}

// ==========================================
// 临时数据库
// ==========================================

/// 创建临时目录并在其中初始化数据库
///
/// # 返回
/// - TempDir: 临时目录（需要保持存活）
/// - String: 数据库文件路径
pub fn create_test_db() -> Result<(TempDir, String), Box<dyn Error>> {
    let dir = TempDir::new()?;
    let db_path = dir.path().join("import.db").to_string_lossy().to_string();
    let conn = open_sqlite_connection(&db_path)?;
    init_schema(&conn)?;
    Ok((dir, db_path))
}

/// 场景表写成 CSV
pub fn write_scenario_csv(dir: &TempDir) -> Result<(), Box<dyn Error>> {
    std::fs::write(
        dir.path().join(format!("{}.csv", MEASUREMENTS)),
        "P_Voltage,P_Current,Q_Power [W]\n1,0.5,0.5\n2,0.5,1.0\n1,1.5,1.5\n2,1.5,3.0\n",
    )?;
    std::fs::write(
        dir.path().join(format!("{}.csv", INFO)),
        "Operator,Lab\nAlice,L1\n",
    )?;
    Ok(())
}
