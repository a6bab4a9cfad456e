// ==========================================
// 参数化数据导入 - 导入API
// ==========================================
// 职责: 装配 SQLite / 目录表源协作者，在阻塞线程池上执行同步导入管道
// 并发: 同一 ImportApi 实例共享进程内数据集锁，同一 scope 的运行串行化
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::config::{ConfigManager, ImportSettings};
use crate::db::{init_schema, open_sqlite_connection};
use crate::domain::report::{ImportReport, SkippedSeries};
use crate::engine::{
    DatasetLock, ImportCollaborators, InProcessDatasetLock, PipelineOrchestrator, ProgressSink,
    TracingProgressSink,
};
use crate::repository::{
    DirectoryTableSource, MetadataRepository, MetadataStore, ResultRepository,
    SelectionRangeRepository,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::info;

/// 导入API响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportApiResponse {
    /// 导入报告ID
    pub report_id: String,
    pub scope: String,
    /// 新建序列名
    pub series_created: Vec<String>,
    /// 跳过的序列及原因
    pub series_skipped: Vec<SkippedSeries>,
    pub unclassified_ranges: Vec<String>,
    pub research_updated: bool,
    pub records_written: u64,
    /// 运行级错误（None 表示成功）
    pub fatal_error: Option<String>,
    pub diagnostics: Vec<String>,
    /// 导入耗时（毫秒）
    pub elapsed_ms: i64,
}

impl ImportApiResponse {
    fn from_report(report: ImportReport, elapsed: Duration) -> Self {
        Self {
            diagnostics: report.diagnostics.entries().to_vec(),
            report_id: report.report_id,
            scope: report.scope,
            series_created: report.series_created,
            series_skipped: report.series_skipped,
            unclassified_ranges: report.unclassified_ranges,
            research_updated: report.research_updated,
            records_written: report.records_written,
            fatal_error: report.fatal_error,
            elapsed_ms: elapsed.as_millis() as i64,
        }
    }

    pub fn is_success(&self) -> bool {
        self.fatal_error.is_none()
    }
}

/// 导入API
pub struct ImportApi {
    db_path: String,
    table_dir: PathBuf,
    lock: Arc<InProcessDatasetLock>,
    progress: Arc<dyn ProgressSink>,
}

impl ImportApi {
    /// 创建新的ImportApi实例
    ///
    /// # 参数
    /// - db_path: SQLite 数据库路径（选区、配置、元数据、结果同库）
    /// - table_dir: 表文件目录
    pub fn new(db_path: impl Into<String>, table_dir: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            table_dir: table_dir.into(),
            lock: Arc::new(InProcessDatasetLock::new()),
            progress: Arc::new(TracingProgressSink),
        }
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    /// 装配编排器（同步，供 CLI 直接调用）
    pub fn build_orchestrator(&self) -> ApiResult<PipelineOrchestrator> {
        Self::assemble(
            &self.db_path,
            &self.table_dir,
            self.lock.clone(),
            self.progress.clone(),
        )
    }

    fn assemble(
        db_path: &str,
        table_dir: &Path,
        lock: Arc<dyn DatasetLock>,
        progress: Arc<dyn ProgressSink>,
    ) -> ApiResult<PipelineOrchestrator> {
        let conn = open_sqlite_connection(db_path)
            .map_err(|e| ApiError::DatabaseConnectionError(e.to_string()))?;
        init_schema(&conn).map_err(|e| ApiError::DatabaseError(format!("建表失败: {}", e)))?;
        let conn = Arc::new(Mutex::new(conn));

        let config = ConfigManager::from_connection(conn.clone())
            .map_err(|e| ApiError::ConfigurationError(e.to_string()))?;
        let settings = ImportSettings::load(&config)?;

        let collaborators = ImportCollaborators::new(
            Arc::new(
                SelectionRangeRepository::from_connection(conn.clone())
                    .with_separator(settings.path_separator.clone()),
            ),
            Arc::new(DirectoryTableSource::new(
                table_dir,
                settings.csv_delimiter,
                settings.default_decimal_delimiter,
            )),
            Arc::new(MetadataRepository::from_connection(conn.clone())),
            Arc::new(ResultRepository::from_connection(conn, settings.result_buffer_size)),
        )
        .with_progress(progress)
        .with_lock(lock);

        Ok(PipelineOrchestrator::new(collaborators, settings))
    }

    /// 执行一次导入
    ///
    /// # 参数
    /// - scope: 数据集作用域
    ///
    /// # 返回
    /// - Ok(ImportApiResponse): 运行结束（运行级错误见 fatal_error）
    /// - Err(ApiError): 装配失败或任务异常
    pub async fn run_import(&self, scope: &str) -> ApiResult<ImportApiResponse> {
        let started = Instant::now();
        let db_path = self.db_path.clone();
        let table_dir = self.table_dir.clone();
        let lock = self.lock.clone();
        let progress = self.progress.clone();
        let scope = scope.to_string();

        let report = tokio::task::spawn_blocking(move || -> ApiResult<ImportReport> {
            let orchestrator = Self::assemble(&db_path, &table_dir, lock, progress)?;
            Ok(orchestrator.run_import(&scope))
        })
        .await
        .map_err(|e| ApiError::InternalError(format!("导入任务异常结束: {}", e)))??;

        let response = ImportApiResponse::from_report(report, started.elapsed());
        info!(
            report_id = %response.report_id,
            elapsed_ms = response.elapsed_ms,
            success = response.is_success(),
            "导入API调用完成"
        );
        Ok(response)
    }

    /// 读取已保存的导入报告
    ///
    /// # 返回
    /// - Err(NotFound): 报告不存在
    pub async fn get_import_report(&self, report_id: &str) -> ApiResult<ImportReport> {
        if report_id.trim().is_empty() {
            return Err(ApiError::InvalidInput("report_id 不能为空".to_string()));
        }
        let db_path = self.db_path.clone();
        let report_id = report_id.to_string();

        tokio::task::spawn_blocking(move || -> ApiResult<ImportReport> {
            let repo = MetadataRepository::new(&db_path)?;
            repo.get_import_report(&report_id)?
                .ok_or_else(|| ApiError::NotFound(format!("导入报告(id={})不存在", report_id)))
        })
        .await
        .map_err(|e| ApiError::InternalError(format!("查询任务异常结束: {}", e)))?
    }
}
