// ==========================================
// 参数化数据导入 - 管道编排器
// ==========================================
// 用途: 驱动一次完整导入运行（单线程同步执行）
// 流程:
// 1. 获取数据集锁
// 2. 读取选区 → 分类
// 3. 回放已有序列 → IndexManager
// 4. 参数类型预检（任何写入之前）
// 5. Research 元数据差异
// 6. 逐个 Series: 表缓存 → 抽取 → 一致性校验 → 登记索引 → 按类型分组流式写入
// 7. 一次调用持久化全部元数据增量，保存导入报告
// 错误:
// - 运行级错误写入 report.fatal_error，运行中止
// - 序列级错误只跳过该序列，原因写入 report.series_skipped
// ==========================================

use crate::config::ImportSettings;
use crate::domain::category::{AssemblyId, CategoryAssembly, CategoryGraph};
use crate::domain::metadata::{Field, NewSeries, QuantityContainerRecord, ResearchDelta};
use crate::domain::report::{Diagnostics, ImportReport};
use crate::domain::types::{CategoryKind, ValueType};
use crate::engine::collaborators::ImportCollaborators;
use crate::engine::dataset_lock::DatasetLockGuard;
use crate::engine::table_cache::TableCache;
use crate::importer::classifier::Classifier;
use crate::importer::consistency_checker::ConsistencyChecker;
use crate::importer::error::{ImportError, ImportResult, SeriesValidationError};
use crate::importer::index_manager::IndexManager;
use crate::importer::range_extractor::RangeExtractor;
use chrono::Utc;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// 单个序列的处理结果
enum SeriesOutcome {
    Created(NewSeries),
    Skipped(SeriesValidationError),
}

/// 一次运行内的可变状态
struct RunContext<'a> {
    scope: &'a str,
    graph: &'a CategoryGraph,
    cache: TableCache,
    index: IndexManager,
}

// ==========================================
// PipelineOrchestrator - 导入管道编排器
// ==========================================
pub struct PipelineOrchestrator {
    collaborators: ImportCollaborators,
    settings: ImportSettings,
    classifier: Classifier,
    extractor: RangeExtractor,
}

impl PipelineOrchestrator {
    /// 创建编排器
    ///
    /// # 参数
    /// - collaborators: 外部协作者集合
    /// - settings: 配置快照
    pub fn new(collaborators: ImportCollaborators, settings: ImportSettings) -> Self {
        Self {
            classifier: Classifier::new(&settings),
            extractor: RangeExtractor::new(&settings),
            collaborators,
            settings,
        }
    }

    pub fn settings(&self) -> &ImportSettings {
        &self.settings
    }

    /// 执行一次导入
    ///
    /// # 参数
    /// - scope: 数据集作用域（选区路径前缀）
    ///
    /// # 返回
    /// 导入报告；运行级错误记录在 fatal_error 中
    #[instrument(skip(self), fields(report_id))]
    pub fn run_import(&self, scope: &str) -> ImportReport {
        let report_id = Uuid::new_v4().to_string();
        tracing::Span::current().record("report_id", report_id.as_str());
        info!(scope = %scope, "开始导入");

        let mut report = ImportReport::new(report_id, scope);
        let outcome = DatasetLockGuard::acquire(self.collaborators.lock.clone(), scope)
            .and_then(|_guard| self.execute(scope, &mut report));

        if let Err(e) = outcome {
            error!(scope = %scope, error = %e, "导入中止");
            self.collaborators.progress.report(&format!("导入中止: {}", e));
            report.fatal_error = Some(e.to_string());
        }
        report.finished_at = Some(Utc::now());

        if report.has_changes() || report.records_written > 0 {
            if let Err(e) = self.collaborators.metadata_store.save_import_report(&report) {
                warn!(report_id = %report.report_id, error = %e, "导入报告保存失败");
            }
        }

        info!(
            created = report.series_created.len(),
            skipped = report.series_skipped.len(),
            records = report.records_written,
            success = report.is_success(),
            "导入结束"
        );
        report
    }

    /// 持锁执行的主体流程
    fn execute(&self, scope: &str, report: &mut ImportReport) -> ImportResult<()> {
        let progress = &self.collaborators.progress;

        // ==========================================
        // 步骤1: 读取选区并分类
        // ==========================================
        let ranges = self
            .collaborators
            .selection_source
            .list_selection_ranges(scope)
            .map_err(|e| ImportError::SelectionSourceError(e.to_string()))?;
        if ranges.is_empty() {
            progress.report("没有待导入的选区");
            return Ok(());
        }
        debug!(ranges = ranges.len(), "步骤1: 选区分类");

        let classification = self.classifier.classify(ranges)?;
        for range in &classification.unclassified {
            report.unclassified_ranges.push(range.path.clone());
            report
                .diagnostics
                .push(format!("选区无法归类: {}", range.path));
        }

        // ==========================================
        // 步骤2: 回放已有序列
        // ==========================================
        let existing = self.collaborators.metadata_store.list_existing_series(scope)?;
        let index = IndexManager::from_existing(&existing)?;

        let graph = &classification.graph;
        let separator = self.settings.path_separator.as_str();
        let pending: Vec<(AssemblyId, String)> = classification
            .series_ids()
            .into_iter()
            .filter_map(|id| {
                let assembly = graph.get(id)?;
                let name = self.settings.series_display_name(assembly.name(separator));
                if index.already_processed(&name) {
                    debug!(series = %name, "序列已导入，跳过");
                    None
                } else {
                    Some((id, name))
                }
            })
            .collect();
        progress.report(&format!("待处理序列 {} 个", pending.len()));

        let mut ctx = RunContext {
            scope,
            graph,
            cache: TableCache::new(self.collaborators.table_source.clone()),
            index,
        };

        // ==========================================
        // 步骤3: 参数类型预检
        // ==========================================
        self.preflight_parameter_types(&mut ctx, &pending)?;

        // ==========================================
        // 步骤4: Research 元数据差异
        // ==========================================
        let research_delta = self.research_delta(&mut ctx, classification.research, &mut report.diagnostics)?;

        // ==========================================
        // 步骤5: 逐个 Series 处理
        // ==========================================
        let mut created: Vec<NewSeries> = Vec::new();
        for (pos, (series_id, name)) in pending.iter().enumerate() {
            ctx.cache.retain_referenced(&referenced_tables(graph, &pending[pos..]));

            let mut diagnostics = Diagnostics::new();
            let outcome = self.process_series(&mut ctx, *series_id, name, &mut diagnostics);
            report.diagnostics.merge(diagnostics);

            match outcome? {
                SeriesOutcome::Created(series) => {
                    info!(series = %name, index = series.index, records = series.record_count, "序列导入完成");
                    report.series_created.push(series.name.clone());
                    report.records_written += series.record_count;
                    created.push(series);
                }
                SeriesOutcome::Skipped(reason) => {
                    warn!(series = %name, reason = %reason, "序列跳过");
                    progress.report(&format!("序列 {} 跳过: {}", name, reason));
                    report.skip(name.clone(), reason.to_string());
                }
            }
        }

        // ==========================================
        // 步骤6: 持久化元数据增量
        // ==========================================
        if !created.is_empty() || research_delta.is_some() {
            self.collaborators.metadata_store.persist_series(
                scope,
                &created,
                &ctx.index.dirty_parameters(),
                &ctx.index.new_quantities(),
                research_delta.as_ref(),
            )?;
            report.research_updated = research_delta.is_some();
            progress.report(&format!("已持久化 {} 个序列", created.len()));
        }
        Ok(())
    }

    /// 在任何写入之前扫描全部待处理序列的参数表头与声明类型
    ///
    /// 读表失败或越界的序列在此忽略，留给逐序列处理时报告
    fn preflight_parameter_types(
        &self,
        ctx: &mut RunContext<'_>,
        pending: &[(AssemblyId, String)],
    ) -> ImportResult<()> {
        let graph = ctx.graph;
        let mut pending_types: BTreeMap<String, ValueType> = BTreeMap::new();

        for (pos, (series_id, _)) in pending.iter().enumerate() {
            let Some(parameter) = graph.parameter_of(*series_id).and_then(|id| graph.get(id)) else {
                continue;
            };
            if parameter.ranges.is_empty() {
                continue;
            }

            ctx.cache.retain_referenced(&referenced_tables(graph, &pending[pos..]));
            if ctx.cache.ensure_loaded(parameter.table_names()).is_err() {
                continue;
            }
            let Ok(headers) = self.extractor.declared_headers(parameter, ctx.cache.tables()) else {
                continue;
            };

            for (name, declared) in headers {
                ctx.index.ensure_parameter_type(&name, declared)?;
                match pending_types.get(&name) {
                    Some(first) if *first != declared => {
                        return Err(ImportError::ParameterTypeRedefinition {
                            parameter: name,
                            existing: *first,
                            requested: declared,
                        });
                    }
                    Some(_) => {}
                    None => {
                        pending_types.insert(name, declared);
                    }
                }
            }
        }
        debug!(parameters = pending_types.len(), "参数类型预检通过");
        Ok(())
    }

    /// Research 元数据与已持久化版本逐字段比较
    ///
    /// # 返回
    /// - Ok(Some): 存在新增或变化的字段
    /// - Ok(None): 无 Research 选区、抽取失败（写入诊断）或无变化
    fn research_delta(
        &self,
        ctx: &mut RunContext<'_>,
        research: AssemblyId,
        diagnostics: &mut Diagnostics,
    ) -> ImportResult<Option<ResearchDelta>> {
        let graph = ctx.graph;
        let Some(assembly) = graph.get(research) else {
            return Ok(None);
        };
        if assembly.ranges.is_empty() {
            return Ok(None);
        }

        let extracted = ctx
            .cache
            .ensure_loaded(assembly.table_names())
            .and_then(|_| self.extractor.extract(assembly, ctx.cache.tables(), diagnostics));
        let fields = match extracted {
            Ok(fields) => fields,
            Err(e) => {
                warn!(research = %assembly.path, error = %e, "Research 元数据抽取失败");
                diagnostics.push(format!("Research {} 元数据抽取失败: {}", assembly.path, e));
                return Ok(None);
            }
        };

        let persisted: BTreeMap<String, Field> = self
            .collaborators
            .metadata_store
            .load_research_fields(ctx.scope)?
            .into_iter()
            .map(|f| (f.name.clone(), f))
            .collect();

        let changed: Vec<Field> = fields
            .into_iter()
            .filter(|field| persisted.get(&field.name) != Some(field))
            .collect();

        if changed.is_empty() {
            debug!(research = %assembly.path, "Research 元数据无变化");
            return Ok(None);
        }
        info!(research = %assembly.path, fields = changed.len(), "Research 元数据有更新");
        Ok(Some(ResearchDelta {
            name: assembly.path.clone(),
            fields: changed,
        }))
    }

    /// 处理单个序列
    ///
    /// # 返回
    /// - Ok(Created): 已登记并写出全部量容器记录
    /// - Ok(Skipped): 序列级校验失败（尚未登记任何索引）
    /// - Err: 运行级错误（结果存储写入失败等）
    fn process_series(
        &self,
        ctx: &mut RunContext<'_>,
        series_id: AssemblyId,
        name: &str,
        diagnostics: &mut Diagnostics,
    ) -> ImportResult<SeriesOutcome> {
        let graph = ctx.graph;

        // ===== 校验 1、2 =====
        let chain = match ConsistencyChecker::all_series_have_parameter_and_quantity(graph, series_id) {
            Ok(chain) => chain,
            Err(e) => return Ok(SeriesOutcome::Skipped(e)),
        };
        if let Err(e) = ConsistencyChecker::parameter_and_quantity_share_one_table(graph, &chain) {
            return Ok(SeriesOutcome::Skipped(e));
        }
        let (Some(series), Some(parameter), Some(quantity)) = (
            graph.get(chain.series),
            graph.get(chain.parameter),
            graph.get(chain.quantity),
        ) else {
            return Err(ImportError::InternalError(format!("序列 {} 链路节点缺失", name)));
        };

        // ===== 加载表、越界检查、抽取 =====
        let extracted = self.extract_groups(ctx, series, parameter, quantity, diagnostics);
        let (metadata, parameter_fields, quantity_fields) = match extracted {
            Ok(groups) => groups,
            Err(e) => return Ok(SeriesOutcome::Skipped(e)),
        };

        // ===== 校验 3 =====
        let rows = match ConsistencyChecker::parameter_and_quantity_counts_match(&parameter_fields, &quantity_fields) {
            Ok(rows) => rows,
            Err(e) => return Ok(SeriesOutcome::Skipped(e)),
        };
        for field in &quantity_fields {
            if let Err(e) = ctx.index.ensure_quantity_type(&field.name, field.value_type) {
                return Ok(SeriesOutcome::Skipped(e));
            }
        }

        // ===== 登记索引 =====
        let series_index = ctx.index.register_series(name);
        let (parameter_names, row_indices) = self.register_parameters(ctx, &parameter_fields, rows)?;
        let constant_parameters = parameter_fields
            .iter()
            .filter(|f| f.is_constant())
            .map(|f| f.name.clone())
            .collect();

        let mut quantity_indices = Vec::with_capacity(quantity_fields.len());
        for field in &quantity_fields {
            let quantity_index = ctx
                .index
                .assign_or_reuse_quantity_index(&field.name, field.value_type, field.unit.as_deref())
                .map_err(|e| ImportError::InternalError(e.to_string()))?;
            quantity_indices.push(quantity_index);
        }

        // ===== 流式写入 =====
        let record_count = self.stream_records(ctx.scope, series_index, &quantity_fields, &quantity_indices, &row_indices)?;

        Ok(SeriesOutcome::Created(NewSeries {
            name: name.to_string(),
            index: series_index,
            metadata,
            parameter_names,
            constant_parameters,
            quantity_names: quantity_fields.iter().map(|f| f.name.clone()).collect(),
            record_count,
        }))
    }

    /// 抽取序列元数据、Parameter 组与 Quantity 组
    fn extract_groups(
        &self,
        ctx: &mut RunContext<'_>,
        series: &CategoryAssembly,
        parameter: &CategoryAssembly,
        quantity: &CategoryAssembly,
        diagnostics: &mut Diagnostics,
    ) -> Result<(Vec<Field>, Vec<Field>, Vec<Field>), SeriesValidationError> {
        let mut needed = parameter.table_names();
        needed.extend(quantity.table_names());
        needed.extend(series.table_names());
        ctx.cache.ensure_loaded(needed)?;

        // 读单元格之前统一检查越界，一次列出全部越界选区
        RangeExtractor::check_bounds(
            parameter.ranges.iter().chain(&quantity.ranges).chain(&series.ranges),
            ctx.cache.tables(),
        )?;

        let tables = ctx.cache.tables();
        let parameter_fields = self.extractor.extract(parameter, tables, diagnostics);
        let quantity_fields = self.extractor.extract(quantity, tables, diagnostics);
        let metadata = if series.ranges.is_empty() {
            Ok(Vec::new())
        } else {
            self.extractor.extract(series, tables, diagnostics)
        };

        // 三组都尝试完毕后再合并转换失败数
        let mut cast_failures = 0;
        let mut first_error = None;
        for result in [&parameter_fields, &quantity_fields, &metadata] {
            match result {
                Err(SeriesValidationError::CastFailures { count }) => cast_failures += *count,
                Err(e) if first_error.is_none() => first_error = Some(e.clone()),
                _ => {}
            }
        }
        if let Some(e) = first_error {
            return Err(e);
        }
        if cast_failures > 0 {
            return Err(SeriesValidationError::CastFailures { count: cast_failures });
        }

        Ok((metadata?, parameter_fields?, quantity_fields?))
    }

    /// 为参数取值分配索引，得到每行的参数取值索引（按参数缩写升序）
    ///
    /// # 返回
    /// - (按缩写排序的参数名, 每行的取值索引列表)
    fn register_parameters(
        &self,
        ctx: &mut RunContext<'_>,
        parameter_fields: &[Field],
        rows: usize,
    ) -> ImportResult<(Vec<String>, Vec<Vec<u32>>)> {
        let mut columns: Vec<(u32, String, Vec<u32>)> = Vec::with_capacity(parameter_fields.len());
        for field in parameter_fields {
            let mut indices = Vec::with_capacity(field.len());
            for value in &field.values {
                indices.push(
                    ctx.index
                        .assign_parameter_value_index(&field.name, field.value_type, value)?,
                );
            }
            ctx.index.set_parameter_unit(&field.name, field.unit.as_deref());
            let abbreviation = ctx
                .index
                .parameter(&field.name)
                .map(|p| p.abbreviation)
                .ok_or_else(|| ImportError::InternalError(format!("参数 {} 未登记", field.name)))?;
            columns.push((abbreviation, field.name.clone(), indices));
        }
        columns.sort_by_key(|(abbreviation, _, _)| *abbreviation);

        // 常量参数只有一个取值索引，对每一行重复使用
        let row_indices = (0..rows)
            .map(|row| {
                columns
                    .iter()
                    .map(|(_, _, indices)| match indices.as_slice() {
                        [only] => *only,
                        all => all[row],
                    })
                    .collect()
            })
            .collect();
        let names = columns.into_iter().map(|(_, name, _)| name).collect();
        Ok((names, row_indices))
    }

    /// 按值类型固定顺序分组写出量容器记录，每组结束后落盘
    ///
    /// # 返回
    /// - 写出的记录数
    fn stream_records(
        &self,
        scope: &str,
        series_index: u32,
        quantity_fields: &[Field],
        quantity_indices: &[u32],
        row_indices: &[Vec<u32>],
    ) -> ImportResult<u64> {
        let store = &self.collaborators.result_store;
        let progress = &self.collaborators.progress;
        let total = quantity_fields.len();
        let mut done = 0;
        let mut written = 0u64;

        for value_type in ValueType::WRITE_ORDER {
            let mut group_written = false;
            for (field, quantity_index) in quantity_fields.iter().zip(quantity_indices) {
                if field.value_type != value_type {
                    continue;
                }
                for (value, parameter_value_indices) in field.values.iter().zip(row_indices) {
                    store
                        .append_quantity_container(
                            scope,
                            QuantityContainerRecord {
                                series_index,
                                quantity_index: *quantity_index,
                                parameter_value_indices: parameter_value_indices.clone(),
                                value: value.clone(),
                            },
                        )
                        .map_err(|e| ImportError::ResultStoreError(e.to_string()))?;
                    written += 1;
                }
                done += 1;
                group_written = true;
                progress.report_progress(done, total);
            }
            if group_written {
                store
                    .flush()
                    .map_err(|e| ImportError::ResultStoreError(e.to_string()))?;
            }
        }
        Ok(written)
    }
}

/// 剩余待处理序列（含其 Parameter / Quantity 节点）引用的全部表
fn referenced_tables(graph: &CategoryGraph, pending: &[(AssemblyId, String)]) -> BTreeSet<String> {
    let mut tables = BTreeSet::new();
    for (series, _) in pending {
        let chain = [
            Some(*series),
            graph.parameter_of(*series),
            graph.quantity_of(*series),
        ];
        for id in chain.into_iter().flatten() {
            if let Some(assembly) = graph.get(id) {
                if assembly.kind != CategoryKind::Research {
                    tables.extend(assembly.table_names().into_iter().map(str::to_string));
                }
            }
        }
    }
    tables
}
