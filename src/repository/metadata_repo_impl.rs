// ==========================================
// 参数化数据导入 - 元数据存储实现
// ==========================================
// 工具: rusqlite（事务化写入）+ serde_json（Value 以带标签 JSON 存储）
// 表: series_metadata / series_field / parameter_definition / parameter_value
//     quantity_definition / series_parameter / series_quantity
//     research_field / import_report
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::metadata::{
    ExistingSeries, Field, NewSeries, ParameterDefinition, QuantityDefinition, ResearchDelta,
};
use crate::domain::report::ImportReport;
use crate::domain::types::ValueType;
use crate::domain::value::Value;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::metadata_repo::MetadataStore;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use tracing::debug;

pub struct MetadataRepository {
    conn: Arc<Mutex<Connection>>,
}

impl MetadataRepository {
    /// 创建新的 MetadataRepository 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建仓储实例
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 作用域内的全部参数定义（含取值，按取值索引排序）
    fn load_parameters(conn: &Connection, scope: &str) -> RepositoryResult<BTreeMap<String, ParameterDefinition>> {
        let mut stmt = conn.prepare(
            "SELECT name, abbreviation, value_type, unit FROM parameter_definition WHERE scope = ?1",
        )?;
        let rows = stmt
            .query_map(params![scope], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, u32>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Option<String>>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut parameters = BTreeMap::new();
        for (name, abbreviation, value_type, unit) in rows {
            let mut definition = ParameterDefinition::new(name.clone(), abbreviation, parse_type(&value_type)?);
            definition.unit = unit;
            parameters.insert(name, definition);
        }

        let mut stmt = conn.prepare(
            r#"
            SELECT parameter_name, value_json FROM parameter_value
            WHERE scope = ?1
            ORDER BY parameter_name, value_index
            "#,
        )?;
        let values = stmt
            .query_map(params![scope], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        for (name, value_json) in values {
            let value: Value = serde_json::from_str(&value_json)?;
            if let Some(definition) = parameters.get_mut(&name) {
                definition.values.push(value);
            }
        }
        Ok(parameters)
    }

    fn load_quantities(conn: &Connection, scope: &str) -> RepositoryResult<BTreeMap<String, QuantityDefinition>> {
        let mut stmt = conn.prepare(
            r#"
            SELECT name, quantity_index, abbreviation, value_type, unit
            FROM quantity_definition WHERE scope = ?1
            "#,
        )?;
        let rows = stmt
            .query_map(params![scope], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, u32>(1)?,
                    row.get::<_, u32>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, Option<String>>(4)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut quantities = BTreeMap::new();
        for (name, index, abbreviation, value_type, unit) in rows {
            let mut definition = QuantityDefinition::new(name.clone(), index, parse_type(&value_type)?);
            definition.abbreviation = abbreviation;
            definition.unit = unit;
            quantities.insert(name, definition);
        }
        Ok(quantities)
    }

    /// 序列 → 关联名称（按 position 排序）
    fn load_links(
        conn: &Connection,
        sql: &str,
        scope: &str,
    ) -> RepositoryResult<BTreeMap<String, Vec<String>>> {
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt
            .query_map(params![scope], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut links: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (series, name) in rows {
            links.entry(series).or_default().push(name);
        }
        Ok(links)
    }

    fn write_parameter(tx: &Transaction<'_>, scope: &str, parameter: &ParameterDefinition) -> RepositoryResult<()> {
        tx.execute(
            r#"
            INSERT INTO parameter_definition (scope, name, abbreviation, value_type, unit)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(scope, name) DO UPDATE SET
                abbreviation = excluded.abbreviation,
                value_type = excluded.value_type,
                unit = COALESCE(parameter_definition.unit, excluded.unit)
            "#,
            params![
                scope,
                parameter.name,
                parameter.abbreviation,
                parameter.value_type.to_string(),
                parameter.unit,
            ],
        )?;

        // 取值只追加，整份重写即可保持索引不变
        tx.execute(
            "DELETE FROM parameter_value WHERE scope = ?1 AND parameter_name = ?2",
            params![scope, parameter.name],
        )?;
        for (pos, value) in parameter.values.iter().enumerate() {
            tx.execute(
                r#"
                INSERT INTO parameter_value (scope, parameter_name, value_index, value_json)
                VALUES (?1, ?2, ?3, ?4)
                "#,
                params![scope, parameter.name, pos as u32 + 1, serde_json::to_string(value)?],
            )?;
        }
        Ok(())
    }

    fn write_series(tx: &Transaction<'_>, scope: &str, series: &NewSeries, created_at: &str) -> RepositoryResult<()> {
        tx.execute(
            r#"
            INSERT INTO series_metadata (scope, name, series_index, record_count, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![scope, series.name, series.index, series.record_count as i64, created_at],
        )?;

        for field in &series.metadata {
            tx.execute(
                r#"
                INSERT OR REPLACE INTO series_field (scope, series_name, field_name, unit, value_type, values_json)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
                params![
                    scope,
                    series.name,
                    field.name,
                    field.unit,
                    field.value_type.to_string(),
                    serde_json::to_string(&field.values)?,
                ],
            )?;
        }

        for (position, parameter) in series.parameter_names.iter().enumerate() {
            let is_constant = series.constant_parameters.contains(parameter);
            tx.execute(
                r#"
                INSERT INTO series_parameter (scope, series_name, parameter_name, position, is_constant)
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
                params![scope, series.name, parameter, position as i64, is_constant],
            )?;
        }

        for (position, quantity) in series.quantity_names.iter().enumerate() {
            tx.execute(
                r#"
                INSERT INTO series_quantity (scope, series_name, quantity_name, position)
                VALUES (?1, ?2, ?3, ?4)
                "#,
                params![scope, series.name, quantity, position as i64],
            )?;
        }
        Ok(())
    }

    /// 读取某个序列的元数据字段
    pub fn load_series_fields(&self, scope: &str, series_name: &str) -> RepositoryResult<Vec<Field>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT field_name, unit, value_type, values_json FROM series_field
            WHERE scope = ?1 AND series_name = ?2
            ORDER BY field_name
            "#,
        )?;
        let rows = stmt
            .query_map(params![scope, series_name], map_field_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(RawFieldRow::into_field).collect()
    }

    /// 某个序列中被标记为常量的参数名
    pub fn list_constant_parameters(&self, scope: &str, series_name: &str) -> RepositoryResult<Vec<String>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT parameter_name FROM series_parameter
            WHERE scope = ?1 AND series_name = ?2 AND is_constant = 1
            ORDER BY position
            "#,
        )?;
        let names = stmt
            .query_map(params![scope, series_name], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(names)
    }

    /// 按时间倒序列出作用域内的导入报告
    pub fn list_import_reports(&self, scope: &str) -> RepositoryResult<Vec<ImportReport>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT report_json FROM import_report WHERE scope = ?1 ORDER BY started_at DESC",
        )?;
        let rows = stmt
            .query_map(params![scope], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        rows.iter()
            .map(|json| serde_json::from_str(json).map_err(RepositoryError::from))
            .collect()
    }
}

struct RawFieldRow {
    name: String,
    unit: Option<String>,
    value_type: String,
    values_json: String,
}

impl RawFieldRow {
    fn into_field(self) -> RepositoryResult<Field> {
        let mut field = Field::new(self.name, parse_type(&self.value_type)?);
        field.unit = self.unit;
        field.values = serde_json::from_str(&self.values_json)?;
        Ok(field)
    }
}

fn map_field_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawFieldRow> {
    Ok(RawFieldRow {
        name: row.get(0)?,
        unit: row.get(1)?,
        value_type: row.get(2)?,
        values_json: row.get(3)?,
    })
}

fn parse_type(raw: &str) -> RepositoryResult<ValueType> {
    ValueType::from_str(raw).ok_or_else(|| RepositoryError::FieldValueError {
        field: "value_type".to_string(),
        message: format!("未知值类型: {}", raw),
    })
}

impl MetadataStore for MetadataRepository {
    fn list_existing_series(&self, scope: &str) -> RepositoryResult<Vec<ExistingSeries>> {
        let conn = self.get_conn()?;

        let parameters = Self::load_parameters(&conn, scope)?;
        let quantities = Self::load_quantities(&conn, scope)?;
        let parameter_links = Self::load_links(
            &conn,
            "SELECT series_name, parameter_name FROM series_parameter WHERE scope = ?1 ORDER BY series_name, position",
            scope,
        )?;
        let quantity_links = Self::load_links(
            &conn,
            "SELECT series_name, quantity_name FROM series_quantity WHERE scope = ?1 ORDER BY series_name, position",
            scope,
        )?;

        let mut stmt = conn.prepare(
            "SELECT name, series_index FROM series_metadata WHERE scope = ?1 ORDER BY series_index",
        )?;
        let series_rows = stmt
            .query_map(params![scope], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, u32>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let existing: Vec<ExistingSeries> = series_rows
            .into_iter()
            .map(|(name, index)| {
                let series_parameters = parameter_links
                    .get(&name)
                    .into_iter()
                    .flatten()
                    .filter_map(|p| parameters.get(p).cloned())
                    .collect();
                let series_quantities = quantity_links
                    .get(&name)
                    .into_iter()
                    .flatten()
                    .filter_map(|q| quantities.get(q).cloned())
                    .collect();
                ExistingSeries {
                    name,
                    index,
                    parameters: series_parameters,
                    quantities: series_quantities,
                }
            })
            .collect();

        debug!(scope = %scope, series = existing.len(), "读取已有序列");
        Ok(existing)
    }

    fn load_research_fields(&self, scope: &str) -> RepositoryResult<Vec<Field>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT field_name, unit, value_type, values_json FROM research_field
            WHERE scope = ?1
            ORDER BY field_name
            "#,
        )?;
        let rows = stmt
            .query_map(params![scope], map_field_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(RawFieldRow::into_field).collect()
    }

    fn persist_series(
        &self,
        scope: &str,
        series: &[NewSeries],
        parameters: &[ParameterDefinition],
        quantities: &[QuantityDefinition],
        research: Option<&ResearchDelta>,
    ) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;
        let now = Utc::now().to_rfc3339();

        for parameter in parameters {
            Self::write_parameter(&tx, scope, parameter)?;
        }

        for quantity in quantities {
            tx.execute(
                r#"
                INSERT INTO quantity_definition (scope, name, quantity_index, abbreviation, value_type, unit)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                ON CONFLICT(scope, name) DO NOTHING
                "#,
                params![
                    scope,
                    quantity.name,
                    quantity.index,
                    quantity.abbreviation,
                    quantity.value_type.to_string(),
                    quantity.unit,
                ],
            )?;
        }

        for new_series in series {
            Self::write_series(&tx, scope, new_series, &now)?;
        }

        if let Some(delta) = research {
            for field in &delta.fields {
                tx.execute(
                    r#"
                    INSERT INTO research_field (scope, research_name, field_name, unit, value_type, values_json, updated_at)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                    ON CONFLICT(scope, field_name) DO UPDATE SET
                        research_name = excluded.research_name,
                        unit = excluded.unit,
                        value_type = excluded.value_type,
                        values_json = excluded.values_json,
                        updated_at = excluded.updated_at
                    "#,
                    params![
                        scope,
                        delta.name,
                        field.name,
                        field.unit,
                        field.value_type.to_string(),
                        serde_json::to_string(&field.values)?,
                        now,
                    ],
                )?;
            }
        }

        tx.commit()?;
        debug!(
            scope = %scope,
            series = series.len(),
            parameters = parameters.len(),
            quantities = quantities.len(),
            research_fields = research.map_or(0, |d| d.fields.len()),
            "元数据增量已持久化"
        );
        Ok(())
    }

    fn save_import_report(&self, report: &ImportReport) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT OR REPLACE INTO import_report (report_id, scope, started_at, finished_at, report_json)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                report.report_id,
                report.scope,
                report.started_at.to_rfc3339(),
                report.finished_at.map(|t| t.to_rfc3339()),
                serde_json::to_string(report)?,
            ],
        )?;
        Ok(())
    }

    fn get_import_report(&self, report_id: &str) -> RepositoryResult<Option<ImportReport>> {
        let conn = self.get_conn()?;
        let json: Option<String> = conn
            .query_row(
                "SELECT report_json FROM import_report WHERE report_id = ?1",
                params![report_id],
                |row| row.get(0),
            )
            .optional()?;
        match json {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_schema;

    fn repo() -> MetadataRepository {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        MetadataRepository::from_connection(Arc::new(Mutex::new(conn)))
    }

    fn voltage(values: &[f64]) -> ParameterDefinition {
        let mut def = ParameterDefinition::new("Voltage", 1, ValueType::Double);
        def.unit = Some("V".to_string());
        def.values = values.iter().map(|v| Value::Double(*v)).collect();
        def
    }

    fn new_series(name: &str, index: u32) -> NewSeries {
        let mut comment = Field::new("Comment", ValueType::String);
        comment.values.push(Value::String("bench".to_string()));
        NewSeries {
            name: name.to_string(),
            index,
            metadata: vec![comment],
            parameter_names: vec!["Voltage".to_string()],
            constant_parameters: Vec::new(),
            quantity_names: vec!["Power".to_string()],
            record_count: 2,
        }
    }

    #[test]
    fn test_persist_and_replay_series() {
        let repo = repo();
        let power = QuantityDefinition::new("Power", 1, ValueType::Double);
        repo.persist_series(
            "Base",
            &[new_series("Dataset/S1", 1)],
            &[voltage(&[1.0, 2.0])],
            &[power.clone()],
            None,
        )
        .unwrap();

        let existing = repo.list_existing_series("Base").unwrap();
        assert_eq!(existing.len(), 1);
        assert_eq!(existing[0].name, "Dataset/S1");
        assert_eq!(existing[0].index, 1);
        assert_eq!(existing[0].parameters, vec![voltage(&[1.0, 2.0])]);
        assert_eq!(existing[0].quantities, vec![power]);

        let fields = repo.load_series_fields("Base", "Dataset/S1").unwrap();
        assert_eq!(fields[0].values, vec![Value::String("bench".to_string())]);

        assert!(repo.list_existing_series("Other").unwrap().is_empty());
    }

    #[test]
    fn test_extended_parameter_keeps_value_indices() {
        let repo = repo();
        repo.persist_series("Base", &[new_series("Dataset/S1", 1)], &[voltage(&[1.0, 2.0])], &[], None)
            .unwrap();
        repo.persist_series("Base", &[new_series("Dataset/S2", 2)], &[voltage(&[1.0, 2.0, 5.0])], &[], None)
            .unwrap();

        let existing = repo.list_existing_series("Base").unwrap();
        let values = &existing[1].parameters[0].values;
        assert_eq!(values.len(), 3);
        assert_eq!(existing[1].parameters[0].value_index(&Value::Double(5.0)), Some(3));
        assert_eq!(existing[0].parameters[0].value_index(&Value::Double(2.0)), Some(2));
    }

    #[test]
    fn test_duplicate_series_rolls_back_whole_call() {
        let repo = repo();
        repo.persist_series("Base", &[new_series("Dataset/S1", 1)], &[voltage(&[1.0])], &[], None)
            .unwrap();

        let err = repo.persist_series(
            "Base",
            &[new_series("Dataset/S2", 2), new_series("Dataset/S1", 3)],
            &[],
            &[],
            None,
        );
        assert!(matches!(err, Err(RepositoryError::UniqueConstraintViolation(_))));
        assert_eq!(repo.list_existing_series("Base").unwrap().len(), 1);
    }

    #[test]
    fn test_research_fields_upsert() {
        let repo = repo();
        let mut author = Field::new("Author", ValueType::String);
        author.values.push(Value::String("Ada".to_string()));
        let delta = ResearchDelta {
            name: "Base/Study".to_string(),
            fields: vec![author.clone()],
        };
        repo.persist_series("Base", &[], &[], &[], Some(&delta)).unwrap();

        author.values = vec![Value::String("Grace".to_string())];
        let delta = ResearchDelta {
            name: "Base/Study".to_string(),
            fields: vec![author.clone()],
        };
        repo.persist_series("Base", &[], &[], &[], Some(&delta)).unwrap();

        assert_eq!(repo.load_research_fields("Base").unwrap(), vec![author]);
    }

    #[test]
    fn test_import_report_round_trip() {
        let repo = repo();
        let mut report = ImportReport::new("r-1", "Base");
        report.series_created.push("Dataset/S1".to_string());
        report.diagnostics.push("表 T 单元格 (2, 1) 字段 Voltage: \"x\" 无法转换为 DOUBLE");
        repo.save_import_report(&report).unwrap();

        assert_eq!(repo.get_import_report("r-1").unwrap(), Some(report));
        assert_eq!(repo.get_import_report("missing").unwrap(), None);
        assert_eq!(repo.list_import_reports("Base").unwrap().len(), 1);
    }
}
