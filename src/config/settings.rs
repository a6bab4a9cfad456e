// ==========================================
// 参数化数据导入 - 运行期配置快照
// ==========================================
// 职责: 每次运行开始时从 ImportConfigReader 读取一次，之后只读
// ==========================================

use crate::config::config_manager::{config_keys, defaults};
use crate::config::import_config_trait::ImportConfigReader;
use crate::importer::error::{ImportError, ImportResult};
use serde::{Deserialize, Serialize};
use std::error::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportSettings {
    pub parameter_folder: String,
    pub quantity_folder: String,
    pub path_separator: String,
    pub dataset_folder: String,
    pub parameter_prefix: String,
    pub quantity_prefix: String,
    pub result_buffer_size: usize,
    pub default_decimal_delimiter: char,
    pub csv_delimiter: u8,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            parameter_folder: defaults::PARAMETER_FOLDER.to_string(),
            quantity_folder: defaults::QUANTITY_FOLDER.to_string(),
            path_separator: defaults::PATH_SEPARATOR.to_string(),
            dataset_folder: defaults::DATASET_FOLDER.to_string(),
            parameter_prefix: defaults::PARAMETER_PREFIX.to_string(),
            quantity_prefix: defaults::QUANTITY_PREFIX.to_string(),
            result_buffer_size: defaults::RESULT_BUFFER_SIZE,
            default_decimal_delimiter: defaults::DECIMAL_DELIMITER,
            csv_delimiter: defaults::CSV_DELIMITER,
        }
    }
}

impl ImportSettings {
    /// 从配置读取器加载快照
    ///
    /// # 返回
    /// - Err(ImportError::ConfigReadError): 任一配置项读取失败（附带 key）
    pub fn load(reader: &dyn ImportConfigReader) -> ImportResult<Self> {
        Ok(Self {
            parameter_folder: read(config_keys::PARAMETER_FOLDER, reader.get_parameter_folder())?,
            quantity_folder: read(config_keys::QUANTITY_FOLDER, reader.get_quantity_folder())?,
            path_separator: read(config_keys::PATH_SEPARATOR, reader.get_path_separator())?,
            dataset_folder: read(config_keys::DATASET_FOLDER, reader.get_dataset_folder())?,
            parameter_prefix: read(config_keys::PARAMETER_PREFIX, reader.get_parameter_prefix())?,
            quantity_prefix: read(config_keys::QUANTITY_PREFIX, reader.get_quantity_prefix())?,
            result_buffer_size: read(
                config_keys::RESULT_BUFFER_SIZE,
                reader.get_result_buffer_size(),
            )?,
            default_decimal_delimiter: read(
                config_keys::DECIMAL_DELIMITER,
                reader.get_default_decimal_delimiter(),
            )?,
            csv_delimiter: read(config_keys::CSV_DELIMITER, reader.get_csv_delimiter())?,
        })
    }

    /// 序列的持久化名称: "<dataset_folder><sep><series>"
    pub fn series_display_name(&self, series_segment: &str) -> String {
        format!("{}{}{}", self.dataset_folder, self.path_separator, series_segment)
    }
}

fn read<T>(key: &str, result: Result<T, Box<dyn Error>>) -> ImportResult<T> {
    result.map_err(|e| ImportError::ConfigReadError {
        key: key.to_string(),
        message: e.to_string(),
    })
}

// ==========================================
// DefaultImportConfig - 全默认值配置
// ==========================================
// 用途: 内存装配与测试
#[derive(Debug, Clone, Default)]
pub struct DefaultImportConfig;

impl ImportConfigReader for DefaultImportConfig {
    fn get_parameter_folder(&self) -> Result<String, Box<dyn Error>> {
        Ok(defaults::PARAMETER_FOLDER.to_string())
    }

    fn get_quantity_folder(&self) -> Result<String, Box<dyn Error>> {
        Ok(defaults::QUANTITY_FOLDER.to_string())
    }

    fn get_path_separator(&self) -> Result<String, Box<dyn Error>> {
        Ok(defaults::PATH_SEPARATOR.to_string())
    }

    fn get_dataset_folder(&self) -> Result<String, Box<dyn Error>> {
        Ok(defaults::DATASET_FOLDER.to_string())
    }

    fn get_parameter_prefix(&self) -> Result<String, Box<dyn Error>> {
        Ok(defaults::PARAMETER_PREFIX.to_string())
    }

    fn get_quantity_prefix(&self) -> Result<String, Box<dyn Error>> {
        Ok(defaults::QUANTITY_PREFIX.to_string())
    }

    fn get_result_buffer_size(&self) -> Result<usize, Box<dyn Error>> {
        Ok(defaults::RESULT_BUFFER_SIZE)
    }

    fn get_default_decimal_delimiter(&self) -> Result<char, Box<dyn Error>> {
        Ok(defaults::DECIMAL_DELIMITER)
    }

    fn get_csv_delimiter(&self) -> Result<u8, Box<dyn Error>> {
        Ok(defaults::CSV_DELIMITER)
    }
}
