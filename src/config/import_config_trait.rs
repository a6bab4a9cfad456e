// ==========================================
// 参数化数据导入 - 导入配置读取 Trait
// ==========================================
// 职责: 定义导入管道所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use std::error::Error;

// ==========================================
// ImportConfigReader Trait
// ==========================================
// 用途: 导入管道所需的配置读取接口
// 实现者: ConfigManager（从 config_kv 表读取）、DefaultImportConfig（全默认值）
pub trait ImportConfigReader: Send + Sync {
    // ===== 分类配置 =====

    /// 获取 Parameter 分类的保留目录名
    ///
    /// # 默认值
    /// - "Parameter"
    fn get_parameter_folder(&self) -> Result<String, Box<dyn Error>>;

    /// 获取 Quantity 分类的保留目录名
    ///
    /// # 默认值
    /// - "Quantity"
    fn get_quantity_folder(&self) -> Result<String, Box<dyn Error>>;

    /// 获取选区路径分隔符
    ///
    /// # 默认值
    /// - "/"
    fn get_path_separator(&self) -> Result<String, Box<dyn Error>>;

    /// 获取序列名前缀目录（序列持久化名为 "<目录>/<序列名>"）
    ///
    /// # 默认值
    /// - "Dataset"
    fn get_dataset_folder(&self) -> Result<String, Box<dyn Error>>;

    // ===== 字段命名配置 =====

    /// 获取参数字段名前缀（抽取时剥离）
    ///
    /// # 默认值
    /// - "P_"
    fn get_parameter_prefix(&self) -> Result<String, Box<dyn Error>>;

    /// 获取量字段名前缀（抽取时剥离）
    ///
    /// # 默认值
    /// - "Q_"
    fn get_quantity_prefix(&self) -> Result<String, Box<dyn Error>>;

    // ===== 读写配置 =====

    /// 获取结果存储缓冲区大小（记录条数，满则自动刷新）
    ///
    /// # 默认值
    /// - 1000
    fn get_result_buffer_size(&self) -> Result<usize, Box<dyn Error>>;

    /// 获取文件表的默认小数分隔符
    ///
    /// # 默认值
    /// - '.'
    fn get_default_decimal_delimiter(&self) -> Result<char, Box<dyn Error>>;

    /// 获取 CSV 字段分隔符
    ///
    /// # 默认值
    /// - ','
    fn get_csv_delimiter(&self) -> Result<u8, Box<dyn Error>>;
}
