// ==========================================
// 表格批量导入管道 - 导入层
// ==========================================
// 职责: 文件解析 → 列映射 → 行转换
// 支持: CSV / TSV / Excel / ODS
// ==========================================

pub mod column_mapper;
pub mod data_cleaner;
pub mod error;
pub mod file_parser;
pub mod importer_trait;
pub mod row_transformer;

// 重导出核心类型
pub use column_mapper::{
    auto_map, set_mapping, validate_mapping_complete, Ambiguity, AutoMapping, ColumnMapping,
};
pub use data_cleaner::DataCleaner;
pub use error::{ImportError, ImportResult};
pub use file_parser::{DelimitedParser, FileFormat, UniversalFileParser, WorkbookKind, WorkbookParser};
pub use importer_trait::FileParser;
pub use row_transformer::RowTransformer;
