// ==========================================
// 表格批量导入管道 - 配置层
// ==========================================
// 职责: 运行配置 + 导入目标目录
// 说明: 启动时加载一次，之后只读
// ==========================================

pub mod config_manager;
pub mod schema_registry;

pub use config_manager::{config_keys, get_default_db_path, ConfigManager, PipelineConfig};
pub use schema_registry::SchemaRegistry;
