// ==========================================
// 表格批量导入管道 - 核心库
// ==========================================
// 流程: 文件 → 解析 → 列映射 → 行转换 → 校验分区 → 提交有效行
// 技术栈: Tokio + Rust + SQLite / REST 协作方
// 系统定位: 操作员驱动的批量导入向导
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 模式 / 记录 / 结果
pub mod domain;

// 配置层 - 运行配置与导入目标目录
pub mod config;

// 导入层 - 解析 / 映射 / 转换
pub mod importer;

// 协作方 - 校验服务 / 提交服务
pub mod gateway;

// 引擎层 - 编排 / 向导 / 会话
pub mod engine;

// API 层 - 操作员接口
pub mod api;

// 命令行定义
pub mod cli;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// ==========================================
// 重导出核心类型
// ==========================================

pub use api::{ImportApi, ImportSessionApi, OperatorMessage};
pub use config::{ConfigManager, PipelineConfig, SchemaRegistry};
pub use domain::{
    CanonicalRecord, CommitOutcome, FieldType, ImportField, ImportTarget, InvalidRow, ParsedSheet,
    RawRow, RowFailure, ValidationOutcome,
};
pub use engine::{ImportSession, ImportWizard, SessionHandle, WizardStage};
pub use importer::{ColumnMapping, FileFormat, ImportError, ImportResult};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "表格批量导入管道";
