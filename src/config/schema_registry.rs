// ==========================================
// 表格批量导入管道 - 导入目标注册表
// ==========================================
// 职责: 静态导入目标目录（只读查询）
// 来源: 内置目录 或 JSON 目录文件
// 红线: 构造时校验不变量，之后不可变更
// ==========================================

use crate::domain::schema::{FieldType, ImportField, ImportTarget};
use crate::importer::error::{ImportError, ImportResult};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use tracing::info;

/// JSON 目录文件格式: `{ "targets": [ ImportTarget, ... ] }`
#[derive(Debug, Deserialize)]
struct CatalogFile {
    targets: Vec<ImportTarget>,
}

// ==========================================
// SchemaRegistry
// ==========================================
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    targets: Vec<ImportTarget>,
}

impl SchemaRegistry {
    /// 从目标列表构造（校验不变量）
    pub fn new(targets: Vec<ImportTarget>) -> ImportResult<Self> {
        let mut seen_ids = HashSet::new();
        for target in &targets {
            if target.id.trim().is_empty() {
                return Err(ImportError::Configuration("导入目标 id 为空".to_string()));
            }
            if !seen_ids.insert(target.id.as_str()) {
                return Err(ImportError::Configuration(format!(
                    "导入目标 id 重复: {}",
                    target.id
                )));
            }
            validate_target(target)?;
        }

        Ok(Self { targets })
    }

    /// 内置目录
    pub fn builtin() -> Self {
        Self {
            targets: builtin_targets(),
        }
    }

    /// 从 JSON 字符串加载
    pub fn from_json_str(raw: &str) -> ImportResult<Self> {
        let catalog: CatalogFile = serde_json::from_str(raw)
            .map_err(|e| ImportError::Configuration(format!("导入目标目录格式错误: {}", e)))?;
        Self::new(catalog.targets)
    }

    /// 从 JSON 文件加载
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> ImportResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ImportError::Configuration(format!("无法读取导入目标目录 {}: {}", path.display(), e))
        })?;
        let registry = Self::from_json_str(&raw)?;
        info!(path = %path.display(), targets = registry.targets.len(), "导入目标目录加载完成");
        Ok(registry)
    }

    /// 查询导入目标，未知 id 视为配置错误
    pub fn get_target(&self, id: &str) -> ImportResult<&ImportTarget> {
        self.targets
            .iter()
            .find(|t| t.id == id)
            .ok_or_else(|| ImportError::Configuration(format!("未知的导入目标: {}", id)))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.targets.iter().any(|t| t.id == id)
    }

    /// 全部目标（定义顺序）
    pub fn targets(&self) -> &[ImportTarget] {
        &self.targets
    }
}

fn validate_target(target: &ImportTarget) -> ImportResult<()> {
    let mut seen_keys = HashSet::new();
    for field in &target.fields {
        if field.key.trim().is_empty() {
            return Err(ImportError::Configuration(format!(
                "导入目标 {} 存在空字段键",
                target.id
            )));
        }
        if !seen_keys.insert(field.key.as_str()) {
            return Err(ImportError::Configuration(format!(
                "导入目标 {} 字段键重复: {}",
                target.id, field.key
            )));
        }
        if field.field_type == FieldType::Enum && field.options().is_empty() {
            return Err(ImportError::Configuration(format!(
                "导入目标 {} 的枚举字段 {} 未定义选项",
                target.id, field.key
            )));
        }
    }
    Ok(())
}

// ==========================================
// 内置目录
// ==========================================
fn builtin_targets() -> Vec<ImportTarget> {
    vec![
        ImportTarget {
            id: "users".to_string(),
            display_name: "用户".to_string(),
            fields: vec![
                ImportField::new("name", "Full Name", true, FieldType::String),
                ImportField::new("email", "Email", true, FieldType::String),
                ImportField::enumeration("role", "Role", false, &["admin", "operator", "viewer"]),
                ImportField::new("site", "Site", false, FieldType::Reference),
                ImportField::new("phone", "Phone", false, FieldType::String),
            ],
            target_collection_name: "users".to_string(),
        },
        ImportTarget {
            id: "tickets".to_string(),
            display_name: "工单".to_string(),
            fields: vec![
                ImportField::new("title", "Title", true, FieldType::String),
                ImportField::new("description", "Description", false, FieldType::String),
                ImportField::enumeration("priority", "Priority", true, &["low", "medium", "high", "critical"]),
                ImportField::enumeration("status", "Status", false, &["open", "in_progress", "resolved", "closed"]),
                ImportField::new("site", "Site", true, FieldType::Reference),
                ImportField::new("assignee", "Assignee", false, FieldType::Reference),
                ImportField::new("due_date", "Due Date", false, FieldType::Date),
            ],
            target_collection_name: "tickets".to_string(),
        },
        ImportTarget {
            id: "readings".to_string(),
            display_name: "读数".to_string(),
            fields: vec![
                ImportField::new("meter", "Meter", true, FieldType::Reference),
                ImportField::new("value", "Value", true, FieldType::Number),
                ImportField::new("read_at", "Reading Date", true, FieldType::Date),
                ImportField::enumeration("unit", "Unit", false, &["kWh", "m3", "L"]),
                ImportField::new("note", "Note", false, FieldType::String),
            ],
            target_collection_name: "meter_readings".to_string(),
        },
    ]
}
