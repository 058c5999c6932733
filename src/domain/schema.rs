// ==========================================
// 表格批量导入管道 - 导入目标与字段定义
// ==========================================
// 职责: 描述可导入的实体类型及其字段模式
// 说明: 进程启动时加载一次，之后只读
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// FieldType - 字段类型
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    /// 文本
    String,
    /// 数值
    Number,
    /// 日期
    Date,
    /// 枚举（取值见 enum_options）
    Enum,
    /// 引用其他实体集合（存在性由外部校验服务判定）
    Reference,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Number => "number",
            FieldType::Date => "date",
            FieldType::Enum => "enum",
            FieldType::Reference => "reference",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ==========================================
// ImportField - 导入字段
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportField {
    /// 字段键（目标内唯一）
    pub key: String,
    /// 展示名称
    pub label: String,
    /// 是否必填
    #[serde(default)]
    pub required: bool,
    /// 字段类型
    #[serde(rename = "type")]
    pub field_type: FieldType,
    /// 枚举选项（仅 enum 类型，且非空）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enum_options: Option<Vec<String>>,
}

impl ImportField {
    pub fn new(key: &str, label: &str, required: bool, field_type: FieldType) -> Self {
        Self {
            key: key.to_string(),
            label: label.to_string(),
            required,
            field_type,
            enum_options: None,
        }
    }

    pub fn enumeration(key: &str, label: &str, required: bool, options: &[&str]) -> Self {
        Self {
            key: key.to_string(),
            label: label.to_string(),
            required,
            field_type: FieldType::Enum,
            enum_options: Some(options.iter().map(|o| o.to_string()).collect()),
        }
    }

    /// 枚举选项切片（非 enum 字段返回空）
    pub fn options(&self) -> &[String] {
        self.enum_options.as_deref().unwrap_or(&[])
    }
}

// ==========================================
// ImportTarget - 导入目标
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportTarget {
    /// 目标 ID
    pub id: String,
    /// 展示名称
    pub display_name: String,
    /// 有序字段列表
    pub fields: Vec<ImportField>,
    /// 后端集合名
    pub target_collection_name: String,
}

impl ImportTarget {
    /// 按 key 查找字段
    pub fn field(&self, key: &str) -> Option<&ImportField> {
        self.fields.iter().find(|f| f.key == key)
    }

    /// 必填字段（保持定义顺序）
    pub fn required_fields(&self) -> impl Iterator<Item = &ImportField> {
        self.fields.iter().filter(|f| f.required)
    }
}
