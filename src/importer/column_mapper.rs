// ==========================================
// 表格批量导入管道 - 列映射引擎
// ==========================================
// 职责: 系统字段 → 文件列 的自动建议 / 手工覆写 / 完整性检查
// 规则:
// - 自动映射: 列名（忽略大小写与首尾空白）等于字段 key 或 label，先到先得
// - 完整性: 所有必填字段均映射到非空列名
// 说明: 纯内存操作，无网络调用
// ==========================================

use crate::domain::schema::{ImportField, ImportTarget};
use crate::importer::error::{ImportError, ImportResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

// ==========================================
// ColumnMapping - 映射表
// ==========================================
/// 字段 key → 文件列名；未出现的 key 视为未映射
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColumnMapping {
    entries: BTreeMap<String, String>,
}

impl ColumnMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field_key: &str) -> Option<&str> {
        self.entries.get(field_key).map(String::as_str)
    }

    /// 设置映射；None 或空白列名等同于清除
    pub fn set(&mut self, field_key: &str, header: Option<&str>) {
        match header {
            Some(h) if !h.trim().is_empty() => {
                self.entries.insert(field_key.to_string(), h.to_string());
            }
            _ => {
                self.entries.remove(field_key);
            }
        }
    }

    pub fn clear(&mut self, field_key: &str) {
        self.entries.remove(field_key);
    }

    pub fn is_mapped(&self, field_key: &str) -> bool {
        self.get(field_key).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ==========================================
// AutoMapping - 自动映射结果
// ==========================================
/// 字段匹配到多个列（含重复列名），已取第一个
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ambiguity {
    pub field_key: String,
    pub candidates: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoMapping {
    pub mapping: ColumnMapping,
    pub ambiguities: Vec<Ambiguity>,
}

impl AutoMapping {
    pub fn is_ambiguous(&self) -> bool {
        !self.ambiguities.is_empty()
    }
}

fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

fn header_matches(field: &ImportField, header: &str) -> bool {
    let h = normalize(header);
    !h.is_empty() && (h == normalize(&field.key) || h == normalize(&field.label))
}

/// 自动映射（纯函数，相同输入得到相同结果）
pub fn auto_map(target: &ImportTarget, headers: &[String]) -> AutoMapping {
    let mut mapping = ColumnMapping::new();
    let mut ambiguities = Vec::new();

    for field in &target.fields {
        let candidates: Vec<String> = headers
            .iter()
            .filter(|h| header_matches(field, h))
            .cloned()
            .collect();

        if let Some(first) = candidates.first() {
            mapping.set(&field.key, Some(first));
        }
        if candidates.len() > 1 {
            ambiguities.push(Ambiguity {
                field_key: field.key.clone(),
                candidates,
            });
        }
    }

    debug!(
        target_id = %target.id,
        mapped = mapping.len(),
        fields = target.fields.len(),
        ambiguous = ambiguities.len(),
        "自动映射完成"
    );

    AutoMapping {
        mapping,
        ambiguities,
    }
}

/// 手工覆写（校验字段与列名均存在）
pub fn set_mapping(
    target: &ImportTarget,
    headers: &[String],
    mapping: &mut ColumnMapping,
    field_key: &str,
    header: Option<&str>,
) -> ImportResult<()> {
    if target.field(field_key).is_none() {
        return Err(ImportError::UnknownField(field_key.to_string()));
    }

    if let Some(h) = header.filter(|h| !h.trim().is_empty()) {
        if !headers.iter().any(|existing| existing == h) {
            return Err(ImportError::UnknownColumn(h.to_string()));
        }
    }

    mapping.set(field_key, header);
    Ok(())
}

/// 返回未映射的必填字段 label（按字段定义顺序）
pub fn validate_mapping_complete(target: &ImportTarget, mapping: &ColumnMapping) -> Vec<String> {
    target
        .required_fields()
        .filter(|f| {
            mapping
                .get(&f.key)
                .map(|h| h.trim().is_empty())
                .unwrap_or(true)
        })
        .map(|f| f.label.clone())
        .collect()
}
