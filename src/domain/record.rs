// ==========================================
// 表格批量导入管道 - 行记录类型
// ==========================================
// 职责: 解析后的原始行 / 转换后的规范记录
// ==========================================

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// 原始行（单元格值均为文本，键为文件列名）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRow {
    /// 数据行序号（1 起，不含表头）
    pub row_index: usize,
    /// 表格中的物理行号（1 起，含表头），用于回指操作员看到的行
    pub source_row: usize,
    /// 列名 → 原始值
    pub cells: HashMap<String, String>,
}

impl RawRow {
    pub fn cell(&self, header: &str) -> Option<&str> {
        self.cells.get(header).map(String::as_str)
    }
}

/// 文件解析结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedSheet {
    /// 表头（原样保留，可能重复）
    pub headers: Vec<String>,
    /// 数据行（文件顺序）
    pub rows: Vec<RawRow>,
    /// 表头所在的物理行号（1 起）
    pub header_row: usize,
    /// 来源工作表名（CSV 为 None）
    pub sheet_name: Option<String>,
}

impl ParsedSheet {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// 规范记录（按系统字段键组织）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalRecord {
    /// 操作员可见的行号
    pub row_index: usize,
    /// 字段键 → 转换后的值
    pub fields: BTreeMap<String, serde_json::Value>,
}

impl CanonicalRecord {
    pub fn new(row_index: usize) -> Self {
        Self {
            row_index,
            fields: BTreeMap::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.fields.get(key)
    }
}
