// ==========================================
// 表格批量导入管道 - 行转换器
// ==========================================
// 职责: 原始行 → 规范记录（字段 key 组织 + 按字段类型规范化）
// 规则:
// - 只读取已映射字段；未映射字段不出现在记录中
// - 行号取表格物理行号（首行表头时 = 文件内位置 + 2）
// - 空单元格 → null；无法规范化的值保留原文本
// 说明: 纯函数，无 I/O
// ==========================================

use crate::domain::record::{CanonicalRecord, RawRow};
use crate::domain::schema::{FieldType, ImportField, ImportTarget};
use crate::importer::column_mapper::ColumnMapping;
use crate::importer::data_cleaner::DataCleaner;
use serde_json::Value;
use tracing::debug;

pub struct RowTransformer {
    cleaner: DataCleaner,
}

impl Default for RowTransformer {
    fn default() -> Self {
        Self::new()
    }
}

impl RowTransformer {
    pub fn new() -> Self {
        Self {
            cleaner: DataCleaner,
        }
    }

    /// 批量转换（保持文件顺序）
    pub fn transform(
        &self,
        target: &ImportTarget,
        rows: &[RawRow],
        mapping: &ColumnMapping,
    ) -> Vec<CanonicalRecord> {
        let records: Vec<CanonicalRecord> = rows
            .iter()
            .map(|row| self.transform_row(target, row, mapping))
            .collect();

        debug!(
            target_id = %target.id,
            rows = records.len(),
            mapped_fields = mapping.len(),
            "行转换完成"
        );
        records
    }

    /// 单行转换
    pub fn transform_row(
        &self,
        target: &ImportTarget,
        row: &RawRow,
        mapping: &ColumnMapping,
    ) -> CanonicalRecord {
        let mut record = CanonicalRecord::new(row.source_row);

        for field in &target.fields {
            let Some(header) = mapping.get(&field.key) else {
                continue;
            };
            let raw = row.cell(header);
            record
                .fields
                .insert(field.key.clone(), self.coerce(field, raw));
        }

        record
    }

    /// 按字段类型规范化单元格值
    pub fn coerce(&self, field: &ImportField, raw: Option<&str>) -> Value {
        let Some(text) = self.cleaner.normalize_null(raw) else {
            return Value::Null;
        };

        match field.field_type {
            FieldType::String | FieldType::Reference => Value::String(text),
            FieldType::Number => match self.cleaner.parse_number(&text) {
                Some(n) => number_value(n).unwrap_or(Value::String(text)),
                None => Value::String(text),
            },
            FieldType::Date => match self.cleaner.parse_date(&text) {
                Some(date) => Value::String(date.format("%Y-%m-%d").to_string()),
                None => Value::String(text),
            },
            FieldType::Enum => match self.cleaner.match_enum(&text, field.options()) {
                Some(option) => Value::String(option.to_string()),
                None => Value::String(text),
            },
        }
    }
}

/// 整数值输出为 JSON 整数
fn number_value(n: f64) -> Option<Value> {
    if n.fract() == 0.0 && n.abs() < 9.0e15 {
        Some(Value::from(n as i64))
    } else {
        serde_json::Number::from_f64(n).map(Value::Number)
    }
}
