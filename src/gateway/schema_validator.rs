// ==========================================
// 表格批量导入管道 - 本地模式校验器
// ==========================================
// 职责: 离线 / 演练模式下替代远端校验服务
// 范围: 只做模式级检查（必填 / 数值 / 日期 / 枚举 / 引用非空）
// 不含: 引用存在性、唯一性等业务规则（由后端负责）
// ==========================================

use crate::config::SchemaRegistry;
use crate::domain::outcome::{InvalidRow, ValidationOutcome};
use crate::domain::record::CanonicalRecord;
use crate::domain::schema::{FieldType, ImportField, ImportTarget};
use crate::gateway::ValidationService;
use crate::importer::error::ImportResult;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

pub struct SchemaValidationService {
    registry: Arc<SchemaRegistry>,
}

impl SchemaValidationService {
    pub fn new(registry: Arc<SchemaRegistry>) -> Self {
        Self { registry }
    }

    /// 单条记录校验，返回错误列表（空表示通过）
    pub fn check_record(&self, target: &ImportTarget, record: &CanonicalRecord) -> Vec<String> {
        target
            .fields
            .iter()
            .filter_map(|field| check_field(field, record.get(&field.key)))
            .collect()
    }

    /// 整批校验并分区
    pub fn partition(&self, target_id: &str, rows: &[CanonicalRecord]) -> ValidationOutcome {
        let target = match self.registry.get_target(target_id) {
            Ok(t) => t,
            Err(e) => {
                warn!(target_id, error = %e, "校验目标未知");
                // 分区仍需覆盖全部提交行
                return ValidationOutcome {
                    valid_rows: Vec::new(),
                    invalid_rows: rows
                        .iter()
                        .cloned()
                        .map(|r| InvalidRow::from_record(r, vec!["导入目标无效，未执行字段校验".to_string()]))
                        .collect(),
                    system_errors: vec![e.to_string()],
                };
            }
        };

        let mut outcome = ValidationOutcome::default();
        for record in rows {
            let errors = self.check_record(target, record);
            if errors.is_empty() {
                outcome.valid_rows.push(record.clone());
            } else {
                outcome
                    .invalid_rows
                    .push(InvalidRow::from_record(record.clone(), errors));
            }
        }

        info!(
            target_id,
            valid = outcome.valid_rows.len(),
            invalid = outcome.invalid_rows.len(),
            "本地模式校验完成"
        );
        outcome
    }
}

#[async_trait]
impl ValidationService for SchemaValidationService {
    async fn validate(
        &self,
        target_id: &str,
        rows: &[CanonicalRecord],
    ) -> ImportResult<ValidationOutcome> {
        Ok(self.partition(target_id, rows))
    }
}

/// 单字段校验
fn check_field(field: &ImportField, value: Option<&Value>) -> Option<String> {
    let value = match value {
        None | Some(Value::Null) => {
            return field
                .required
                .then(|| format!("{} 为必填项", field.label));
        }
        Some(v) => v,
    };

    match field.field_type {
        FieldType::String => match value {
            Value::String(_) => None,
            other => Some(format!("{}: {} 不是文本", field.label, other)),
        },
        FieldType::Reference => match value {
            Value::String(s) if !s.trim().is_empty() => None,
            other => Some(format!("{}: 引用值无效 {}", field.label, other)),
        },
        FieldType::Number => match value {
            Value::Number(_) => None,
            other => Some(format!("{}: {} 不是有效数字", field.label, display(other))),
        },
        FieldType::Date => match value {
            Value::String(s) if NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok() => None,
            other => Some(format!("{}: {} 不是有效日期", field.label, display(other))),
        },
        FieldType::Enum => match value {
            Value::String(s) if field.options().iter().any(|o| o == s) => None,
            other => Some(format!(
                "{}: {} 不在可选值 [{}] 中",
                field.label,
                display(other),
                field.options().join(", ")
            )),
        },
    }
}

fn display(value: &Value) -> String {
    match value {
        Value::String(s) => format!("'{}'", s),
        other => other.to_string(),
    }
}
