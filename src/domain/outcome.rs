// ==========================================
// 表格批量导入管道 - 校验/提交结果
// ==========================================

use crate::domain::record::CanonicalRecord;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 校验未通过的行（附行级错误）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidRow {
    pub row_index: usize,
    #[serde(default)]
    pub fields: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub errors: Vec<String>,
}

impl InvalidRow {
    pub fn from_record(record: CanonicalRecord, errors: Vec<String>) -> Self {
        Self {
            row_index: record.row_index,
            fields: record.fields,
            errors,
        }
    }
}

/// 校验结果：valid / invalid 两个分区互斥且覆盖全部提交行
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationOutcome {
    #[serde(default)]
    pub valid_rows: Vec<CanonicalRecord>,
    #[serde(default)]
    pub invalid_rows: Vec<InvalidRow>,
    /// 与具体行无关的校验器级错误
    #[serde(default)]
    pub system_errors: Vec<String>,
}

impl ValidationOutcome {
    pub fn total(&self) -> usize {
        self.valid_rows.len() + self.invalid_rows.len()
    }

    pub fn has_invalid(&self) -> bool {
        !self.invalid_rows.is_empty()
    }
}

/// 单行提交失败
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowFailure {
    pub row_index: usize,
    pub error: String,
}

/// 提交结果（允许部分成功）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitOutcome {
    pub success_count: usize,
    pub failure_count: usize,
    /// 逐行失败明细（外部服务未提供时为空）
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed_rows: Vec<RowFailure>,
}

impl CommitOutcome {
    pub fn is_partial(&self) -> bool {
        self.success_count > 0 && self.failure_count > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_outcome_wire_format() {
        let json = r#"{
            "validRows": [{"rowIndex": 2, "fields": {"email": "a@b.c"}}],
            "invalidRows": [{"rowIndex": 3, "fields": {}, "errors": ["Email 为空"]}]
        }"#;
        let outcome: ValidationOutcome = serde_json::from_str(json).unwrap();

        assert_eq!(outcome.total(), 2);
        assert!(outcome.system_errors.is_empty());
        assert_eq!(outcome.invalid_rows[0].errors, vec!["Email 为空".to_string()]);
    }

    #[test]
    fn test_commit_outcome_without_failed_rows() {
        let outcome: CommitOutcome =
            serde_json::from_str(r#"{"successCount": 7, "failureCount": 1}"#).unwrap();

        assert_eq!(outcome.success_count, 7);
        assert_eq!(outcome.failure_count, 1);
        assert!(outcome.failed_rows.is_empty());
        assert!(outcome.is_partial());
    }
}
