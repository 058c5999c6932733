// ==========================================
// 表格批量导入管道 - 提交编排器
// ==========================================
// 职责: 只提交 valid 分区，原样返回成功 / 失败计数
// 规则:
// - 空批次不调用提交服务，直接返回零计数
// - 允许部分成功，计数不做任何修正
// ==========================================

use crate::domain::outcome::CommitOutcome;
use crate::domain::record::CanonicalRecord;
use crate::gateway::CommitService;
use crate::importer::error::ImportResult;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

#[derive(Clone)]
pub struct CommitOrchestrator {
    service: Arc<dyn CommitService>,
}

impl CommitOrchestrator {
    pub fn new(service: Arc<dyn CommitService>) -> Self {
        Self { service }
    }

    #[instrument(skip(self, valid_rows), fields(rows = valid_rows.len()))]
    pub async fn commit(
        &self,
        target_id: &str,
        valid_rows: &[CanonicalRecord],
    ) -> ImportResult<CommitOutcome> {
        if valid_rows.is_empty() {
            debug!("空批次，跳过提交");
            return Ok(CommitOutcome::default());
        }

        let outcome = self.service.commit(target_id, valid_rows).await?;

        if outcome.success_count + outcome.failure_count != valid_rows.len() {
            warn!(
                submitted = valid_rows.len(),
                success = outcome.success_count,
                failure = outcome.failure_count,
                "提交计数与提交行数不一致"
            );
        }
        info!(
            success = outcome.success_count,
            failure = outcome.failure_count,
            "提交完成"
        );
        Ok(outcome)
    }
}
