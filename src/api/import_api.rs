// ==========================================
// 表格批量导入管道 - 导入 API
// ==========================================
// 职责: 面向操作员的导入门面（目标列表 / 会话操作 / 视图渲染）
// 协作方装配:
// - validate_url 已配置 → HTTP 校验；否则本地模式校验
// - commit_url 已配置 → HTTP 提交；否则写入本地 SQLite
// ==========================================

use crate::api::error::ApiResult;
use crate::api::views::{CommitReport, MappingView, TargetView, ValidationSummary};
use crate::config::{PipelineConfig, SchemaRegistry};
use crate::domain::schema::ImportTarget;
use crate::engine::events::{ImportEventPublisher, OptionalEventPublisher};
use crate::engine::session::{ImportSession, SessionHandle, SessionServices};
use crate::engine::wizard::{ImportWizard, WizardOptions, WizardSnapshot};
use crate::engine::{CommitOrchestrator, ValidationOrchestrator};
use crate::gateway::{
    CommitService, HttpCommitService, HttpValidationService, SchemaValidationService,
    SqliteCommitService, ValidationService,
};
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::file_parser::FileFormat;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// 导入API
pub struct ImportApi {
    registry: Arc<SchemaRegistry>,
    config: PipelineConfig,
    services: SessionServices,
    events: OptionalEventPublisher,
}

impl ImportApi {
    /// 使用指定协作方创建
    pub fn new(
        registry: Arc<SchemaRegistry>,
        config: PipelineConfig,
        validation: Arc<dyn ValidationService>,
        commit: Arc<dyn CommitService>,
    ) -> Self {
        Self {
            registry,
            config,
            services: SessionServices {
                validation: ValidationOrchestrator::new(validation),
                commit: CommitOrchestrator::new(commit),
            },
            events: OptionalEventPublisher::none(),
        }
    }

    /// 按运行配置装配协作方
    pub fn from_config(config: PipelineConfig) -> ImportResult<Self> {
        let registry = Arc::new(config.load_registry()?);
        let timeout = config.request_timeout();

        let validation: Arc<dyn ValidationService> = match &config.validate_url {
            Some(url) => {
                info!(url = %url, "使用远端校验服务");
                Arc::new(HttpValidationService::new(url, timeout)?)
            }
            None => {
                info!("未配置校验服务地址，使用本地模式校验");
                Arc::new(SchemaValidationService::new(registry.clone()))
            }
        };

        let commit: Arc<dyn CommitService> = match &config.commit_url {
            Some(url) => {
                info!(url = %url, "使用远端提交服务");
                Arc::new(HttpCommitService::new(url, timeout)?)
            }
            None => {
                let db_path = config.resolved_db_path();
                info!(db_path = %db_path.display(), "未配置提交服务地址，写入本地数据库");
                Arc::new(SqliteCommitService::open(&db_path, registry.clone())?)
            }
        };

        Ok(Self::new(registry, config, validation, commit))
    }

    pub fn with_events(mut self, publisher: Arc<dyn ImportEventPublisher>) -> Self {
        self.events = OptionalEventPublisher::with_publisher(publisher);
        self
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// 导入目标列表（目录顺序）
    pub fn list_targets(&self) -> Vec<TargetView> {
        self.registry.targets().iter().map(TargetView::from).collect()
    }

    /// 打开导入会话（需在 tokio 运行时内调用）
    pub fn open_session(&self, target_id: &str) -> ApiResult<ImportSessionApi> {
        let options = WizardOptions {
            require_all_valid: self.config.require_all_valid,
        };
        let wizard =
            ImportWizard::new(&self.registry, target_id, options)?.with_events(self.events.clone());
        let target = wizard.target().clone();
        let handle = ImportSession::spawn(wizard, self.services.clone());

        Ok(ImportSessionApi {
            handle,
            target,
            preview_limit: self.config.error_preview_limit,
            require_all_valid: self.config.require_all_valid,
        })
    }
}

// ==========================================
// ImportSessionApi - 单个会话
// ==========================================

pub struct ImportSessionApi {
    handle: SessionHandle,
    target: ImportTarget,
    preview_limit: usize,
    require_all_valid: bool,
}

impl ImportSessionApi {
    pub fn session_id(&self) -> &str {
        self.handle.session_id()
    }

    pub fn target(&self) -> &ImportTarget {
        &self.target
    }

    pub fn handle(&self) -> &SessionHandle {
        &self.handle
    }

    pub async fn upload_file(&self, path: &Path, sheet: Option<&str>) -> ApiResult<MappingView> {
        let snapshot = self
            .handle
            .upload_file(path, sheet.map(str::to_string))
            .await?;
        Ok(self.mapping_of(&snapshot))
    }

    pub async fn upload_bytes(
        &self,
        bytes: Vec<u8>,
        format: FileFormat,
        sheet: Option<&str>,
    ) -> ApiResult<MappingView> {
        let snapshot = self
            .handle
            .upload(bytes, format, sheet.map(str::to_string))
            .await?;
        Ok(self.mapping_of(&snapshot))
    }

    pub async fn set_mapping(&self, field_key: &str, header: Option<&str>) -> ApiResult<MappingView> {
        let snapshot = self.handle.set_mapping(field_key, header).await?;
        Ok(self.mapping_of(&snapshot))
    }

    pub async fn mapping_view(&self) -> ApiResult<MappingView> {
        let snapshot = self.handle.snapshot().await?;
        Ok(self.mapping_of(&snapshot))
    }

    /// 校验并返回摘要
    pub async fn validate(&self) -> ApiResult<ValidationSummary> {
        let snapshot = self.handle.validate().await?;
        self.summary_of(&snapshot)
    }

    pub async fn back_to_mapping(&self) -> ApiResult<MappingView> {
        let snapshot = self.handle.back_to_mapping().await?;
        Ok(self.mapping_of(&snapshot))
    }

    /// 提交 valid 分区并返回报告（计数原样）
    pub async fn commit(&self) -> ApiResult<CommitReport> {
        let snapshot = self.handle.commit().await?;
        let skipped = snapshot
            .validation
            .as_ref()
            .map(|v| v.invalid_rows.len())
            .unwrap_or(0);
        let outcome = snapshot
            .commit
            .as_ref()
            .ok_or_else(|| ImportError::CommitRequest("提交结果缺失".to_string()))?;
        Ok(CommitReport::build(outcome, skipped))
    }

    pub async fn cancel(&self) -> ApiResult<()> {
        self.handle.cancel().await?;
        Ok(())
    }

    pub async fn snapshot(&self) -> ApiResult<WizardSnapshot> {
        Ok(self.handle.snapshot().await?)
    }

    fn mapping_of(&self, snapshot: &WizardSnapshot) -> MappingView {
        MappingView::build(&self.target, snapshot)
    }

    fn summary_of(&self, snapshot: &WizardSnapshot) -> ApiResult<ValidationSummary> {
        let outcome = snapshot
            .validation
            .as_ref()
            .ok_or_else(|| ImportError::ValidationRequest("校验结果缺失".to_string()))?;
        Ok(ValidationSummary::build(
            outcome,
            self.preview_limit,
            self.require_all_valid,
        ))
    }
}
