// ==========================================
// 表格批量导入管道 - 配置管理器
// ==========================================
// 职责: 运行配置加载（默认值 → JSON 文件 → 环境变量覆写）
// 说明: 进程启动时加载一次，按引用传递给各组件
// ==========================================

use crate::config::schema_registry::SchemaRegistry;
use crate::importer::error::{ImportError, ImportResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// 默认请求超时（秒）
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// 默认错误预览条数
pub const DEFAULT_ERROR_PREVIEW_LIMIT: usize = 50;

// ==========================================
// PipelineConfig - 管道运行配置
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// 外部校验服务地址（None 时使用本地模式校验）
    pub validate_url: Option<String>,
    /// 外部提交服务地址（None 时写入本地 SQLite）
    pub commit_url: Option<String>,
    /// 单次请求超时（秒）
    pub request_timeout_secs: u64,
    /// 校验摘要中展示的行错误上限
    pub error_preview_limit: usize,
    /// 为 true 时存在无效行即禁止提交
    pub require_all_valid: bool,
    /// 导入目标目录文件（None 时使用内置目录）
    pub schema_path: Option<PathBuf>,
    /// 本地提交库路径
    pub db_path: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            validate_url: None,
            commit_url: None,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            error_preview_limit: DEFAULT_ERROR_PREVIEW_LIMIT,
            require_all_valid: false,
            schema_path: None,
            db_path: None,
        }
    }
}

impl PipelineConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// 本地提交库路径（未配置时使用用户数据目录）
    pub fn resolved_db_path(&self) -> PathBuf {
        self.db_path.clone().unwrap_or_else(get_default_db_path)
    }

    /// 加载导入目标目录
    pub fn load_registry(&self) -> ImportResult<SchemaRegistry> {
        match &self.schema_path {
            Some(path) => SchemaRegistry::from_json_file(path),
            None => Ok(SchemaRegistry::builtin()),
        }
    }
}

// ==========================================
// ConfigManager
// ==========================================
pub struct ConfigManager;

impl ConfigManager {
    /// 加载配置：默认值 → 文件（可选）→ 环境变量
    pub fn load(path: Option<&Path>) -> ImportResult<PipelineConfig> {
        let mut config = match path {
            Some(p) => Self::load_file(p)?,
            None => PipelineConfig::default(),
        };

        Self::apply_overrides(&mut config, |key| std::env::var(key).ok())?;

        info!(
            validate_url = ?config.validate_url,
            commit_url = ?config.commit_url,
            timeout_secs = config.request_timeout_secs,
            require_all_valid = config.require_all_valid,
            "管道配置加载完成"
        );
        Ok(config)
    }

    /// 读取 JSON 配置文件（缺失的键使用默认值）
    pub fn load_file(path: &Path) -> ImportResult<PipelineConfig> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ImportError::Configuration(format!("无法读取配置文件 {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&raw)
            .map_err(|e| ImportError::Configuration(format!("配置文件格式错误: {}", e)))
    }

    /// 应用覆写（lookup 通常为环境变量读取）
    pub fn apply_overrides<F>(config: &mut PipelineConfig, lookup: F) -> ImportResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(v) = get(config_keys::VALIDATE_URL) {
            config.validate_url = Some(v);
        }
        if let Some(v) = get(config_keys::COMMIT_URL) {
            config.commit_url = Some(v);
        }
        if let Some(v) = get(config_keys::TIMEOUT_SECS) {
            config.request_timeout_secs = parse_value(config_keys::TIMEOUT_SECS, &v)?;
        }
        if let Some(v) = get(config_keys::PREVIEW_LIMIT) {
            config.error_preview_limit = parse_value(config_keys::PREVIEW_LIMIT, &v)?;
        }
        if let Some(v) = get(config_keys::REQUIRE_ALL_VALID) {
            config.require_all_valid = parse_bool(config_keys::REQUIRE_ALL_VALID, &v)?;
        }
        if let Some(v) = get(config_keys::SCHEMA_PATH) {
            config.schema_path = Some(PathBuf::from(v));
        }
        if let Some(v) = get(config_keys::DB_PATH) {
            config.db_path = Some(PathBuf::from(v));
        }

        if config.request_timeout_secs == 0 {
            return Err(ImportError::Configuration(
                "request_timeout_secs 必须大于 0".to_string(),
            ));
        }

        debug!(?config, "配置覆写完成");
        Ok(())
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> ImportResult<T> {
    value.parse::<T>().map_err(|_| {
        ImportError::Configuration(format!("配置值格式错误 (key: {}, value: {})", key, value))
    })
}

fn parse_bool(key: &str, value: &str) -> ImportResult<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ImportError::Configuration(format!(
            "配置值格式错误 (key: {}, value: {})",
            key, value
        ))),
    }
}

/// 默认本地提交库路径
pub fn get_default_db_path() -> PathBuf {
    if let Ok(path) = std::env::var(config_keys::DB_PATH) {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return PathBuf::from(trimmed);
        }
    }

    match dirs::data_dir() {
        Some(data_dir) => data_dir.join("tabular-import").join("imports.db"),
        None => PathBuf::from("./tabular_import.db"),
    }
}

// ==========================================
// 配置键（环境变量名）
// ==========================================
pub mod config_keys {
    pub const VALIDATE_URL: &str = "TABULAR_IMPORT_VALIDATE_URL";
    pub const COMMIT_URL: &str = "TABULAR_IMPORT_COMMIT_URL";
    pub const TIMEOUT_SECS: &str = "TABULAR_IMPORT_TIMEOUT_SECS";
    pub const PREVIEW_LIMIT: &str = "TABULAR_IMPORT_PREVIEW_LIMIT";
    pub const REQUIRE_ALL_VALID: &str = "TABULAR_IMPORT_REQUIRE_ALL_VALID";
    pub const SCHEMA_PATH: &str = "TABULAR_IMPORT_SCHEMA_PATH";
    pub const DB_PATH: &str = "TABULAR_IMPORT_DB_PATH";
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.request_timeout_secs, 30);
        assert_eq!(config.error_preview_limit, 50);
        assert!(!config.require_all_valid);
        assert!(config.validate_url.is_none());
    }

    #[test]
    fn test_overrides_applied() {
        let mut config = PipelineConfig::default();
        let lookup = lookup_from(&[
            (config_keys::VALIDATE_URL, "http://localhost:8080/import/validate"),
            (config_keys::PREVIEW_LIMIT, "10"),
            (config_keys::REQUIRE_ALL_VALID, "yes"),
        ]);

        ConfigManager::apply_overrides(&mut config, lookup).unwrap();

        assert_eq!(
            config.validate_url.as_deref(),
            Some("http://localhost:8080/import/validate")
        );
        assert_eq!(config.error_preview_limit, 10);
        assert!(config.require_all_valid);
    }

    #[test]
    fn test_invalid_override_rejected() {
        let mut config = PipelineConfig::default();
        let err = ConfigManager::apply_overrides(
            &mut config,
            lookup_from(&[(config_keys::TIMEOUT_SECS, "soon")]),
        )
        .unwrap_err();
        assert!(matches!(err, ImportError::Configuration(_)));

        let err = ConfigManager::apply_overrides(
            &mut config,
            lookup_from(&[(config_keys::TIMEOUT_SECS, "0")]),
        )
        .unwrap_err();
        assert!(err.to_string().contains("request_timeout_secs"));
    }

    #[test]
    fn test_blank_override_ignored() {
        let mut config = PipelineConfig::default();
        ConfigManager::apply_overrides(&mut config, lookup_from(&[(config_keys::COMMIT_URL, "  ")]))
            .unwrap();
        assert!(config.commit_url.is_none());
    }

    #[test]
    fn test_load_file_partial() {
        use std::io::Write;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"error_preview_limit": 5, "require_all_valid": true}}"#).unwrap();

        let config = ConfigManager::load_file(file.path()).unwrap();
        assert_eq!(config.error_preview_limit, 5);
        assert!(config.require_all_valid);
        assert_eq!(config.request_timeout_secs, DEFAULT_REQUEST_TIMEOUT_SECS);
    }

    #[test]
    fn test_registry_defaults_to_builtin() {
        let registry = PipelineConfig::default().load_registry().unwrap();
        assert!(registry.contains("users"));
    }
}
