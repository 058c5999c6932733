// ==========================================
// 日志系统初始化
// ==========================================
// 使用 tracing 和 tracing-subscriber
// 支持环境变量配置日志级别
// ==========================================

use tracing_subscriber::{fmt, EnvFilter};

/// 日志输出格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// 人类可读（默认）
    #[default]
    Pretty,
    /// 单行 JSON（便于日志采集）
    Json,
}

/// 初始化日志系统
///
/// # 环境变量
/// - RUST_LOG: 日志级别过滤器（默认: info）
///   例如: RUST_LOG=debug 或 RUST_LOG=tabular_import=trace
///
/// # 示例
/// ```no_run
/// use tabular_import::logging;
/// logging::init();
/// ```
pub fn init() {
    init_with(LogFormat::Pretty, None);
}

/// 按格式初始化；verbose 非空时覆盖默认级别（RUST_LOG 优先）
pub fn init_with(format: LogFormat, default_level: Option<&str>) {
    let fallback = default_level.unwrap_or("info");
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    // 日志写 stderr，stdout 留给命令输出
    let builder = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_line_number(true)
        .with_writer(std::io::stderr);

    let _ = match format {
        LogFormat::Pretty => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}

/// 初始化测试环境的日志系统
///
/// 使用更详细的日志级别，便于调试
pub fn init_test() {
    let _ = fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}
