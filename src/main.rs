// ==========================================
// 表格批量导入管道 - 命令行入口
// ==========================================

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::Path;
use tabular_import::api::{CommitReport, ImportApi, MappingView, ValidationSummary};
use tabular_import::cli::{parse_mapping_arg, Cli, Command, OutputFormat};
use tabular_import::config::ConfigManager;
use tabular_import::importer::{auto_map, FileFormat, UniversalFileParser, WorkbookParser};
use tabular_import::logging::{self, LogFormat};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_format = if cli.json_log { LogFormat::Json } else { LogFormat::Pretty };
    logging::init_with(log_format, cli.verbose.then_some("debug"));

    tracing::info!("{} v{}", tabular_import::APP_NAME, tabular_import::VERSION);

    let config = ConfigManager::load(cli.config.as_deref()).context("加载配置失败")?;

    match cli.command {
        Command::Targets { format } => {
            let registry = config.load_registry()?;
            let targets: Vec<_> = registry
                .targets()
                .iter()
                .map(tabular_import::api::TargetView::from)
                .collect();
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&targets)?),
                OutputFormat::Text => {
                    for t in &targets {
                        println!(
                            "{:<12} {:<20} 字段 {:>2}  必填: {}",
                            t.id,
                            t.display_name,
                            t.field_count,
                            t.required_labels.join(", ")
                        );
                    }
                }
            }
        }

        Command::Inspect {
            file,
            target,
            sheet,
        } => inspect(&config, &file, target.as_deref(), sheet.as_deref())?,

        Command::Run {
            file,
            target,
            mappings,
            sheet,
            commit,
            format,
        } => {
            let api = ImportApi::from_config(config)?;
            let session = api.open_session(&target)?;

            let mut view = session.upload_file(&file, sheet.as_deref()).await?;
            for raw in &mappings {
                let Some((key, header)) = parse_mapping_arg(raw) else {
                    bail!("映射参数格式错误: {}（应为 key=列名）", raw);
                };
                view = session.set_mapping(&key, header.as_deref()).await?;
            }
            print_mapping(&view, format)?;

            if !view.ready {
                bail!("必填字段未映射: {}", view.missing_required.join(", "));
            }

            let summary = session.validate().await?;
            print_summary(&summary, format)?;

            if commit {
                if !summary.can_commit {
                    bail!("当前校验结果不允许提交");
                }
                let report = session.commit().await?;
                print_report(&report, format)?;
            }
        }
    }

    Ok(())
}

fn inspect(
    config: &tabular_import::PipelineConfig,
    file: &Path,
    target: Option<&str>,
    sheet: Option<&str>,
) -> Result<()> {
    let format = FileFormat::from_path(file)?;
    let bytes = std::fs::read(file).with_context(|| format!("读取文件失败: {}", file.display()))?;

    if let FileFormat::Workbook(kind) = format {
        let sheets = WorkbookParser { kind }.sheet_names(&bytes)?;
        println!("工作表: {}", sheets.join(", "));
    }

    let parsed = UniversalFileParser.parse(&bytes, format, sheet)?;
    println!("表头行: {}", parsed.header_row);
    println!("数据行: {}", parsed.row_count());
    println!("表头: {}", parsed.headers.join(" | "));

    if let Some(target_id) = target {
        let registry = config.load_registry()?;
        let target = registry.get_target(target_id)?;
        let auto = auto_map(target, &parsed.headers);
        for field in &target.fields {
            let header = auto.mapping.get(&field.key).unwrap_or("-");
            let flag = if field.required { "*" } else { " " };
            println!("{} {:<16} ← {}", flag, field.label, header);
        }
        for ambiguity in &auto.ambiguities {
            println!(
                "! {} 匹配多个列: {}",
                ambiguity.field_key,
                ambiguity.candidates.join(", ")
            );
        }
    }
    Ok(())
}

fn print_mapping(view: &MappingView, format: OutputFormat) -> Result<()> {
    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(view)?);
        return Ok(());
    }
    println!("数据行: {}", view.row_count);
    for row in &view.fields {
        let flag = if row.required { "*" } else { " " };
        let ambiguous = if row.ambiguous { " (多个候选)" } else { "" };
        println!(
            "{} {:<16} ← {}{}",
            flag,
            row.label,
            row.header.as_deref().unwrap_or("-"),
            ambiguous
        );
    }
    Ok(())
}

fn print_summary(summary: &ValidationSummary, format: OutputFormat) -> Result<()> {
    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(summary)?);
        return Ok(());
    }
    println!(
        "校验: 共 {} 行，有效 {}，无效 {}",
        summary.submitted, summary.valid_count, summary.invalid_count
    );
    for err in &summary.system_errors {
        println!("  系统错误: {}", err);
    }
    for row in &summary.error_preview {
        println!("  第 {} 行: {}", row.row_index, row.errors.join("; "));
    }
    if summary.truncated {
        println!("  ……（仅展示前 {} 条）", summary.error_preview.len());
    }
    Ok(())
}

fn print_report(report: &CommitReport, format: OutputFormat) -> Result<()> {
    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }
    println!("{}", report.message);
    for failure in &report.failed_rows {
        println!("  第 {} 行: {}", failure.row_index, failure.error);
    }
    Ok(())
}
