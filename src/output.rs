use std::path::Path;

use clap::ValueEnum;
use log::info;

use crate::error::Result;
use crate::models::UsageReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Total line followed by comma-separated rows
    Csv,
    /// Serialized report
    Json,
}

pub fn render(report: &UsageReport, format: OutputFormat, pretty: bool) -> Result<String> {
    match format {
        OutputFormat::Csv => Ok(render_csv(report)),
        OutputFormat::Json if pretty => Ok(serde_json::to_string_pretty(report)?),
        OutputFormat::Json => Ok(serde_json::to_string(report)?),
    }
}

/// Write the rendered report to `path`, or to stdout when no path is given.
pub fn write(
    report: &UsageReport,
    format: OutputFormat,
    pretty: bool,
    path: Option<&Path>,
) -> Result<()> {
    let mut rendered = render(report, format, pretty)?;
    if !rendered.ends_with('\n') {
        rendered.push('\n');
    }

    if let Some(path) = path {
        std::fs::write(path, rendered)?;
        info!("Report written to: {}", path.display());
    } else {
        print!("{rendered}");
    }

    Ok(())
}

fn render_csv(report: &UsageReport) -> String {
    let mut lines = vec![
        format!(
            "Total CI minutes used in the past {} days: {}",
            report.days,
            format_minutes(report.total_ci_minutes)
        ),
        "-".repeat(80),
        "Project ID,Project Name,CI Minutes Used".to_string(),
    ];

    lines.extend(report.projects.iter().map(|entry| {
        format!(
            "{},{},{}",
            entry.project_id,
            escape_field(&entry.project_name),
            format_minutes(entry.ci_minutes_used)
        )
    }));

    lines.join("\n")
}

/// Keeps a trailing `.0` on whole values so every row reads as minutes.
fn format_minutes(minutes: f64) -> String {
    if minutes.fract() == 0.0 {
        format!("{minutes:.1}")
    } else {
        minutes.to_string()
    }
}

fn escape_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
