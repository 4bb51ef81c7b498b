// Report generation from computed metrics

use crate::error::Result;
use crate::insights::HealthReport;
use crate::metrics::{MetricGroupKind, MetricValue, WorkspaceMetrics};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;

const RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportFormat {
    Text,
    Json,
    Markdown,
}

impl ReportFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" => Some(ReportFormat::Text),
            "json" => Some(ReportFormat::Json),
            "markdown" | "md" => Some(ReportFormat::Markdown),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportData {
    pub analysis_id: String,
    pub generated_at: DateTime<Utc>,
    pub total_records: usize,
    pub metrics: WorkspaceMetrics,
    pub health: HealthReport,
}

impl ReportData {
    pub fn new(
        analysis_id: impl Into<String>,
        total_records: usize,
        metrics: WorkspaceMetrics,
        health: HealthReport,
    ) -> Self {
        Self {
            analysis_id: analysis_id.into(),
            generated_at: Utc::now(),
            total_records,
            metrics,
            health,
        }
    }

    pub fn with_generated_at(mut self, generated_at: DateTime<Utc>) -> Self {
        self.generated_at = generated_at;
        self
    }
}

pub fn render_report(data: &ReportData, format: ReportFormat) -> Result<String> {
    Ok(match format {
        ReportFormat::Text => generate_text_report(data),
        ReportFormat::Json => generate_json_report(data)?,
        ReportFormat::Markdown => generate_markdown_report(data),
    })
}

pub fn generate_text_report(data: &ReportData) -> String {
    let mut report = String::new();

    report.push_str(RULE);
    report.push_str("                        CANOPY WORKSPACE ANALYSIS REPORT\n");
    report.push_str(RULE);
    report.push('\n');

    report.push_str(&format!("Analysis ID:  {}\n", data.analysis_id));
    report.push_str(&format!("Generated:    {}\n", format_timestamp(&data.generated_at)));
    report.push_str(&format!("Records:      {}\n", data.total_records));
    report.push('\n');

    report.push_str(RULE);
    report.push_str("WORKSPACE HEALTH\n");
    report.push_str(RULE);
    report.push('\n');
    report.push_str(&format!(
        "Health Score: {:.2}  ({})\n\n",
        data.health.score, data.health.status
    ));
    report.push_str(&format!("  Structure     {:>7.2}\n", data.health.structure_score));
    report.push_str(&format!("  Organization  {:>7.2}\n", data.health.organization_score));
    match data.health.activity_score {
        Some(activity) => report.push_str(&format!("  Activity      {:>7.2}\n", activity)),
        None => report.push_str("  Activity          n/a  (no dated pages)\n"),
    }
    report.push('\n');

    if !data.health.recommendations.is_empty() {
        report.push_str("Recommendations:\n");
        for recommendation in &data.health.recommendations {
            report.push_str(&format!("  - {}\n", recommendation));
        }
        report.push('\n');
    }

    for kind in MetricGroupKind::ALL {
        let section = data.metrics.section(kind);
        if section.is_empty() {
            continue;
        }
        report.push_str(RULE);
        report.push_str(&format!("{} METRICS\n", kind.title().to_uppercase()));
        report.push_str(RULE);
        report.push('\n');

        let width = section.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
        for (key, value) in section {
            report.push_str(&format!("  {:<width$}  {}\n", key, value, width = width));
        }
        report.push('\n');
    }

    report.push_str(RULE);
    report.push_str("                          End of Report\n");
    report.push_str(RULE);

    report
}

pub fn generate_json_report(data: &ReportData) -> std::result::Result<String, serde_json::Error> {
    let json_report = serde_json::json!({
        "report": {
            "metadata": {
                "generator": "Canopy",
                "version": env!("CARGO_PKG_VERSION"),
                "generated_at": data.generated_at.to_rfc3339(),
                "format": "json"
            },
            "analysis": {
                "id": data.analysis_id,
                "total_records": data.total_records
            },
            "health": data.health,
            "metrics": data.metrics
        }
    });

    serde_json::to_string_pretty(&json_report)
}

pub fn generate_markdown_report(data: &ReportData) -> String {
    let mut report = String::new();

    report.push_str("# Canopy Workspace Analysis\n\n");
    report.push_str(&format!("- **Analysis ID:** `{}`\n", data.analysis_id));
    report.push_str(&format!(
        "- **Generated:** {}\n",
        format_timestamp(&data.generated_at)
    ));
    report.push_str(&format!("- **Records:** {}\n\n", data.total_records));

    report.push_str("## Health\n\n");
    report.push_str(&format!(
        "**{:.2}** ({})\n\n",
        data.health.score, data.health.status
    ));
    report.push_str("| Score | Value |\n|---|---|\n");
    report.push_str(&format!("| Structure | {:.2} |\n", data.health.structure_score));
    report.push_str(&format!(
        "| Organization | {:.2} |\n",
        data.health.organization_score
    ));
    report.push_str(&format!(
        "| Activity | {} |\n\n",
        data.health
            .activity_score
            .map(|a| format!("{:.2}", a))
            .unwrap_or_else(|| "n/a".to_string())
    ));

    if !data.health.recommendations.is_empty() {
        report.push_str("### Recommendations\n\n");
        for recommendation in &data.health.recommendations {
            report.push_str(&format!("- {}\n", recommendation));
        }
        report.push('\n');
    }

    for kind in MetricGroupKind::ALL {
        let section = data.metrics.section(kind);
        if section.is_empty() {
            continue;
        }
        report.push_str(&format!("## {}\n\n", kind.title()));
        report.push_str("| Metric | Value |\n|---|---|\n");
        for (key, value) in section {
            report.push_str(&format!("| `{}` | {} |\n", key, markdown_value(value)));
        }
        report.push('\n');
    }

    report
}

pub fn save_report(content: &str, path: &Path) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}

fn markdown_value(value: MetricValue) -> String {
    match value {
        MetricValue::NoSignal => "_n/a_".to_string(),
        other => other.to_string(),
    }
}

fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}
