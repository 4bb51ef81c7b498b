use crate::config::{AnalyzeConfig, TriggerConfig};
use anyhow::{Context, Result};
use canopy_core::report::{ReportData, render_report, save_report};
use canopy_core::{Analysis, ProgressCallback, WorkspaceModel, stream_export};
use canopy_stream::{AssemblerOptions, ExportBatch, HexTrigger, Reassembly, ReportTrigger, RunHandle};
use chrono::Utc;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::{Instrument, info, info_span};
use uuid::Uuid;

/// Load an export file (`dataframe_2` records and optional `dataframe_3` stats)
pub fn load_export_from_file(path: &Path) -> Result<ExportBatch> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read export file {}", path.display()))?;
    let batch: ExportBatch = serde_json::from_str(&content)
        .with_context(|| format!("Malformed export file {}", path.display()))?;
    info!(
        "Loaded {} records from {}",
        batch.dataframe_2.len(),
        path.display()
    );
    Ok(batch)
}

/// Graph export plus the creation-time series, as handed to a renderer
pub fn graph_document(model: &WorkspaceModel) -> serde_json::Value {
    let export = model.export_graph();
    serde_json::json!({
        "nodes": export.nodes,
        "links": export.links,
        "timeline": model.timeline(),
    })
}

fn progress_bar(show: bool) -> ProgressBar {
    if !show {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(100);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos:>3}% {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ");
    pb.set_style(style);
    pb.set_message("Waiting for results...");
    pb
}

/// Stream a loaded export through the chunk pipeline and analyse it
pub async fn analyze_batch(
    batch: ExportBatch,
    chunk_size: usize,
    show_progress: bool,
) -> Result<(usize, Analysis)> {
    let pb = progress_bar(show_progress);
    let pb_clone = pb.clone();
    let progress: ProgressCallback = Arc::new(move |step: &Reassembly| match step {
        Reassembly::Connected => pb_clone.set_message("Connected"),
        Reassembly::Progress {
            chunk_index,
            records_received,
            total_records,
            percent,
        } => {
            pb_clone.set_position(percent.round() as u64);
            pb_clone.set_message(format!(
                "chunk {} ({}/{} records)",
                chunk_index, records_received, total_records
            ));
        }
        Reassembly::Complete(export) => {
            pb_clone.set_position(100);
            pb_clone.set_message(format!("{} records received", export.records.len()));
        }
    });

    let streamed = stream_export(batch, AssemblerOptions { chunk_size }, Some(progress)).await;
    pb.finish_and_clear();
    let export = streamed.context("Result stream failed")?;

    let analysis = Analysis::run(&export, Utc::now());
    Ok((export.records.len(), analysis))
}

pub async fn handle_analyze(config: AnalyzeConfig) -> Result<()> {
    let analysis_id = Uuid::new_v4().to_string();
    let span = info_span!("analysis", id = %analysis_id);

    async move {
        let batch = load_export_from_file(&config.input)?;
        let (total_records, analysis) =
            analyze_batch(batch, config.chunk_size, config.show_progress).await?;

        if let Some(path) = &config.graph_out {
            let document = serde_json::to_string_pretty(&graph_document(&analysis.model))?;
            save_report(&document, path)
                .with_context(|| format!("Failed to write graph to {}", path.display()))?;
            if config.show_progress {
                eprintln!(
                    "{} Graph written to {}",
                    "✓".green().bold(),
                    path.display().to_string().bright_white()
                );
            }
        }

        let data = ReportData::new(
            analysis_id.clone(),
            total_records,
            analysis.metrics,
            analysis.health,
        );
        let report = render_report(&data, config.format)?;

        match &config.output {
            Some(path) => {
                save_report(&report, path)
                    .with_context(|| format!("Failed to write report to {}", path.display()))?;
                if config.show_progress {
                    eprintln!(
                        "{} Report written to {}",
                        "✓".green().bold(),
                        path.display().to_string().bright_white()
                    );
                }
            }
            None => print!("{}", report),
        }
        Ok(())
    }
    .instrument(span)
    .await
}

/// Start a report run through any trigger implementation
pub async fn run_trigger<T: ReportTrigger>(trigger: &T, workspace: &str) -> Result<RunHandle> {
    let handle = trigger
        .trigger(workspace)
        .await
        .context("Failed to start report run")?;
    info!("Report run {} started", handle.run_id);
    Ok(handle)
}

pub async fn handle_trigger(config: TriggerConfig) -> Result<RunHandle> {
    let mut trigger = HexTrigger::with_timeout(
        config.project_id.as_str(),
        config.api_token.as_str(),
        config.timeout_secs,
    )?;
    if let Some(base_url) = config.base_url.clone() {
        trigger = trigger.with_base_url(base_url);
    }

    let handle = run_trigger(&trigger, &config.workspace).await?;
    println!(
        "{} Run started: {}",
        "✓".green().bold(),
        handle.run_id.bright_white()
    );
    Ok(handle)
}
