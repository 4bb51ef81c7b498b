use crate::error::{AnalysisError, Result};
use crate::insights::{HealthReport, assess_health};
use crate::metrics::{MetricValue, MetricsEngine, OrganizationRules, WorkspaceMetrics};
use crate::workspace::WorkspaceModel;
use canopy_stream::{
    AssembledExport, AssemblerOptions, ExportBatch, Reassembly, ResultFeed, ResultReassembler,
    StreamHandle, StreamOptions, spawn_result_stream,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Callback for reporting reassembly progress
pub type ProgressCallback = Arc<dyn Fn(&Reassembly) + Send + Sync>;

/// Read a stream to its last chunk.
///
/// The export is only returned once the last chunk has arrived. A failure
/// event, a protocol violation or a stream that ends early all disconnect and
/// return an error; no partial record set is ever handed back.
pub async fn collect_export(
    mut handle: StreamHandle,
    progress: Option<ProgressCallback>,
) -> Result<AssembledExport> {
    let mut reassembler = ResultReassembler::new();

    while let Some(event) = handle.next_event().await {
        let step = match reassembler.accept(event) {
            Ok(step) => step,
            Err(e) => {
                warn!("Abandoning result stream: {}", e);
                handle.disconnect().await;
                return Err(e.into());
            }
        };

        if let Some(callback) = &progress {
            callback(&step);
        }

        if let Reassembly::Complete(export) = step {
            let summary = handle.finish().await;
            debug!(
                "Result stream finished after {} chunks ({} records)",
                summary.chunks_sent, summary.records_sent
            );
            return Ok(export);
        }
    }

    handle.finish().await;
    Err(AnalysisError::IncompleteStream)
}

/// Push a complete export through the chunked delivery path and read it back
pub async fn stream_export(
    batch: ExportBatch,
    options: AssemblerOptions,
    progress: Option<ProgressCallback>,
) -> Result<AssembledExport> {
    let feed = ResultFeed::new(options);
    let handle = spawn_result_stream(&feed, StreamOptions::default())?;
    feed.push(batch).await?;
    feed.complete().await?;
    collect_export(handle, progress).await
}

/// Everything derived from one reassembled export
#[derive(Debug, Clone)]
pub struct Analysis {
    pub model: WorkspaceModel,
    pub metrics: WorkspaceMetrics,
    pub health: HealthReport,
}

impl Analysis {
    pub fn run(export: &AssembledExport, now: DateTime<Utc>) -> Self {
        Self::run_with(&MetricsEngine::new(), export, now)
    }

    pub fn run_with<R: OrganizationRules>(
        engine: &MetricsEngine<R>,
        export: &AssembledExport,
        now: DateTime<Utc>,
    ) -> Self {
        let model = WorkspaceModel::from_export(export);
        let metrics = engine.compute_all(&model, now);
        let growth = metrics
            .get("monthly_content_growth_rate")
            .unwrap_or(MetricValue::NoSignal);
        let health = assess_health(model.summary(), growth);
        info!(
            "Workspace health {:.2} ({}) across {} pages",
            health.score,
            health.status,
            model.summary().total_nodes
        );

        Self {
            model,
            metrics,
            health,
        }
    }
}
