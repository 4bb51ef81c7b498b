// End-to-end tests: chunked delivery into the workspace model

use canopy_core::{Analysis, AnalysisError, WorkspaceModel, collect_export, stream_export};
use canopy_stream::{
    AssemblerOptions, ExportBatch, PipelineError, RawAggregateStats, RawRecord, Reassembly,
    ResultFeed, StreamOptions, spawn_result_stream,
};
use chrono::Utc;
use std::sync::{Arc, Mutex};

fn tree(n: usize) -> Vec<RawRecord> {
    (0..n)
        .map(|i| {
            let record = RawRecord::new(format!("n{}", i)).with_text(format!("Page {}", i));
            if i == 0 {
                record
            } else {
                record.with_parent(format!("n{}", (i - 1) / 2))
            }
        })
        .collect()
}

// ============================================================================
// Stream Collection Tests
// ============================================================================

#[tokio::test]
async fn test_stream_export_round_trips_records_and_stats() {
    let stats = RawAggregateStats::default().with_counter("TOTAL_NUM_MEMBERS", 7);
    let batch = ExportBatch::new(tree(1200), Some(stats.clone()));

    let export = stream_export(batch, AssemblerOptions { chunk_size: 500 }, None)
        .await
        .unwrap();

    assert_eq!(export.records.len(), 1200);
    assert_eq!(export.records[0].id, "n0");
    assert_eq!(export.records[1199].id, "n1199");
    assert_eq!(export.stats, Some(stats));
}

#[tokio::test]
async fn test_progress_reported_per_chunk() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_clone = seen.clone();
    let progress: canopy_core::ProgressCallback = Arc::new(move |step: &Reassembly| {
        if let Reassembly::Progress {
            records_received, ..
        } = step
        {
            seen_clone.lock().unwrap().push(*records_received);
        }
    });

    stream_export(
        ExportBatch::new(tree(1200), None),
        AssemblerOptions { chunk_size: 500 },
        Some(progress),
    )
    .await
    .unwrap();

    assert_eq!(*seen.lock().unwrap(), vec![500, 1000]);
}

#[tokio::test]
async fn test_streamed_model_matches_direct_model() {
    let records = tree(777);
    let direct = WorkspaceModel::from_raw(&records);

    let export = stream_export(
        ExportBatch::new(records, None),
        AssemblerOptions { chunk_size: 100 },
        None,
    )
    .await
    .unwrap();
    let streamed = WorkspaceModel::from_export(&export);

    assert_eq!(streamed.summary(), direct.summary());
}

#[tokio::test]
async fn test_empty_export_completes() {
    let export = stream_export(
        ExportBatch::new(Vec::new(), None),
        AssemblerOptions::default(),
        None,
    )
    .await
    .unwrap();
    assert!(export.records.is_empty());
}

#[tokio::test]
async fn test_upstream_failure_surfaces_as_stream_failure() {
    let feed = ResultFeed::new(AssemblerOptions { chunk_size: 10 });
    let handle = spawn_result_stream(&feed, StreamOptions::default()).unwrap();
    feed.push(ExportBatch::new(tree(5), None)).await.unwrap();
    feed.fail("warehouse query timed out").await;

    let err = collect_export(handle, None).await.unwrap_err();
    match err {
        AnalysisError::Pipeline(PipelineError::StreamFailure(message)) => {
            assert!(message.contains("warehouse query timed out"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(feed.is_closed().await);
}

// ============================================================================
// Analysis Tests
// ============================================================================

#[tokio::test]
async fn test_analysis_over_streamed_export() {
    let stats = RawAggregateStats::default()
        .with_counter("TOTAL_NUM_MEMBERS", 10)
        .with_counter("TOTAL_NUM_TEAMSPACES", 2);
    let export = stream_export(
        ExportBatch::new(tree(15), Some(stats)),
        AssemblerOptions { chunk_size: 4 },
        None,
    )
    .await
    .unwrap();

    let analysis = Analysis::run(&export, Utc::now());
    assert_eq!(analysis.model.summary().total_nodes, 15);
    assert_eq!(analysis.model.summary().max_depth, 3);
    assert_eq!(
        analysis.metrics.get("total_num_members").and_then(|v| v.as_f64()),
        Some(10.0)
    );
    assert_eq!(analysis.health.activity_score, None);
    assert!(analysis.health.score.is_finite());
}
