use crate::assembler::{AssemblerOptions, AssemblerState, ChunkedResultAssembler};
use crate::envelope::{ChunkEnvelope, StreamEvent};
use crate::error::{PipelineError, Result};
use crate::export::ExportBatch;
use futures::Stream;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, Notify, mpsc};
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, info, info_span, warn};

/// Options for the delivery task
#[derive(Debug, Clone)]
pub struct StreamOptions {
    /// Events buffered between the task and the consumer
    pub channel_capacity: usize,
    /// Name used in log spans
    pub label: String,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            channel_capacity: 1,
            label: "results".to_string(),
        }
    }
}

struct FeedShared {
    assembler: Mutex<ChunkedResultAssembler>,
    failure: Mutex<Option<String>>,
    notify: Notify,
    attached: AtomicBool,
}

/// Producer handle for one analysis. Each analysis owns its own feed; a feed
/// is never shared between analyses and serves a single consumer.
#[derive(Clone)]
pub struct ResultFeed {
    shared: Arc<FeedShared>,
}

impl ResultFeed {
    pub fn new(options: AssemblerOptions) -> Self {
        Self {
            shared: Arc::new(FeedShared {
                assembler: Mutex::new(ChunkedResultAssembler::new(options)),
                failure: Mutex::new(None),
                notify: Notify::new(),
                attached: AtomicBool::new(false),
            }),
        }
    }

    pub async fn push(&self, batch: ExportBatch) -> Result<()> {
        self.shared.assembler.lock().await.add_results(batch)?;
        self.shared.notify.notify_one();
        Ok(())
    }

    pub async fn complete(&self) -> Result<()> {
        self.shared.assembler.lock().await.mark_complete()?;
        self.shared.notify.notify_one();
        Ok(())
    }

    /// Report an upstream failure. The consumer receives one error event and
    /// the stream closes.
    pub async fn fail(&self, message: impl Into<String>) {
        *self.shared.failure.lock().await = Some(message.into());
        self.shared.notify.notify_one();
    }

    pub async fn is_closed(&self) -> bool {
        self.shared.assembler.lock().await.state() == AssemblerState::Closed
    }

    pub async fn buffered_records(&self) -> usize {
        self.shared.assembler.lock().await.buffered_records()
    }
}

impl Default for ResultFeed {
    fn default() -> Self {
        Self::new(AssemblerOptions::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamOutcome {
    /// The last chunk was delivered
    Completed,
    /// The consumer went away first
    Disconnected,
    /// A failure event was delivered
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamSummary {
    pub outcome: StreamOutcome,
    pub chunks_sent: usize,
    pub records_sent: usize,
}

/// Consumer side of a running stream
pub struct StreamHandle {
    events: mpsc::Receiver<StreamEvent>,
    task: JoinHandle<StreamSummary>,
}

impl StreamHandle {
    pub async fn next_event(&mut self) -> Option<StreamEvent> {
        self.events.recv().await
    }

    /// Stop listening. The producer side is closed and its buffers dropped.
    pub async fn disconnect(self) -> StreamSummary {
        debug!("Consumer disconnecting");
        self.finish().await
    }

    /// Wait for the delivery task after the stream has ended. Anything still
    /// unread is dropped.
    pub async fn finish(self) -> StreamSummary {
        let StreamHandle { events, task } = self;
        drop(events);
        Self::join(task).await
    }

    /// Adapt the event channel into a `Stream`. Dropping the stream
    /// disconnects.
    pub fn into_stream(self) -> impl Stream<Item = StreamEvent> {
        let StreamHandle { events, task: _ } = self;
        futures::stream::unfold(events, |mut rx| async move {
            rx.recv().await.map(|event| (event, rx))
        })
    }

    async fn join(task: JoinHandle<StreamSummary>) -> StreamSummary {
        match task.await {
            Ok(summary) => summary,
            Err(e) => {
                warn!("Result stream task failed: {}", e);
                StreamSummary {
                    outcome: StreamOutcome::Failed,
                    chunks_sent: 0,
                    records_sent: 0,
                }
            }
        }
    }
}

/// Start delivering the feed's chunks.
///
/// The task only pulls a chunk once the consumer has room for it, so chunks
/// are produced at the pace they are read. A `connected` event always comes
/// first; the stream ends after the last chunk, after a failure event, or
/// when the consumer disconnects. In every case the feed is closed and its
/// buffered records are discarded.
///
/// A feed can only be streamed once; a second call fails with a stream error.
pub fn spawn_result_stream(feed: &ResultFeed, options: StreamOptions) -> Result<StreamHandle> {
    if feed.shared.attached.swap(true, Ordering::AcqRel) {
        return Err(PipelineError::stream("result feed already has a consumer"));
    }
    let (tx, rx) = mpsc::channel(options.channel_capacity.max(1));
    let shared = feed.shared.clone();
    let span = info_span!("result_stream", label = %options.label);
    let task = tokio::spawn(drive(shared, tx).instrument(span));
    Ok(StreamHandle { events: rx, task })
}

enum Pull {
    Chunk(ChunkEnvelope),
    Failed(String),
    Disconnected,
}

async fn drive(shared: Arc<FeedShared>, tx: mpsc::Sender<StreamEvent>) -> StreamSummary {
    let mut summary = StreamSummary {
        outcome: StreamOutcome::Disconnected,
        chunks_sent: 0,
        records_sent: 0,
    };

    if tx.send(StreamEvent::Connected).await.is_err() {
        shared.assembler.lock().await.close();
        return summary;
    }
    info!("Consumer connected");

    loop {
        // Consumer readiness gates the next pull
        let permit = match tx.reserve().await {
            Ok(permit) => permit,
            Err(_) => break,
        };

        match next_chunk(&shared, &tx).await {
            Pull::Chunk(envelope) => {
                let records = envelope.records().len();
                let index = envelope.chunk_index;
                permit.send(StreamEvent::Data(envelope));

                let mut assembler = shared.assembler.lock().await;
                if let Err(e) = assembler.complete_drain() {
                    warn!("Could not acknowledge chunk {}: {}", index, e);
                    summary.outcome = StreamOutcome::Failed;
                    break;
                }
                summary.chunks_sent += 1;
                summary.records_sent += records;
                debug!("Sent chunk {} ({} records)", index, records);

                if assembler.is_finished() {
                    summary.outcome = StreamOutcome::Completed;
                    break;
                }
            }
            Pull::Failed(message) => {
                warn!("Result stream failed: {}", message);
                permit.send(StreamEvent::Error { message });
                summary.outcome = StreamOutcome::Failed;
                break;
            }
            Pull::Disconnected => break,
        }
    }

    if summary.outcome == StreamOutcome::Disconnected {
        info!("Consumer disconnected after {} chunks", summary.chunks_sent);
    } else {
        info!(
            "Result stream closed: {} chunks, {} records",
            summary.chunks_sent, summary.records_sent
        );
    }
    shared.assembler.lock().await.close();
    summary
}

async fn next_chunk(shared: &FeedShared, tx: &mpsc::Sender<StreamEvent>) -> Pull {
    loop {
        if let Some(message) = shared.failure.lock().await.take() {
            return Pull::Failed(message);
        }

        match shared.assembler.lock().await.begin_drain() {
            Ok(Some(envelope)) => return Pull::Chunk(envelope),
            Ok(None) => {}
            Err(e) => return Pull::Failed(e.to_string()),
        }

        tokio::select! {
            _ = shared.notify.notified() => {}
            _ = tx.closed() => return Pull::Disconnected,
        }
    }
}
