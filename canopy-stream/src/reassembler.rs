use crate::envelope::{ChunkEnvelope, StreamEvent};
use crate::error::{PipelineError, Result};
use crate::export::{RawAggregateStats, RawRecord};
use tracing::debug;

/// Every record of a finished stream plus the aggregate stats
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssembledExport {
    pub records: Vec<RawRecord>,
    pub stats: Option<RawAggregateStats>,
}

/// Result of feeding one event to the reassembler
#[derive(Debug, Clone, PartialEq)]
pub enum Reassembly {
    /// Stream opened, nothing received yet
    Connected,
    /// A chunk was accepted; `percent` of the records have arrived
    Progress {
        chunk_index: usize,
        records_received: usize,
        total_records: usize,
        percent: f64,
    },
    /// The last chunk arrived and the export is ready to analyse
    Complete(AssembledExport),
}

/// Consumer side of the chunk protocol.
///
/// Records are appended in arrival order. Stats are only trusted once the
/// last chunk has been seen; nothing is handed out before then, so a partial
/// record set can never be analysed by mistake.
#[derive(Debug, Default)]
pub struct ResultReassembler {
    records: Vec<RawRecord>,
    last_chunk_index: usize,
    finished: bool,
    failed: bool,
}

impl ResultReassembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records_received(&self) -> usize {
        self.records.len()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn accept(&mut self, event: StreamEvent) -> Result<Reassembly> {
        if self.finished || self.failed {
            return Err(PipelineError::stream("event received after the stream ended"));
        }

        match event {
            StreamEvent::Connected => Ok(Reassembly::Connected),
            StreamEvent::Data(envelope) => self.accept_chunk(envelope),
            StreamEvent::Error { message } => Err(self.fail(message)),
        }
    }

    fn accept_chunk(&mut self, envelope: ChunkEnvelope) -> Result<Reassembly> {
        let expected = self.last_chunk_index + 1;
        if envelope.chunk_index != expected {
            return Err(self.fail(format!(
                "expected chunk {} but received chunk {}",
                expected, envelope.chunk_index
            )));
        }

        let received = self.records.len() + envelope.records().len();
        if envelope.records_processed != received {
            return Err(self.fail(format!(
                "chunk {} claims {} records processed but {} were received",
                envelope.chunk_index, envelope.records_processed, received
            )));
        }

        self.last_chunk_index = envelope.chunk_index;
        let percent = envelope.progress_percent();
        let total_records = envelope.total_records;
        let is_last = envelope.is_last_chunk;
        let ChunkEnvelope { data, .. } = envelope;
        self.records.extend(data.records);
        debug!(
            "Accepted chunk {} ({}/{} records)",
            self.last_chunk_index,
            self.records.len(),
            total_records
        );

        if is_last {
            self.finished = true;
            return Ok(Reassembly::Complete(AssembledExport {
                records: std::mem::take(&mut self.records),
                stats: data.stats,
            }));
        }

        Ok(Reassembly::Progress {
            chunk_index: self.last_chunk_index,
            records_received: self.records.len(),
            total_records,
            percent,
        })
    }

    fn fail(&mut self, message: String) -> PipelineError {
        self.failed = true;
        self.records = Vec::new();
        PipelineError::StreamFailure(message)
    }
}
