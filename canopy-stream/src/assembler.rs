use crate::envelope::{ChunkEnvelope, ChunkPayload};
use crate::error::{PipelineError, Result};
use crate::export::{ExportBatch, RawAggregateStats, RawRecord};
use tracing::debug;

pub const DEFAULT_CHUNK_SIZE: usize = 500;

/// Options for configuring an assembler
#[derive(Debug, Clone)]
pub struct AssemblerOptions {
    pub chunk_size: usize,
}

impl Default for AssemblerOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssemblerState {
    /// No chunk is being emitted
    Idle,
    /// A chunk has been handed out and not yet acknowledged
    Draining,
    /// Terminal, all buffered state has been discarded
    Closed,
}

/// Producer side of a chunked result stream.
///
/// Records are buffered as the report delivers them and handed out in
/// fixed-size chunks. At most one chunk is in flight: `begin_drain` returns
/// `None` until the previous chunk is acknowledged with `complete_drain`, so
/// an extra drain request can never emit a chunk twice or skip one.
#[derive(Debug)]
pub struct ChunkedResultAssembler {
    records: Vec<RawRecord>,
    stats: Option<RawAggregateStats>,
    chunk_size: usize,
    last_processed: usize,
    chunks_emitted: usize,
    in_flight: usize,
    in_flight_last: bool,
    complete: bool,
    final_emitted: bool,
    state: AssemblerState,
}

impl ChunkedResultAssembler {
    pub fn new(options: AssemblerOptions) -> Self {
        Self {
            records: Vec::new(),
            stats: None,
            chunk_size: options.chunk_size.max(1),
            last_processed: 0,
            chunks_emitted: 0,
            in_flight: 0,
            in_flight_last: false,
            complete: false,
            final_emitted: false,
            state: AssemblerState::Idle,
        }
    }

    pub fn state(&self) -> AssemblerState {
        self.state
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn buffered_records(&self) -> usize {
        self.records.len()
    }

    pub fn records_processed(&self) -> usize {
        self.last_processed
    }

    /// The last chunk went out and the producer had nothing more to add
    pub fn is_finished(&self) -> bool {
        self.final_emitted || self.state == AssemblerState::Closed
    }

    /// Append a batch of report output. Stats replace any earlier stats.
    pub fn add_results(&mut self, batch: ExportBatch) -> Result<()> {
        self.ensure_open()?;
        debug!(
            "Buffering {} records (stats: {})",
            batch.dataframe_2.len(),
            batch.dataframe_3.is_some()
        );
        self.records.extend(batch.dataframe_2);
        if let Some(stats) = batch.dataframe_3 {
            self.stats = Some(stats);
        }
        Ok(())
    }

    /// The producer has delivered everything it is going to deliver
    pub fn mark_complete(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.complete = true;
        Ok(())
    }

    /// Hand out the next chunk, if one is available and none is in flight
    pub fn begin_drain(&mut self) -> Result<Option<ChunkEnvelope>> {
        match self.state {
            AssemblerState::Closed => return Err(PipelineError::stream("assembler is closed")),
            AssemblerState::Draining => return Ok(None),
            AssemblerState::Idle => {}
        }

        let total = self.records.len();
        let start = self.last_processed;
        let end = (start + self.chunk_size).min(total);

        // A finished export with nothing left still owes the consumer a last chunk
        let empty_final = start >= total && self.is_settled() && !self.final_emitted;
        if start >= total && !empty_final {
            return Ok(None);
        }

        // Until the producer is done the tail may still grow, so only full
        // chunks go out and none of them can be the last
        let settled = self.is_settled();
        if !settled && end - start < self.chunk_size {
            return Ok(None);
        }

        let is_last_chunk = settled && start + self.chunk_size >= total;
        let envelope = ChunkEnvelope {
            data: ChunkPayload {
                records: self.records[start..end].to_vec(),
                stats: if is_last_chunk { self.stats.clone() } else { None },
            },
            chunk_index: self.chunks_emitted + 1,
            total_chunks_estimate: total.div_ceil(self.chunk_size).max(1),
            records_processed: end,
            total_records: total,
            is_last_chunk,
        };

        self.in_flight = end - start;
        self.in_flight_last = is_last_chunk;
        self.state = AssemblerState::Draining;
        debug!(
            "Draining chunk {} ({} records, last: {})",
            envelope.chunk_index,
            self.in_flight,
            is_last_chunk
        );
        Ok(Some(envelope))
    }

    /// Acknowledge the chunk handed out by the last `begin_drain`
    pub fn complete_drain(&mut self) -> Result<()> {
        match self.state {
            AssemblerState::Closed => Err(PipelineError::stream("assembler is closed")),
            AssemblerState::Idle => Err(PipelineError::stream("no chunk is being drained")),
            AssemblerState::Draining => {
                self.last_processed += self.in_flight;
                self.in_flight = 0;
                self.chunks_emitted += 1;
                self.state = AssemblerState::Idle;
                // Nothing may follow the last chunk
                if self.in_flight_last {
                    self.final_emitted = true;
                    self.close();
                }
                Ok(())
            }
        }
    }

    /// Drop everything buffered. No further chunks are produced.
    pub fn close(&mut self) {
        if self.state == AssemblerState::Closed {
            return;
        }
        debug!(
            "Closing assembler after {} chunks, discarding {} undelivered records",
            self.chunks_emitted,
            self.records.len().saturating_sub(self.last_processed)
        );
        self.records = Vec::new();
        self.stats = None;
        self.in_flight = 0;
        self.state = AssemblerState::Closed;
    }

    /// Stats only arrive with the final batch, so either signal ends the export
    fn is_settled(&self) -> bool {
        self.complete || self.stats.is_some()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.state == AssemblerState::Closed {
            return Err(PipelineError::stream("assembler is closed"));
        }
        Ok(())
    }
}

impl Default for ChunkedResultAssembler {
    fn default() -> Self {
        Self::new(AssemblerOptions::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records(n: usize) -> Vec<RawRecord> {
        (0..n).map(|i| RawRecord::new(format!("r{}", i))).collect()
    }

    fn drain_all(assembler: &mut ChunkedResultAssembler) -> Vec<ChunkEnvelope> {
        let mut out = Vec::new();
        while !assembler.is_finished() {
            let Some(envelope) = assembler.begin_drain().unwrap() else {
                break;
            };
            assembler.complete_drain().unwrap();
            out.push(envelope);
        }
        out
    }

    #[test]
    fn test_1200_records_emit_three_chunks() {
        let mut assembler = ChunkedResultAssembler::default();
        let stats = RawAggregateStats::default().with_counter("TOTAL_NUM_MEMBERS", 4);
        assembler
            .add_results(ExportBatch::new(records(1200), Some(stats.clone())))
            .unwrap();

        let chunks = drain_all(&mut assembler);
        let sizes: Vec<usize> = chunks.iter().map(|c| c.records().len()).collect();
        assert_eq!(sizes, vec![500, 500, 200]);

        let processed: Vec<usize> = chunks.iter().map(|c| c.records_processed).collect();
        assert_eq!(processed, vec![500, 1000, 1200]);

        let last_flags: Vec<bool> = chunks.iter().map(|c| c.is_last_chunk).collect();
        assert_eq!(last_flags, vec![false, false, true]);

        assert!(chunks[0].data.stats.is_none());
        assert!(chunks[1].data.stats.is_none());
        assert_eq!(chunks[2].data.stats, Some(stats));

        let indices: Vec<usize> = chunks.iter().map(|c| c.chunk_index).collect();
        assert_eq!(indices, vec![1, 2, 3]);
        assert!(chunks.iter().all(|c| c.total_chunks_estimate == 3));
    }

    #[test]
    fn test_drain_in_flight_is_a_no_op() {
        let mut assembler = ChunkedResultAssembler::default();
        assembler.add_results(ExportBatch::new(records(600), None)).unwrap();

        let first = assembler.begin_drain().unwrap().unwrap();
        assert_eq!(assembler.state(), AssemblerState::Draining);
        assert!(assembler.begin_drain().unwrap().is_none());

        assembler.complete_drain().unwrap();
        assembler.mark_complete().unwrap();
        let second = assembler.begin_drain().unwrap().unwrap();
        assert_eq!(assembler.state(), AssemblerState::Draining);
        assert!(assembler.begin_drain().unwrap().is_none());

        assert_eq!(first.chunk_index, 1);
        assert_eq!(second.chunk_index, 2);
        assert_eq!(second.records()[0].id, "r500");
        assert_eq!(second.records().len(), 100);
        assert!(second.is_last_chunk);
    }

    #[test]
    fn test_nothing_to_drain_until_results_arrive() {
        let mut assembler = ChunkedResultAssembler::default();
        assert!(assembler.begin_drain().unwrap().is_none());
        assert_eq!(assembler.state(), AssemblerState::Idle);

        assembler.add_results(ExportBatch::new(records(3), None)).unwrap();
        assert!(assembler.begin_drain().unwrap().is_none());

        assembler.mark_complete().unwrap();
        let chunk = assembler.begin_drain().unwrap().unwrap();
        assert!(chunk.is_last_chunk);
        assert_eq!(chunk.total_records, 3);
    }

    #[test]
    fn test_partial_tail_waits_for_late_records() {
        let mut assembler = ChunkedResultAssembler::new(AssemblerOptions { chunk_size: 4 });
        assembler.add_results(ExportBatch::new(records(2), None)).unwrap();
        assert!(drain_all(&mut assembler).is_empty());

        assembler.add_results(ExportBatch::new(records(3), None)).unwrap();
        let full = drain_all(&mut assembler);
        assert_eq!(full.len(), 1);
        assert_eq!(full[0].records().len(), 4);
        assert!(!full[0].is_last_chunk);

        assembler.mark_complete().unwrap();
        let tail = drain_all(&mut assembler);
        assert_eq!(tail.len(), 1);
        assert_eq!(tail[0].records().len(), 1);
        assert_eq!(tail[0].records_processed, 5);
        assert_eq!(tail[0].chunk_index, 2);
        assert!(tail[0].is_last_chunk);
        assert!(assembler.is_finished());
    }

    #[test]
    fn test_full_chunk_before_completion_is_not_last() {
        let mut assembler = ChunkedResultAssembler::new(AssemblerOptions { chunk_size: 5 });
        assembler.add_results(ExportBatch::new(records(5), None)).unwrap();
        let chunk = assembler.begin_drain().unwrap().unwrap();
        assert!(!chunk.is_last_chunk);
        assembler.complete_drain().unwrap();
        assert!(!assembler.is_finished());

        assembler.mark_complete().unwrap();
        let last = assembler.begin_drain().unwrap().unwrap();
        assert!(last.is_last_chunk);
        assert!(last.records().is_empty());
        assert_eq!(last.records_processed, 5);
        assert_eq!(last.chunk_index, 2);
        assembler.complete_drain().unwrap();
        assert!(assembler.is_finished());
    }

    #[test]
    fn test_complete_empty_export_emits_single_final_chunk() {
        let mut assembler = ChunkedResultAssembler::default();
        assert!(assembler.begin_drain().unwrap().is_none());

        assembler.mark_complete().unwrap();
        let chunks = drain_all(&mut assembler);
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].is_last_chunk);
        assert!(chunks[0].records().is_empty());
        assert!(chunks[0].data.stats.is_none());
        assert!(assembler.is_finished());
    }

    #[test]
    fn test_stats_arriving_after_full_chunks_end_the_export() {
        let mut assembler = ChunkedResultAssembler::new(AssemblerOptions { chunk_size: 5 });
        assembler.add_results(ExportBatch::new(records(10), None)).unwrap();
        assert_eq!(drain_all(&mut assembler).len(), 2);
        assert!(!assembler.is_finished());

        let stats = RawAggregateStats::default().with_counter("TOTAL_NUM_BOTS", 1);
        assembler
            .add_results(ExportBatch::new(Vec::new(), Some(stats.clone())))
            .unwrap();
        let chunks = drain_all(&mut assembler);
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].is_last_chunk);
        assert_eq!(chunks[0].data.stats, Some(stats));
        assert_eq!(chunks[0].records_processed, 10);
        assert!(assembler.is_finished());
    }

    #[test]
    fn test_close_discards_state_and_rejects_further_work() {
        let mut assembler = ChunkedResultAssembler::default();
        assembler.add_results(ExportBatch::new(records(700), None)).unwrap();
        assembler.begin_drain().unwrap();

        assembler.close();
        assert_eq!(assembler.state(), AssemblerState::Closed);
        assert_eq!(assembler.buffered_records(), 0);
        assert!(assembler.begin_drain().is_err());
        assert!(assembler.complete_drain().is_err());
        assert!(assembler.add_results(ExportBatch::default()).is_err());
    }

    #[test]
    fn test_nothing_follows_the_last_chunk() {
        let mut assembler = ChunkedResultAssembler::default();
        assembler.add_results(ExportBatch::new(records(1), None)).unwrap();
        assembler.mark_complete().unwrap();

        let chunks = drain_all(&mut assembler);
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].is_last_chunk);
        assert!(assembler.is_finished());
        assert_eq!(assembler.state(), AssemblerState::Closed);
        assert_eq!(assembler.records_processed(), 1);

        assert!(assembler.add_results(ExportBatch::new(records(1), None)).is_err());
        assert!(assembler.mark_complete().is_err());
        assert!(assembler.begin_drain().is_err());
    }

    #[test]
    fn test_complete_without_drain_is_an_error() {
        let mut assembler = ChunkedResultAssembler::default();
        assert!(assembler.complete_drain().is_err());
    }
}
