//! Wire shapes, chunked delivery and report triggering for Canopy.
//!
//! A report run is started through a [`ReportTrigger`]. Its output is fed to a
//! [`ResultFeed`], delivered to the consumer in bounded chunks by
//! [`spawn_result_stream`], and put back together by a [`ResultReassembler`].

pub mod assembler;
pub mod envelope;
pub mod error;
pub mod export;
pub mod reassembler;
pub mod stream;
pub mod trigger;

pub use assembler::{AssemblerOptions, AssemblerState, ChunkedResultAssembler, DEFAULT_CHUNK_SIZE};
pub use envelope::{ChunkEnvelope, ChunkPayload, StreamEvent, decode_sse, encode_sse};
pub use error::{PipelineError, Result, UpstreamFailureKind};
pub use export::{CreatedTime, ExportBatch, RawAggregateStats, RawRecord};
pub use reassembler::{AssembledExport, Reassembly, ResultReassembler};
pub use stream::{
    ResultFeed, StreamHandle, StreamOptions, StreamOutcome, StreamSummary, spawn_result_stream,
};
pub use trigger::{HexTrigger, ReportTrigger, RunHandle};
