use crate::error::{PipelineError, Result};
use crate::export::{RawAggregateStats, RawRecord};
use serde::{Deserialize, Serialize};

/// Records carried by a single chunk. The aggregate stats are only present
/// on the last chunk of a stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkPayload {
    #[serde(rename = "dataframe_2")]
    pub records: Vec<RawRecord>,
    #[serde(rename = "dataframe_3")]
    pub stats: Option<RawAggregateStats>,
}

/// One unit of incremental transfer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkEnvelope {
    pub data: ChunkPayload,
    /// 1-based position of this chunk in the stream
    #[serde(rename = "currentChunk")]
    pub chunk_index: usize,
    /// Estimate based on the records buffered at emission time
    #[serde(rename = "totalChunks")]
    pub total_chunks_estimate: usize,
    pub records_processed: usize,
    pub total_records: usize,
    pub is_last_chunk: bool,
}

impl ChunkEnvelope {
    pub fn records(&self) -> &[RawRecord] {
        &self.data.records
    }

    pub fn progress_percent(&self) -> f64 {
        if self.total_records == 0 {
            return 100.0;
        }
        self.records_processed as f64 / self.total_records as f64 * 100.0
    }
}

/// Events delivered on the result channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StreamEvent {
    Connected,
    Data(ChunkEnvelope),
    Error { message: String },
}

impl StreamEvent {
    pub fn is_terminal(&self) -> bool {
        match self {
            StreamEvent::Connected => false,
            StreamEvent::Data(envelope) => envelope.is_last_chunk,
            StreamEvent::Error { .. } => true,
        }
    }
}

/// Frame an event as a server-sent-event `data:` line
pub fn encode_sse(event: &StreamEvent) -> Result<String> {
    let json = serde_json::to_string(event)?;
    Ok(format!("data: {}\n\n", json))
}

/// Parse one server-sent-event frame back into an event
pub fn decode_sse(frame: &str) -> Result<StreamEvent> {
    let payload = frame
        .trim()
        .strip_prefix("data:")
        .ok_or_else(|| PipelineError::stream(format!("frame is not a data event: {:?}", frame)))?;
    Ok(serde_json::from_str(payload.trim())?)
}
