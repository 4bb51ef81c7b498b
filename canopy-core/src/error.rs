use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error(transparent)]
    Pipeline(#[from] canopy_stream::PipelineError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Stream ended before the last chunk arrived")]
    IncompleteStream,
}

pub type Result<T> = std::result::Result<T, AnalysisError>;
