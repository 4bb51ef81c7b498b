use thiserror::Error;

/// Why the report trigger was rejected upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamFailureKind {
    /// The API token was refused (401/403)
    InvalidCredential,
    /// The project or workspace does not exist (404)
    NotFound,
    /// Any other upstream or transport failure
    Upstream,
}

impl UpstreamFailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpstreamFailureKind::InvalidCredential => "invalid credential",
            UpstreamFailureKind::NotFound => "project or workspace not found",
            UpstreamFailureKind::Upstream => "upstream failure",
        }
    }
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Report trigger failed ({}): {detail}", .kind.as_str())]
    UpstreamTrigger {
        kind: UpstreamFailureKind,
        status: Option<u16>,
        detail: String,
    },

    #[error("Stream failure: {0}")]
    StreamFailure(String),
}

impl PipelineError {
    pub fn upstream(kind: UpstreamFailureKind, status: Option<u16>, detail: impl Into<String>) -> Self {
        PipelineError::UpstreamTrigger {
            kind,
            status,
            detail: detail.into(),
        }
    }

    pub fn stream(message: impl Into<String>) -> Self {
        PipelineError::StreamFailure(message.into())
    }
}

impl From<reqwest::Error> for PipelineError {
    fn from(err: reqwest::Error) -> Self {
        let status = err.status().map(|s| s.as_u16());
        PipelineError::upstream(UpstreamFailureKind::Upstream, status, err.to_string())
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        PipelineError::StreamFailure(format!("malformed envelope: {}", err))
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
