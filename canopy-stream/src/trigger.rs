use crate::error::{PipelineError, Result, UpstreamFailureKind};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://app.hex.tech";

/// Identifier of a report run started upstream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunHandle {
    pub run_id: String,
    /// Full upstream response, kept for diagnostics
    pub raw: Value,
}

/// Starts a report run for a workspace
pub trait ReportTrigger {
    fn trigger(&self, workspace_id: &str) -> impl Future<Output = Result<RunHandle>> + Send;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RunRequest<'a> {
    input_params: InputParams<'a>,
    update_published_results: bool,
    use_cached_sql_results: bool,
}

#[derive(Serialize)]
struct InputParams<'a> {
    #[serde(rename = "_input_text")]
    input_text: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RunResponse {
    run_id: Option<String>,
}

/// Trigger backed by the Hex project run API
pub struct HexTrigger {
    client: Client,
    base_url: Url,
    project_id: String,
    api_token: String,
}

impl HexTrigger {
    pub fn new(project_id: impl Into<String>, api_token: impl Into<String>) -> Result<Self> {
        Self::with_timeout(project_id, api_token, 30)
    }

    pub fn with_timeout(
        project_id: impl Into<String>,
        api_token: impl Into<String>,
        timeout_secs: u64,
    ) -> Result<Self> {
        let (timeout, connect_timeout) = client_timeouts(timeout_secs);
        let client = Client::builder()
            .user_agent("Canopy/0.1 (https://github.com/trapdoorsec/canopy)")
            .timeout(timeout)
            .connect_timeout(connect_timeout)
            .build()?;
        let base_url = Url::parse(DEFAULT_BASE_URL)
            .map_err(|e| PipelineError::InvalidInput(format!("Invalid base URL: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            project_id: project_id.into(),
            api_token: api_token.into(),
        })
    }

    pub fn with_base_url(mut self, base_url: Url) -> Self {
        self.base_url = base_url;
        self
    }

    fn run_url(&self) -> Result<Url> {
        self.base_url
            .join(&format!("api/v1/project/{}/run", self.project_id))
            .map_err(|e| PipelineError::InvalidInput(format!("Invalid project id: {}", e)))
    }
}

impl ReportTrigger for HexTrigger {
    async fn trigger(&self, workspace_id: &str) -> Result<RunHandle> {
        let workspace_id = workspace_id.trim();
        if workspace_id.is_empty() {
            return Err(PipelineError::InvalidInput(
                "Workspace ID is required".to_string(),
            ));
        }
        if self.project_id.trim().is_empty() {
            return Err(PipelineError::InvalidInput(
                "Project ID is required".to_string(),
            ));
        }

        let url = self.run_url()?;
        info!("Triggering report run for workspace {}", workspace_id);
        debug!("POST {}", url);

        let body = RunRequest {
            input_params: InputParams {
                input_text: workspace_id,
            },
            update_published_results: false,
            use_cached_sql_results: true,
        };

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.api_token)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            warn!("Report trigger rejected with {}", status);
            return Err(PipelineError::upstream(
                classify_status(status),
                Some(status.as_u16()),
                text,
            ));
        }

        let raw: Value = serde_json::from_str(&text).map_err(|e| {
            PipelineError::upstream(
                UpstreamFailureKind::Upstream,
                Some(status.as_u16()),
                format!("Invalid response body: {}", e),
            )
        })?;
        let parsed: RunResponse = serde_json::from_value(raw.clone()).map_err(|e| {
            PipelineError::upstream(
                UpstreamFailureKind::Upstream,
                Some(status.as_u16()),
                format!("Invalid response body: {}", e),
            )
        })?;

        match parsed.run_id.filter(|id| !id.is_empty()) {
            Some(run_id) => {
                info!("Report run {} started", run_id);
                Ok(RunHandle { run_id, raw })
            }
            None => Err(PipelineError::upstream(
                UpstreamFailureKind::Upstream,
                Some(status.as_u16()),
                format!("Response did not include a runId: {}", text),
            )),
        }
    }
}

/// Request and connect timeouts, never below one second
fn client_timeouts(timeout_secs: u64) -> (Duration, Duration) {
    let timeout_secs = timeout_secs.max(1);
    (
        Duration::from_secs(timeout_secs),
        Duration::from_secs((timeout_secs / 2).max(1)),
    )
}

fn classify_status(status: StatusCode) -> UpstreamFailureKind {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => UpstreamFailureKind::InvalidCredential,
        StatusCode::NOT_FOUND => UpstreamFailureKind::NotFound,
        _ => UpstreamFailureKind::Upstream,
    }
}
