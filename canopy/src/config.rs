// Command options resolved from parsed arguments

use anyhow::{Context, Result, anyhow};
use canopy_core::ReportFormat;
use clap::ArgMatches;
use std::path::PathBuf;
use url::Url;

/// Expand a leading `~` in a user supplied path
pub fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).into_owned())
}

#[derive(Debug, Clone)]
pub struct AnalyzeConfig {
    pub input: PathBuf,
    pub format: ReportFormat,
    pub output: Option<PathBuf>,
    pub graph_out: Option<PathBuf>,
    pub chunk_size: usize,
    pub show_progress: bool,
}

impl AnalyzeConfig {
    pub fn from_matches(args: &ArgMatches, quiet: bool) -> Result<Self> {
        let input = args
            .get_one::<String>("input")
            .map(|p| expand_path(p))
            .context("--input is required")?;
        let format = args
            .get_one::<String>("format")
            .map(String::as_str)
            .unwrap_or("text");
        let format = ReportFormat::from_str(format)
            .ok_or_else(|| anyhow!("Unsupported report format '{}'", format))?;
        let chunk_size = args.get_one::<usize>("chunk-size").copied().unwrap_or(500);
        if chunk_size == 0 {
            return Err(anyhow!("--chunk-size must be at least 1"));
        }

        Ok(Self {
            input,
            format,
            output: args.get_one::<String>("output").map(|p| expand_path(p)),
            graph_out: args.get_one::<String>("graph-out").map(|p| expand_path(p)),
            chunk_size,
            show_progress: !quiet,
        })
    }
}

#[derive(Debug, Clone)]
pub struct TriggerConfig {
    pub workspace: String,
    pub project_id: String,
    pub api_token: String,
    pub base_url: Option<Url>,
    pub timeout_secs: u64,
}

impl TriggerConfig {
    pub fn from_matches(args: &ArgMatches) -> Result<Self> {
        let required = |name: &str| -> Result<String> {
            args.get_one::<String>(name)
                .cloned()
                .with_context(|| format!("--{} is required", name))
        };

        let timeout_secs = args.get_one::<u64>("timeout").copied().unwrap_or(30);
        if timeout_secs == 0 {
            return Err(anyhow!("--timeout must be at least 1"));
        }

        Ok(Self {
            workspace: required("workspace")?,
            project_id: required("project-id")?,
            api_token: required("api-token")?,
            base_url: args.get_one::<Url>("base-url").cloned(),
            timeout_secs,
        })
    }
}
