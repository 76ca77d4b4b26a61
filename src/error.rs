use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Everything that can stop a proof run. Each pipeline stage has its own kind
/// so callers can tell which external step went wrong.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{role} not found: {}", .path.display())]
    MissingInput { role: &'static str, path: PathBuf },

    #[error("failed to launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{stage} did not finish within {limit:?}")]
    Timeout { stage: &'static str, limit: Duration },

    #[error("witness generation failed (exit code {code:?}):\n{stderr}")]
    WitnessGeneration { code: Option<i32>, stderr: String },

    #[error("proving failed (exit code {code:?}):\n{stderr}")]
    Proving { code: Option<i32>, stderr: String },

    #[error("failed to read {}: {source}", .path.display())]
    ProofRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", .path.display())]
    ProofParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("malformed proof: {0}")]
    MalformedProof(String),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
