use serde::Serialize;
use thiserror::Error;

/// Contract violations left after every retry was spent.
///
/// The last raw output is kept so callers can attempt a looser salvage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    pub last_output: String,
    pub violations: Vec<String>,
    pub attempts: u32,
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("LLM API request failed: {0}")]
    LlmApiRequest(#[from] reqwest::Error),

    #[error("LLM API error (status {status}): {message}")]
    LlmApiError { status: u16, message: String },

    #[error("LLM rate limited, retry after {retry_after_secs}s")]
    LlmRateLimited { retry_after_secs: u64 },

    #[error("failed to parse LLM response: {0}")]
    LlmResponseParse(String),

    #[error("LLM returned empty response")]
    LlmEmptyResponse,

    #[error("contract load error: {0}")]
    SchemaLoad(String),

    #[error(
        "contract validation failed after {} attempts: {}",
        .0.attempts,
        .0.violations.join(", ")
    )]
    Validation(ValidationError),

    #[error("no JSON object found in output: {0}")]
    JsonExtraction(String),

    #[error("narrative plan rejected: {}", violations.join(", "))]
    InvalidPlan { violations: Vec<String> },

    #[error("generation cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("parser error: {0}")]
    Parser(#[from] nomothesia_parser::ParserError),
}

impl PipelineError {
    /// The raw output of an exhausted contract call, if any.
    pub fn last_output(&self) -> Option<&str> {
        match self {
            Self::Validation(err) => Some(&err.last_output),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
