use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Failure of a single collaborator call. Always recovered by the caller.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SourceError {
    #[error("Source not configured: {0}")]
    NotConfigured(String),

    #[error("Source unavailable: {0}")]
    Unavailable(String),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },
}

/// Errors allowed to abort a pipeline invocation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    #[error("Invalid question: {0}")]
    InvalidQuestion(String),

    #[error("No data collected: {0}")]
    NoDataCollected(String),

    #[error("Aggregation exhausted: data gathering failed for all {0} candidates")]
    AggregationExhausted(usize),
}

impl PipelineError {
    pub fn category(&self) -> &'static str {
        match self {
            PipelineError::InvalidQuestion(_) => "invalid_question",
            PipelineError::NoDataCollected(_) => "no_data_collected",
            PipelineError::AggregationExhausted(_) => "aggregation_exhausted",
        }
    }

    pub fn report(&self) -> ErrorReport {
        ErrorReport {
            category: self.category().to_string(),
            message: self.to_string(),
        }
    }
}

/// Small structured error handed to callers instead of a raw error chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub category: String,
    pub message: String,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScoringError {
    #[error("Non-finite {field} for {disease}")]
    NonFinite { field: &'static str, disease: String },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum NarrativeError {
    #[error("Text generator not configured")]
    NotConfigured,

    #[error("Generation failed: {0}")]
    Generation(#[from] SourceError),

    #[error("Generator returned an empty response")]
    EmptyResponse,
}

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Report renderer not configured")]
    NotConfigured,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
