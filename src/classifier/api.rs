use async_trait::async_trait;

use crate::capture::Frame;
use crate::signal::AnalysisResult;

#[derive(Debug, thiserror::Error)]
pub enum ClassifierError {
    #[error("vision API key is not configured")]
    MissingCredential,
    #[error("API request failed: {0}")]
    Http(String),
    #[error("HTTP status {status}: {body}")]
    HttpStatus { status: u16, body: String },
    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Schema validation failed: {0}")]
    Schema(String),
    #[error("Timeout")]
    Timeout,
}

#[async_trait]
pub trait SignalClassifier: Send + Sync {
    /// Interpret one chart frame. Failures are reported, never retried.
    async fn classify(&self, frame: &Frame) -> Result<AnalysisResult, ClassifierError>;

    /// Problem that will make every call fail, shown as a persistent banner.
    fn configuration_warning(&self) -> Option<String> {
        None
    }
}
