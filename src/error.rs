use thiserror::Error;

/// Everything that can go wrong between pressing "capture" and showing an
/// answer. The pipeline recovers all of these at its boundary; none of them
/// should reach the UI layer as a panic.
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("API key is not configured. Please set it in Settings.")]
    MissingApiKey,

    #[error("Screen capture failed: {0}")]
    CaptureFailed(String),

    #[error("AI backend error ({status}): {body}")]
    Backend { status: u16, body: String },

    #[error("AI backend returned no candidates in response")]
    EmptyResponse,

    #[error("{0}")]
    Unsupported(String),

    #[error("Failed to parse AI response: {cause}. Offending text: {text}")]
    Parse { cause: String, text: String },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Request was cancelled")]
    Cancelled,

    #[error("A capture is already in progress")]
    Busy,
}

impl AnalysisError {
    pub fn parse(cause: impl ToString, text: impl Into<String>) -> Self {
        AnalysisError::Parse {
            cause: cause.to_string(),
            text: text.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AnalysisError>;
