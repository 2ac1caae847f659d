use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

/// What kind of content a capture attempt was analyzed as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CaptureKind {
    CodeChallenge,
    Certification,
    GenericExam,
}

impl CaptureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaptureKind::CodeChallenge => "CODE_CHALLENGE",
            CaptureKind::Certification => "CERTIFICATION",
            CaptureKind::GenericExam => "GENERIC_EXAM",
        }
    }

    pub fn from_str(value: &str) -> Result<Self> {
        match value {
            "CODE_CHALLENGE" => Ok(CaptureKind::CodeChallenge),
            "CERTIFICATION" => Ok(CaptureKind::Certification),
            "GENERIC_EXAM" => Ok(CaptureKind::GenericExam),
            _ => Err(anyhow!("unknown capture kind '{value}'")),
        }
    }
}

/// One row of the capture history: a screenshot plus either the serialized
/// analysis result or the error that ended the attempt. Never mutated after
/// insert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureAttempt {
    pub id: i64,
    /// Epoch millis, set at capture time.
    pub timestamp: i64,
    pub kind: CaptureKind,
    pub image_base64: String,
    pub result: Option<String>,
    pub error: Option<String>,
    pub metadata: Option<String>,
}
