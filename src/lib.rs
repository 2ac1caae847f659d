pub mod ai;
pub mod capture;
pub mod db;
pub mod error;
pub mod pipeline;
pub mod stealth;

pub use ai::{
    AiBackend, AnalysisResult, CertificationResult, CertificationType, GenericExamResult,
    GenericExamType, PromptContext, SolutionResult,
};
pub use capture::{CaptureRegion, PrimaryDisplayCapturer, ScreenCapturer};
pub use db::{CaptureAttempt, CaptureKind, Database};
pub use error::AnalysisError;
pub use pipeline::{AnalysisOutcome, CapturePipeline};
pub use stealth::{PlatformStealth, StealthController};
