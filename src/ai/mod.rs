pub mod extract;
pub mod gemini;
pub mod openai;
pub mod prompts;
mod types;

pub use types::{
    AnalysisResult, CertificationAnswer, CertificationResult, CertificationType,
    GenericExamAnswer, GenericExamResult, GenericExamType, PromptContext, SolutionResult,
};

use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::{AnalysisError, Result};

/// Vision-model latency is high, so the per-request timeout is generous.
pub(crate) const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
pub(crate) const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// One AI provider integration. Implementations are stateless apart from
/// the API key and model id, which are read fresh from settings on every
/// call, so a single instance can be shared across requests.
#[async_trait]
pub trait AiBackend: Send + Sync {
    /// Solve a textual coding problem in the given language.
    async fn solve_text(
        &self,
        problem: &str,
        language: &str,
        cancel: CancellationToken,
    ) -> Result<SolutionResult>;

    /// Analyze a base64-encoded PNG screenshot according to `context`.
    async fn solve_image(
        &self,
        image_base64: &str,
        context: &PromptContext,
        cancel: CancellationToken,
    ) -> Result<AnalysisResult>;

    /// Raw provider model catalog, for the settings UI.
    async fn list_models(&self) -> Result<String>;
}

/// Race an outgoing request against its cancellation token.
pub(crate) async fn send_cancellable(
    request: reqwest::RequestBuilder,
    cancel: &CancellationToken,
) -> Result<reqwest::Response> {
    tokio::select! {
        _ = cancel.cancelled() => Err(AnalysisError::Cancelled),
        response = request.send() => response.map_err(|err| AnalysisError::Backend {
            status: 0,
            body: format!("request failed: {err}"),
        }),
    }
}

/// Read the body and turn any non-2xx status into a backend error carrying
/// that body. The client never retries; that decision belongs to the caller.
pub(crate) async fn require_success(response: reqwest::Response) -> Result<String> {
    let status = response.status();
    let body = response.text().await.map_err(|err| AnalysisError::Backend {
        status: status.as_u16(),
        body: format!("failed to read response body: {err}"),
    })?;

    if !status.is_success() {
        return Err(AnalysisError::Backend {
            status: status.as_u16(),
            body,
        });
    }

    Ok(body)
}
