use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use chrono::Utc;
use log::{error, info, warn};
use parking_lot::Mutex;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::ai::{AiBackend, AnalysisResult, PromptContext, SolutionResult};
use crate::capture::{CaptureRegion, ScreenCapturer};
use crate::db::{keys, Database};
use crate::error::{AnalysisError, Result};
use crate::stealth::StealthController;

/// Wait after enabling stealth so the platform call takes visible effect
/// before the capture syscall runs. Empirically anything under ~150ms still
/// shows the window in its own screenshot.
const STEALTH_SETTLE_DELAY: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Idle,
    Capturing,
    Analyzing,
}

struct PipelineState {
    stage: Stage,
    /// Base64 PNG of the last successful capture, kept so a retry can skip
    /// the capture step entirely.
    retained_image: Option<String>,
    context: Option<PromptContext>,
    captured_at: Option<i64>,
    cancel: Option<CancellationToken>,
    /// Bumped for every analysis run; a finished run only clears shared
    /// state when no newer run has replaced it.
    generation: u64,
}

/// What the UI layer sees after a run: either a result or a message,
/// never a panic or a raw error type.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisOutcome {
    pub result: Option<AnalysisResult>,
    pub error: Option<String>,
}

impl AnalysisOutcome {
    pub fn from_result(result: Result<AnalysisResult>) -> Self {
        match result {
            Ok(result) => Self {
                result: Some(result),
                error: None,
            },
            Err(err) => Self {
                result: None,
                error: Some(err.to_string()),
            },
        }
    }
}

/// Coordinates one capture attempt end to end: stealth on, capture, stealth
/// restore, backend call, extraction, history write.
///
/// At most one run may be between capture and record at a time; the stealth
/// flag on the application window is process-wide, so two interleaved runs
/// could otherwise toggle it under each other.
pub struct CapturePipeline {
    db: Database,
    stealth: Arc<dyn StealthController>,
    capturer: Arc<dyn ScreenCapturer>,
    backend: Arc<dyn AiBackend>,
    state: Mutex<PipelineState>,
}

impl CapturePipeline {
    pub fn new(
        db: Database,
        stealth: Arc<dyn StealthController>,
        capturer: Arc<dyn ScreenCapturer>,
        backend: Arc<dyn AiBackend>,
    ) -> Self {
        Self {
            db,
            stealth,
            capturer,
            backend,
            state: Mutex::new(PipelineState {
                stage: Stage::Idle,
                retained_image: None,
                context: None,
                captured_at: None,
                cancel: None,
                generation: 0,
            }),
        }
    }

    /// Full pipeline run. Rejects with `Busy` while another run is still
    /// capturing or analyzing.
    pub async fn capture_and_analyze(&self, context: PromptContext) -> Result<AnalysisResult> {
        {
            let mut state = self.state.lock();
            if state.stage != Stage::Idle {
                return Err(AnalysisError::Busy);
            }
            state.stage = Stage::Capturing;
        }

        let capture_result = self.capture_with_stealth().await;

        let image_base64 = match capture_result {
            Ok(image) => image,
            Err(err) => {
                // Pure capture failures never reached the backend and are
                // not recorded; the UI surfaces them transiently.
                self.state.lock().stage = Stage::Idle;
                return Err(err);
            }
        };

        let captured_at = Utc::now().timestamp_millis();
        {
            let mut state = self.state.lock();
            state.retained_image = Some(image_base64.clone());
            state.context = Some(context.clone());
            state.captured_at = Some(captured_at);
        }

        self.run_analysis(image_base64, context, captured_at).await
    }

    /// Re-run only the analyzing step against the already-captured image.
    /// No recapture, no stealth toggle.
    pub async fn retry(&self) -> Result<AnalysisResult> {
        let context = {
            let state = self.state.lock();
            state.context.clone().ok_or_else(|| {
                AnalysisError::CaptureFailed("nothing captured yet".to_string())
            })?
        };
        self.reanalyze(context).await
    }

    /// Analyze the retained image under a new context (language or exam type
    /// switch). A still-pending backend call is cancelled first so a stale
    /// result cannot land after the newer selection.
    pub async fn reanalyze(&self, context: PromptContext) -> Result<AnalysisResult> {
        let (image, captured_at) = {
            let mut state = self.state.lock();
            let image = state.retained_image.clone().ok_or_else(|| {
                AnalysisError::CaptureFailed("nothing captured yet".to_string())
            })?;
            if let Some(pending) = state.cancel.take() {
                pending.cancel();
            }
            state.context = Some(context.clone());
            (image, state.captured_at.unwrap_or_else(|| Utc::now().timestamp_millis()))
        };

        self.run_analysis(image, context, captured_at).await
    }

    /// Abandon a still-pending backend call, if any. No history record is
    /// written for a cancelled call.
    pub fn cancel(&self) {
        let mut state = self.state.lock();
        if let Some(pending) = state.cancel.take() {
            pending.cancel();
        }
    }

    /// Text-only path: no capture, no history record.
    pub async fn solve_text(&self, problem: &str, language: &str) -> Result<SolutionResult> {
        self.backend
            .solve_text(problem, language, CancellationToken::new())
            .await
    }

    /// Toggle stealth, settle, capture, restore. The restore runs whether or
    /// not the capture succeeded, but only when stealth was off on entry; a
    /// window the user keeps permanently hidden stays hidden.
    async fn capture_with_stealth(&self) -> Result<String> {
        let stealth_was_on = match self.db.get_setting(keys::HIDE_FROM_CAPTURE).await {
            Ok(value) => value.as_deref() == Some("true"),
            Err(err) => {
                warn!("Failed to read stealth setting, assuming visible: {err}");
                false
            }
        };

        if !stealth_was_on {
            self.stealth.set_hidden(true);
            tokio::time::sleep(STEALTH_SETTLE_DELAY).await;
        }

        let capture_result = self.capture_configured_region().await;

        if !stealth_was_on {
            self.stealth.set_hidden(false);
        }

        let bytes = capture_result?;
        info!("Captured {} bytes", bytes.len());
        Ok(base64::engine::general_purpose::STANDARD.encode(bytes))
    }

    async fn capture_configured_region(&self) -> Result<Vec<u8>> {
        let region = match self.db.get_setting(keys::CAPTURE_REGION).await {
            Ok(Some(raw)) => Some(raw.parse::<CaptureRegion>()?),
            Ok(None) => None,
            Err(err) => {
                warn!("Failed to read capture region, using full screen: {err}");
                None
            }
        };

        let capturer = Arc::clone(&self.capturer);
        tokio::task::spawn_blocking(move || capturer.capture(region.as_ref()))
            .await
            .map_err(|err| AnalysisError::CaptureFailed(format!("capture task failed: {err}")))?
    }

    /// The Analyzing step. Every outcome except a cancellation writes
    /// exactly one history record.
    async fn run_analysis(
        &self,
        image_base64: String,
        context: PromptContext,
        captured_at: i64,
    ) -> Result<AnalysisResult> {
        let cancel = CancellationToken::new();
        let my_generation = {
            let mut state = self.state.lock();
            state.stage = Stage::Analyzing;
            state.generation += 1;
            state.cancel = Some(cancel.clone());
            state.generation
        };

        let outcome = self
            .backend
            .solve_image(&image_base64, &context, cancel.clone())
            .await;

        {
            let mut state = self.state.lock();
            if state.generation == my_generation {
                state.stage = Stage::Idle;
                state.cancel = None;
            }
        }

        // A cancelled run is abandoned entirely: a newer selection owns the
        // state now, and cancellations are never recorded.
        if cancel.is_cancelled() || matches!(outcome, Err(AnalysisError::Cancelled)) {
            return Err(AnalysisError::Cancelled);
        }

        let (result_json, error_text) = match &outcome {
            Ok(result) => match serde_json::to_string(result) {
                Ok(json) => (Some(json), None),
                Err(err) => {
                    error!("Failed to serialize analysis result: {err}");
                    (None, Some(format!("failed to serialize result: {err}")))
                }
            },
            Err(err) => (None, Some(err.to_string())),
        };

        // History is best-effort auxiliary data: a failed write is logged
        // but does not take down an already-delivered result.
        if let Err(err) = self
            .db
            .insert_attempt(
                captured_at,
                context.kind(),
                image_base64,
                result_json,
                error_text,
                context.metadata(),
            )
            .await
        {
            error!("Failed to record capture attempt: {err}");
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::{CertificationType, SolutionResult};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Clone, Default)]
    struct EventLog(Arc<Mutex<Vec<String>>>);

    impl EventLog {
        fn push(&self, event: &str) {
            self.0.lock().push(event.to_string());
        }

        fn events(&self) -> Vec<String> {
            self.0.lock().clone()
        }
    }

    struct RecordingStealth {
        log: EventLog,
    }

    impl StealthController for RecordingStealth {
        fn set_hidden(&self, hidden: bool) {
            self.log
                .push(if hidden { "stealth:on" } else { "stealth:off" });
        }
    }

    struct RecordingCapturer {
        log: EventLog,
        fail: bool,
    }

    impl ScreenCapturer for RecordingCapturer {
        fn capture(&self, _region: Option<&CaptureRegion>) -> Result<Vec<u8>> {
            self.log.push("capture");
            if self.fail {
                Err(AnalysisError::CaptureFailed("no display".to_string()))
            } else {
                Ok(vec![0x89, 0x50, 0x4e, 0x47])
            }
        }
    }

    enum Behavior {
        Succeed,
        Fail,
        HangUntilCancelled,
        HangThenSucceed,
    }

    struct StubBackend {
        log: EventLog,
        behavior: Behavior,
        calls: AtomicUsize,
    }

    impl StubBackend {
        fn new(log: EventLog, behavior: Behavior) -> Self {
            Self {
                log,
                behavior,
                calls: AtomicUsize::new(0),
            }
        }

        fn solution() -> SolutionResult {
            SolutionResult {
                code: "fn main() {}".into(),
                explanation: "trivial".into(),
                time_complexity: "O(1)".into(),
                space_complexity: "O(1)".into(),
            }
        }
    }

    #[async_trait]
    impl AiBackend for StubBackend {
        async fn solve_text(
            &self,
            _problem: &str,
            _language: &str,
            _cancel: CancellationToken,
        ) -> Result<SolutionResult> {
            Ok(Self::solution())
        }

        async fn solve_image(
            &self,
            _image_base64: &str,
            _context: &PromptContext,
            cancel: CancellationToken,
        ) -> Result<AnalysisResult> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            self.log.push("backend");
            match self.behavior {
                Behavior::Succeed => Ok(AnalysisResult::Solution(Self::solution())),
                Behavior::Fail => Err(AnalysisError::Backend {
                    status: 500,
                    body: "boom".to_string(),
                }),
                Behavior::HangUntilCancelled => {
                    cancel.cancelled().await;
                    Err(AnalysisError::Cancelled)
                }
                Behavior::HangThenSucceed => {
                    if call == 0 {
                        cancel.cancelled().await;
                        Err(AnalysisError::Cancelled)
                    } else {
                        Ok(AnalysisResult::Solution(Self::solution()))
                    }
                }
            }
        }

        async fn list_models(&self) -> Result<String> {
            Ok("[]".to_string())
        }
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        db: Database,
        log: EventLog,
        pipeline: Arc<CapturePipeline>,
    }

    fn build(behavior: Behavior, capture_fails: bool) -> Fixture {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = Database::new(dir.path().join("snapsolve.db")).expect("open db");
        let log = EventLog::default();

        let pipeline = Arc::new(CapturePipeline::new(
            db.clone(),
            Arc::new(RecordingStealth { log: log.clone() }),
            Arc::new(RecordingCapturer {
                log: log.clone(),
                fail: capture_fails,
            }),
            Arc::new(StubBackend::new(log.clone(), behavior)),
        ));

        Fixture {
            _dir: dir,
            db,
            log,
            pipeline,
        }
    }

    fn code_context() -> PromptContext {
        PromptContext::CodeChallenge {
            language: "Rust".to_string(),
        }
    }

    #[tokio::test]
    async fn stealth_wraps_the_capture_when_it_was_off() {
        let fx = build(Behavior::Succeed, false);
        fx.pipeline
            .capture_and_analyze(code_context())
            .await
            .unwrap();

        assert_eq!(
            fx.log.events(),
            vec!["stealth:on", "capture", "stealth:off", "backend"]
        );
    }

    #[tokio::test]
    async fn no_stealth_toggles_when_already_hidden() {
        let fx = build(Behavior::Succeed, false);
        fx.db
            .set_setting(keys::HIDE_FROM_CAPTURE, "true")
            .await
            .unwrap();

        fx.pipeline
            .capture_and_analyze(code_context())
            .await
            .unwrap();

        assert_eq!(fx.log.events(), vec!["capture", "backend"]);
    }

    #[tokio::test]
    async fn capture_failure_restores_stealth_and_writes_no_history() {
        let fx = build(Behavior::Succeed, true);
        let err = fx
            .pipeline
            .capture_and_analyze(code_context())
            .await
            .unwrap_err();

        assert!(matches!(err, AnalysisError::CaptureFailed(_)));
        assert_eq!(
            fx.log.events(),
            vec!["stealth:on", "capture", "stealth:off"]
        );
        assert!(fx.db.recent_attempts(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn success_writes_exactly_one_record_without_error() {
        let fx = build(Behavior::Succeed, false);
        fx.pipeline
            .capture_and_analyze(PromptContext::Certification(
                CertificationType::AwsCloudPractitioner,
            ))
            .await
            .unwrap();

        let attempts = fx.db.recent_attempts(10).await.unwrap();
        assert_eq!(attempts.len(), 1);
        assert!(attempts[0].result.is_some());
        assert_eq!(attempts[0].error, None);
        assert_eq!(
            attempts[0].metadata.as_deref(),
            Some("AWS Cloud Practitioner")
        );
    }

    #[tokio::test]
    async fn backend_failure_writes_exactly_one_record_with_error() {
        let fx = build(Behavior::Fail, false);
        let err = fx
            .pipeline
            .capture_and_analyze(code_context())
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::Backend { status: 500, .. }));

        let attempts = fx.db.recent_attempts(10).await.unwrap();
        assert_eq!(attempts.len(), 1);
        assert_eq!(attempts[0].result, None);
        assert!(attempts[0].error.as_deref().unwrap().contains("500"));
    }

    #[tokio::test]
    async fn retry_reuses_the_captured_image_without_recapturing() {
        let fx = build(Behavior::Fail, false);
        fx.pipeline
            .capture_and_analyze(code_context())
            .await
            .unwrap_err();

        fx.pipeline.retry().await.unwrap_err();

        let captures = fx
            .log
            .events()
            .iter()
            .filter(|e| *e == "capture")
            .count();
        assert_eq!(captures, 1);

        // both analyzing runs were recorded
        assert_eq!(fx.db.recent_attempts(10).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn retry_without_a_capture_is_an_error() {
        let fx = build(Behavior::Succeed, false);
        let err = fx.pipeline.retry().await.unwrap_err();
        assert!(matches!(err, AnalysisError::CaptureFailed(_)));
    }

    #[tokio::test]
    async fn second_run_is_rejected_while_one_is_in_flight() {
        let fx = build(Behavior::HangUntilCancelled, false);
        let pipeline = Arc::clone(&fx.pipeline);

        let first = tokio::spawn(async move { pipeline.capture_and_analyze(code_context()).await });

        // wait for the first run to reach the backend
        while !fx.log.events().iter().any(|e| e == "backend") {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let err = fx
            .pipeline
            .capture_and_analyze(code_context())
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::Busy));

        // no second stealth toggle interleaved with the first run
        assert_eq!(
            fx.log.events(),
            vec!["stealth:on", "capture", "stealth:off", "backend"]
        );

        fx.pipeline.cancel();
        let first_result = first.await.unwrap();
        assert!(matches!(first_result, Err(AnalysisError::Cancelled)));

        // cancelled runs are never recorded
        assert!(fx.db.recent_attempts(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn reanalyze_cancels_the_stale_call_and_records_only_the_new_one() {
        let fx = build(Behavior::HangThenSucceed, false);
        let pipeline = Arc::clone(&fx.pipeline);

        let first = tokio::spawn(async move { pipeline.capture_and_analyze(code_context()).await });

        while !fx.log.events().iter().any(|e| e == "backend") {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let result = fx
            .pipeline
            .reanalyze(PromptContext::CodeChallenge {
                language: "Python".to_string(),
            })
            .await
            .unwrap();
        assert!(matches!(result, AnalysisResult::Solution(_)));

        let first_result = first.await.unwrap();
        assert!(matches!(first_result, Err(AnalysisError::Cancelled)));

        // one capture, two backend calls, one history record
        let captures = fx
            .log
            .events()
            .iter()
            .filter(|e| *e == "capture")
            .count();
        assert_eq!(captures, 1);

        let attempts = fx.db.recent_attempts(10).await.unwrap();
        assert_eq!(attempts.len(), 1);
        assert_eq!(attempts[0].metadata.as_deref(), Some("Python"));
    }

    #[tokio::test]
    async fn outcome_flattens_errors_into_messages() {
        let ok = AnalysisOutcome::from_result(Ok(AnalysisResult::Solution(
            StubBackend::solution(),
        )));
        assert!(ok.result.is_some());
        assert_eq!(ok.error, None);

        let err = AnalysisOutcome::from_result(Err(AnalysisError::MissingApiKey));
        assert!(err.result.is_none());
        assert!(err.error.unwrap().contains("API key"));
    }
}
