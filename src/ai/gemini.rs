use async_trait::async_trait;
use log::{info, warn};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use crate::ai::{
    extract::extract, prompts, require_success, send_cancellable, AiBackend, AnalysisResult,
    PromptContext, SolutionResult, CONNECT_TIMEOUT, REQUEST_TIMEOUT,
};
use crate::db::{keys, Database};
use crate::error::{AnalysisError, Result};

const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Google Gemini backend. Supports text, image analysis, and model listing.
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    base_url: String,
    db: Database,
}

#[derive(Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: GeminiContent,
}

#[derive(Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: String,
}

impl GeminiClient {
    pub fn new(db: Database) -> Self {
        Self::with_base_url(db, "https://generativelanguage.googleapis.com/v1beta")
    }

    pub fn with_base_url(db: Database, base_url: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url: base_url.into(),
            db,
        }
    }

    /// API key is read fresh from settings on every call and must be
    /// non-blank.
    async fn api_key(&self) -> Result<String> {
        let key = self
            .db
            .get_setting(keys::API_KEY)
            .await
            .map_err(|err| AnalysisError::Storage(err.to_string()))?
            .unwrap_or_default();

        if key.trim().is_empty() {
            return Err(AnalysisError::MissingApiKey);
        }
        Ok(key)
    }

    /// Model id is configurable per request, with a fixed fallback.
    async fn model(&self) -> String {
        match self.db.get_setting(keys::SELECTED_MODEL).await {
            Ok(Some(model)) if !model.trim().is_empty() => model,
            Ok(_) => DEFAULT_MODEL.to_string(),
            Err(err) => {
                warn!("Failed to read selected model, using default: {err}");
                DEFAULT_MODEL.to_string()
            }
        }
    }

    async fn generate(&self, parts: Value, cancel: &CancellationToken) -> Result<String> {
        let api_key = self.api_key().await?;
        let model = self.model().await;

        info!("Sending request to Gemini with model: {model}");

        let request = self
            .client
            .post(format!(
                "{}/models/{}:generateContent?key={}",
                self.base_url, model, api_key
            ))
            .json(&json!({ "contents": [{ "parts": parts }] }));

        let response = send_cancellable(request, cancel).await?;
        let body = require_success(response).await?;

        let parsed: GeminiResponse = serde_json::from_str(&body)
            .map_err(|err| AnalysisError::parse(err, body.clone()))?;

        parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content.parts.into_iter().next())
            .map(|part| part.text)
            .ok_or(AnalysisError::EmptyResponse)
    }

    fn image_parts(prompt: &str, image_base64: &str) -> Value {
        json!([
            { "text": prompt },
            {
                "inlineData": {
                    "mimeType": "image/png",
                    "data": image_base64,
                }
            }
        ])
    }
}

#[async_trait]
impl AiBackend for GeminiClient {
    async fn solve_text(
        &self,
        problem: &str,
        language: &str,
        cancel: CancellationToken,
    ) -> Result<SolutionResult> {
        let prompt = prompts::solution_prompt(problem, language);
        let content = self
            .generate(json!([{ "text": prompt }]), &cancel)
            .await?;
        extract(&content)
    }

    async fn solve_image(
        &self,
        image_base64: &str,
        context: &PromptContext,
        cancel: CancellationToken,
    ) -> Result<AnalysisResult> {
        let prompt = match context {
            PromptContext::CodeChallenge { language } => prompts::image_analysis_prompt(language),
            PromptContext::Certification(cert) => prompts::certification_prompt(*cert),
            PromptContext::GenericExam {
                exam_type,
                extra_context,
            } => prompts::generic_exam_prompt(*exam_type, extra_context.as_deref()),
        };

        let parts = Self::image_parts(&prompt, image_base64);
        let content = self.generate(parts, &cancel).await?;

        match context {
            PromptContext::CodeChallenge { .. } => {
                Ok(AnalysisResult::Solution(extract(&content)?))
            }
            PromptContext::Certification(_) => {
                Ok(AnalysisResult::Certification(extract(&content)?))
            }
            PromptContext::GenericExam { .. } => {
                Ok(AnalysisResult::GenericExam(extract(&content)?))
            }
        }
    }

    async fn list_models(&self) -> Result<String> {
        let api_key = self.api_key().await?;
        let response = self
            .client
            .get(format!("{}/models?key={}", self.base_url, api_key))
            .send()
            .await
            .map_err(|err| AnalysisError::Backend {
                status: 0,
                body: format!("request failed: {err}"),
            })?;

        require_success(response).await
    }
}
