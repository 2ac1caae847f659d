use async_trait::async_trait;
use log::info;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::ai::{
    extract::extract, prompts, require_success, send_cancellable, AiBackend, AnalysisResult,
    PromptContext, SolutionResult, CONNECT_TIMEOUT, REQUEST_TIMEOUT,
};
use crate::db::{keys, Database};
use crate::error::{AnalysisError, Result};

// Free-tier compatible text model; it has no vision capability.
const MODEL: &str = "gpt-3.5-turbo";

/// OpenAI backend. Text-only: image analysis is rejected up front because
/// the configured free-tier model cannot see.
#[derive(Clone)]
pub struct OpenAiClient {
    client: Client,
    base_url: String,
    db: Database,
}

#[derive(Serialize, Deserialize)]
struct OpenAiMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
    temperature: f64,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

#[derive(Deserialize)]
struct OpenAiResponse {
    #[serde(default)]
    choices: Vec<OpenAiChoice>,
}

impl OpenAiClient {
    pub fn new(db: Database) -> Self {
        Self::with_base_url(db, "https://api.openai.com/v1")
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
}

#[async_trait]
impl AiBackend for OpenAiClient {
    async fn solve_text(
        &self,
        problem: &str,
        language: &str,
        cancel: CancellationToken,
    ) -> Result<SolutionResult> {
        let api_key = self.api_key().await?;
        let prompt = prompts::solution_prompt(problem, language);

        let request_body = OpenAiRequest {
            model: MODEL.to_string(),
            messages: vec![
                OpenAiMessage {
                    role: "system".to_string(),
                    content: prompts::SYSTEM_PROMPT.to_string(),
                },
                OpenAiMessage {
                    role: "user".to_string(),
                    content: prompt,
                },
            ],
            temperature: 0.3,
            max_tokens: 1500,
        };

        info!("Sending request to OpenAI with model: {MODEL}");

        let request = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {api_key}"))
            .json(&request_body);

        let response = send_cancellable(request, &cancel).await?;
        let body = require_success(response).await?;

        let parsed: OpenAiResponse = serde_json::from_str(&body)
            .map_err(|err| AnalysisError::parse(err, body.clone()))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or(AnalysisError::EmptyResponse)?;

        extract(&content)
    }

    async fn solve_image(
        &self,
        _image_base64: &str,
        _context: &PromptContext,
        _cancel: CancellationToken,
    ) -> Result<AnalysisResult> {
        // No network call: the configured model has no vision capability.
        Err(AnalysisError::Unsupported(
            "OpenAI vision requires GPT-4 Vision which is not in the free tier. \
             Please use Gemini for image analysis."
                .to_string(),
        ))
    }

    async fn list_models(&self) -> Result<String> {
        let api_key = self.api_key().await?;
        let response = self
            .client
            .get(format!("{}/models", self.base_url))
            .header("Authorization", format!("Bearer {api_key}"))
            .send()
            .await
            .map_err(|err| AnalysisError::Backend {
                status: 0,
                body: format!("request failed: {err}"),
            })?;

        require_success(response).await
    }
}
