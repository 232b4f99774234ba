//! Chat-completion client for continuation generation.

use async_trait::async_trait;
use reqwest::Client;
use shared::{
    error::{ApiError, ErrorCode},
    protocol::{
        ChatCompletionRequest, ChatCompletionResponse, ErrorEnvelope, REFERER_HEADER,
        TITLE_HEADER,
    },
};
use thiserror::Error;

use crate::config::Settings;

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Please configure your API key first")]
    MissingCredential,
    #[error("Please select a script first")]
    MissingScript,
    #[error("Prompt template is not loaded")]
    MissingTemplate,
    #[error("A generation is already in progress")]
    Busy,
    #[error("generation was interrupted before the provider answered")]
    Interrupted,
    #[error("{}", .error.message)]
    Provider { status: u16, error: ApiError },
    #[error("network error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected provider response: {0}")]
    MalformedResponse(String),
}

impl GenerationError {
    /// True when the request was refused locally, before any network traffic.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::MissingCredential | Self::MissingScript | Self::MissingTemplate | Self::Busy
        )
    }

    pub fn provider_code(&self) -> Option<ErrorCode> {
        match self {
            Self::Provider { error, .. } => Some(error.code),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub api_key: String,
    pub model: String,
    pub prompt: String,
}

#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Returns the raw assistant text of the first choice.
    async fn complete(&self, request: &GenerationRequest) -> Result<String, GenerationError>;
}

pub struct CompletionClient {
    http: Client,
    endpoint: String,
    referer: String,
    title: String,
}

impl CompletionClient {
    pub fn new(
        endpoint: impl Into<String>,
        referer: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        Self {
            http: Client::new(),
            endpoint: endpoint.into(),
            referer: referer.into(),
            title: title.into(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(&settings.api_url, &settings.referer, &settings.app_title)
    }
}

#[async_trait]
impl CompletionBackend for CompletionClient {
    async fn complete(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let body = ChatCompletionRequest::single_prompt(&request.model, &request.prompt);
        tracing::info!(
            model = %request.model,
            prompt_chars = request.prompt.len(),
            "requesting continuation"
        );

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&request.api_key)
            .header(REFERER_HEADER, &self.referer)
            .header(TITLE_HEADER, &self.title)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let raw = response.text().await.unwrap_or_default();
            let error = provider_error(status.as_u16(), &raw);
            tracing::warn!(status = status.as_u16(), "provider rejected request: {}", error.message);
            return Err(GenerationError::Provider {
                status: status.as_u16(),
                error,
            });
        }

        let raw = response.text().await?;
        let parsed: ChatCompletionResponse = serde_json::from_str(&raw)
            .map_err(|err| GenerationError::MalformedResponse(err.to_string()))?;
        let content = parsed.first_content().ok_or_else(|| {
            GenerationError::MalformedResponse("no choices[0].message.content in response".into())
        })?;
        tracing::debug!(content_chars = content.len(), "continuation received");
        Ok(content.to_string())
    }
}

/// Message from the `{"error":{"message"}}` envelope, else a status-derived fallback.
pub fn provider_error(status: u16, body: &str) -> ApiError {
    let message = serde_json::from_str::<ErrorEnvelope>(body)
        .ok()
        .and_then(|envelope| envelope.message().map(str::to_string))
        .unwrap_or_else(|| format!("API request failed: {status}"));
    ApiError::from_status(status, message)
}

#[cfg(test)]
#[path = "tests/completion_tests.rs"]
mod tests;
