//! Wire types for the OpenAI-compatible chat-completion endpoint.

use serde::{Deserialize, Serialize};

pub const GENERATION_TEMPERATURE: f32 = 0.7;
pub const GENERATION_MAX_TOKENS: u32 = 4000;

pub const REFERER_HEADER: &str = "HTTP-Referer";
pub const TITLE_HEADER: &str = "X-Title";
pub const CLIENT_TITLE: &str = "DramaBench Interactive Demo";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl ChatCompletionRequest {
    /// Single user-turn request with the fixed sampling settings.
    pub fn single_prompt(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            messages: vec![ChatMessage {
                role: ChatRole::User,
                content: prompt.into(),
            }],
            temperature: GENERATION_TEMPERATURE,
            max_tokens: GENERATION_MAX_TOKENS,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatCompletionResponse {
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
}

impl ChatCompletionResponse {
    pub fn first_content(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|choice| choice.message.content.as_deref())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatChoice {
    pub message: ChoiceMessage,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChoiceMessage {
    #[serde(default)]
    pub content: Option<String>,
}

/// `{"error": {"message": "...", "code": ...}}` as returned on non-2xx responses.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorEnvelope {
    #[serde(default)]
    pub error: Option<ErrorBody>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub code: Option<serde_json::Value>,
}

impl ErrorEnvelope {
    pub fn message(&self) -> Option<&str> {
        self.error
            .as_ref()
            .and_then(|body| body.message.as_deref())
            .filter(|message| !message.is_empty())
    }
}
