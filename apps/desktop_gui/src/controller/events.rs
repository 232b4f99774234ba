//! UI/backend events and error modeling for the desktop GUI controller.

use client_core::{AssetError, GenerationError, PromptTemplate};
use shared::{domain::ScriptRecord, error::ErrorCode};

pub enum UiEvent {
    Info(String),
    CredentialLoaded(Option<String>),
    CredentialSaved,
    CredentialCleared,
    TemplateLoaded(Result<PromptTemplate, AssetError>),
    DatasetLoaded(Result<Vec<ScriptRecord>, AssetError>),
    GenerationFinished(Result<String, GenerationError>),
    Error(UiError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiErrorCategory {
    Auth,
    RateLimit,
    Transport,
    Validation,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiErrorContext {
    BackendStartup,
    Credential,
    Generation,
}

#[derive(Debug, Clone)]
pub struct UiError {
    category: UiErrorCategory,
    context: UiErrorContext,
    message: String,
}

impl UiError {
    pub fn from_message(context: UiErrorContext, message: impl Into<String>) -> Self {
        let message = message.into();
        let message_lower = message.to_ascii_lowercase();
        let category = if message_lower.contains("401")
            || message_lower.contains("unauthorized")
            || message_lower.contains("no auth credentials")
            || message_lower.contains("invalid api key")
            || message_lower.contains("user not found")
        {
            UiErrorCategory::Auth
        } else if message_lower.contains("429") || message_lower.contains("rate limit") {
            UiErrorCategory::RateLimit
        } else if message_lower.contains("timeout")
            || message_lower.contains("timed out")
            || message_lower.contains("connection")
            || message_lower.contains("network")
            || message_lower.contains("dns")
            || message_lower.contains("disconnect")
        {
            UiErrorCategory::Transport
        } else if message_lower.contains("invalid")
            || message_lower.contains("missing")
            || message_lower.contains("malformed")
            || message_lower.contains("please")
        {
            UiErrorCategory::Validation
        } else {
            UiErrorCategory::Unknown
        };

        Self {
            category,
            context,
            message,
        }
    }

    /// Uses the provider status when there is one, message heuristics otherwise.
    pub fn from_generation(err: &GenerationError) -> Self {
        let category = match err {
            GenerationError::Provider { .. } => match err.provider_code() {
                Some(ErrorCode::Unauthorized | ErrorCode::Forbidden) => Some(UiErrorCategory::Auth),
                Some(ErrorCode::RateLimited) => Some(UiErrorCategory::RateLimit),
                Some(ErrorCode::Validation) => Some(UiErrorCategory::Validation),
                _ => None,
            },
            GenerationError::Transport(_) | GenerationError::Interrupted => {
                Some(UiErrorCategory::Transport)
            }
            GenerationError::MissingCredential => Some(UiErrorCategory::Auth),
            _ if err.is_precondition() => Some(UiErrorCategory::Validation),
            _ => None,
        };

        let mut ui_error = Self::from_message(UiErrorContext::Generation, err.to_string());
        if let Some(category) = category {
            ui_error.category = category;
        }
        ui_error
    }

    pub fn requires_reauth(&self) -> bool {
        self.category == UiErrorCategory::Auth
    }

    pub fn category(&self) -> UiErrorCategory {
        self.category
    }

    pub fn context(&self) -> UiErrorContext {
        self.context
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

pub fn err_label(category: UiErrorCategory) -> &'static str {
    match category {
        UiErrorCategory::Auth => "Authentication",
        UiErrorCategory::RateLimit => "Rate limit",
        UiErrorCategory::Transport => "Network",
        UiErrorCategory::Validation => "Validation",
        UiErrorCategory::Unknown => "Unexpected",
    }
}
