//! Applies backend events to the session state.

use client_core::SessionState;
use shared::error::ErrorCode;

use crate::controller::events::{err_label, UiError, UiErrorContext, UiEvent};

/// Side effects the UI shell performs after an event is applied.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Effects {
    pub status: Option<String>,
    pub focus_credential: bool,
}

pub fn apply_event(state: &mut SessionState, event: UiEvent) -> Effects {
    let mut effects = Effects::default();
    match event {
        UiEvent::Info(message) => effects.status = Some(message),
        UiEvent::CredentialLoaded(stored) => {
            let found = stored.is_some() && state.api_key().is_none();
            state.credential_loaded(stored);
            effects.focus_credential = state.api_key().is_none();
            if found {
                effects.status = Some("Restored stored API key".to_string());
            }
        }
        UiEvent::CredentialSaved => effects.status = Some("API key stored".to_string()),
        UiEvent::CredentialCleared => {
            effects.status = Some("Stored API key removed".to_string());
            effects.focus_credential = true;
        }
        UiEvent::TemplateLoaded(outcome) => state.template_loaded(outcome),
        UiEvent::DatasetLoaded(outcome) => {
            let count = outcome.as_ref().map(Vec::len).ok();
            state.scripts_loaded(outcome);
            if let Some(count) = count {
                effects.status = Some(format!("Loaded {count} scripts"));
            }
        }
        UiEvent::GenerationFinished(Ok(raw)) => {
            state.complete_generation(&raw);
            effects.status = Some(format!(
                "Continuation received from {}",
                state.model_display_name()
            ));
        }
        UiEvent::GenerationFinished(Err(err)) => {
            state.fail_generation(&err);
            let ui_error = UiError::from_generation(&err);
            effects.focus_credential = ui_error.requires_reauth();
            let mut status = describe(&ui_error);
            if err.provider_code().is_some_and(ErrorCode::is_transient) {
                status.push_str(" (try again shortly)");
            }
            effects.status = Some(status);
        }
        UiEvent::Error(ui_error) => {
            if ui_error.context() == UiErrorContext::Credential {
                state.report_credential_error(ui_error.message());
            }
            effects.focus_credential = ui_error.requires_reauth();
            effects.status = Some(describe(&ui_error));
        }
    }
    effects
}

fn describe(ui_error: &UiError) -> String {
    format!("{} error: {}", err_label(ui_error.category()), ui_error.message())
}
