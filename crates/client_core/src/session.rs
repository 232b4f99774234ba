//! Session state machine for the continuation workbench.
//!
//! [`SessionState`] holds every piece of UI-bound state and exposes pure
//! transitions; hosts (the desktop GUI, the CLI, tests) own exactly one and
//! render from its queries. [`SessionController`] drives the same transitions
//! through the async credential store, asset loader and completion backend.

use std::sync::Arc;

use rand::Rng;
use shared::domain::{model_display_name, ScriptRecord};
use thiserror::Error;

use crate::{
    assets::{AssetError, AssetLoader, PromptTemplate},
    completion::{CompletionBackend, GenerationError, GenerationRequest},
    continuation::extract_continuation,
    credential::{validate_credential, CredentialError, CredentialStore},
};

pub const GENERATING_STATUS: &str = "Generating continuation... This may take 30-60 seconds.";
pub const TEMPLATE_LOAD_ALERT: &str = "Failed to load prompt template";
pub const DATASET_LOAD_ALERT: &str = "Failed to load script dataset";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    NoCredential,
    Ready,
    Generating,
    ResultsShown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResultView {
    #[default]
    Generated,
    GroundTruth,
    Comparison,
}

impl ResultView {
    pub const ALL: [ResultView; 3] = [Self::Generated, Self::GroundTruth, Self::Comparison];

    pub fn label(self) -> &'static str {
        match self {
            Self::Generated => "Generated",
            Self::GroundTruth => "Ground Truth",
            Self::Comparison => "Side by Side",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    Success,
    Error,
    Info,
    Loading,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMessage {
    pub kind: StatusKind,
    pub text: String,
}

impl StatusMessage {
    fn new(kind: StatusKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionState {
    api_key: Option<String>,
    scripts: Vec<ScriptRecord>,
    current_script: Option<usize>,
    prompt_template: Option<PromptTemplate>,
    generated_continuation: Option<String>,
    selected_model: String,
    generating: bool,
    results_visible: bool,
    result_view: ResultView,
    credential_status: Option<StatusMessage>,
    generation_status: Option<StatusMessage>,
    alerts: Vec<String>,
}

impl SessionState {
    pub fn new(default_model: impl Into<String>) -> Self {
        Self {
            api_key: None,
            scripts: Vec::new(),
            current_script: None,
            prompt_template: None,
            generated_continuation: None,
            selected_model: default_model.into(),
            generating: false,
            results_visible: false,
            result_view: ResultView::default(),
            credential_status: None,
            generation_status: None,
            alerts: Vec::new(),
        }
    }

    /// Applies a credential read back from persistent storage at startup.
    /// A key the user entered before the read finished is kept.
    pub fn credential_loaded(&mut self, stored: Option<String>) {
        if self.api_key.is_some() {
            tracing::debug!("keeping credential entered before stored credential arrived");
            return;
        }
        match stored.filter(|key| !key.trim().is_empty()) {
            Some(key) => {
                self.api_key = Some(key);
                self.credential_status = Some(StatusMessage::new(
                    StatusKind::Success,
                    "API key loaded from storage",
                ));
            }
            None => self.api_key = None,
        }
    }

    /// Validates `raw`; on success the trimmed key becomes the session credential
    /// and is returned so the caller can persist it.
    pub fn apply_credential(&mut self, raw: &str) -> Result<String, CredentialError> {
        match validate_credential(raw) {
            Ok(key) => {
                self.api_key = Some(key.clone());
                self.credential_status = Some(StatusMessage::new(
                    StatusKind::Success,
                    "API key saved successfully!",
                ));
                Ok(key)
            }
            Err(err) => {
                self.credential_status = Some(StatusMessage::new(StatusKind::Error, err.to_string()));
                Err(err)
            }
        }
    }

    pub fn clear_credential(&mut self) {
        self.api_key = None;
        self.credential_status = Some(StatusMessage::new(StatusKind::Info, "API key cleared"));
    }

    pub fn report_credential_error(&mut self, message: impl Into<String>) {
        self.credential_status = Some(StatusMessage::new(StatusKind::Error, message));
    }

    pub fn template_loaded(&mut self, outcome: Result<PromptTemplate, AssetError>) {
        match outcome {
            Ok(template) => self.prompt_template = Some(template),
            Err(err) => {
                tracing::error!("failed to load prompt template: {err}");
                self.prompt_template = None;
                self.alerts.push(TEMPLATE_LOAD_ALERT.to_string());
            }
        }
    }

    pub fn scripts_loaded(&mut self, outcome: Result<Vec<ScriptRecord>, AssetError>) {
        self.current_script = None;
        self.generated_continuation = None;
        self.results_visible = false;
        match outcome {
            Ok(scripts) => {
                tracing::info!(count = scripts.len(), "scripts available");
                self.scripts = scripts;
            }
            Err(err) => {
                tracing::error!("failed to load scripts: {err}");
                self.scripts.clear();
                self.alerts.push(DATASET_LOAD_ALERT.to_string());
            }
        }
    }

    /// Blocking load-failure messages not yet shown to the user.
    pub fn take_alerts(&mut self) -> Vec<String> {
        std::mem::take(&mut self.alerts)
    }

    /// Selects the script at `index`. An empty or out-of-range selection clears
    /// the current script. Ignored while a generation is in flight.
    pub fn select_script(&mut self, index: Option<usize>) -> Option<&ScriptRecord> {
        if self.generating {
            tracing::debug!(?index, "ignoring script selection during generation");
            return self.current_script();
        }

        self.generated_continuation = None;
        self.results_visible = false;
        self.current_script = index.filter(|&index| index < self.scripts.len());
        self.current_script()
    }

    /// Draws a uniform index with `rng` and selects it.
    pub fn select_random_script<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Option<usize> {
        let index = (!self.scripts.is_empty()).then(|| rng.gen_range(0..self.scripts.len()));
        self.select_script(index);
        self.current_script
    }

    pub fn set_selected_model(&mut self, model: impl Into<String>) {
        self.selected_model = model.into();
    }

    /// Checks preconditions and enters `Generating`, returning the request to issue.
    /// A refused request only updates the generation status.
    pub fn begin_generation(&mut self, model: &str) -> Result<GenerationRequest, GenerationError> {
        let request = self.prepare_request(model);
        match &request {
            Ok(_) => {
                self.selected_model = model.to_string();
                self.generating = true;
                self.generation_status =
                    Some(StatusMessage::new(StatusKind::Loading, GENERATING_STATUS));
            }
            Err(err) => {
                self.generation_status = Some(StatusMessage::new(StatusKind::Error, err.to_string()));
            }
        }
        request
    }

    fn prepare_request(&self, model: &str) -> Result<GenerationRequest, GenerationError> {
        if self.generating {
            return Err(GenerationError::Busy);
        }
        let api_key = self.api_key.as_ref().ok_or(GenerationError::MissingCredential)?;
        let script = self.current_script().ok_or(GenerationError::MissingScript)?;
        let template = self
            .prompt_template
            .as_ref()
            .ok_or(GenerationError::MissingTemplate)?;

        Ok(GenerationRequest {
            api_key: api_key.clone(),
            model: model.to_string(),
            prompt: template.render(&script.context),
        })
    }

    /// Leaves `Generating` for every outcome.
    pub fn finish_generation(&mut self, outcome: Result<String, GenerationError>) {
        match outcome {
            Ok(raw) => self.complete_generation(&raw),
            Err(err) => self.fail_generation(&err),
        }
    }

    pub fn complete_generation(&mut self, raw: &str) {
        self.generating = false;
        self.generated_continuation = Some(extract_continuation(raw));
        self.generation_status = Some(StatusMessage::new(StatusKind::Success, "Generation complete!"));
        self.results_visible = true;
        self.result_view = ResultView::Generated;
    }

    pub fn fail_generation(&mut self, err: &GenerationError) {
        tracing::warn!("generation failed: {err}");
        self.generating = false;
        self.generation_status = Some(StatusMessage::new(StatusKind::Error, format!("Error: {err}")));
    }

    pub fn show_view(&mut self, view: ResultView) {
        self.result_view = view;
    }

    pub fn is_view_visible(&self, view: ResultView) -> bool {
        self.result_view == view
    }

    pub fn phase(&self) -> SessionPhase {
        if self.api_key.is_none() {
            SessionPhase::NoCredential
        } else if self.generating {
            SessionPhase::Generating
        } else if self.results_visible {
            SessionPhase::ResultsShown
        } else {
            SessionPhase::Ready
        }
    }

    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }

    pub fn main_surface_visible(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn generate_enabled(&self) -> bool {
        self.current_script.is_some() && !self.generating
    }

    pub fn is_generating(&self) -> bool {
        self.generating
    }

    pub fn results_visible(&self) -> bool {
        self.results_visible && self.generated_continuation.is_some()
    }

    pub fn result_view(&self) -> ResultView {
        self.result_view
    }

    pub fn scripts(&self) -> &[ScriptRecord] {
        &self.scripts
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current_script
    }

    pub fn current_script(&self) -> Option<&ScriptRecord> {
        self.current_script.and_then(|index| self.scripts.get(index))
    }

    pub fn prompt_template(&self) -> Option<&PromptTemplate> {
        self.prompt_template.as_ref()
    }

    pub fn generated_continuation(&self) -> Option<&str> {
        self.generated_continuation.as_deref()
    }

    pub fn selected_model(&self) -> &str {
        &self.selected_model
    }

    pub fn model_display_name(&self) -> &str {
        model_display_name(&self.selected_model)
    }

    pub fn credential_status(&self) -> Option<&StatusMessage> {
        self.credential_status.as_ref()
    }

    pub fn generation_status(&self) -> Option<&StatusMessage> {
        self.generation_status.as_ref()
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Credential(#[from] CredentialError),
    #[error("failed to persist credential: {0:#}")]
    Persistence(anyhow::Error),
    #[error(transparent)]
    Generation(#[from] GenerationError),
}

/// Async driver around a [`SessionState`].
pub struct SessionController {
    state: SessionState,
    credentials: Arc<dyn CredentialStore>,
    assets: Arc<dyn AssetLoader>,
    backend: Arc<dyn CompletionBackend>,
}

impl SessionController {
    pub fn new(
        default_model: impl Into<String>,
        credentials: Arc<dyn CredentialStore>,
        assets: Arc<dyn AssetLoader>,
        backend: Arc<dyn CompletionBackend>,
    ) -> Self {
        Self {
            state: SessionState::new(default_model),
            credentials,
            assets,
            backend,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut SessionState {
        &mut self.state
    }

    /// Restores the stored credential and loads both assets.
    pub async fn startup(&mut self) {
        let stored = match self.credentials.load().await {
            Ok(stored) => stored,
            Err(err) => {
                tracing::warn!("could not read stored credential: {err:#}");
                None
            }
        };
        self.state.credential_loaded(stored);

        let (template, scripts) =
            tokio::join!(self.assets.load_template(), self.assets.load_dataset());
        self.state.template_loaded(template);
        self.state.scripts_loaded(scripts);
    }

    pub async fn save_credential(&mut self, raw: &str) -> Result<(), SessionError> {
        let key = self.state.apply_credential(raw)?;
        if let Err(err) = self.credentials.save(&key).await {
            self.state
                .report_credential_error(format!("API key is active but could not be saved: {err}"));
            return Err(SessionError::Persistence(err));
        }
        Ok(())
    }

    pub async fn clear_credential(&mut self) -> Result<(), SessionError> {
        self.state.clear_credential();
        self.credentials
            .clear()
            .await
            .map_err(SessionError::Persistence)
    }

    /// Runs one generation with `model`; the session always leaves `Generating`,
    /// even if this future is dropped mid-request.
    pub async fn generate(&mut self, model: &str) -> Result<String, SessionError> {
        let request = self.state.begin_generation(model)?;
        let backend = Arc::clone(&self.backend);

        let mut guard = GenerationGuard {
            state: &mut self.state,
            settled: false,
        };
        let outcome = backend.complete(&request).await;
        guard.settle(outcome)
    }
}

struct GenerationGuard<'a> {
    state: &'a mut SessionState,
    settled: bool,
}

impl GenerationGuard<'_> {
    fn settle(&mut self, outcome: Result<String, GenerationError>) -> Result<String, SessionError> {
        self.settled = true;
        match outcome {
            Ok(raw) => {
                self.state.complete_generation(&raw);
                Ok(self
                    .state
                    .generated_continuation()
                    .unwrap_or_default()
                    .to_string())
            }
            Err(err) => {
                self.state.fail_generation(&err);
                Err(err.into())
            }
        }
    }
}

impl Drop for GenerationGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.state.fail_generation(&GenerationError::Interrupted);
        }
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
