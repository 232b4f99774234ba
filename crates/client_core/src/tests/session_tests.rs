use super::*;

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use rand::{rngs::StdRng, SeedableRng};
use shared::{
    domain::{ScriptId, ScriptStats, DEFAULT_MODEL_ID},
    error::{ApiError, ErrorCode},
};

use crate::{assets::DatasetError, credential::MemoryCredentialStore};

const KEY: &str = "sk-or-v1-0123456789abcdef";

fn script(n: usize) -> ScriptRecord {
    ScriptRecord {
        id: ScriptId(format!("script_{n:03}")),
        title: format!("Episode {n}"),
        description: format!("description {n}"),
        context: format!("CONTEXT {n}"),
        continuation: format!("GROUND TRUTH {n}"),
        stats: ScriptStats {
            total_lines: 20,
            context_lines: 12,
            continuation_lines: 8,
            split_ratio: 0.6,
            split_type: "scene".to_string(),
        },
    }
}

fn loaded_state(count: usize) -> SessionState {
    let mut state = SessionState::new(DEFAULT_MODEL_ID);
    state.template_loaded(Ok(PromptTemplate::new("Continue this drama:\n{{context}}")));
    state.scripts_loaded(Ok((0..count).map(script).collect()));
    state
}

fn ready_state(count: usize) -> SessionState {
    let mut state = loaded_state(count);
    state.apply_credential(KEY).expect("credential");
    state
}

#[derive(Default)]
struct CountingBackend {
    calls: AtomicUsize,
    prompts: std::sync::Mutex<Vec<String>>,
    reply: Option<String>,
}

impl CountingBackend {
    fn replying(reply: &str) -> Self {
        Self {
            reply: Some(reply.to_string()),
            ..Self::default()
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompletionBackend for CountingBackend {
    async fn complete(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts
            .lock()
            .expect("prompts lock")
            .push(request.prompt.clone());
        match &self.reply {
            Some(reply) => Ok(reply.clone()),
            None => Err(GenerationError::Provider {
                status: 429,
                error: ApiError::new(ErrorCode::RateLimited, "rate limited"),
            }),
        }
    }
}

struct PendingBackend;

#[async_trait]
impl CompletionBackend for PendingBackend {
    async fn complete(&self, _request: &GenerationRequest) -> Result<String, GenerationError> {
        std::future::pending().await
    }
}

struct FixedAssets {
    template: Option<&'static str>,
    scripts: Option<usize>,
}

#[async_trait]
impl AssetLoader for FixedAssets {
    async fn load_template(&self) -> Result<PromptTemplate, AssetError> {
        self.template.map(PromptTemplate::new).ok_or_else(|| AssetError::Io {
            location: "template.txt".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        })
    }

    async fn load_dataset(&self) -> Result<Vec<ScriptRecord>, AssetError> {
        match self.scripts {
            Some(count) => Ok((0..count).map(script).collect()),
            None => Err(AssetError::Dataset(DatasetError::Malformed {
                line: 1,
                source: serde_json::from_str::<ScriptRecord>("{").expect_err("bad json"),
            })),
        }
    }
}

fn controller(
    store: Arc<MemoryCredentialStore>,
    assets: FixedAssets,
    backend: Arc<dyn CompletionBackend>,
) -> SessionController {
    SessionController::new(DEFAULT_MODEL_ID, store, Arc::new(assets), backend)
}

fn healthy_assets() -> FixedAssets {
    FixedAssets {
        template: Some("Continue:\n{{context}}\nEnd."),
        scripts: Some(3),
    }
}

#[test]
fn starts_without_credential_and_hidden_surface() {
    let state = SessionState::new(DEFAULT_MODEL_ID);
    assert_eq!(state.phase(), SessionPhase::NoCredential);
    assert!(!state.main_surface_visible());
    assert!(!state.generate_enabled());
    assert_eq!(state.selected_model(), "openai/gpt-5.2");
}

#[test]
fn malformed_credentials_leave_state_unchanged() {
    let mut state = loaded_state(2);
    state.apply_credential(KEY).expect("first key");

    for raw in ["", "   ", "sk-ant-api03", "bearer sk-or-v1-x", "SK-OR-V1-upper"] {
        assert!(state.apply_credential(raw).is_err(), "accepted {raw:?}");
        assert_eq!(state.api_key(), Some(KEY));
        assert_eq!(
            state.credential_status().map(|s| s.kind),
            Some(StatusKind::Error)
        );
    }
}

#[test]
fn valid_credential_is_trimmed_and_reveals_surface() {
    let mut state = loaded_state(1);
    let key = state
        .apply_credential(&format!("  {KEY}\n"))
        .expect("credential");
    assert_eq!(key, KEY);
    assert_eq!(state.api_key(), Some(KEY));
    assert!(state.main_surface_visible());
    assert_eq!(state.phase(), SessionPhase::Ready);
}

#[test]
fn late_stored_credential_read_keeps_a_key_entered_meanwhile() {
    let mut state = SessionState::new(DEFAULT_MODEL_ID);
    state.apply_credential("sk-or-v1-typed").expect("valid key");

    state.credential_loaded(None);
    assert_eq!(state.api_key(), Some("sk-or-v1-typed"));
    assert!(state.main_surface_visible());

    state.credential_loaded(Some("sk-or-v1-older".to_string()));
    assert_eq!(state.api_key(), Some("sk-or-v1-typed"));
}

#[test]
fn clearing_credential_returns_to_no_credential_from_results() {
    let mut state = ready_state(2);
    state.select_script(Some(1));
    let request = state.begin_generation(DEFAULT_MODEL_ID).expect("request");
    assert_eq!(request.api_key, KEY);
    state.finish_generation(Ok("text".to_string()));
    assert_eq!(state.phase(), SessionPhase::ResultsShown);

    state.clear_credential();
    assert_eq!(state.phase(), SessionPhase::NoCredential);
    assert!(!state.main_surface_visible());
    assert_eq!(state.api_key(), None);
}

#[test]
fn out_of_range_and_empty_selection_clear_current_script() {
    let mut state = ready_state(3);
    for index in [None, Some(3), Some(4), Some(usize::MAX)] {
        state.select_script(Some(0));
        assert!(state.generate_enabled());

        assert!(state.select_script(index).is_none());
        assert!(state.current_script().is_none());
        assert!(!state.generate_enabled());
    }
}

#[test]
fn valid_selection_matches_dataset_entry() {
    let mut state = ready_state(5);
    for index in 0..5 {
        let selected = state.select_script(Some(index)).cloned();
        assert_eq!(selected.as_ref(), state.scripts().get(index));
        assert_eq!(state.current_script(), Some(&script(index)));
        assert!(state.generate_enabled());
    }
}

#[test]
fn selecting_a_new_script_hides_previous_results() {
    let mut state = ready_state(3);
    state.select_script(Some(0));
    state.begin_generation(DEFAULT_MODEL_ID).expect("request");
    state.finish_generation(Ok("draft".to_string()));
    assert!(state.results_visible());

    state.select_script(Some(2));
    assert!(!state.results_visible());
    assert_eq!(state.generated_continuation(), None);
    assert_eq!(state.phase(), SessionPhase::Ready);
}

#[test]
fn random_selection_uses_injected_rng() {
    let mut first = ready_state(10);
    let mut second = ready_state(10);
    let mut rng_a = StdRng::seed_from_u64(7);
    let mut rng_b = StdRng::seed_from_u64(7);

    for _ in 0..20 {
        let a = first.select_random_script(&mut rng_a).expect("index");
        let b = second.select_random_script(&mut rng_b).expect("index");
        assert_eq!(a, b);
        assert!(a < 10);
        assert_eq!(first.current_index(), Some(a));
    }
}

#[test]
fn random_selection_on_empty_dataset_clears() {
    let mut state = ready_state(0);
    let mut rng = StdRng::seed_from_u64(1);
    assert_eq!(state.select_random_script(&mut rng), None);
    assert!(!state.generate_enabled());
}

#[test]
fn generation_requires_credential() {
    let mut state = loaded_state(2);
    state.select_script(Some(0));
    let err = state.begin_generation(DEFAULT_MODEL_ID).expect_err("must refuse");
    assert!(matches!(err, GenerationError::MissingCredential));
    assert_eq!(
        state.generation_status().map(|s| s.text.as_str()),
        Some("Please configure your API key first")
    );
    assert!(!state.is_generating());
}

#[test]
fn generation_requires_script() {
    let mut state = ready_state(2);
    let err = state.begin_generation(DEFAULT_MODEL_ID).expect_err("must refuse");
    assert!(matches!(err, GenerationError::MissingScript));
    assert_eq!(
        state.generation_status().map(|s| s.text.as_str()),
        Some("Please select a script first")
    );
}

#[test]
fn generation_requires_template() {
    let mut state = SessionState::new(DEFAULT_MODEL_ID);
    state.scripts_loaded(Ok(vec![script(0)]));
    state.apply_credential(KEY).expect("credential");
    state.select_script(Some(0));
    let err = state.begin_generation(DEFAULT_MODEL_ID).expect_err("must refuse");
    assert!(matches!(err, GenerationError::MissingTemplate));
}

#[test]
fn begin_generation_fills_template_and_disables_generate() {
    let mut state = ready_state(3);
    state.select_script(Some(2));
    let request = state.begin_generation("z-ai/glm-4.7").expect("request");

    assert_eq!(request.prompt, "Continue this drama:\nCONTEXT 2");
    assert_eq!(request.model, "z-ai/glm-4.7");
    assert_eq!(state.phase(), SessionPhase::Generating);
    assert!(!state.generate_enabled());
    assert_eq!(
        state.generation_status().map(|s| s.kind),
        Some(StatusKind::Loading)
    );
    assert_eq!(state.model_display_name(), "GLM-4.7");

    assert!(matches!(
        state.begin_generation("z-ai/glm-4.7"),
        Err(GenerationError::Busy)
    ));
}

#[test]
fn success_extracts_continuation_and_shows_generated_view() {
    let mut state = ready_state(1);
    state.select_script(Some(0));
    state.begin_generation(DEFAULT_MODEL_ID).expect("request");
    state.show_view(ResultView::Comparison);
    state.finish_generation(Ok(
        "Sure!\n```continuation\n  NORA: Not tonight.\n```\nHope that helps".to_string(),
    ));

    assert_eq!(state.generated_continuation(), Some("NORA: Not tonight."));
    assert_eq!(state.phase(), SessionPhase::ResultsShown);
    assert!(state.generate_enabled());
    assert!(state.is_view_visible(ResultView::Generated));
}

#[test]
fn failure_surfaces_error_and_restores_generate() {
    let mut state = ready_state(1);
    state.select_script(Some(0));
    state.begin_generation(DEFAULT_MODEL_ID).expect("request");
    state.finish_generation(Err(GenerationError::Provider {
        status: 429,
        error: ApiError::new(ErrorCode::RateLimited, "rate limited"),
    }));

    assert_eq!(state.phase(), SessionPhase::Ready);
    assert!(state.generate_enabled());
    assert_eq!(
        state.generation_status().map(|s| s.text.as_str()),
        Some("Error: rate limited")
    );
    assert!(!state.results_visible());
}

#[test]
fn view_toggles_are_mutually_exclusive() {
    let mut state = ready_state(1);
    state.select_script(Some(0));
    state.begin_generation(DEFAULT_MODEL_ID).expect("request");
    state.finish_generation(Ok("x".to_string()));

    for view in [
        ResultView::GroundTruth,
        ResultView::Comparison,
        ResultView::Generated,
        ResultView::Comparison,
    ] {
        state.show_view(view);
        let visible: Vec<_> = ResultView::ALL
            .into_iter()
            .filter(|candidate| state.is_view_visible(*candidate))
            .collect();
        assert_eq!(visible, vec![view]);
        assert_eq!(state.result_view(), view);
    }
}

#[test]
fn load_failures_raise_alerts_and_leave_state_absent() {
    let mut state = SessionState::new(DEFAULT_MODEL_ID);
    state.template_loaded(Err(AssetError::Status {
        location: "t".to_string(),
        status: 404,
    }));
    state.scripts_loaded(Err(AssetError::Status {
        location: "d".to_string(),
        status: 500,
    }));

    assert!(state.prompt_template().is_none());
    assert!(state.scripts().is_empty());
    assert_eq!(
        state.take_alerts(),
        vec![TEMPLATE_LOAD_ALERT.to_string(), DATASET_LOAD_ALERT.to_string()]
    );
    assert!(state.take_alerts().is_empty());
}

#[tokio::test]
async fn startup_restores_stored_credential_and_assets() {
    let store = Arc::new(MemoryCredentialStore::with_key(KEY));
    let mut controller = controller(store, healthy_assets(), Arc::new(CountingBackend::default()));
    controller.startup().await;

    let state = controller.state();
    assert_eq!(state.api_key(), Some(KEY));
    assert!(state.main_surface_visible());
    assert_eq!(state.scripts().len(), 3);
    assert!(state.prompt_template().is_some());
    assert_eq!(
        state.credential_status().map(|s| s.text.as_str()),
        Some("API key loaded from storage")
    );
}

#[tokio::test]
async fn startup_load_failures_become_alerts() {
    let store = Arc::new(MemoryCredentialStore::default());
    let assets = FixedAssets {
        template: None,
        scripts: None,
    };
    let mut controller = controller(store, assets, Arc::new(CountingBackend::default()));
    controller.startup().await;

    assert_eq!(controller.state().phase(), SessionPhase::NoCredential);
    assert_eq!(controller.state_mut().take_alerts().len(), 2);
}

#[tokio::test]
async fn save_and_clear_credential_update_persistent_store() {
    let store = Arc::new(MemoryCredentialStore::default());
    let mut controller = controller(
        Arc::clone(&store),
        healthy_assets(),
        Arc::new(CountingBackend::default()),
    );
    controller.startup().await;

    let err = controller.save_credential("nope").await.expect_err("invalid");
    assert!(matches!(err, SessionError::Credential(CredentialError::InvalidFormat)));
    assert_eq!(store.load().await.expect("load"), None);

    controller
        .save_credential(&format!(" {KEY} "))
        .await
        .expect("save");
    assert_eq!(store.load().await.expect("load").as_deref(), Some(KEY));
    assert_eq!(controller.state().api_key(), Some(KEY));

    controller.clear_credential().await.expect("clear");
    assert_eq!(store.load().await.expect("load"), None);
    assert_eq!(controller.state().phase(), SessionPhase::NoCredential);
}

#[tokio::test]
async fn generate_without_credential_issues_no_request() {
    let backend = Arc::new(CountingBackend::replying("never"));
    let mut controller = controller(
        Arc::new(MemoryCredentialStore::default()),
        healthy_assets(),
        backend.clone(),
    );
    controller.startup().await;
    controller.state_mut().select_script(Some(0));

    let err = controller.generate(DEFAULT_MODEL_ID).await.expect_err("refused");
    assert!(matches!(
        err,
        SessionError::Generation(GenerationError::MissingCredential)
    ));
    assert_eq!(backend.calls(), 0);
}

#[tokio::test]
async fn generate_without_script_issues_no_request() {
    let backend = Arc::new(CountingBackend::replying("never"));
    let mut controller = controller(
        Arc::new(MemoryCredentialStore::with_key(KEY)),
        healthy_assets(),
        backend.clone(),
    );
    controller.startup().await;

    let err = controller.generate(DEFAULT_MODEL_ID).await.expect_err("refused");
    assert!(matches!(
        err,
        SessionError::Generation(GenerationError::MissingScript)
    ));
    assert_eq!(backend.calls(), 0);
}

#[tokio::test]
async fn generate_issues_one_request_and_extracts_result() {
    let backend = Arc::new(CountingBackend::replying(
        "```continuation\nLEO: We leave at dawn.\n```",
    ));
    let mut controller = controller(
        Arc::new(MemoryCredentialStore::with_key(KEY)),
        healthy_assets(),
        backend.clone(),
    );
    controller.startup().await;
    controller.state_mut().select_script(Some(1));

    let text = controller
        .generate("google/gemini-3-flash-preview")
        .await
        .expect("generate");

    assert_eq!(text, "LEO: We leave at dawn.");
    assert_eq!(backend.calls(), 1);
    assert_eq!(
        backend.prompts.lock().expect("prompts").as_slice(),
        ["Continue:\nCONTEXT 1\nEnd.".to_string()]
    );
    let state = controller.state();
    assert_eq!(state.phase(), SessionPhase::ResultsShown);
    assert_eq!(state.model_display_name(), "Gemini 3 Flash Preview");
}

#[tokio::test]
async fn provider_failure_restores_generate_control() {
    let backend = Arc::new(CountingBackend::default());
    let mut controller = controller(
        Arc::new(MemoryCredentialStore::with_key(KEY)),
        healthy_assets(),
        backend.clone(),
    );
    controller.startup().await;
    controller.state_mut().select_script(Some(0));

    let err = controller.generate(DEFAULT_MODEL_ID).await.expect_err("fails");
    assert_eq!(err.to_string(), "rate limited");
    assert!(controller.state().generate_enabled());
    assert_eq!(
        controller.state().generation_status().map(|s| s.text.as_str()),
        Some("Error: rate limited")
    );
}

#[tokio::test]
async fn dropped_generation_still_restores_generate_control() {
    let mut controller = controller(
        Arc::new(MemoryCredentialStore::with_key(KEY)),
        healthy_assets(),
        Arc::new(PendingBackend),
    );
    controller.startup().await;
    controller.state_mut().select_script(Some(0));

    let timed_out = tokio::time::timeout(
        std::time::Duration::from_millis(20),
        controller.generate(DEFAULT_MODEL_ID),
    )
    .await;
    assert!(timed_out.is_err());

    assert!(!controller.state().is_generating());
    assert!(controller.state().generate_enabled());
    assert_eq!(
        controller.state().generation_status().map(|s| s.kind),
        Some(StatusKind::Error)
    );
}
