//! Runtime bridge between UI command queue and backend event intake.

use std::{sync::Arc, thread};

use client_core::{
    AssetLoader, CompletionBackend, CompletionClient, CredentialStore, GenerationError,
    LocalAssetLoader, MemoryCredentialStore, Settings, SqliteCredentialStore,
};
use crossbeam_channel::{Receiver, Sender};
use storage::Storage;

use crate::backend_bridge::commands::BackendCommand;
use crate::controller::events::{UiError, UiErrorContext, UiEvent};

pub fn launch(settings: Settings, cmd_rx: Receiver<BackendCommand>, ui_tx: Sender<UiEvent>) {
    thread::spawn(move || {
        let runtime = match tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(err) => {
                let _ = ui_tx.try_send(UiEvent::Error(UiError::from_message(
                    UiErrorContext::BackendStartup,
                    format!("backend worker startup failure: failed to build runtime: {err}"),
                )));
                tracing::error!("failed to build backend runtime: {err}");
                return;
            }
        };

        runtime.block_on(async move {
            let credentials = open_credential_store(&settings, &ui_tx).await;
            let assets: Arc<dyn AssetLoader> = Arc::new(LocalAssetLoader::from_settings(&settings));
            let backend: Arc<dyn CompletionBackend> =
                Arc::new(CompletionClient::from_settings(&settings));
            let _ = ui_tx.try_send(UiEvent::Info("Backend worker ready".to_string()));

            while let Ok(cmd) = cmd_rx.recv() {
                match cmd {
                    BackendCommand::Startup => {
                        match credentials.load().await {
                            Ok(stored) => {
                                let _ = ui_tx.try_send(UiEvent::CredentialLoaded(stored));
                            }
                            Err(err) => {
                                let _ = ui_tx.try_send(UiEvent::CredentialLoaded(None));
                                let _ = ui_tx.try_send(UiEvent::Error(UiError::from_message(
                                    UiErrorContext::Credential,
                                    format!("could not read stored API key: {err:#}"),
                                )));
                            }
                        }

                        let (template, dataset) =
                            tokio::join!(assets.load_template(), assets.load_dataset());
                        let _ = ui_tx.try_send(UiEvent::TemplateLoaded(template));
                        let _ = ui_tx.try_send(UiEvent::DatasetLoaded(dataset));
                    }
                    BackendCommand::SaveCredential { key } => {
                        let event = match credentials.save(&key).await {
                            Ok(()) => UiEvent::CredentialSaved,
                            Err(err) => UiEvent::Error(UiError::from_message(
                                UiErrorContext::Credential,
                                format!("could not store API key: {err:#}"),
                            )),
                        };
                        let _ = ui_tx.try_send(event);
                    }
                    BackendCommand::ClearCredential => {
                        let event = match credentials.clear().await {
                            Ok(()) => UiEvent::CredentialCleared,
                            Err(err) => UiEvent::Error(UiError::from_message(
                                UiErrorContext::Credential,
                                format!("could not remove stored API key: {err:#}"),
                            )),
                        };
                        let _ = ui_tx.try_send(event);
                    }
                    BackendCommand::Generate { request } => {
                        let backend = Arc::clone(&backend);
                        let ui_tx = ui_tx.clone();
                        tokio::spawn(async move {
                            let outcome = backend.complete(&request).await;
                            if !deliver_generation(ui_tx, outcome).await {
                                tracing::debug!("ui closed before generation finished");
                            }
                        });
                    }
                }
            }
            tracing::info!("ui command queue closed; backend worker exiting");
        });
    });
}

/// Waits for room in the UI queue on the blocking pool; the result must not be
/// dropped or the session would stay in `Generating`.
async fn deliver_generation(
    ui_tx: Sender<UiEvent>,
    outcome: Result<String, GenerationError>,
) -> bool {
    tokio::task::spawn_blocking(move || ui_tx.send(UiEvent::GenerationFinished(outcome)).is_ok())
        .await
        .unwrap_or(false)
}

/// Falls back to a process-local store so the session stays usable when the
/// database cannot be opened.
async fn open_credential_store(
    settings: &Settings,
    ui_tx: &Sender<UiEvent>,
) -> Arc<dyn CredentialStore> {
    let database_url = Storage::sqlite_url_for_data_dir(&settings.data_dir);
    match SqliteCredentialStore::open(&database_url).await {
        Ok(store) => Arc::new(store),
        Err(err) => {
            tracing::error!(%database_url, "failed to open credential storage: {err:#}");
            let _ = ui_tx.try_send(UiEvent::Error(UiError::from_message(
                UiErrorContext::BackendStartup,
                format!(
                    "backend worker startup failure: could not open '{}'; the API key will not be remembered: {err:#}",
                    settings.data_dir.display()
                ),
            )));
            Arc::new(MemoryCredentialStore::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;
    use std::time::Duration;

    #[tokio::test(flavor = "current_thread")]
    async fn generation_result_waits_for_room_without_stalling_the_runtime() {
        let (ui_tx, ui_rx) = bounded(1);
        assert!(ui_tx.try_send(UiEvent::Info("busy".to_string())).is_ok());

        let delivery = tokio::spawn(deliver_generation(ui_tx, Ok("NORA: Stay.".to_string())));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!delivery.is_finished());

        assert!(matches!(ui_rx.try_recv(), Ok(UiEvent::Info(_))));
        assert!(delivery.await.expect("join"));
        assert!(matches!(
            ui_rx.try_recv(),
            Ok(UiEvent::GenerationFinished(Ok(text))) if text == "NORA: Stay."
        ));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn closed_ui_reports_undelivered_generation() {
        let (ui_tx, ui_rx) = bounded(1);
        drop(ui_rx);
        assert!(!deliver_generation(ui_tx, Err(GenerationError::Interrupted)).await);
    }
}
