mod backend_bridge;
mod controller;
mod ui;

use crossbeam_channel::bounded;
use eframe::egui;

use crate::backend_bridge::commands::BackendCommand;
use crate::controller::events::UiEvent;
use crate::ui::{app::SETTINGS_STORAGE_KEY, DramaBenchApp};

fn main() -> eframe::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let settings = client_core::load_settings();
    tracing::info!(
        api_url = %settings.api_url,
        data_dir = %settings.data_dir.display(),
        "starting desktop gui"
    );
    let default_model = settings.default_model.clone();

    let (cmd_tx, cmd_rx) = bounded::<BackendCommand>(64);
    let (ui_tx, ui_rx) = bounded::<UiEvent>(256);
    backend_bridge::runtime::launch(settings, cmd_rx, ui_tx);

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("DramaBench Interactive Demo")
            .with_inner_size([1100.0, 820.0])
            .with_min_inner_size([760.0, 560.0]),
        ..Default::default()
    };
    eframe::run_native(
        "DramaBench Interactive Demo",
        options,
        Box::new(move |cc| {
            let persisted_model = cc
                .storage
                .and_then(|storage| storage.get_string(SETTINGS_STORAGE_KEY));
            Ok(Box::new(DramaBenchApp::new(
                cmd_tx,
                ui_rx,
                default_model,
                persisted_model,
            )))
        }),
    )
}
