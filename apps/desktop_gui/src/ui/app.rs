use std::{collections::VecDeque, time::Duration};

use client_core::{credential::mask_credential, GenerationError, ResultView, SessionState};
use crossbeam_channel::{Receiver, Sender};
use eframe::egui;
use shared::domain::MODEL_CATALOG;

use crate::backend_bridge::commands::BackendCommand;
use crate::controller::{
    events::UiEvent, orchestration::dispatch_backend_command, reducer::apply_event,
};
use crate::ui::widgets;

pub const SETTINGS_STORAGE_KEY: &str = "dramabench.selected_model";
const NO_SCRIPT_LABEL: &str = "-- Select a script --";

pub struct DramaBenchApp {
    cmd_tx: Sender<BackendCommand>,
    ui_rx: Receiver<UiEvent>,
    session: SessionState,
    api_key_input: String,
    reveal_key: bool,
    focus_credential: bool,
    status: String,
    alerts: VecDeque<String>,
}

impl DramaBenchApp {
    pub fn new(
        cmd_tx: Sender<BackendCommand>,
        ui_rx: Receiver<UiEvent>,
        default_model: String,
        persisted_model: Option<String>,
    ) -> Self {
        let model = persisted_model
            .filter(|model| MODEL_CATALOG.iter().any(|option| option.id == model.as_str()))
            .unwrap_or(default_model);
        let mut app = Self {
            cmd_tx,
            ui_rx,
            session: SessionState::new(model),
            api_key_input: String::new(),
            reveal_key: false,
            focus_credential: false,
            status: "Starting backend...".to_string(),
            alerts: VecDeque::new(),
        };
        dispatch_backend_command(&app.cmd_tx, BackendCommand::Startup, &mut app.status);
        app
    }

    fn process_ui_events(&mut self) {
        while let Ok(event) = self.ui_rx.try_recv() {
            let effects = apply_event(&mut self.session, event);
            if let Some(status) = effects.status {
                self.status = status;
            }
            self.focus_credential |= effects.focus_credential;
        }
        self.alerts.extend(self.session.take_alerts());
    }

    fn save_credential(&mut self) {
        if let Ok(key) = self.session.apply_credential(&self.api_key_input) {
            self.api_key_input.clear();
            self.reveal_key = false;
            dispatch_backend_command(
                &self.cmd_tx,
                BackendCommand::SaveCredential { key },
                &mut self.status,
            );
        }
    }

    fn clear_credential(&mut self) {
        self.session.clear_credential();
        self.api_key_input.clear();
        dispatch_backend_command(&self.cmd_tx, BackendCommand::ClearCredential, &mut self.status);
    }

    fn start_generation(&mut self) {
        let model = self.session.selected_model().to_string();
        match self.session.begin_generation(&model) {
            Ok(request) => {
                let queued = dispatch_backend_command(
                    &self.cmd_tx,
                    BackendCommand::Generate { request },
                    &mut self.status,
                );
                if !queued {
                    self.session.fail_generation(&GenerationError::Interrupted);
                }
            }
            Err(err) => {
                tracing::debug!("generation refused: {err}");
                self.focus_credential |= matches!(err, GenerationError::MissingCredential);
            }
        }
    }

    fn show_main(&mut self, ui: &mut egui::Ui) {
        self.show_credential_card(ui);
        if !self.session.main_surface_visible() {
            return;
        }

        ui.add_space(10.0);
        self.show_script_card(ui);
        ui.add_space(10.0);
        self.show_generation_card(ui);
        if self.session.results_visible() {
            ui.add_space(10.0);
            self.show_results_card(ui);
        }
    }

    fn show_credential_card(&mut self, ui: &mut egui::Ui) {
        widgets::card(ui, "OpenRouter API key", |ui| {
            if let Some(key) = self.session.api_key() {
                ui.label(format!("Configured: {}", mask_credential(key)));
            } else {
                ui.label("Enter your OpenRouter API key to start generating continuations.");
            }

            ui.horizontal(|ui| {
                let response = ui.add(
                    egui::TextEdit::singleline(&mut self.api_key_input)
                        .password(!self.reveal_key)
                        .hint_text("sk-or-v1-...")
                        .desired_width(360.0),
                );
                if self.focus_credential {
                    response.request_focus();
                    self.focus_credential = false;
                }
                let submitted =
                    response.lost_focus() && ui.input(|input| input.key_pressed(egui::Key::Enter));

                ui.checkbox(&mut self.reveal_key, "Show");
                if ui.button("Save").clicked() || submitted {
                    self.save_credential();
                }
                if ui
                    .add_enabled(self.session.api_key().is_some(), egui::Button::new("Clear"))
                    .clicked()
                {
                    self.clear_credential();
                }
            });

            widgets::status_line(ui, self.session.credential_status());
        });
    }

    fn show_script_card(&mut self, ui: &mut egui::Ui) {
        let generating = self.session.is_generating();
        widgets::card(ui, "Script", |ui| {
            let labels: Vec<String> = self.session.scripts().iter().map(|s| s.label()).collect();
            let current = self.session.current_index();
            let selected_text = current
                .and_then(|index| labels.get(index).cloned())
                .unwrap_or_else(|| NO_SCRIPT_LABEL.to_string());

            let mut chosen: Option<Option<usize>> = None;
            ui.horizontal(|ui| {
                ui.add_enabled_ui(!generating, |ui| {
                    egui::ComboBox::from_id_salt("script_select")
                        .selected_text(selected_text)
                        .width(420.0)
                        .show_ui(ui, |ui| {
                            if ui.selectable_label(current.is_none(), NO_SCRIPT_LABEL).clicked() {
                                chosen = Some(None);
                            }
                            for (index, label) in labels.iter().enumerate() {
                                if ui.selectable_label(current == Some(index), label).clicked() {
                                    chosen = Some(Some(index));
                                }
                            }
                        });
                });

                let can_randomize = !generating && !labels.is_empty();
                if ui
                    .add_enabled(can_randomize, egui::Button::new("🎲 Random"))
                    .clicked()
                {
                    let mut rng = rand::thread_rng();
                    self.session.select_random_script(&mut rng);
                }
            });
            if let Some(index) = chosen {
                self.session.select_script(index);
            }

            let Some(script) = self.session.current_script() else {
                return;
            };
            ui.add_space(8.0);
            ui.heading(&script.title);
            if !script.description.is_empty() {
                ui.label(egui::RichText::new(&script.description).italics());
            }
            widgets::script_stats(ui, &script.stats);
            ui.add_space(6.0);
            ui.strong("Context");
            widgets::script_text(ui, "context_text", &script.context, 260.0);
        });
    }

    fn show_generation_card(&mut self, ui: &mut egui::Ui) {
        widgets::card(ui, "Generate", |ui| {
            let generating = self.session.is_generating();
            let mut selected = self.session.selected_model().to_string();
            ui.add_enabled_ui(!generating, |ui| {
                ui.horizontal_wrapped(|ui| {
                    for option in MODEL_CATALOG {
                        ui.radio_value(&mut selected, option.id.to_string(), option.display_name);
                    }
                });
            });
            if selected != self.session.selected_model() {
                self.session.set_selected_model(selected);
            }

            ui.add_space(6.0);
            if ui
                .add_enabled(
                    self.session.generate_enabled(),
                    egui::Button::new("Generate Continuation"),
                )
                .clicked()
            {
                self.start_generation();
            }
            widgets::status_line(ui, self.session.generation_status());
        });
    }

    fn show_results_card(&mut self, ui: &mut egui::Ui) {
        let title = format!("Results ({})", self.session.model_display_name());
        widgets::card(ui, &title, |ui| {
            ui.horizontal(|ui| {
                for view in ResultView::ALL {
                    if ui
                        .selectable_label(self.session.is_view_visible(view), view.label())
                        .clicked()
                    {
                        self.session.show_view(view);
                    }
                }
            });
            ui.add_space(6.0);

            let generated = self.session.generated_continuation().unwrap_or_default();
            let ground_truth = self
                .session
                .current_script()
                .map(|script| script.continuation.as_str())
                .unwrap_or_default();

            match self.session.result_view() {
                ResultView::Generated => {
                    if ui.small_button("Copy").clicked() {
                        ui.ctx().copy_text(generated.to_string());
                    }
                    widgets::script_text(ui, "generated_text", generated, 420.0);
                }
                ResultView::GroundTruth => {
                    widgets::script_text(ui, "ground_truth_text", ground_truth, 420.0);
                }
                ResultView::Comparison => {
                    ui.columns(2, |columns| {
                        columns[0].strong("Generated");
                        widgets::script_text(&mut columns[0], "compare_generated", generated, 420.0);
                        columns[1].strong("Ground Truth");
                        widgets::script_text(
                            &mut columns[1],
                            "compare_ground_truth",
                            ground_truth,
                            420.0,
                        );
                    });
                }
            }
        });
    }

    fn show_alert(&mut self, ctx: &egui::Context) {
        let Some(message) = self.alerts.front().cloned() else {
            return;
        };
        let mut dismissed = false;
        egui::Window::new("Load error")
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                ui.label(message);
                ui.add_space(8.0);
                if ui.button("OK").clicked() {
                    dismissed = true;
                }
            });
        if dismissed {
            self.alerts.pop_front();
        }
    }
}

impl eframe::App for DramaBenchApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.process_ui_events();

        egui::TopBottomPanel::top("header").show(ctx, |ui| {
            ui.add_space(4.0);
            ui.heading("DramaBench");
            ui.label("Script continuation with large language models");
            ui.add_space(4.0);
        });
        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            ui.label(egui::RichText::new(&self.status).small().weak());
        });

        let interactive = self.alerts.is_empty();
        egui::CentralPanel::default().show(ctx, |ui| {
            ui.add_enabled_ui(interactive, |ui| {
                egui::ScrollArea::vertical()
                    .auto_shrink([false, false])
                    .show(ui, |ui| self.show_main(ui));
            });
        });
        self.show_alert(ctx);

        let delay = if self.session.is_generating() { 50 } else { 100 };
        ctx.request_repaint_after(Duration::from_millis(delay));
    }

    fn save(&mut self, storage: &mut dyn eframe::Storage) {
        storage.set_string(SETTINGS_STORAGE_KEY, self.session.selected_model().to_string());
    }
}
