use client_core::{StatusKind, StatusMessage};
use eframe::egui;
use shared::domain::ScriptStats;

pub fn status_color(kind: StatusKind) -> egui::Color32 {
    match kind {
        StatusKind::Success => egui::Color32::from_rgb(46, 160, 67),
        StatusKind::Error => egui::Color32::from_rgb(218, 54, 51),
        StatusKind::Info => egui::Color32::from_rgb(88, 166, 255),
        StatusKind::Loading => egui::Color32::from_rgb(210, 153, 34),
    }
}

pub fn status_line(ui: &mut egui::Ui, status: Option<&StatusMessage>) {
    let Some(status) = status else {
        return;
    };
    ui.horizontal(|ui| {
        if status.kind == StatusKind::Loading {
            ui.spinner();
        }
        ui.colored_label(status_color(status.kind), &status.text);
    });
}

pub fn card<R>(ui: &mut egui::Ui, title: &str, add_contents: impl FnOnce(&mut egui::Ui) -> R) -> R {
    egui::Frame::NONE
        .fill(ui.visuals().faint_bg_color)
        .stroke(ui.visuals().widgets.noninteractive.bg_stroke)
        .corner_radius(8.0)
        .inner_margin(egui::Margin::symmetric(14, 12))
        .show(ui, |ui| {
            ui.set_width(ui.available_width());
            ui.strong(title);
            ui.add_space(6.0);
            add_contents(ui)
        })
        .inner
}

pub fn script_stats(ui: &mut egui::Ui, stats: &ScriptStats) {
    ui.horizontal_wrapped(|ui| {
        stat_chip(ui, "Total lines", stats.total_lines.to_string());
        stat_chip(ui, "Context", stats.context_lines.to_string());
        stat_chip(ui, "Continuation", stats.continuation_lines.to_string());
        stat_chip(ui, "Split ratio", format!("{:.2}", stats.split_ratio));
        stat_chip(ui, "Split type", stats.split_type.clone());
    });
}

fn stat_chip(ui: &mut egui::Ui, label: &str, value: String) {
    egui::Frame::NONE
        .fill(ui.visuals().extreme_bg_color)
        .corner_radius(6.0)
        .inner_margin(egui::Margin::symmetric(8, 4))
        .show(ui, |ui| {
            ui.label(egui::RichText::new(label).small().weak());
            ui.label(egui::RichText::new(value).strong());
        });
}

/// Scrollable monospace block; `id` keeps scroll offsets apart.
pub fn script_text(ui: &mut egui::Ui, id: &str, text: &str, max_height: f32) {
    egui::ScrollArea::vertical()
        .id_salt(id)
        .max_height(max_height)
        .auto_shrink([false, true])
        .show(ui, |ui| {
            ui.label(egui::RichText::new(text).monospace());
        });
}
