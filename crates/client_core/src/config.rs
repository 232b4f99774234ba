use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::Deserialize;
use shared::{domain::DEFAULT_MODEL_ID, protocol::CLIENT_TITLE};
use url::Url;

pub const CONFIG_FILE_NAME: &str = "dramabench.toml";
pub const DEFAULT_API_URL: &str = "https://openrouter.ai/api/v1/chat/completions";
pub const DEFAULT_TEMPLATE_LOCATION: &str = "data/demo/drama_continuation_prompt_template.txt";
pub const DEFAULT_DATASET_LOCATION: &str = "data/demo/dramabench_continuation_100.jsonl";
pub const DEFAULT_REFERER: &str = "app://dramabench-desktop";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub api_url: String,
    pub template_location: String,
    pub dataset_location: String,
    pub default_model: String,
    pub referer: String,
    pub app_title: String,
    pub data_dir: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.into(),
            template_location: DEFAULT_TEMPLATE_LOCATION.into(),
            dataset_location: DEFAULT_DATASET_LOCATION.into(),
            default_model: DEFAULT_MODEL_ID.into(),
            referer: DEFAULT_REFERER.into(),
            app_title: CLIENT_TITLE.into(),
            data_dir: default_data_dir(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileSettings {
    api_url: Option<String>,
    template_location: Option<String>,
    dataset_location: Option<String>,
    default_model: Option<String>,
    referer: Option<String>,
    app_title: Option<String>,
    data_dir: Option<PathBuf>,
}

pub fn load_settings() -> Settings {
    load_settings_with(Path::new(CONFIG_FILE_NAME), |name| std::env::var(name).ok())
}

/// Defaults, then the optional TOML file, then environment overrides.
pub fn load_settings_with(
    config_path: &Path,
    env: impl Fn(&str) -> Option<String>,
) -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string(config_path) {
        match toml::from_str::<FileSettings>(&raw) {
            Ok(file_cfg) => apply_file_settings(&mut settings, file_cfg),
            Err(err) => tracing::warn!(
                path = %config_path.display(),
                "ignoring unreadable settings file: {err}"
            ),
        }
    }

    let lookup = |names: &[&str]| {
        names
            .iter()
            .filter_map(|name| env(name))
            .map(|value| value.trim().to_string())
            .rfind(|value| !value.is_empty())
    };

    if let Some(v) = lookup(&["DRAMABENCH_API_URL", "APP__API_URL"]) {
        settings.api_url = v;
    }
    if let Some(v) = lookup(&["DRAMABENCH_TEMPLATE", "APP__TEMPLATE_LOCATION"]) {
        settings.template_location = v;
    }
    if let Some(v) = lookup(&["DRAMABENCH_DATASET", "APP__DATASET_LOCATION"]) {
        settings.dataset_location = v;
    }
    if let Some(v) = lookup(&["DRAMABENCH_MODEL", "APP__DEFAULT_MODEL"]) {
        settings.default_model = v;
    }
    if let Some(v) = lookup(&["DRAMABENCH_REFERER", "APP__REFERER"]) {
        settings.referer = v;
    }
    if let Some(v) = lookup(&["DRAMABENCH_DATA_DIR", "APP__DATA_DIR"]) {
        settings.data_dir = PathBuf::from(v);
    }

    settings.referer = normalize_referer(&settings.referer);
    settings
}

fn apply_file_settings(settings: &mut Settings, file_cfg: FileSettings) {
    if let Some(v) = file_cfg.api_url {
        settings.api_url = v;
    }
    if let Some(v) = file_cfg.template_location {
        settings.template_location = v;
    }
    if let Some(v) = file_cfg.dataset_location {
        settings.dataset_location = v;
    }
    if let Some(v) = file_cfg.default_model {
        settings.default_model = v;
    }
    if let Some(v) = file_cfg.referer {
        settings.referer = v;
    }
    if let Some(v) = file_cfg.app_title {
        settings.app_title = v;
    }
    if let Some(v) = file_cfg.data_dir {
        settings.data_dir = v;
    }
}

/// Reduces an http(s) referer to its origin (`scheme://host[:port]`).
fn normalize_referer(raw: &str) -> String {
    let raw = raw.trim();
    match Url::parse(raw) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => url.origin().ascii_serialization(),
        _ => raw.to_string(),
    }
}

/// Per-user local data dir (`~/.local/share`, `%LOCALAPPDATA%`, ...), else `./.dramabench`.
pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|base| base.join("dramabench"))
        .unwrap_or_else(|| PathBuf::from(".dramabench"))
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
