//! Prompt template and script dataset loading.

use std::path::PathBuf;

use async_trait::async_trait;
use reqwest::Client;
use shared::domain::ScriptRecord;
use thiserror::Error;

pub const CONTEXT_PLACEHOLDER: &str = "{{context}}";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetLocation {
    Path(PathBuf),
    Url(String),
}

impl AssetLocation {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.starts_with("http://") || raw.starts_with("https://") {
            Self::Url(raw.to_string())
        } else {
            Self::Path(PathBuf::from(raw))
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Self::Path(path) => path.display().to_string(),
            Self::Url(url) => url.clone(),
        }
    }
}

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("failed to read '{location}': {source}")]
    Io {
        location: String,
        source: std::io::Error,
    },
    #[error("failed to fetch '{location}': {source}")]
    Http {
        location: String,
        source: reqwest::Error,
    },
    #[error("fetching '{location}' returned status {status}")]
    Status { location: String, status: u16 },
    #[error(transparent)]
    Dataset(#[from] DatasetError),
}

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("line {line}: {source}")]
    Malformed {
        line: usize,
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    text: String,
}

impl PromptTemplate {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn has_placeholder(&self) -> bool {
        self.text.contains(CONTEXT_PLACEHOLDER)
    }

    /// Substitutes the first `{{context}}` occurrence.
    pub fn render(&self, context: &str) -> String {
        self.text.replacen(CONTEXT_PLACEHOLDER, context, 1)
    }
}

/// Parses newline-delimited JSON; blank lines are skipped, the first bad line aborts.
pub fn parse_dataset(text: &str) -> Result<Vec<ScriptRecord>, DatasetError> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            serde_json::from_str::<ScriptRecord>(line).map_err(|source| DatasetError::Malformed {
                line: index + 1,
                source,
            })
        })
        .collect()
}

#[async_trait]
pub trait AssetLoader: Send + Sync {
    async fn load_template(&self) -> Result<PromptTemplate, AssetError>;
    async fn load_dataset(&self) -> Result<Vec<ScriptRecord>, AssetError>;
}

pub struct LocalAssetLoader {
    http: Client,
    template: AssetLocation,
    dataset: AssetLocation,
}

impl LocalAssetLoader {
    pub fn new(template: AssetLocation, dataset: AssetLocation) -> Self {
        Self {
            http: Client::new(),
            template,
            dataset,
        }
    }

    pub fn from_settings(settings: &crate::config::Settings) -> Self {
        Self::new(
            AssetLocation::parse(&settings.template_location),
            AssetLocation::parse(&settings.dataset_location),
        )
    }

    async fn read_text(&self, location: &AssetLocation) -> Result<String, AssetError> {
        match location {
            AssetLocation::Path(path) => {
                tokio::fs::read_to_string(path)
                    .await
                    .map_err(|source| AssetError::Io {
                        location: location.describe(),
                        source,
                    })
            }
            AssetLocation::Url(url) => {
                let response = self
                    .http
                    .get(url)
                    .send()
                    .await
                    .map_err(|source| AssetError::Http {
                        location: url.clone(),
                        source,
                    })?;
                if !response.status().is_success() {
                    return Err(AssetError::Status {
                        location: url.clone(),
                        status: response.status().as_u16(),
                    });
                }
                response.text().await.map_err(|source| AssetError::Http {
                    location: url.clone(),
                    source,
                })
            }
        }
    }
}

#[async_trait]
impl AssetLoader for LocalAssetLoader {
    async fn load_template(&self) -> Result<PromptTemplate, AssetError> {
        let template = PromptTemplate::new(self.read_text(&self.template).await?);
        if !template.has_placeholder() {
            tracing::warn!(
                location = %self.template.describe(),
                "prompt template has no {CONTEXT_PLACEHOLDER} placeholder"
            );
        }
        tracing::info!(location = %self.template.describe(), "prompt template loaded");
        Ok(template)
    }

    async fn load_dataset(&self) -> Result<Vec<ScriptRecord>, AssetError> {
        let text = self.read_text(&self.dataset).await?;
        let scripts = parse_dataset(&text)?;
        tracing::info!(
            location = %self.dataset.describe(),
            count = scripts.len(),
            "script dataset loaded"
        );
        Ok(scripts)
    }
}

#[cfg(test)]
#[path = "tests/assets_tests.rs"]
mod tests;
