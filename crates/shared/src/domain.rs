use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Dataset identifier. Published datasets use both string and integer ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ScriptId(pub String);

impl<'de> Deserialize<'de> for ScriptId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Text(String),
            Int(i64),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Text(text) => Self(text),
            RawId::Int(value) => Self(value.to_string()),
        })
    }
}

impl fmt::Display for ScriptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptStats {
    pub total_lines: u32,
    pub context_lines: u32,
    pub continuation_lines: u32,
    pub split_ratio: f64,
    pub split_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptRecord {
    pub id: ScriptId,
    pub title: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub description: String,
    pub context: String,
    pub continuation: String,
    pub stats: ScriptStats,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

impl ScriptRecord {
    /// Picker entry text, e.g. `script_003: The Heist`.
    pub fn label(&self) -> String {
        format!("{}: {}", self.id, self.title)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelOption {
    pub id: &'static str,
    pub display_name: &'static str,
}

pub const DEFAULT_MODEL_ID: &str = "openai/gpt-5.2";

pub const MODEL_CATALOG: &[ModelOption] = &[
    ModelOption {
        id: "openai/gpt-5.2",
        display_name: "GPT-5.2",
    },
    ModelOption {
        id: "google/gemini-3-flash-preview",
        display_name: "Gemini 3 Flash Preview",
    },
    ModelOption {
        id: "z-ai/glm-4.7",
        display_name: "GLM-4.7",
    },
    ModelOption {
        id: "minimax/minimax-m2.1",
        display_name: "MiniMax M2.1",
    },
];

pub fn model_display_name(model_id: &str) -> &str {
    MODEL_CATALOG
        .iter()
        .find(|option| option.id == model_id)
        .map(|option| option.display_name)
        .unwrap_or(model_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_json(id: &str) -> String {
        format!(
            r#"{{"id":{id},"title":"Night Shift","description":"two nurses","context":"A: hi","continuation":"B: bye","stats":{{"total_lines":10,"context_lines":6,"continuation_lines":4,"split_ratio":0.6,"split_type":"scene_boundary"}}}}"#
        )
    }

    #[test]
    fn script_id_accepts_strings_and_integers() {
        let text: ScriptRecord = serde_json::from_str(&record_json("\"script_007\"")).expect("text id");
        assert_eq!(text.id, ScriptId("script_007".to_string()));

        let numeric: ScriptRecord = serde_json::from_str(&record_json("42")).expect("numeric id");
        assert_eq!(numeric.id.to_string(), "42");
        assert_eq!(numeric.label(), "42: Night Shift");
    }

    #[test]
    fn description_defaults_to_empty() {
        let raw = r#"{"id":"s1","title":"t","context":"c","continuation":"k","stats":{"total_lines":2,"context_lines":1,"continuation_lines":1,"split_ratio":0.5,"split_type":"middle"}}"#;
        let record: ScriptRecord = serde_json::from_str(raw).expect("record");
        assert!(record.description.is_empty());
        assert_eq!(record.stats.split_type, "middle");
    }

    #[test]
    fn null_description_reads_as_empty() {
        let raw = r#"{"id":7,"title":"t","description":null,"context":"c","continuation":"k","stats":{"total_lines":2,"context_lines":1,"continuation_lines":1,"split_ratio":0.5,"split_type":"middle"}}"#;
        let record: ScriptRecord = serde_json::from_str(raw).expect("record");
        assert_eq!(record.description, "");
        assert_eq!(record.label(), "7: t");
    }

    #[test]
    fn unknown_models_display_their_raw_id() {
        assert_eq!(model_display_name(DEFAULT_MODEL_ID), "GPT-5.2");
        assert_eq!(model_display_name("z-ai/glm-4.7"), "GLM-4.7");
        assert_eq!(model_display_name("acme/custom"), "acme/custom");
    }
}
