//! Summary statistics and consistency checks over a loaded script dataset.

use std::collections::{BTreeMap, HashSet};

use shared::domain::ScriptRecord;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LengthSummary {
    pub min: usize,
    pub max: usize,
    pub avg: f64,
}

impl LengthSummary {
    fn from_lengths(lengths: &[usize]) -> Option<Self> {
        let min = *lengths.iter().min()?;
        let max = *lengths.iter().max()?;
        let avg = lengths.iter().sum::<usize>() as f64 / lengths.len() as f64;
        Some(Self { min, max, avg })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DatasetSummary {
    pub samples: usize,
    pub unique_ids: usize,
    pub context_chars: Option<LengthSummary>,
    pub continuation_chars: Option<LengthSummary>,
    pub avg_split_ratio: Option<f64>,
    pub split_types: BTreeMap<String, usize>,
}

impl DatasetSummary {
    pub fn from_records(records: &[ScriptRecord]) -> Self {
        let context: Vec<usize> = records.iter().map(|r| r.context.chars().count()).collect();
        let continuation: Vec<usize> = records
            .iter()
            .map(|r| r.continuation.chars().count())
            .collect();

        let mut split_types = BTreeMap::new();
        for record in records {
            *split_types
                .entry(record.stats.split_type.clone())
                .or_insert(0) += 1;
        }

        let unique_ids = records
            .iter()
            .map(|r| r.id.0.as_str())
            .collect::<HashSet<_>>()
            .len();
        let avg_split_ratio = (!records.is_empty()).then(|| {
            records.iter().map(|r| r.stats.split_ratio).sum::<f64>() / records.len() as f64
        });

        Self {
            samples: records.len(),
            unique_ids,
            context_chars: LengthSummary::from_lengths(&context),
            continuation_chars: LengthSummary::from_lengths(&continuation),
            avg_split_ratio,
            split_types,
        }
    }

    pub fn split_share(&self, split_type: &str) -> f64 {
        match (self.split_types.get(split_type), self.samples) {
            (Some(count), samples) if samples > 0 => *count as f64 * 100.0 / samples as f64,
            _ => 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordIssue {
    pub position: usize,
    pub id: String,
    pub problem: String,
}

/// Problems with individual records; `position` is 1-based.
pub fn validate_records(records: &[ScriptRecord]) -> Vec<RecordIssue> {
    let mut issues = Vec::new();
    let mut seen = HashSet::new();

    for (index, record) in records.iter().enumerate() {
        let mut push = |problem: String| {
            issues.push(RecordIssue {
                position: index + 1,
                id: record.id.to_string(),
                problem,
            })
        };

        if record.id.0.trim().is_empty() {
            push("empty id".to_string());
        } else if !seen.insert(record.id.0.as_str()) {
            push("duplicate id".to_string());
        }
        for (field, value) in [
            ("title", &record.title),
            ("context", &record.context),
            ("continuation", &record.continuation),
        ] {
            if value.trim().is_empty() {
                push(format!("empty {field}"));
            }
        }

        let stats = &record.stats;
        if stats.context_lines + stats.continuation_lines > stats.total_lines {
            push(format!(
                "context_lines + continuation_lines ({} + {}) exceeds total_lines ({})",
                stats.context_lines, stats.continuation_lines, stats.total_lines
            ));
        }
        if !(0.0..=1.0).contains(&stats.split_ratio) {
            push(format!("split_ratio {} outside 0..=1", stats.split_ratio));
        }
    }

    issues
}

/// First `max_chars` characters, with an ellipsis when anything was cut.
pub fn preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::domain::{ScriptId, ScriptStats};

    fn record(id: &str, context: &str, continuation: &str, split_type: &str) -> ScriptRecord {
        ScriptRecord {
            id: ScriptId(id.to_string()),
            title: format!("Script {id}"),
            description: String::new(),
            context: context.to_string(),
            continuation: continuation.to_string(),
            stats: ScriptStats {
                total_lines: 10,
                context_lines: 7,
                continuation_lines: 3,
                split_ratio: 0.7,
                split_type: split_type.to_string(),
            },
        }
    }

    #[test]
    fn summarizes_lengths_and_split_types() {
        let records = vec![
            record("1", "abcd", "xy", "scene_boundary"),
            record("2", "ab", "wxyz", "middle"),
            record("3", "abcdef", "z", "scene_boundary"),
        ];
        let summary = DatasetSummary::from_records(&records);

        assert_eq!(summary.samples, 3);
        assert_eq!(summary.unique_ids, 3);
        assert_eq!(
            summary.context_chars,
            Some(LengthSummary {
                min: 2,
                max: 6,
                avg: 4.0
            })
        );
        assert_eq!(summary.continuation_chars.map(|s| s.max), Some(4));
        assert_eq!(summary.split_types.get("scene_boundary"), Some(&2));
        assert!((summary.split_share("middle") - 100.0 / 3.0).abs() < 1e-9);
        assert!((summary.avg_split_ratio.unwrap_or_default() - 0.7).abs() < 1e-9);
    }

    #[test]
    fn empty_dataset_has_no_length_summary() {
        let summary = DatasetSummary::from_records(&[]);
        assert_eq!(summary.samples, 0);
        assert_eq!(summary.context_chars, None);
        assert_eq!(summary.avg_split_ratio, None);
        assert_eq!(summary.split_share("middle"), 0.0);
    }

    #[test]
    fn flags_inconsistent_records() {
        let mut bad_counts = record("2", "ctx", "cont", "middle");
        bad_counts.stats.total_lines = 5;
        let records = vec![
            record("1", "ctx", "cont", "middle"),
            bad_counts,
            record("1", "", "cont", "middle"),
        ];

        let issues = validate_records(&records);
        let problems: Vec<(usize, &str)> = issues
            .iter()
            .map(|issue| (issue.position, issue.problem.as_str()))
            .collect();
        assert_eq!(issues.len(), 3);
        assert!(problems[0].1.contains("exceeds total_lines"));
        assert_eq!(problems[0].0, 2);
        assert_eq!(problems[1], (3, "duplicate id"));
        assert_eq!(problems[2], (3, "empty context"));
    }

    #[test]
    fn preview_cuts_on_character_boundaries() {
        assert_eq!(preview("héllo wörld", 5), "héllo...");
        assert_eq!(preview("short", 10), "short");
    }
}
