use std::sync::OnceLock;

use regex::Regex;

fn continuation_block() -> &'static Regex {
    static BLOCK: OnceLock<Regex> = OnceLock::new();
    BLOCK.get_or_init(|| {
        Regex::new(r"(?is)```continuation\s*(.*?)```").expect("continuation pattern is valid")
    })
}

/// Keeps only the trimmed body of a ```` ```continuation ```` fenced block when
/// the model produced one, otherwise the whole trimmed response.
pub fn extract_continuation(text: &str) -> String {
    continuation_block()
        .captures(text)
        .and_then(|captures| captures.get(1))
        .map(|body| body.as_str().trim().to_string())
        .unwrap_or_else(|| text.trim().to_string())
}
