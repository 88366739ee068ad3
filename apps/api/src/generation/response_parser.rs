//! Recovers the JSON object from free-form model output.
//!
//! Strategies run in a fixed order and the first one that yields a JSON object wins.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

static FENCED_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"```(?:json)?\n?([\s\S]*?)\n?```").expect("fenced block pattern is valid")
});

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("No valid JSON found in response")]
    NoValidJson,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseStrategy {
    /// The whole trimmed text is the object.
    Direct,
    /// The interior of the first triple-backtick block, optionally tagged `json`.
    FencedBlock,
    /// Everything from the first `{` through the last `}`.
    BraceSlice,
}

impl ParseStrategy {
    pub const ORDER: [ParseStrategy; 3] = [
        ParseStrategy::Direct,
        ParseStrategy::FencedBlock,
        ParseStrategy::BraceSlice,
    ];

    pub fn attempt(self, text: &str) -> Option<Value> {
        let candidate = match self {
            ParseStrategy::Direct => Some(text.trim()),
            ParseStrategy::FencedBlock => FENCED_BLOCK
                .captures(text)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().trim()),
            ParseStrategy::BraceSlice => brace_slice(text),
        }?;
        parse_object(candidate)
    }
}

/// Runs every strategy in order and returns the first object with the strategy that found it.
pub fn extract_json(text: &str) -> Result<(Value, ParseStrategy), ParseError> {
    for strategy in ParseStrategy::ORDER {
        if let Some(value) = strategy.attempt(text) {
            debug!("Parsed model response with {strategy:?} strategy");
            return Ok((value, strategy));
        }
    }
    Err(ParseError::NoValidJson)
}

fn brace_slice(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

fn parse_object(candidate: &str) -> Option<Value> {
    match serde_json::from_str::<Value>(candidate) {
        Ok(value) if value.is_object() => Some(value),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_direct_parse_of_serialized_object() {
        let original = json!({
            "personas": [{"id": "persona-1", "type": "The Planner", "quotes": ["Plan first."]}],
            "nested": {"n": 1.5, "flag": true, "none": null}
        });
        let text = serde_json::to_string(&original).unwrap();
        let (value, strategy) = extract_json(&text).unwrap();
        assert_eq!(value, original);
        assert_eq!(strategy, ParseStrategy::Direct);
    }

    #[test]
    fn test_direct_parse_tolerates_surrounding_whitespace() {
        let (value, strategy) = extract_json("\n\n  {\"a\": 1}  \n").unwrap();
        assert_eq!(value, json!({"a": 1}));
        assert_eq!(strategy, ParseStrategy::Direct);
    }

    #[test]
    fn test_fenced_block_recovery() {
        let text = "Here is the result:\n```json\n{\"a\":1}\n```\n";
        let (value, strategy) = extract_json(text).unwrap();
        assert_eq!(value, json!({"a": 1}));
        assert_eq!(strategy, ParseStrategy::FencedBlock);
    }

    #[test]
    fn test_untagged_fence() {
        let text = "```\n{\"b\": [1, 2]}\n```";
        let (value, strategy) = extract_json(text).unwrap();
        assert_eq!(value, json!({"b": [1, 2]}));
        assert_eq!(strategy, ParseStrategy::FencedBlock);
    }

    #[test]
    fn test_brace_slice_recovery() {
        let text = "Sure! {\"a\":1} Hope that helps.";
        let (value, strategy) = extract_json(text).unwrap();
        assert_eq!(value, json!({"a": 1}));
        assert_eq!(strategy, ParseStrategy::BraceSlice);
    }

    #[test]
    fn test_broken_fence_falls_through_to_brace_slice() {
        let text = "```json\nnot json\n``` but later {\"a\": 2}";
        assert!(ParseStrategy::FencedBlock.attempt(text).is_none());
        let (value, strategy) = extract_json(text).unwrap();
        assert_eq!(value, json!({"a": 2}));
        assert_eq!(strategy, ParseStrategy::BraceSlice);
    }

    #[test]
    fn test_no_braces_fails() {
        assert_eq!(
            extract_json("I could not generate personas today.").unwrap_err(),
            ParseError::NoValidJson
        );
        assert_eq!(
            ParseError::NoValidJson.to_string(),
            "No valid JSON found in response"
        );
    }

    #[test]
    fn test_reversed_or_unbalanced_braces_fail() {
        assert!(extract_json("} nothing here {").is_err());
        assert!(extract_json("{\"a\": ").is_err());
    }

    #[test]
    fn test_non_object_json_is_rejected() {
        assert!(ParseStrategy::Direct.attempt("[1, 2, 3]").is_none());
        assert!(extract_json("42").is_err());
    }
}
