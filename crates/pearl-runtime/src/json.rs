use pearl_core::{PearlError, Result};
use serde::de::DeserializeOwned;

/// Parse a model's JSON answer, tolerating a surrounding markdown fence.
pub(crate) fn parse_model_json<T: DeserializeOwned>(text: &str) -> Result<T> {
    let trimmed = strip_fence(text.trim());
    serde_json::from_str(trimmed).map_err(|e| {
        let preview: String = trimmed.chars().take(120).collect();
        PearlError::MalformedOutput(format!("{e} in: {preview}"))
    })
}

fn strip_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // drop the language tag line, e.g. ```json
    let body = rest.split_once('\n').map(|(_, b)| b).unwrap_or(rest);
    body.strip_suffix("```").unwrap_or(body).trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fenced_and_bare_json() {
        let bare: serde_json::Value = parse_model_json(r#"{"a": 1}"#).unwrap();
        let fenced: serde_json::Value = parse_model_json("```json\n{\"a\": 1}\n```").unwrap();
        assert_eq!(bare, fenced);
    }

    #[test]
    fn test_garbage_is_malformed_output() {
        let err = parse_model_json::<serde_json::Value>("I cannot help").unwrap_err();
        assert!(matches!(err, PearlError::MalformedOutput(_)));
        assert!(!err.is_transient());
    }
}
