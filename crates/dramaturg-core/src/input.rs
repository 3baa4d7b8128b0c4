//! Input normalization: bare text or `{text, options}` into a PipelineInput
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::PipelineError;

/// Submission as received from the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawInput {
    Text(String),
    Structured {
        #[serde(default)]
        text: Option<String>,
        #[serde(default)]
        options: Map<String, Value>,
    },
}

impl RawInput {
    pub fn structured(text: impl Into<String>, options: Map<String, Value>) -> Self {
        RawInput::Structured {
            text: Some(text.into()),
            options,
        }
    }

    /// Interpret an arbitrary JSON value as a submission
    pub fn from_value(value: Value) -> Result<Self, PipelineError> {
        serde_json::from_value(value)
            .map_err(|e| PipelineError::InvalidInput(format!("unrecognized submission: {}", e)))
    }
}

impl From<&str> for RawInput {
    fn from(text: &str) -> Self {
        RawInput::Text(text.to_string())
    }
}

impl From<String> for RawInput {
    fn from(text: String) -> Self {
        RawInput::Text(text)
    }
}

/// Validated submission
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineInput {
    pub text: String,
    pub options: Map<String, Value>,
}

impl PipelineInput {
    /// Normalize line endings and surrounding whitespace; reject empty text
    pub fn normalize(raw: RawInput) -> Result<Self, PipelineError> {
        let (text, options) = match raw {
            RawInput::Text(text) => (Some(text), Map::new()),
            RawInput::Structured { text, options } => (text, options),
        };

        let text = text
            .map(|t| t.replace("\r\n", "\n").replace('\r', "\n").trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| PipelineError::InvalidInput("no usable text in submission".to_string()))?;

        Ok(Self { text, options })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_bare_text() {
        let input = PipelineInput::normalize("  A lonely astronaut.\r\n".into()).unwrap();
        assert_eq!(input.text, "A lonely astronaut.");
        assert!(input.options.is_empty());
    }

    #[test]
    fn test_structured_from_json() {
        let raw = RawInput::from_value(json!({
            "text": "INT. SHIP - NIGHT",
            "options": { "genre_hint": "thriller" }
        }))
        .unwrap();
        let input = PipelineInput::normalize(raw).unwrap();
        assert_eq!(input.text, "INT. SHIP - NIGHT");
        assert_eq!(input.options["genre_hint"], json!("thriller"));

        let bare = RawInput::from_value(json!("plain text")).unwrap();
        assert_eq!(bare, RawInput::Text("plain text".to_string()));
    }

    #[test]
    fn test_empty_is_invalid() {
        for raw in [
            RawInput::from(""),
            RawInput::from("   \n\t"),
            RawInput::Structured { text: None, options: Map::new() },
        ] {
            assert!(matches!(
                PipelineInput::normalize(raw),
                Err(PipelineError::InvalidInput(_))
            ));
        }
        assert!(RawInput::from_value(json!(42)).is_err());
    }
}
