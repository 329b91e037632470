//! Input normalization and output re-serialization.

use crate::error::ConvertError;
use serde_json::Value;
use std::fmt;

/// Serialization a document arrived in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Json,
    Yaml,
}

/// A document handed to a converter: raw text or an already parsed tree.
#[derive(Debug, Clone, Copy)]
pub enum Input<'a> {
    Text(&'a str),
    Document(&'a Value),
}

impl<'a> From<&'a str> for Input<'a> {
    fn from(text: &'a str) -> Self {
        Input::Text(text)
    }
}

impl<'a> From<&'a String> for Input<'a> {
    fn from(text: &'a String) -> Self {
        Input::Text(text.as_str())
    }
}

impl<'a> From<&'a Value> for Input<'a> {
    fn from(document: &'a Value) -> Self {
        Input::Document(document)
    }
}

/// A parsed document together with what is needed to serialize the result
/// back the way the input came in.
#[derive(Debug, Clone, PartialEq)]
pub struct SerializedInput {
    pub format: DocumentFormat,
    pub document: Value,
    pub structured: bool,
}

/// Parse `input` into an owned tree.
///
/// Structured input is cloned so the caller's tree is never touched. Text is
/// tried as strict JSON first and only counts as JSON when it yields a
/// mapping or sequence; everything else goes through the YAML parser.
pub fn serialize_input(input: Input<'_>) -> Result<SerializedInput, ConvertError> {
    match input {
        Input::Document(document) => Ok(SerializedInput {
            format: DocumentFormat::Json,
            document: document.clone(),
            structured: true,
        }),
        Input::Text(text) => {
            if let Ok(document) = serde_json::from_str::<Value>(text) {
                if document.is_object() || document.is_array() {
                    return Ok(SerializedInput {
                        format: DocumentFormat::Json,
                        document,
                        structured: false,
                    });
                }
            }

            let document = serde_yaml::from_str::<Value>(text).map_err(|err| {
                ConvertError::InvalidDocument {
                    reason: err.to_string(),
                }
            })?;
            Ok(SerializedInput {
                format: DocumentFormat::Yaml,
                document,
                structured: false,
            })
        }
    }
}

/// A converted document, shaped like the input it came from.
#[derive(Debug, Clone, PartialEq)]
pub enum Output {
    Text { format: DocumentFormat, text: String },
    Document(Value),
}

impl Output {
    /// Serialize `document` the way `input` was given.
    pub fn render(document: Value, input: &SerializedInput) -> Result<Self, ConvertError> {
        if input.structured {
            return Ok(Output::Document(document));
        }
        let text = match input.format {
            DocumentFormat::Yaml => serde_yaml::to_string(&document)?,
            DocumentFormat::Json => serde_json::to_string_pretty(&document)?,
        };
        Ok(Output::Text {
            format: input.format,
            text,
        })
    }

    pub fn format(&self) -> DocumentFormat {
        match self {
            Output::Text { format, .. } => *format,
            Output::Document(_) => DocumentFormat::Json,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Output::Text { text, .. } => Some(text),
            Output::Document(_) => None,
        }
    }

    /// The converted tree, parsing textual output back if needed.
    pub fn to_value(&self) -> Result<Value, ConvertError> {
        match self {
            Output::Document(document) => Ok(document.clone()),
            Output::Text { text, .. } => Ok(serialize_input(Input::Text(text))?.document),
        }
    }
}

impl fmt::Display for Output {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Output::Text { text, .. } => f.write_str(text),
            Output::Document(document) => match serde_json::to_string_pretty(document) {
                Ok(text) => f.write_str(&text),
                Err(_) => Err(fmt::Error),
            },
        }
    }
}
