//! Single-step transformers, one per registered AsyncAPI version.

pub mod first;
pub mod second;
pub mod third;

use crate::error::ConvertError;
use crate::refs::Object;
use crate::registry::ConvertStep;
use serde_json::Value;

/// Take the root mapping out of `document`.
pub(crate) fn into_object(document: Value) -> Result<Object, ConvertError> {
    match document {
        Value::Object(object) => Ok(object),
        other => Err(ConvertError::InvalidDocument {
            reason: format!("expected a mapping at the document root, found {}", kind(&other)),
        }),
    }
}

/// A step that only rewrites the `asyncapi` field.
pub(crate) fn bump_to(version: &'static str) -> ConvertStep {
    Box::new(move |document, _| {
        let mut object = into_object(document)?;
        object.insert("asyncapi".to_string(), Value::String(version.to_string()));
        Ok(Value::Object(object))
    })
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a sequence",
        Value::Object(_) => "a mapping",
    }
}
