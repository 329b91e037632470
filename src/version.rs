use regex::Regex;
use serde_json::Value;
use std::fmt;
use once_cell::sync::Lazy;

/// OpenAPI versions the OpenAPI converter accepts.
pub const OPENAPI_VERSIONS: &[&str] = &["3.0.0", "3.0.1", "3.0.2", "3.0.3", "3.1.0"];

/// Postman collection schema versions the Postman converter accepts.
pub const POSTMAN_VERSIONS: &[&str] = &["2.0.0", "2.1.0"];

/// AsyncAPI versions a Postman collection can be converted to.
pub const POSTMAN_TARGET_VERSIONS: &[&str] = &["3.0.0"];

/// The schema family a document declares, with its declared version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentFamily {
    AsyncApi(String),
    OpenApi(String),
    Postman(Option<String>),
    Unknown,
}

impl DocumentFamily {
    /// Detect the family from the document's top-level fields.
    pub fn detect(document: &Value) -> Self {
        if let Some(version) = document.get("asyncapi") {
            return DocumentFamily::AsyncApi(version_string(version));
        }
        if let Some(version) = document.get("openapi") {
            return DocumentFamily::OpenApi(version_string(version));
        }

        let info = document.get("info");
        let schema = info.and_then(|i| i.get("schema")).and_then(Value::as_str);
        let is_postman = info.and_then(|i| i.get("_postman_id")).is_some()
            || schema.is_some_and(|s| s.contains("getpostman.com"))
            || (document.get("item").is_some_and(Value::is_array)
                && info.and_then(|i| i.get("name")).is_some());
        if is_postman {
            return DocumentFamily::Postman(schema.and_then(postman_schema_version));
        }

        DocumentFamily::Unknown
    }

    pub fn name(&self) -> &'static str {
        match self {
            DocumentFamily::AsyncApi(_) => "AsyncAPI",
            DocumentFamily::OpenApi(_) => "OpenAPI",
            DocumentFamily::Postman(_) => "Postman collection",
            DocumentFamily::Unknown => "unknown",
        }
    }
}

impl fmt::Display for DocumentFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentFamily::AsyncApi(version) | DocumentFamily::OpenApi(version) => {
                write!(f, "{} {}", self.name(), version)
            }
            DocumentFamily::Postman(Some(version)) => write!(f, "{} {}", self.name(), version),
            DocumentFamily::Postman(None) | DocumentFamily::Unknown => write!(f, "{}", self.name()),
        }
    }
}

/// Whether the OpenAPI converter handles `version`.
pub fn is_supported_openapi(version: &str) -> bool {
    OPENAPI_VERSIONS.contains(&version)
}

/// Whether the Postman converter handles `version`.
pub fn is_supported_postman(version: &str) -> bool {
    POSTMAN_VERSIONS.contains(&version)
}

// Version fields are sometimes written unquoted (`openapi: 3.1`), so numbers
// are accepted as well as strings.
fn version_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

static RE_POSTMAN_SCHEMA: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/collection/v(\d+\.\d+\.\d+)/").expect("Invalid regex"));

/// Extract `2.1.0` from `https://schema.getpostman.com/json/collection/v2.1.0/collection.json`.
fn postman_schema_version(schema: &str) -> Option<String> {
    RE_POSTMAN_SCHEMA
        .captures(schema)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}
