use crate::document::{serialize_input, Input, Output};
use crate::error::ConvertError;
use crate::options::ConvertOptions;
use crate::registry::VersionRegistry;
use crate::version::DocumentFamily;
use serde_json::Value;
use std::ops::RangeInclusive;
use tracing::debug;

/// Drives a document through the registry's steps to a target version.
#[derive(Debug, Clone, Copy)]
pub struct ConversionEngine<'r> {
    registry: &'r VersionRegistry,
}

/// Result of a version conversion
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionResult {
    pub document: Value,
    pub source_version: String,
    pub target_version: String,
    /// Versions whose steps ran, in order.
    pub applied_steps: Vec<String>,
}

impl<'r> ConversionEngine<'r> {
    pub fn new(registry: &'r VersionRegistry) -> Self {
        Self { registry }
    }

    /// Convert `input` and serialize the result the way it came in.
    pub fn convert(
        &self,
        input: Input<'_>,
        target_version: &str,
        options: &ConvertOptions,
    ) -> Result<Output, ConvertError> {
        let mut input = serialize_input(input)?;
        let document = std::mem::take(&mut input.document);
        let result = self.convert_document(document, target_version, options)?;
        Output::render(result.document, &input)
    }

    /// Convert an already parsed AsyncAPI document to `target_version`.
    pub fn convert_document(
        &self,
        document: Value,
        target_version: &str,
        options: &ConvertOptions,
    ) -> Result<ConversionResult, ConvertError> {
        let source_version = match DocumentFamily::detect(&document) {
            DocumentFamily::AsyncApi(version) => version,
            family @ (DocumentFamily::OpenApi(_) | DocumentFamily::Postman(_)) => {
                return Err(ConvertError::WrongConverter {
                    family: family.name().to_string(),
                    entry_point: "convert".to_string(),
                });
            }
            DocumentFamily::Unknown => {
                return Err(ConvertError::UnknownVersion {
                    from: "undefined".to_string(),
                    to: target_version.to_string(),
                });
            }
        };

        let steps = self.resolve_steps(&source_version, target_version)?;

        let mut document = document;
        let mut applied_steps = Vec::new();
        let mut current = source_version.clone();
        for index in steps {
            let Some((version, step)) = self.registry.step(index) else {
                break;
            };
            debug!(from = %current, to = %version, "applying conversion step");
            document = step(document, options)?;
            applied_steps.push(version.to_string());
            current = version.to_string();
        }

        Ok(ConversionResult {
            document,
            source_version,
            target_version: target_version.to_string(),
            applied_steps,
        })
    }

    /// Registry indices of the steps between `from` (exclusive) and `to`
    /// (inclusive).
    fn resolve_steps(&self, from: &str, to: &str) -> Result<RangeInclusive<usize>, ConvertError> {
        let (Some(source), Some(target)) = (self.registry.position(from), self.registry.position(to))
        else {
            return Err(ConvertError::UnknownVersion {
                from: from.to_string(),
                to: to.to_string(),
            });
        };

        if target < source {
            return Err(ConvertError::Downgrade {
                from: from.to_string(),
                to: to.to_string(),
            });
        }
        if target == source {
            return Err(ConvertError::NoopConversion {
                version: from.to_string(),
            });
        }

        Ok(source + 1..=target)
    }
}
