// AsyncAPI document conversion
pub mod document;
pub mod engine;
pub mod error;
pub mod openapi;
pub mod options;
pub mod postman;
pub mod refs;
pub mod registry;
pub mod security;
pub mod transformers;
pub mod version;

// Re-export core types for convenience
pub use document::{DocumentFormat, Input, Output};
pub use engine::{ConversionEngine, ConversionResult};
pub use error::ConvertError;
pub use options::{
    ConvertOptions, DefaultIdGenerator, IdContext, IdGenerator, IdKind, Perspective, PointOfView,
    V2ToV3Options,
};
pub use registry::{ConvertStep, VersionRegistry};
pub use version::DocumentFamily;

/// Convert an AsyncAPI document to `target_version`.
///
/// Text input comes back as text in the same format (YAML in, YAML out);
/// a parsed tree comes back as a tree.
///
/// ```
/// use asyncapi_converter::{convert, ConvertOptions};
///
/// let input = "asyncapi: 2.5.0\ninfo:\n  title: Streetlights\n  version: 1.0.0\nchannels: {}\n";
/// let output = convert(input.into(), "2.6.0", &ConvertOptions::default()).unwrap();
/// assert_eq!(output.to_value().unwrap()["asyncapi"], "2.6.0");
/// ```
pub fn convert(
    input: Input<'_>,
    target_version: &str,
    options: &ConvertOptions,
) -> Result<Output, ConvertError> {
    let registry = VersionRegistry::asyncapi();
    ConversionEngine::new(&registry).convert(input, target_version, options)
}

/// Convert an OpenAPI 3.x document to AsyncAPI 3.0.0.
pub fn convert_openapi(input: Input<'_>, options: &ConvertOptions) -> Result<Output, ConvertError> {
    openapi::convert_openapi(input, options)
}

/// Convert a Postman collection to AsyncAPI `target_version`.
pub fn convert_postman(
    input: Input<'_>,
    target_version: &str,
    options: &ConvertOptions,
) -> Result<Output, ConvertError> {
    postman::convert_postman(input, target_version, options)
}

/// The newest AsyncAPI version [`convert`] can produce.
pub fn latest_version() -> String {
    VersionRegistry::asyncapi()
        .latest_version()
        .unwrap_or_default()
        .to_string()
}
