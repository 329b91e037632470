//! Conversion options and the identifier-generation strategy.

use crate::refs::dereference;
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Options recognised by every entry point.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConvertOptions {
    /// Explicit application identifier; otherwise generated from `info.title`.
    pub id: Option<String>,
    pub v2tov3: V2ToV3Options,
    /// Point of view for OpenAPI and Postman conversions.
    pub perspective: Perspective,
}

impl ConvertOptions {
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_perspective(mut self, perspective: Perspective) -> Self {
        self.perspective = perspective;
        self
    }

    pub fn with_point_of_view(mut self, point_of_view: PointOfView) -> Self {
        self.v2tov3.point_of_view = point_of_view;
        self
    }

    pub fn with_id_generator(mut self, generator: Arc<dyn IdGenerator>) -> Self {
        self.v2tov3.id_generator = Some(generator);
        self
    }
}

/// Options for the 2.6.0 to 3.0.0 step.
#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct V2ToV3Options {
    pub point_of_view: PointOfView,
    #[serde(skip)]
    pub id_generator: Option<Arc<dyn IdGenerator>>,
    pub use_channel_id_extension: bool,
    pub convert_server_components: bool,
    pub convert_channel_components: bool,
    pub fail_on_parameter_reference: bool,
}

impl Default for V2ToV3Options {
    fn default() -> Self {
        Self {
            point_of_view: PointOfView::default(),
            id_generator: None,
            use_channel_id_extension: true,
            convert_server_components: true,
            convert_channel_components: true,
            fail_on_parameter_reference: false,
        }
    }
}

impl fmt::Debug for V2ToV3Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("V2ToV3Options")
            .field("point_of_view", &self.point_of_view)
            .field("id_generator", &self.id_generator.as_ref().map(|_| "custom"))
            .field("use_channel_id_extension", &self.use_channel_id_extension)
            .field("convert_server_components", &self.convert_server_components)
            .field("convert_channel_components", &self.convert_channel_components)
            .field("fail_on_parameter_reference", &self.fail_on_parameter_reference)
            .finish()
    }
}

impl V2ToV3Options {
    /// The configured generator, or the default heuristic.
    pub fn id_generator(&self) -> Arc<dyn IdGenerator> {
        match &self.id_generator {
            Some(generator) => Arc::clone(generator),
            None => Arc::new(DefaultIdGenerator::new(self.use_channel_id_extension)),
        }
    }
}

/// Whose side a v2 `publish`/`subscribe` is read from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointOfView {
    #[default]
    Application,
    Client,
}

/// Whether an OpenAPI operation is described from the server or the client.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Perspective {
    Client,
    #[default]
    Server,
}

impl Perspective {
    /// The AsyncAPI action for an incoming request seen from this side.
    pub fn action(self) -> &'static str {
        match self {
            Perspective::Server => "receive",
            Perspective::Client => "send",
        }
    }
}

/// What kind of object an identifier is generated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdKind {
    Channel,
    Publish,
    Subscribe,
    Message,
}

impl IdKind {
    pub fn as_str(self) -> &'static str {
        match self {
            IdKind::Channel => "channel",
            IdKind::Publish => "publish",
            IdKind::Subscribe => "subscribe",
            IdKind::Message => "message",
        }
    }
}

/// Everything a generator may look at when naming an object.
#[derive(Debug, Clone, Copy)]
pub struct IdContext<'a> {
    /// The whole document, as it was before the step started.
    pub document: &'a Value,
    pub kind: IdKind,
    /// Channel address for channels, `publish`/`subscribe` for operations,
    /// `message` or the `oneOf` index for messages.
    pub key: &'a str,
    /// Unescaped path of the object in the v2 document.
    pub path: &'a [String],
    pub object: &'a Value,
    /// Identifier of the enclosing channel or operation.
    pub parent_id: Option<&'a str>,
}

/// Produces stable identifiers for channels, operations and messages.
pub trait IdGenerator: Send + Sync {
    fn generate_id(&self, context: &IdContext<'_>) -> String;
}

/// The built-in naming heuristic.
#[derive(Debug, Clone, Copy)]
pub struct DefaultIdGenerator {
    use_channel_id_extension: bool,
}

impl DefaultIdGenerator {
    pub fn new(use_channel_id_extension: bool) -> Self {
        Self {
            use_channel_id_extension,
        }
    }

    fn channel_id(&self, context: &IdContext<'_>) -> String {
        if self.use_channel_id_extension {
            if let Some(Value::String(id)) = context.object.get("x-channelId") {
                return id.clone();
            }
        }
        camel_case_id(context.key).unwrap_or_else(|| "root".to_string())
    }

    fn operation_id(&self, context: &IdContext<'_>) -> String {
        if let Some(Value::String(id)) = context.object.get("operationId") {
            return id.clone();
        }
        match context.parent_id {
            Some(parent) => format!("{}.{}", parent, context.kind.as_str()),
            None => context.kind.as_str().to_string(),
        }
    }

    fn message_id(&self, context: &IdContext<'_>) -> String {
        let declared = dereference(context.document, context.object)
            .and_then(|message| message.get("messageId"))
            .or_else(|| context.object.get("messageId"))
            .and_then(Value::as_str);
        if let Some(id) = declared {
            return id.to_string();
        }

        let parent = context.parent_id.unwrap_or("operation");
        if context.key == "message" {
            format!("{}.message", parent)
        } else {
            format!("{}.message.{}", parent, context.key)
        }
    }
}

impl Default for DefaultIdGenerator {
    fn default() -> Self {
        Self::new(true)
    }
}

impl IdGenerator for DefaultIdGenerator {
    fn generate_id(&self, context: &IdContext<'_>) -> String {
        match context.kind {
            IdKind::Channel => self.channel_id(context),
            IdKind::Publish | IdKind::Subscribe => self.operation_id(context),
            IdKind::Message => self.message_id(context),
        }
    }
}

/// `user/{userId}/signed-up` becomes `userUserIdSignedUp`. Returns `None`
/// when the input has no alphanumeric characters.
pub(crate) fn camel_case_id(raw: &str) -> Option<String> {
    let mut id = String::with_capacity(raw.len());
    for word in raw.split(|c: char| !c.is_ascii_alphanumeric()).filter(|w| !w.is_empty()) {
        if id.is_empty() {
            let mut chars = word.chars();
            if let Some(first) = chars.next() {
                id.push(first.to_ascii_lowercase());
                id.push_str(chars.as_str());
            }
        } else {
            id.push_str(&upper_first(word));
        }
    }
    if id.is_empty() {
        None
    } else {
        Some(id)
    }
}

pub(crate) fn upper_first(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}
