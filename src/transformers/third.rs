//! AsyncAPI 3.x steps.
//!
//! The 2.6.0 to 3.0.0 step splits every channel into a channel and its
//! operations. It runs in three phases: identifiers and relocations are
//! planned against the untouched document, every `$ref` is rewritten through
//! the recorded relocations, and only then is the document restructured.
//! References the restructuring creates are already in their final form and
//! never pass through the rewrite.

use super::{bump_to, into_object};
use crate::error::ConvertError;
use crate::options::{ConvertOptions, IdContext, IdGenerator, IdKind, PointOfView, V2ToV3Options};
use crate::refs::{
    create_ref_object, is_ref_object, sort_object_keys, unescape_segment, Object, RefMap,
};
use crate::registry::ConvertStep;
use crate::security::{convert_security_requirements, convert_security_scheme};
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

pub fn steps() -> Vec<(&'static str, ConvertStep)> {
    vec![
        ("3.0.0", Box::new(from_2_6_0_to_3_0_0) as ConvertStep),
        ("3.1.0", bump_to("3.1.0")),
    ]
}

const ROOT_KEYS: &[&str] = &[
    "asyncapi",
    "id",
    "info",
    "defaultContentType",
    "servers",
    "channels",
    "operations",
    "components",
];

pub(crate) const INFO_KEYS: &[&str] = &[
    "title",
    "version",
    "description",
    "termsOfService",
    "contact",
    "license",
    "tags",
    "externalDocs",
];

pub(crate) const SERVER_KEYS: &[&str] = &[
    "host",
    "pathname",
    "protocol",
    "protocolVersion",
    "title",
    "summary",
    "description",
    "variables",
    "security",
    "tags",
    "externalDocs",
    "bindings",
];

pub(crate) const CHANNEL_KEYS: &[&str] = &[
    "address",
    "messages",
    "title",
    "summary",
    "description",
    "servers",
    "parameters",
    "tags",
    "externalDocs",
    "bindings",
];

pub(crate) const OPERATION_KEYS: &[&str] = &[
    "action",
    "channel",
    "title",
    "summary",
    "description",
    "security",
    "tags",
    "externalDocs",
    "bindings",
    "traits",
    "messages",
    "reply",
];

const OPERATION_KINDS: [(&str, IdKind); 2] =
    [("publish", IdKind::Publish), ("subscribe", IdKind::Subscribe)];

/// Parameter schema keywords that have a 3.0.0 counterpart.
const PARAMETER_SCHEMA_KEYWORDS: &[&str] =
    &["type", "description", "enum", "const", "default", "examples"];

pub fn from_2_6_0_to_3_0_0(
    document: Value,
    options: &ConvertOptions,
) -> Result<Value, ConvertError> {
    let v2tov3 = &options.v2tov3;
    let generator = v2tov3.id_generator();

    let plan = Plan::build(&document, v2tov3, generator.as_ref());
    debug!(relocations = plan.refs.len(), "planned channel split");

    let mut document = document;
    plan.refs.rewrite(&mut document);

    let mut asyncapi = into_object(document)?;
    asyncapi.insert("asyncapi".to_string(), json!("3.0.0"));
    convert_info(&mut asyncapi);

    // Security schemes as they were declared, for inlining scoped requirements
    let schemes = json!({ "components": asyncapi.get("components").cloned().unwrap_or(Value::Null) });

    if let Some(Value::Object(servers)) = asyncapi.get_mut("servers") {
        for server in servers.values_mut() {
            convert_server(server, &schemes);
        }
    }

    let mut operations = Object::new();
    if let Some(Value::Object(channels)) = asyncapi.shift_remove("channels") {
        let channels = convert_channels(
            channels,
            &plan.channels,
            Scope::Root,
            &mut operations,
            v2tov3,
            &schemes,
        )?;
        asyncapi.insert("channels".to_string(), Value::Object(channels));
    }

    if let Some(Value::Object(components)) = asyncapi.get_mut("components") {
        convert_components(components, &plan, v2tov3, &schemes)?;
    }

    // Root channels that point at a component channel expose its operations
    for channel in &plan.channels {
        let Some(component) = channel.component.as_deref() else {
            continue;
        };
        let Some(target) = plan.component_channels.iter().find(|c| c.key == component) else {
            continue;
        };
        for operation in &target.operations {
            if operations.contains_key(&operation.id) {
                continue;
            }
            operations.insert(
                operation.id.clone(),
                create_ref_object(&["components", "operations", operation.id.as_str()]),
            );
        }
    }

    if !operations.is_empty() {
        asyncapi.insert("operations".to_string(), Value::Object(operations));
    }

    Ok(Value::Object(sort_object_keys(asyncapi, ROOT_KEYS)))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    Root,
    Components,
}

impl Scope {
    fn channels_path(self) -> Vec<String> {
        match self {
            Scope::Root => vec!["channels".to_string()],
            Scope::Components => vec!["components".to_string(), "channels".to_string()],
        }
    }

    fn operations_path(self) -> Vec<String> {
        match self {
            Scope::Root => vec!["operations".to_string()],
            Scope::Components => vec!["components".to_string(), "operations".to_string()],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MessageSource {
    Single,
    OneOf(usize),
}

#[derive(Debug)]
struct MessagePlan {
    id: String,
    source: MessageSource,
}

#[derive(Debug)]
struct OperationPlan {
    kind: &'static str,
    id: String,
    messages: Vec<MessagePlan>,
}

#[derive(Debug)]
struct ChannelPlan {
    key: String,
    id: String,
    operations: Vec<OperationPlan>,
    /// Key of the component channel a root channel reference points at.
    component: Option<String>,
}

/// Identifiers and relocations, computed before anything moves.
#[derive(Debug)]
struct Plan {
    channels: Vec<ChannelPlan>,
    component_channels: Vec<ChannelPlan>,
    refs: RefMap,
}

impl Plan {
    fn build(document: &Value, options: &V2ToV3Options, generator: &dyn IdGenerator) -> Self {
        let mut planner = Planner {
            document,
            generator,
            refs: RefMap::new(),
            operation_ids: HashSet::new(),
        };

        for key in ["tags", "externalDocs"] {
            if document.get(key).is_some() {
                planner.refs.record(&[key], &["info", key]);
            }
        }

        let channels = match document.get("channels") {
            Some(Value::Object(channels)) => planner.plan_channels(channels, Scope::Root),
            _ => Vec::new(),
        };

        let component_channels = match document
            .get("components")
            .and_then(|components| components.get("channels"))
        {
            Some(Value::Object(channels)) if options.convert_channel_components => {
                planner.plan_channels(channels, Scope::Components)
            }
            _ => Vec::new(),
        };

        Plan {
            channels,
            component_channels,
            refs: planner.refs,
        }
    }
}

struct Planner<'a> {
    document: &'a Value,
    generator: &'a dyn IdGenerator,
    refs: RefMap,
    /// Shared by root and component operations, which end up side by
    /// side in the root `operations` map.
    operation_ids: HashSet<String>,
}

impl<'a> Planner<'a> {
    fn plan_channels(&mut self, channels: &'a Object, scope: Scope) -> Vec<ChannelPlan> {
        let mut channel_ids = HashSet::new();
        let mut plans = Vec::with_capacity(channels.len());

        for (key, channel) in channels {
            let mut path = scope.channels_path();
            path.push(key.clone());

            let generated = self.generator.generate_id(&IdContext {
                document: self.document,
                kind: IdKind::Channel,
                key,
                path: &path,
                object: channel,
                parent_id: None,
            });
            let id = unique_id(generated, &channel_ids);
            channel_ids.insert(id.clone());

            let mut new_path = scope.channels_path();
            new_path.push(id.clone());
            self.refs.record(&path, &new_path);

            let component = match scope {
                Scope::Root => component_channel_key(channel),
                Scope::Components => None,
            };

            let mut operations = Vec::new();
            let mut messages: HashMap<String, &'a Value> = HashMap::new();
            for (kind_key, kind) in OPERATION_KINDS {
                let Some(operation) = channel.get(kind_key).filter(|o| o.is_object()) else {
                    continue;
                };
                let mut operation_path = path.clone();
                operation_path.push(kind_key.to_string());

                let generated = self.generator.generate_id(&IdContext {
                    document: self.document,
                    kind,
                    key: kind_key,
                    path: &operation_path,
                    object: operation,
                    parent_id: Some(id.as_str()),
                });
                let operation_id = unique_id(generated, &self.operation_ids);
                self.operation_ids.insert(operation_id.clone());

                let mut new_operation_path = scope.operations_path();
                new_operation_path.push(operation_id.clone());
                self.refs.record(&operation_path, &new_operation_path);

                let planned = self.plan_messages(
                    operation,
                    &operation_path,
                    &operation_id,
                    &new_path,
                    &mut messages,
                );
                operations.push(OperationPlan {
                    kind: kind_key,
                    id: operation_id,
                    messages: planned,
                });
            }

            plans.push(ChannelPlan {
                key: key.clone(),
                id,
                operations,
                component,
            });
        }

        plans
    }

    fn plan_messages(
        &mut self,
        operation: &'a Value,
        operation_path: &[String],
        operation_id: &str,
        channel_path: &[String],
        taken: &mut HashMap<String, &'a Value>,
    ) -> Vec<MessagePlan> {
        let Some(message) = operation.get("message") else {
            return Vec::new();
        };
        let mut message_path = operation_path.to_vec();
        message_path.push("message".to_string());

        let variants: Vec<(String, Vec<String>, &'a Value, MessageSource)> = match message.get("oneOf") {
            Some(Value::Array(variants)) => variants
                .iter()
                .enumerate()
                .map(|(index, variant)| {
                    let mut path = message_path.clone();
                    path.push("oneOf".to_string());
                    path.push(index.to_string());
                    (index.to_string(), path, variant, MessageSource::OneOf(index))
                })
                .collect(),
            _ => vec![("message".to_string(), message_path, message, MessageSource::Single)],
        };

        let mut plans: Vec<MessagePlan> = Vec::with_capacity(variants.len());
        for (key, path, variant, source) in variants {
            let generated = self.generator.generate_id(&IdContext {
                document: self.document,
                kind: IdKind::Message,
                key: &key,
                path: &path,
                object: variant,
                parent_id: Some(operation_id),
            });

            // The same message used twice on a channel keeps a single entry
            let id = match taken.get(&generated) {
                Some(existing) if *existing == variant => generated,
                Some(_) => {
                    let names: HashSet<String> = taken.keys().cloned().collect();
                    unique_id(generated, &names)
                }
                None => generated,
            };
            taken.insert(id.clone(), variant);

            let mut new_path = channel_path.to_vec();
            new_path.push("messages".to_string());
            new_path.push(id.clone());
            self.refs.record(&path, &new_path);

            if plans.iter().all(|planned| planned.id != id) {
                plans.push(MessagePlan { id, source });
            }
        }
        plans
    }
}

/// `base`, or `base_<n>` with the smallest `n` not yet taken.
pub(crate) fn unique_id(base: String, taken: &HashSet<String>) -> String {
    if !taken.contains(&base) {
        return base;
    }
    let mut n = 1;
    loop {
        let candidate = format!("{}_{}", base, n);
        if !taken.contains(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

fn component_channel_key(channel: &Value) -> Option<String> {
    let reference = channel.get("$ref")?.as_str()?;
    let key = reference.strip_prefix("#/components/channels/")?;
    if key.contains('/') {
        return None;
    }
    Some(unescape_segment(key))
}

/// Move root `tags` and `externalDocs` into `info`.
fn convert_info(asyncapi: &mut Object) {
    let tags = asyncapi.shift_remove("tags");
    let external_docs = asyncapi.shift_remove("externalDocs");

    if tags.is_some() || external_docs.is_some() {
        asyncapi
            .entry("info")
            .or_insert_with(|| Value::Object(Object::new()));
    }
    if let Some(Value::Object(info)) = asyncapi.get_mut("info") {
        if let Some(tags) = tags {
            info.insert("tags".to_string(), tags);
        }
        if let Some(external_docs) = external_docs {
            info.insert("externalDocs".to_string(), external_docs);
        }
        *info = sort_object_keys(std::mem::take(info), INFO_KEYS);
    }
}

/// Parts of a server URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ServerUrl {
    pub host: String,
    pub pathname: Option<String>,
    pub protocol: Option<String>,
}

impl ServerUrl {
    /// Split on `://`, then on the first `/`.
    pub(crate) fn parse(url: &str) -> Self {
        let (protocol, rest) = match url.split_once("://") {
            Some((protocol, rest)) => (Some(protocol.to_string()), rest),
            None => (None, url),
        };
        let (host, pathname) = match rest.split_once('/') {
            Some((host, path)) => (host.to_string(), Some(format!("/{}", path))),
            None => (rest.to_string(), None),
        };
        Self {
            host,
            pathname,
            protocol,
        }
    }

    /// Write `host`, `pathname` and, unless one is declared, `protocol`.
    pub(crate) fn apply(self, server: &mut Object) {
        server.insert("host".to_string(), Value::String(self.host));
        if let Some(pathname) = self.pathname {
            server.insert("pathname".to_string(), Value::String(pathname));
        }
        if let Some(protocol) = self.protocol {
            if !server.contains_key("protocol") {
                server.insert("protocol".to_string(), Value::String(protocol));
            }
        }
    }
}

fn convert_server(server: &mut Value, schemes: &Value) {
    let Value::Object(object) = server else {
        return;
    };
    if object.contains_key("$ref") {
        return;
    }

    if let Some(Value::String(url)) = object.shift_remove("url") {
        ServerUrl::parse(&url).apply(object);
    }
    if let Some(security) = object.shift_remove("security") {
        let security = convert_security_requirements(&security, schemes, convert_security_scheme);
        object.insert("security".to_string(), Value::Array(security));
    }
    *object = sort_object_keys(std::mem::take(object), SERVER_KEYS);
}

/// Convert every planned channel of one scope, collecting its operations
/// into `operations`.
fn convert_channels(
    mut channels: Object,
    plans: &[ChannelPlan],
    scope: Scope,
    operations: &mut Object,
    options: &V2ToV3Options,
    schemes: &Value,
) -> Result<Object, ConvertError> {
    let mut converted = Object::with_capacity(channels.len());

    for plan in plans {
        let Some(channel) = channels.shift_remove(&plan.key) else {
            continue;
        };
        let Value::Object(mut channel) = channel else {
            converted.insert(plan.id.clone(), channel);
            continue;
        };
        if channel.contains_key("$ref") {
            converted.insert(plan.id.clone(), Value::Object(channel));
            continue;
        }

        if scope == Scope::Root {
            channel.insert("address".to_string(), Value::String(plan.key.clone()));
        }

        if let Some(Value::Array(servers)) = channel.get_mut("servers") {
            for server in servers.iter_mut() {
                if let Value::String(name) = server {
                    *server = create_ref_object(&["servers", name.as_str()]);
                }
            }
        }

        if let Some(Value::Object(parameters)) = channel.get_mut("parameters") {
            for (name, parameter) in parameters.iter_mut() {
                let taken = parameter.take();
                *parameter = convert_parameter(name, taken, options)?;
            }
        }

        let mut channel_path = scope.channels_path();
        channel_path.push(plan.id.clone());

        let mut messages = Object::new();
        for operation_plan in &plan.operations {
            let Some(Value::Object(mut operation)) = channel.shift_remove(operation_plan.kind) else {
                continue;
            };
            let message = operation.shift_remove("message").unwrap_or(Value::Null);

            let mut message_refs = Vec::with_capacity(operation_plan.messages.len());
            for message_plan in &operation_plan.messages {
                let value = match message_plan.source {
                    MessageSource::Single => Some(message.clone()),
                    MessageSource::OneOf(index) => message
                        .get("oneOf")
                        .and_then(|variants| variants.get(index))
                        .cloned(),
                };
                if let Some(mut value) = value {
                    convert_message(&mut value);
                    messages.insert(message_plan.id.clone(), value);
                }

                let mut message_path = channel_path.clone();
                message_path.push("messages".to_string());
                message_path.push(message_plan.id.clone());
                message_refs.push(create_ref_object(&message_path));
            }

            let operation = convert_operation(
                operation,
                operation_plan.kind,
                create_ref_object(&channel_path),
                message_refs,
                options.point_of_view,
                schemes,
            );
            operations.insert(operation_plan.id.clone(), operation);
        }
        // Anything left under publish/subscribe was not an operation object
        for (kind, _) in OPERATION_KINDS {
            channel.shift_remove(kind);
        }

        if !messages.is_empty() {
            channel.insert("messages".to_string(), Value::Object(messages));
        }

        converted.insert(
            plan.id.clone(),
            Value::Object(sort_object_keys(channel, CHANNEL_KEYS)),
        );
    }

    Ok(converted)
}

fn convert_operation(
    mut operation: Object,
    kind: &str,
    channel: Value,
    messages: Vec<Value>,
    point_of_view: PointOfView,
    schemes: &Value,
) -> Value {
    operation.shift_remove("operationId");

    let is_publish = kind == "publish";
    let action = match (point_of_view, is_publish) {
        (PointOfView::Application, true) | (PointOfView::Client, false) => "receive",
        (PointOfView::Application, false) | (PointOfView::Client, true) => "send",
    };
    operation.insert("action".to_string(), json!(action));
    operation.insert("channel".to_string(), channel);

    if !messages.is_empty() {
        operation.insert("messages".to_string(), Value::Array(messages));
    }

    if let Some(security) = operation.shift_remove("security") {
        let security = convert_security_requirements(&security, schemes, convert_security_scheme);
        operation.insert("security".to_string(), Value::Array(security));
    }

    if let Some(Value::Array(traits)) = operation.get_mut("traits") {
        for operation_trait in traits.iter_mut().filter_map(Value::as_object_mut) {
            operation_trait.shift_remove("operationId");
        }
    }

    Value::Object(sort_object_keys(operation, OPERATION_KEYS))
}

/// Lift the parameter schema's `enum`, `const`, `default` and `examples`
/// onto the parameter itself.
fn convert_parameter(
    name: &str,
    parameter: Value,
    options: &V2ToV3Options,
) -> Result<Value, ConvertError> {
    let Value::Object(mut parameter) = parameter else {
        return Ok(parameter);
    };
    if parameter.contains_key("$ref") {
        return Ok(Value::Object(parameter));
    }

    let mut enumeration = None;
    let mut default = None;
    let mut examples = None;
    let mut description = parameter.shift_remove("description");

    match parameter.shift_remove("schema") {
        Some(schema) if is_ref_object(&schema) => {
            if options.fail_on_parameter_reference {
                return Err(ConvertError::UnsupportedParameter {
                    name: name.to_string(),
                    location: "channel".to_string(),
                    reason: "a referenced schema has no 3.0.0 representation".to_string(),
                });
            }
            warn!(parameter = name, "dropping referenced parameter schema");
        }
        Some(Value::Object(mut schema)) => {
            enumeration = schema.shift_remove("enum");
            if let Some(constant) = schema.shift_remove("const") {
                if enumeration.is_none() {
                    enumeration = Some(Value::Array(vec![constant]));
                }
            }
            default = schema.shift_remove("default");
            examples = schema.shift_remove("examples");
            let schema_description = schema.shift_remove("description");
            if description.is_none() {
                description = schema_description;
            }

            let dropped: Vec<&str> = schema
                .keys()
                .map(String::as_str)
                .filter(|keyword| !PARAMETER_SCHEMA_KEYWORDS.contains(keyword))
                .collect();
            if !dropped.is_empty() {
                warn!(parameter = name, keywords = ?dropped, "dropping unsupported parameter schema keywords");
            }
        }
        _ => {}
    }

    let mut converted = Object::new();
    let fields = [
        ("enum", enumeration),
        ("default", default),
        ("description", description),
        ("examples", examples),
        ("location", parameter.shift_remove("location")),
    ];
    for (key, value) in fields {
        if let Some(value) = value {
            converted.insert(key.to_string(), value);
        }
    }
    for (key, value) in parameter {
        if key.starts_with("x-") {
            converted.insert(key, value);
        }
    }
    Ok(Value::Object(converted))
}

/// Drop `messageId` and turn a foreign `schemaFormat` into a multi-format
/// payload.
fn convert_message(message: &mut Value) {
    let Value::Object(object) = message else {
        return;
    };
    if object.contains_key("$ref") {
        return;
    }

    object.shift_remove("messageId");
    if let Some(format) = object.shift_remove("schemaFormat") {
        let foreign = format
            .as_str()
            .is_some_and(|format| !format.starts_with("application/vnd.aai.asyncapi"));
        if foreign {
            if let Some(payload) = object.get_mut("payload") {
                *payload = json!({"schemaFormat": format, "schema": payload.take()});
            }
        }
    }
}

fn convert_components(
    components: &mut Object,
    plan: &Plan,
    options: &V2ToV3Options,
    schemes: &Value,
) -> Result<(), ConvertError> {
    if options.convert_server_components {
        if let Some(Value::Object(servers)) = components.get_mut("servers") {
            for server in servers.values_mut() {
                convert_server(server, schemes);
            }
        }
    }

    if options.convert_channel_components {
        if let Some(Value::Object(channels)) = components.shift_remove("channels") {
            let mut operations = match components.shift_remove("operations") {
                Some(Value::Object(operations)) => operations,
                _ => Object::new(),
            };
            let channels = convert_channels(
                channels,
                &plan.component_channels,
                Scope::Components,
                &mut operations,
                options,
                schemes,
            )?;
            components.insert("channels".to_string(), Value::Object(channels));
            if !operations.is_empty() {
                components.insert("operations".to_string(), Value::Object(operations));
            }
        }
    }

    if let Some(Value::Object(messages)) = components.get_mut("messages") {
        for message in messages.values_mut() {
            convert_message(message);
        }
    }

    for (section, field) in [("messageTraits", "messageId"), ("operationTraits", "operationId")] {
        if let Some(Value::Object(traits)) = components.get_mut(section) {
            for object in traits.values_mut().filter_map(Value::as_object_mut) {
                object.shift_remove(field);
            }
        }
    }

    if let Some(Value::Object(security_schemes)) = components.get_mut("securitySchemes") {
        for scheme in security_schemes.values_mut() {
            convert_security_scheme(scheme);
        }
    }

    if let Some(Value::Object(parameters)) = components.get_mut("parameters") {
        for (name, parameter) in parameters.iter_mut() {
            let taken = parameter.take();
            *parameter = convert_parameter(name, taken, options)?;
        }
    }

    Ok(())
}
