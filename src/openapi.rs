//! OpenAPI to AsyncAPI 3.0.0.
//!
//! Every path becomes a channel and every method on it an operation whose
//! request bodies are its messages and whose responses are its reply.

use crate::document::{serialize_input, Input, Output};
use crate::error::ConvertError;
use crate::options::{upper_first, ConvertOptions, Perspective};
use crate::refs::{
    create_ref_object, dereference, remove_empty_values, sort_object_keys, Object, RefMap,
};
use crate::security::{convert_openapi_security_scheme, convert_security_requirements};
use crate::transformers::third::{
    unique_id, ServerUrl, CHANNEL_KEYS, INFO_KEYS, OPERATION_KEYS, SERVER_KEYS,
};
use crate::version::{is_supported_openapi, DocumentFamily};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, warn};

const ROOT_KEYS: &[&str] = &[
    "asyncapi",
    "info",
    "defaultContentType",
    "servers",
    "channels",
    "operations",
    "components",
];

const METHODS: [&str; 8] = ["get", "put", "post", "delete", "options", "head", "patch", "trace"];

/// Convert an OpenAPI document given as text or as a parsed tree.
pub fn convert_openapi(input: Input<'_>, options: &ConvertOptions) -> Result<Output, ConvertError> {
    let mut input = serialize_input(input)?;
    let document = std::mem::take(&mut input.document);
    let converted = convert_openapi_document(document, options)?;
    Output::render(converted, &input)
}

/// Convert a parsed OpenAPI document into an AsyncAPI 3.0.0 tree.
pub fn convert_openapi_document(
    openapi: Value,
    options: &ConvertOptions,
) -> Result<Value, ConvertError> {
    match DocumentFamily::detect(&openapi) {
        DocumentFamily::OpenApi(version) if is_supported_openapi(&version) => {}
        DocumentFamily::OpenApi(version) => {
            return Err(ConvertError::UnsupportedSchemaVersion {
                family: "OpenAPI".to_string(),
                version,
            });
        }
        family @ (DocumentFamily::AsyncApi(_) | DocumentFamily::Postman(_)) => {
            return Err(ConvertError::WrongConverter {
                family: family.name().to_string(),
                entry_point: "convert_openapi".to_string(),
            });
        }
        DocumentFamily::Unknown => {
            return Err(ConvertError::UnsupportedSchemaVersion {
                family: "OpenAPI".to_string(),
                version: "undefined".to_string(),
            });
        }
    }

    OpenApiConverter::new(&openapi, options.perspective).convert()
}

struct OpenApiConverter<'a> {
    openapi: &'a Value,
    perspective: Perspective,
    component_messages: ComponentMessages,
}

/// Messages built from `components.requestBodies` and `components.responses`.
#[derive(Debug, Default)]
struct ComponentMessages {
    messages: Object,
    /// `(section, name)` to the content-type suffix and message key of
    /// every message the entry produced, in content order.
    keys: BTreeMap<(String, String), Vec<(String, String)>>,
}

impl ComponentMessages {
    fn build(openapi: &Value) -> Self {
        let mut built = ComponentMessages::default();
        let Some(declared) = openapi.get("components") else {
            return built;
        };

        let mut taken = HashSet::new();
        for section in ["requestBodies", "responses"] {
            let Some(Value::Object(entries)) = declared.get(section) else {
                continue;
            };
            for (name, entry) in entries {
                let headers = entry
                    .get("headers")
                    .and_then(|headers| headers_schema(openapi, headers));
                let mut keys = Vec::new();
                for (message_name, message) in content_messages(name, entry, headers) {
                    let suffix = message_name
                        .strip_prefix(name.as_str())
                        .unwrap_or_default()
                        .to_string();
                    let key = unique_id(message_name, &taken);
                    taken.insert(key.clone());
                    built.messages.insert(key.clone(), message);
                    keys.push((suffix, key));
                }
                built.keys.insert((section.to_string(), name.clone()), keys);
            }
        }
        built
    }
}

impl<'a> OpenApiConverter<'a> {
    fn new(openapi: &'a Value, perspective: Perspective) -> Self {
        OpenApiConverter {
            openapi,
            perspective,
            component_messages: ComponentMessages::build(openapi),
        }
    }

    fn convert(&self) -> Result<Value, ConvertError> {
        let mut asyncapi = Object::new();
        asyncapi.insert("asyncapi".to_string(), json!("3.0.0"));
        asyncapi.insert("info".to_string(), self.convert_info());
        asyncapi.insert("servers".to_string(), Value::Object(self.convert_servers()));

        let mut channels = Object::new();
        let mut operations = Object::new();
        if let Some(Value::Object(paths)) = self.openapi.get("paths") {
            let mut channel_ids = HashSet::new();
            let mut operation_ids = HashSet::new();
            for (path, path_item) in paths {
                let Some(path_item) = dereference(self.openapi, path_item) else {
                    warn!(path = %path, "skipping unresolvable path item");
                    continue;
                };
                let channel_id = unique_id(channel_id(path), &channel_ids);
                channel_ids.insert(channel_id.clone());

                let channel = self.convert_path(
                    path,
                    path_item,
                    &channel_id,
                    &mut operations,
                    &mut operation_ids,
                )?;
                channels.insert(channel_id, channel);
            }
        }
        asyncapi.insert("channels".to_string(), Value::Object(channels));
        asyncapi.insert("operations".to_string(), Value::Object(operations));

        let (components, refs) = self.convert_components();
        asyncapi.insert("components".to_string(), Value::Object(components));

        remove_empty_values(&mut asyncapi);
        let mut converted = Value::Object(sort_object_keys(asyncapi, ROOT_KEYS));
        refs.rewrite(&mut converted);
        Ok(converted)
    }

    /// `info` with the root `tags` and `externalDocs` folded in.
    fn convert_info(&self) -> Value {
        let mut info = self
            .openapi
            .get("info")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        for key in ["tags", "externalDocs"] {
            if let Some(value) = self.openapi.get(key) {
                info.insert(key.to_string(), value.clone());
            }
        }
        Value::Object(sort_object_keys(info, INFO_KEYS))
    }

    fn convert_servers(&self) -> Object {
        let mut servers = Object::new();
        let Some(Value::Array(declared)) = self.openapi.get("servers") else {
            return servers;
        };

        let mut names = HashSet::new();
        for (index, server) in declared.iter().enumerate() {
            let Some(url) = server.get("url").and_then(Value::as_str) else {
                continue;
            };
            let name = unique_id(server_name(url, index), &names);
            names.insert(name.clone());

            let mut converted = Object::new();
            ServerUrl::parse(url).apply(&mut converted);
            for key in ["description", "variables"] {
                if let Some(value) = server.get(key) {
                    converted.insert(key.to_string(), value.clone());
                }
            }

            // A server's own requirements win over the document-wide ones
            let security = server.get("security").or_else(|| self.openapi.get("security"));
            if let Some(security) = security {
                let security = self.convert_security(security);
                if !security.is_empty() {
                    converted.insert("security".to_string(), Value::Array(security));
                }
            }

            servers.insert(name, Value::Object(sort_object_keys(converted, SERVER_KEYS)));
        }
        servers
    }

    fn convert_security(&self, requirements: &Value) -> Vec<Value> {
        convert_security_requirements(requirements, self.openapi, convert_openapi_security_scheme)
    }

    fn convert_path(
        &self,
        path: &str,
        path_item: &Value,
        channel_id: &str,
        operations: &mut Object,
        operation_ids: &mut HashSet<String>,
    ) -> Result<Value, ConvertError> {
        let mut channel = Object::new();
        channel.insert("address".to_string(), json!(path));
        for key in ["summary", "description"] {
            if let Some(value) = path_item.get(key) {
                channel.insert(key.to_string(), value.clone());
            }
        }

        let mut parameters = Object::new();
        self.collect_parameters(path_item.get("parameters"), &mut parameters)?;

        let mut messages = Object::new();
        for method in METHODS {
            let Some(operation) = path_item.get(method).filter(|o| o.is_object()) else {
                continue;
            };
            self.collect_parameters(operation.get("parameters"), &mut parameters)?;

            let operation_id = match operation.get("operationId").and_then(Value::as_str) {
                Some(id) => id.to_string(),
                None => format!("{}{}", method, upper_first(channel_id)),
            };
            let operation_id = unique_id(operation_id, operation_ids);
            operation_ids.insert(operation_id.clone());
            debug!(method, path, operation = %operation_id, "converting operation");

            let channel_ref = create_ref_object(&["channels", channel_id]);
            let message_ref =
                |name: &str| create_ref_object(&["channels", channel_id, "messages", name]);

            let mut requests = Vec::new();
            if let Some(body) = operation.get("requestBody") {
                for (name, message) in self.request_messages(&operation_id, body) {
                    requests.push(message_ref(&name));
                    messages.insert(name, message);
                }
            }

            let mut replies = Vec::new();
            if let Some(Value::Object(responses)) = operation.get("responses") {
                for (status, response) in responses {
                    for (name, message) in self.response_messages(&operation_id, status, response) {
                        replies.push(message_ref(&name));
                        messages.insert(name, message);
                    }
                }
            }

            let mut converted = Object::new();
            converted.insert("action".to_string(), json!(self.perspective.action()));
            converted.insert("channel".to_string(), channel_ref.clone());
            for key in ["summary", "description", "externalDocs"] {
                if let Some(value) = operation.get(key) {
                    converted.insert(key.to_string(), value.clone());
                }
            }
            if let Some(Value::Array(tags)) = operation.get("tags") {
                let tags: Vec<Value> = tags
                    .iter()
                    .filter_map(Value::as_str)
                    .map(|name| json!({ "name": name }))
                    .collect();
                converted.insert("tags".to_string(), Value::Array(tags));
            }
            if let Some(security) = operation.get("security") {
                let security = self.convert_security(security);
                if !security.is_empty() {
                    converted.insert("security".to_string(), Value::Array(security));
                }
            }
            converted.insert(
                "bindings".to_string(),
                json!({ "http": { "method": method.to_uppercase() } }),
            );
            if !requests.is_empty() {
                converted.insert("messages".to_string(), Value::Array(requests));
            }
            if !replies.is_empty() {
                converted.insert(
                    "reply".to_string(),
                    json!({ "channel": channel_ref, "messages": replies }),
                );
            }

            operations.insert(
                operation_id,
                Value::Object(sort_object_keys(converted, OPERATION_KEYS)),
            );
        }

        if !parameters.is_empty() {
            channel.insert("parameters".to_string(), Value::Object(parameters));
        }
        if !messages.is_empty() {
            channel.insert("messages".to_string(), Value::Object(messages));
        }
        Ok(Value::Object(sort_object_keys(channel, CHANNEL_KEYS)))
    }

    /// Add the path, query and header parameters of `declared` to the
    /// channel parameters. Later declarations override earlier ones.
    ///
    /// AsyncAPI 3.0.0 has no operation-level parameters, so query and
    /// header parameters land here too even though they match no
    /// `{placeholder}` in the address. They carry a `location` pointing
    /// into the message headers instead.
    fn collect_parameters(
        &self,
        declared: Option<&Value>,
        parameters: &mut Object,
    ) -> Result<(), ConvertError> {
        let Some(Value::Array(declared)) = declared else {
            return Ok(());
        };

        for parameter in declared {
            let Some(resolved) = dereference(self.openapi, parameter) else {
                warn!(parameter = %parameter, "skipping unresolvable parameter");
                continue;
            };
            let name = resolved
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let location = resolved.get("in").and_then(Value::as_str).unwrap_or("path");
            if location == "cookie" {
                return Err(ConvertError::UnsupportedParameter {
                    name,
                    location: location.to_string(),
                    reason: "AsyncAPI has no cookie parameters".to_string(),
                });
            }

            let converted = match parameter.get("$ref") {
                Some(Value::String(_)) => parameter.clone(),
                _ => convert_parameter(resolved),
            };
            parameters.insert(name, converted);
        }
        Ok(())
    }

    fn request_messages(&self, operation_id: &str, body: &Value) -> Vec<(String, Value)> {
        let name = format!("{}Request", operation_id);
        if let Some(target) = referenced_component(body, "requestBodies") {
            return self.referenced_messages(&name, "requestBodies", target);
        }
        content_messages(&name, body, None)
    }

    fn response_messages(
        &self,
        operation_id: &str,
        status: &str,
        response: &Value,
    ) -> Vec<(String, Value)> {
        let name = format!("{}Response{}", operation_id, upper_first(status));
        if let Some(target) = referenced_component(response, "responses") {
            return self.referenced_messages(&name, "responses", target);
        }
        let headers = response
            .get("headers")
            .and_then(|headers| headers_schema(self.openapi, headers));
        content_messages(&name, response, headers)
    }

    /// References to the component messages built from
    /// `#/components/<section>/<target>`, one per content type.
    fn referenced_messages(&self, name: &str, section: &str, target: &str) -> Vec<(String, Value)> {
        let lookup = (section.to_string(), target.to_string());
        let Some(keys) = self.component_messages.keys.get(&lookup) else {
            warn!(section, component = target, "skipping unresolvable component reference");
            return Vec::new();
        };
        keys.iter()
            .map(|(suffix, key)| {
                (
                    format!("{}{}", name, suffix),
                    create_ref_object(&["components", "messages", key.as_str()]),
                )
            })
            .collect()
    }

    /// Components of the OpenAPI document that carry over, and the
    /// relocations of the ones that moved.
    fn convert_components(&self) -> (Object, RefMap) {
        let mut refs = RefMap::new();
        let mut components = Object::new();
        let Some(Value::Object(declared)) = self.openapi.get("components") else {
            return (components, refs);
        };

        if let Some(Value::Object(schemas)) = declared.get("schemas") {
            let schemas: Object = schemas
                .iter()
                .map(|(name, schema)| (name.clone(), convert_schema(schema.clone())))
                .collect();
            components.insert("schemas".to_string(), Value::Object(schemas));
        }

        if let Some(Value::Object(schemes)) = declared.get("securitySchemes") {
            let mut converted = Object::new();
            for (name, scheme) in schemes {
                let mut scheme = scheme.clone();
                convert_openapi_security_scheme(&mut scheme);
                converted.insert(name.clone(), scheme);
            }
            components.insert("securitySchemes".to_string(), Value::Object(converted));
        }

        if let Some(Value::Object(parameters)) = declared.get("parameters") {
            let mut converted = Object::new();
            for (name, parameter) in parameters {
                if parameter.get("in").and_then(Value::as_str) == Some("cookie") {
                    warn!(parameter = %name, "dropping cookie parameter component");
                    continue;
                }
                converted.insert(name.clone(), convert_parameter(parameter));
            }
            components.insert("parameters".to_string(), Value::Object(converted));
        }

        // Other references to a request body or response land on its first message.
        for ((section, name), keys) in &self.component_messages.keys {
            if let Some((_, key)) = keys.first() {
                refs.record(
                    &["components", section.as_str(), name.as_str()],
                    &["components", "messages", key.as_str()],
                );
            }
        }
        components.insert(
            "messages".to_string(),
            Value::Object(self.component_messages.messages.clone()),
        );

        if let Some(Value::Object(headers)) = declared.get("headers") {
            let mut traits = Object::new();
            for (name, header) in headers {
                let mut single = Object::new();
                single.insert(name.clone(), header.clone());
                if let Some(schema) = headers_schema(self.openapi, &Value::Object(single)) {
                    traits.insert(name.clone(), json!({ "headers": schema }));
                }
                refs.record(&["components", "headers", name.as_str()], &["components", "messageTraits", name.as_str()]);
            }
            components.insert("messageTraits".to_string(), Value::Object(traits));
        }

        for section in ["callbacks", "links", "examples"] {
            if declared.get(section).is_some() {
                warn!(section, "dropping OpenAPI components with no AsyncAPI counterpart");
            }
        }

        remove_empty_values(&mut components);
        (components, refs)
    }
}

/// Response headers as an object schema.
fn headers_schema(openapi: &Value, headers: &Value) -> Option<Value> {
    let headers = headers.as_object()?;
    let mut properties = Object::new();
    for (name, header) in headers {
        let schema = dereference(openapi, header)
            .and_then(|header| header.get("schema"))
            .map(|schema| convert_schema(schema.clone()))
            .unwrap_or_else(|| json!({}));
        properties.insert(name.clone(), schema);
    }
    Some(json!({ "type": "object", "properties": properties }))
}

/// Name of the `#/components/<section>/<name>` target of a reference object.
fn referenced_component<'v>(value: &'v Value, section: &str) -> Option<&'v str> {
    let reference = value.get("$ref")?.as_str()?;
    let rest = reference.strip_prefix("#/components/")?;
    let (found, name) = rest.split_once('/')?;
    if found == section && !name.contains('/') {
        Some(name)
    } else {
        None
    }
}

/// One message per content type of a request body or response. Several
/// content types get a suffix derived from the media type.
fn content_messages(name: &str, source: &Value, headers: Option<Value>) -> Vec<(String, Value)> {
    let description = source.get("description").cloned();
    let content = source
        .get("content")
        .and_then(Value::as_object)
        .filter(|content| !content.is_empty());

    let Some(content) = content else {
        let mut message = Object::new();
        message.insert("name".to_string(), json!(name));
        if let Some(headers) = headers {
            message.insert("headers".to_string(), headers);
        }
        if let Some(description) = description {
            message.insert("description".to_string(), description);
        }
        return vec![(name.to_string(), Value::Object(message))];
    };

    let several = content.len() > 1;
    content
        .iter()
        .map(|(content_type, media)| {
            let message_name = if several {
                format!("{}{}", name, content_type_suffix(content_type))
            } else {
                name.to_string()
            };

            let mut message = Object::new();
            message.insert("name".to_string(), json!(message_name));
            message.insert("contentType".to_string(), json!(content_type));
            if let Some(headers) = &headers {
                message.insert("headers".to_string(), headers.clone());
            }
            if let Some(description) = &description {
                message.insert("description".to_string(), description.clone());
            }
            if let Some(schema) = media.get("schema") {
                message.insert("payload".to_string(), convert_schema(schema.clone()));
            }
            if let Some(example) = media.get("example") {
                message.insert("examples".to_string(), json!([{ "payload": example }]));
            }
            (message_name, Value::Object(message))
        })
        .collect()
}

/// `application/vnd.api+json` becomes `ApplicationVndApiJson`.
fn content_type_suffix(content_type: &str) -> String {
    content_type
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(|word| upper_first(&word.to_ascii_lowercase()))
        .collect()
}

/// An OpenAPI parameter as an AsyncAPI channel parameter.
fn convert_parameter(parameter: &Value) -> Value {
    let mut converted = Object::new();
    let schema = parameter.get("schema");

    if let Some(values) = schema.and_then(|schema| schema.get("enum")) {
        converted.insert("enum".to_string(), values.clone());
    }
    if let Some(default) = schema.and_then(|schema| schema.get("default")) {
        converted.insert("default".to_string(), default.clone());
    }
    if let Some(description) = parameter.get("description") {
        converted.insert("description".to_string(), description.clone());
    }

    let examples = match (parameter.get("example"), parameter.get("examples")) {
        (Some(example), _) => Some(vec![example.clone()]),
        (None, Some(Value::Object(examples))) => Some(
            examples
                .values()
                .filter_map(|example| example.get("value").cloned())
                .collect(),
        ),
        _ => schema.and_then(|schema| match (schema.get("examples"), schema.get("example")) {
            (Some(Value::Array(examples)), _) => Some(examples.clone()),
            (None, Some(example)) => Some(vec![example.clone()]),
            _ => None,
        }),
    };
    if let Some(examples) = examples.filter(|examples| !examples.is_empty()) {
        converted.insert("examples".to_string(), Value::Array(examples));
    }

    if let Some(location @ ("query" | "header")) = parameter.get("in").and_then(Value::as_str) {
        let name = parameter.get("name").and_then(Value::as_str).unwrap_or_default();
        converted.insert(
            "location".to_string(),
            json!(format!("$message.header#/{}", name)),
        );
        debug!(parameter = name, location, "parameter carried in message headers");
    }

    Value::Object(converted)
}

/// Rewrite an OpenAPI schema object into its AsyncAPI form.
pub(crate) fn convert_schema(schema: Value) -> Value {
    match schema {
        Value::Object(mut object) => {
            if object.contains_key("$ref") {
                return Value::Object(object);
            }

            if object.shift_remove("nullable") == Some(Value::Bool(true)) {
                let widened = match object.get("type") {
                    Some(Value::String(kind)) => Some(json!([kind, "null"])),
                    Some(Value::Array(kinds)) if !kinds.iter().any(|k| k == "null") => {
                        let mut kinds = kinds.clone();
                        kinds.push(json!("null"));
                        Some(Value::Array(kinds))
                    }
                    _ => None,
                };
                if let Some(widened) = widened {
                    object.insert("type".to_string(), widened);
                }
            }
            if let Some(example) = object.shift_remove("example") {
                object
                    .entry("examples")
                    .or_insert_with(|| Value::Array(vec![example]));
            }
            let property = object
                .get("discriminator")
                .and_then(Value::as_object)
                .map(|discriminator| discriminator.get("propertyName").cloned());
            match property {
                Some(Some(property)) => {
                    object.insert("discriminator".to_string(), property);
                }
                Some(None) => {
                    object.shift_remove("discriminator");
                }
                None => {}
            }
            if let Some(xml) = object.shift_remove("xml") {
                object.insert("x-xml".to_string(), xml);
            }

            for (key, value) in object.iter_mut() {
                match key.as_str() {
                    "properties" | "patternProperties" | "definitions" | "$defs" => {
                        if let Value::Object(children) = value {
                            for child in children.values_mut() {
                                *child = convert_schema(child.take());
                            }
                        }
                    }
                    "items" | "additionalProperties" | "not" | "contains" | "if" | "then"
                    | "else" | "propertyNames" | "additionalItems" => {
                        *value = convert_schema(value.take());
                    }
                    "allOf" | "anyOf" | "oneOf" | "prefixItems" => {
                        if let Value::Array(children) = value {
                            for child in children.iter_mut() {
                                *child = convert_schema(child.take());
                            }
                        }
                    }
                    _ => {}
                }
            }
            Value::Object(object)
        }
        other => other,
    }
}

/// `/pets/{petId}` becomes `pets_petId`; `/` becomes `root`.
fn channel_id(path: &str) -> String {
    let id = path
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join("_");
    if id.is_empty() {
        "root".to_string()
    } else {
        id
    }
}

/// Last two host labels plus the first path segment, e.g.
/// `https://api.example.com/v1` becomes `example_com_v1`.
fn server_name(url: &str, index: usize) -> String {
    let parsed = ServerUrl::parse(url);
    let host = parsed.host.split(':').next().unwrap_or_default();
    let labels: Vec<&str> = host.split('.').filter(|label| !label.is_empty()).collect();
    let mut parts: Vec<&str> = labels[labels.len().saturating_sub(2)..].to_vec();
    if let Some(segment) = parsed
        .pathname
        .as_deref()
        .and_then(|path| path.split('/').find(|segment| !segment.is_empty()))
    {
        parts.push(segment);
    }

    let name: String = parts
        .join("_")
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if name.is_empty() {
        format!("server{}", index)
    } else {
        name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn yaml(text: &str) -> Value {
        serde_yaml::from_str(text).unwrap()
    }

    fn convert(document: Value) -> Value {
        convert_openapi_document(document, &ConvertOptions::default()).unwrap()
    }

    #[test]
    fn test_channel_id() {
        assert_eq!(channel_id("/pets/{petId}"), "pets_petId");
        assert_eq!(channel_id("/"), "root");
        assert_eq!(channel_id("/v1/user-profile"), "v1_user_profile");
    }

    #[test]
    fn test_server_name() {
        assert_eq!(server_name("https://api.example.com/v1", 0), "example_com_v1");
        assert_eq!(server_name("http://localhost:8080", 1), "localhost");
        assert_eq!(server_name("/", 2), "server2");
    }

    #[test]
    fn test_content_type_suffix() {
        assert_eq!(content_type_suffix("application/json"), "ApplicationJson");
        assert_eq!(content_type_suffix("application/vnd.api+json"), "ApplicationVndApiJson");
    }

    #[test]
    fn test_basic_structure() {
        let converted = convert(yaml(
            r#"
            openapi: 3.0.3
            info:
              title: Petstore
              version: 1.0.0
            tags:
              - name: pets
            externalDocs:
              url: https://example.com/docs
            servers:
              - url: https://petstore.example.com/v1
                description: Production
            paths: {}
            "#,
        ));

        assert_eq!(
            converted,
            json!({
                "asyncapi": "3.0.0",
                "info": {
                    "title": "Petstore",
                    "version": "1.0.0",
                    "tags": [{"name": "pets"}],
                    "externalDocs": {"url": "https://example.com/docs"}
                },
                "servers": {
                    "example_com_v1": {
                        "host": "petstore.example.com",
                        "pathname": "/v1",
                        "protocol": "https",
                        "description": "Production"
                    }
                }
            })
        );
        let keys: Vec<&String> = converted.as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["asyncapi", "info", "servers"]);
    }

    #[test]
    fn test_operations_and_messages() {
        let converted = convert(yaml(
            r#"
            openapi: 3.0.0
            info: {title: Petstore, version: 1.0.0}
            paths:
              /pets/{petId}:
                parameters:
                  - name: petId
                    in: path
                    required: true
                    schema: {type: string}
                get:
                  operationId: showPetById
                  tags: [pets]
                  parameters:
                    - name: verbose
                      in: query
                      schema: {type: boolean, default: false}
                  responses:
                    '200':
                      description: A pet
                      content:
                        application/json:
                          schema: {$ref: '#/components/schemas/Pet'}
                put:
                  requestBody:
                    content:
                      application/json:
                        schema: {$ref: '#/components/schemas/Pet'}
                      application/xml:
                        schema: {$ref: '#/components/schemas/Pet'}
                  responses:
                    '204':
                      description: Updated
            "#,
        ));

        let channel = &converted["channels"]["pets_petId"];
        assert_eq!(channel["address"], "/pets/{petId}");
        assert_eq!(
            channel["parameters"],
            json!({
                "petId": {},
                "verbose": {"default": false, "location": "$message.header#/verbose"}
            })
        );
        assert_eq!(
            channel["messages"]["showPetByIdResponse200"],
            json!({
                "name": "showPetByIdResponse200",
                "contentType": "application/json",
                "description": "A pet",
                "payload": {"$ref": "#/components/schemas/Pet"}
            })
        );
        assert!(channel["messages"].get("putPets_petIdRequestApplicationJson").is_some());
        assert!(channel["messages"].get("putPets_petIdRequestApplicationXml").is_some());

        assert_eq!(
            converted["operations"]["showPetById"],
            json!({
                "action": "receive",
                "channel": {"$ref": "#/channels/pets_petId"},
                "tags": [{"name": "pets"}],
                "bindings": {"http": {"method": "GET"}},
                "reply": {
                    "channel": {"$ref": "#/channels/pets_petId"},
                    "messages": [{"$ref": "#/channels/pets_petId/messages/showPetByIdResponse200"}]
                }
            })
        );
        assert_eq!(
            converted["operations"]["putPets_petId"]["messages"],
            json!([
                {"$ref": "#/channels/pets_petId/messages/putPets_petIdRequestApplicationJson"},
                {"$ref": "#/channels/pets_petId/messages/putPets_petIdRequestApplicationXml"}
            ])
        );
    }

    #[test]
    fn test_client_perspective_sends() {
        let document = yaml(
            r#"
            openapi: 3.1.0
            info: {title: Ping, version: 1.0.0}
            paths:
              /ping:
                get:
                  responses:
                    '200': {description: pong}
            "#,
        );
        let options = ConvertOptions::default().with_perspective(Perspective::Client);
        let converted = convert_openapi_document(document, &options).unwrap();
        assert_eq!(converted["operations"]["getPing"]["action"], "send");
    }

    #[test]
    fn test_cookie_parameters_are_rejected() {
        let document = yaml(
            r#"
            openapi: 3.0.0
            info: {title: Session, version: 1.0.0}
            paths:
              /me:
                get:
                  parameters:
                    - name: session
                      in: cookie
                  responses: {}
            "#,
        );
        let err = convert_openapi_document(document, &ConvertOptions::default()).unwrap_err();
        assert!(
            matches!(err, ConvertError::UnsupportedParameter { name, location, .. } if name == "session" && location == "cookie")
        );
    }

    #[test]
    fn test_version_checks() {
        let err = convert_openapi_document(json!({"openapi": "2.0"}), &ConvertOptions::default())
            .unwrap_err();
        assert!(matches!(err, ConvertError::UnsupportedSchemaVersion { .. }));

        let err = convert_openapi_document(json!({"asyncapi": "2.6.0"}), &ConvertOptions::default())
            .unwrap_err();
        assert!(matches!(err, ConvertError::WrongConverter { .. }));
    }

    #[test]
    fn test_convert_schema() {
        let schema = convert_schema(yaml(
            r#"
            type: object
            discriminator:
              propertyName: petType
            xml:
              name: Pet
            properties:
              name:
                type: string
                nullable: true
                example: Rex
              tags:
                type: array
                items:
                  type: string
                  nullable: true
            "#,
        ));

        assert_eq!(
            schema,
            json!({
                "type": "object",
                "discriminator": "petType",
                "x-xml": {"name": "Pet"},
                "properties": {
                    "name": {"type": ["string", "null"], "examples": ["Rex"]},
                    "tags": {"type": "array", "items": {"type": ["string", "null"]}}
                }
            })
        );
    }

    #[test]
    fn test_components_and_security() {
        let converted = convert(yaml(
            r#"
            openapi: 3.0.1
            info: {title: Secure, version: 1.0.0}
            servers:
              - url: https://api.example.com
            security:
              - oauth: [read]
            paths:
              /items:
                post:
                  requestBody:
                    $ref: '#/components/requestBodies/Item'
                  responses:
                    '201':
                      $ref: '#/components/responses/Created'
            components:
              schemas:
                Item:
                  type: object
                  nullable: true
              requestBodies:
                Item:
                  content:
                    application/json:
                      schema: {$ref: '#/components/schemas/Item'}
              responses:
                Created:
                  description: Created
                  headers:
                    Location:
                      schema: {type: string}
              securitySchemes:
                key:
                  type: apiKey
                  in: header
                  name: X-Key
                oauth:
                  type: oauth2
                  flows:
                    authorizationCode:
                      authorizationUrl: https://example.com/auth
                      tokenUrl: https://example.com/token
                      scopes:
                        read: Read items
              callbacks:
                onEvent: {}
            "#,
        ));

        assert_eq!(
            converted["servers"]["example_com"]["security"],
            json!([{
                "type": "oauth2",
                "flows": {
                    "authorizationCode": {
                        "authorizationUrl": "https://example.com/auth",
                        "tokenUrl": "https://example.com/token",
                        "availableScopes": {"read": "Read items"}
                    }
                },
                "scopes": ["read"]
            }])
        );

        let components = &converted["components"];
        assert_eq!(components["schemas"]["Item"]["type"], json!(["object", "null"]));
        assert_eq!(components["securitySchemes"]["key"]["type"], "httpApiKey");
        assert_eq!(
            components["messages"]["Item"],
            json!({
                "name": "Item",
                "contentType": "application/json",
                "payload": {"$ref": "#/components/schemas/Item"}
            })
        );
        assert_eq!(
            components["messages"]["Created"],
            json!({
                "name": "Created",
                "headers": {"type": "object", "properties": {"Location": {"type": "string"}}},
                "description": "Created"
            })
        );
        assert!(components.get("callbacks").is_none());

        let channel = &converted["channels"]["items"];
        assert_eq!(
            channel["messages"]["postItemsRequest"],
            json!({"$ref": "#/components/messages/Item"})
        );
        assert_eq!(
            channel["messages"]["postItemsResponse201"],
            json!({"$ref": "#/components/messages/Created"})
        );
    }

    #[test]
    fn test_component_messages_sharing_a_name() {
        let converted = convert(yaml(
            r#"
            openapi: 3.0.3
            info: {title: Pets, version: 1.0.0}
            paths:
              /pets:
                post:
                  operationId: addPet
                  requestBody:
                    $ref: '#/components/requestBodies/Pet'
                  responses:
                    '200':
                      $ref: '#/components/responses/Pet'
            components:
              requestBodies:
                Pet:
                  content:
                    application/json:
                      schema: {type: object, required: [name]}
              responses:
                Pet:
                  description: The stored pet
                  content:
                    application/json:
                      schema: {type: object, required: [id]}
            "#,
        ));

        let messages = &converted["components"]["messages"];
        assert_eq!(messages["Pet"]["payload"]["required"], json!(["name"]));
        assert_eq!(messages["Pet_1"]["payload"]["required"], json!(["id"]));

        let channel = &converted["channels"]["pets"];
        assert_eq!(
            channel["messages"]["addPetRequest"],
            json!({"$ref": "#/components/messages/Pet"})
        );
        assert_eq!(
            channel["messages"]["addPetResponse200"],
            json!({"$ref": "#/components/messages/Pet_1"})
        );
    }

    #[test]
    fn test_component_request_body_with_several_content_types() {
        let converted = convert(yaml(
            r#"
            openapi: 3.0.3
            info: {title: Pets, version: 1.0.0}
            paths:
              /pets:
                post:
                  operationId: addPet
                  requestBody:
                    $ref: '#/components/requestBodies/Pet'
                  responses:
                    '204': {description: Stored}
            components:
              requestBodies:
                Pet:
                  content:
                    application/json:
                      schema: {type: object}
                    application/xml:
                      schema: {type: object}
            "#,
        ));

        let messages = &converted["components"]["messages"];
        assert_eq!(messages["PetApplicationJson"]["contentType"], "application/json");
        assert_eq!(messages["PetApplicationXml"]["contentType"], "application/xml");
        assert!(messages.get("Pet").is_none());

        assert_eq!(
            converted["operations"]["addPet"]["messages"],
            json!([
                {"$ref": "#/channels/pets/messages/addPetRequestApplicationJson"},
                {"$ref": "#/channels/pets/messages/addPetRequestApplicationXml"}
            ])
        );
        assert_eq!(
            converted["channels"]["pets"]["messages"]["addPetRequestApplicationXml"],
            json!({"$ref": "#/components/messages/PetApplicationXml"})
        );
    }
}
