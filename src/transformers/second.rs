//! Steps from 1.2.0 up to 2.6.0.

use super::{bump_to, into_object};
use crate::error::ConvertError;
use crate::options::ConvertOptions;
use crate::refs::{sort_object_keys, Object};
use crate::registry::ConvertStep;
use regex::Regex;
use serde_json::{json, Value};
use once_cell::sync::Lazy;

pub fn steps() -> Vec<(&'static str, ConvertStep)> {
    vec![
        ("2.0.0-rc1", Box::new(from_1_2_0_to_2_0_0_rc1) as ConvertStep),
        ("2.0.0-rc2", Box::new(from_2_0_0_rc1_to_2_0_0_rc2) as ConvertStep),
        ("2.0.0", Box::new(from_2_0_0_rc2_to_2_0_0) as ConvertStep),
        ("2.1.0", bump_to("2.1.0")),
        ("2.2.0", bump_to("2.2.0")),
        ("2.3.0", bump_to("2.3.0")),
        ("2.4.0", bump_to("2.4.0")),
        ("2.5.0", bump_to("2.5.0")),
        ("2.6.0", bump_to("2.6.0")),
    ]
}

/// Topics, streams and events become channels; servers speak `protocol`.
pub fn from_1_2_0_to_2_0_0_rc1(
    document: Value,
    options: &ConvertOptions,
) -> Result<Value, ConvertError> {
    let mut asyncapi = into_object(document)?;
    asyncapi.insert("asyncapi".to_string(), json!("2.0.0-rc1"));

    let id = match &options.id {
        Some(id) => id.clone(),
        None => urn_from_title(&asyncapi)?,
    };
    asyncapi.insert("id".to_string(), Value::String(id));

    // Root security moves onto every server
    let security = asyncapi.shift_remove("security");
    if let Some(Value::Array(servers)) = asyncapi.get_mut("servers") {
        for server in servers.iter_mut().filter_map(Value::as_object_mut) {
            convert_first_server(server, security.as_ref());
        }
    }

    let base_topic = match asyncapi.shift_remove("baseTopic") {
        Some(Value::String(base)) if !base.is_empty() => format!("{}.", base),
        _ => String::new(),
    };
    let topics = asyncapi.shift_remove("topics");
    let stream = asyncapi.shift_remove("stream");
    let events = asyncapi.shift_remove("events");

    let channels = if let Some(Value::Object(topics)) = topics {
        Some(topics_to_channels(topics, &base_topic))
    } else if let Some(stream) = stream {
        Some(root_channel(&stream, "read", "write"))
    } else {
        events.map(|events| root_channel(&events, "receive", "send"))
    };
    if let Some(channels) = channels {
        asyncapi.insert("channels".to_string(), Value::Object(channels));
    }

    Ok(Value::Object(sort_object_keys(
        asyncapi,
        &["asyncapi", "id", "info", "servers", "channels"],
    )))
}

/// Servers become a named map, parameters a keyed map, `protocolInfo`
/// becomes `bindings`.
pub fn from_2_0_0_rc1_to_2_0_0_rc2(
    document: Value,
    options: &ConvertOptions,
) -> Result<Value, ConvertError> {
    let mut asyncapi = into_object(document)?;
    asyncapi.insert("asyncapi".to_string(), json!("2.0.0-rc2"));
    apply_id_option(&mut asyncapi, options);

    if let Some(Value::Array(servers)) = asyncapi.get_mut("servers") {
        let servers = std::mem::take(servers);
        asyncapi.insert("servers".to_string(), Value::Object(servers_to_map(servers)));
    }

    if let Some(Value::Object(channels)) = asyncapi.get_mut("channels") {
        for (name, channel) in channels.iter_mut() {
            if let Value::Object(channel) = channel {
                convert_second_channel(name, channel);
            }
        }
    }

    if let Some(Value::Object(parameters)) = asyncapi
        .get_mut("components")
        .and_then(|components| components.get_mut("parameters"))
    {
        for parameter in parameters.values_mut().filter_map(Value::as_object_mut) {
            parameter.shift_remove("name");
        }
    }

    Ok(Value::Object(asyncapi))
}

pub fn from_2_0_0_rc2_to_2_0_0(
    document: Value,
    options: &ConvertOptions,
) -> Result<Value, ConvertError> {
    let mut asyncapi = into_object(document)?;
    asyncapi.insert("asyncapi".to_string(), json!("2.0.0"));
    if options.id.is_none() {
        asyncapi.shift_remove("id");
    }
    Ok(Value::Object(asyncapi))
}

/// `urn:` followed by the lower-cased title with spaces replaced by dots.
fn urn_from_title(asyncapi: &Object) -> Result<String, ConvertError> {
    let title = asyncapi
        .get("info")
        .and_then(|info| info.get("title"))
        .and_then(Value::as_str)
        .ok_or_else(|| ConvertError::MissingField {
            path: "info.title".to_string(),
        })?;
    Ok(format!("urn:{}", title.to_lowercase().replace(' ', ".")))
}

// The identifier survives only when the caller asked for one.
fn apply_id_option(asyncapi: &mut Object, options: &ConvertOptions) {
    match &options.id {
        Some(id) => {
            if !asyncapi.contains_key("id") {
                asyncapi.insert("id".to_string(), Value::String(id.clone()));
            }
        }
        None => {
            asyncapi.shift_remove("id");
        }
    }
}

fn convert_first_server(server: &mut Object, security: Option<&Value>) {
    let scheme = server.shift_remove("scheme");
    let scheme_version = server.shift_remove("schemeVersion");

    if let Some(scheme) = scheme {
        server.insert("protocol".to_string(), scheme);
    }
    if let Some(version) = scheme_version.filter(|v| !v.is_null()) {
        server.insert("protocolVersion".to_string(), version);
    }
    if let Some(security) = security {
        server.insert("security".to_string(), security.clone());
    }
}

fn topics_to_channels(topics: Object, base_topic: &str) -> Object {
    let mut channels = Object::with_capacity(topics.len());
    for (topic, mut channel) in topics {
        if let Value::Object(channel) = &mut channel {
            for kind in ["publish", "subscribe"] {
                if let Some(operation) = channel.get_mut(kind) {
                    *operation = json!({ "message": operation.take() });
                }
            }
        }
        let address = format!("{}{}", base_topic, topic).replace('.', "/");
        channels.insert(address, channel);
    }
    channels
}

/// A `stream` or `events` section becomes the single channel `/`, with the
/// listed messages as a `oneOf` union.
fn root_channel(section: &Value, publish_key: &str, subscribe_key: &str) -> Object {
    let mut channel = Object::new();
    if let Some(messages) = section.get(publish_key).filter(|v| !v.is_null()) {
        channel.insert("publish".to_string(), json!({"message": {"oneOf": messages}}));
    }
    if let Some(messages) = section.get(subscribe_key).filter(|v| !v.is_null()) {
        channel.insert("subscribe".to_string(), json!({"message": {"oneOf": messages}}));
    }

    let mut channels = Object::new();
    channels.insert("/".to_string(), Value::Object(channel));
    channels
}

/// The first server is `default`, the rest `server<index>`.
fn servers_to_map(servers: Vec<Value>) -> Object {
    let mut map = Object::with_capacity(servers.len());
    for (index, mut server) in servers.into_iter().enumerate() {
        if let Value::Object(server) = &mut server {
            server.shift_remove("baseChannel");
        }
        let name = if index == 0 {
            "default".to_string()
        } else {
            format!("server{}", index)
        };
        map.insert(name, server);
    }
    map
}

fn convert_second_channel(name: &str, channel: &mut Object) {
    if let Some(Value::Array(parameters)) = channel.get_mut("parameters") {
        let parameters = std::mem::take(parameters);
        channel.insert(
            "parameters".to_string(),
            Value::Object(parameters_to_map(name, parameters)),
        );
    }

    rename_key(channel, "protocolInfo", "bindings");
    for kind in ["publish", "subscribe"] {
        if let Some(Value::Object(operation)) = channel.get_mut(kind) {
            if let Some(message) = operation.get_mut("message") {
                convert_second_message(message);
            }
            rename_key(operation, "protocolInfo", "bindings");
        }
    }
}

/// Key each parameter by the placeholder at the same position in the
/// channel name, falling back to its `name` field.
fn parameters_to_map(channel_name: &str, parameters: Vec<Value>) -> Object {
    let placeholders = placeholders(channel_name);
    let mut map = Object::with_capacity(parameters.len());
    for (index, mut parameter) in parameters.into_iter().enumerate() {
        let explicit = match &mut parameter {
            Value::Object(parameter) => match parameter.shift_remove("name") {
                Some(Value::String(name)) => Some(name),
                _ => None,
            },
            _ => None,
        };
        let key = placeholders
            .get(index)
            .cloned()
            .or(explicit)
            .unwrap_or_else(|| format!("parameter{}", index));
        map.insert(key, parameter);
    }
    map
}

static RE_PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{([^}]{1,100})\}").expect("Invalid regex"));

fn placeholders(channel_name: &str) -> Vec<String> {
    RE_PLACEHOLDER
        .captures_iter(channel_name)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .collect()
}

fn convert_second_message(message: &mut Value) {
    if let Some(Value::Array(variants)) = message.get_mut("oneOf") {
        for variant in variants.iter_mut().filter_map(Value::as_object_mut) {
            convert_message_fields(variant);
        }
    } else if let Value::Object(message) = message {
        convert_message_fields(message);
    }
}

fn convert_message_fields(message: &mut Object) {
    rename_key(message, "protocolInfo", "bindings");
    if let Some(headers) = message.get_mut("headers") {
        if headers.is_object() {
            let properties = headers.take();
            *headers = json!({"type": "object", "properties": properties});
        }
    }
}

fn rename_key(object: &mut Object, from: &str, to: &str) {
    if let Some(value) = object.shift_remove(from) {
        object.insert(to.to_string(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn yaml(text: &str) -> Value {
        serde_yaml::from_str(text).unwrap()
    }

    #[test]
    fn test_topics_become_channels() {
        let document = yaml(
            r#"
            asyncapi: 1.2.0
            info:
              title: Streetlights API
              version: 1.0.0
            baseTopic: smartylighting.streetlights
            topics:
              event.lighting.measured:
                publish:
                  $ref: '#/components/messages/lightMeasured'
            "#,
        );

        let converted = from_1_2_0_to_2_0_0_rc1(document, &ConvertOptions::default()).unwrap();

        assert_eq!(converted["asyncapi"], "2.0.0-rc1");
        assert_eq!(converted["id"], "urn:streetlights.api");
        assert_eq!(
            converted["channels"],
            json!({
                "smartylighting/streetlights/event/lighting/measured": {
                    "publish": {"message": {"$ref": "#/components/messages/lightMeasured"}}
                }
            })
        );
        assert!(converted.get("topics").is_none());
        assert!(converted.get("baseTopic").is_none());

        let keys: Vec<&String> = converted.as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["asyncapi", "id", "info", "channels"]);
    }

    #[test]
    fn test_servers_use_protocol_and_inherit_security() {
        let document = yaml(
            r#"
            asyncapi: 1.2.0
            info:
              title: Broker
            security:
              - apiKey: []
            servers:
              - url: api.example.com
                scheme: mqtt
                schemeVersion: '3.1'
            topics: {}
            "#,
        );

        let converted =
            from_1_2_0_to_2_0_0_rc1(document, &ConvertOptions::default().with_id("urn:broker"))
                .unwrap();

        assert_eq!(converted["id"], "urn:broker");
        assert_eq!(
            converted["servers"],
            json!([{
                "url": "api.example.com",
                "protocol": "mqtt",
                "protocolVersion": "3.1",
                "security": [{"apiKey": []}]
            }])
        );
        assert!(converted.get("security").is_none());
    }

    #[test]
    fn test_stream_and_events_become_root_channel() {
        let stream = yaml(
            r#"
            asyncapi: 1.2.0
            info: {title: Chat}
            stream:
              read:
                - $ref: '#/components/messages/chatMessage'
              write:
                - $ref: '#/components/messages/heartbeat'
            "#,
        );
        let converted = from_1_2_0_to_2_0_0_rc1(stream, &ConvertOptions::default()).unwrap();
        assert_eq!(
            converted["channels"],
            json!({
                "/": {
                    "publish": {"message": {"oneOf": [{"$ref": "#/components/messages/chatMessage"}]}},
                    "subscribe": {"message": {"oneOf": [{"$ref": "#/components/messages/heartbeat"}]}}
                }
            })
        );

        let events = yaml(
            r#"
            asyncapi: 1.2.0
            info: {title: Chat}
            events:
              send:
                - $ref: '#/components/messages/notification'
            "#,
        );
        let converted = from_1_2_0_to_2_0_0_rc1(events, &ConvertOptions::default()).unwrap();
        assert_eq!(
            converted["channels"],
            json!({"/": {"subscribe": {"message": {"oneOf": [{"$ref": "#/components/messages/notification"}]}}}})
        );
    }

    #[test]
    fn test_missing_title_without_id_fails() {
        let err = from_1_2_0_to_2_0_0_rc1(json!({"asyncapi": "1.2.0", "info": {}}), &ConvertOptions::default())
            .unwrap_err();
        assert!(matches!(err, ConvertError::MissingField { path } if path == "info.title"));
    }

    #[test]
    fn test_server_list_becomes_map() {
        let document = yaml(
            r#"
            asyncapi: 2.0.0-rc1
            id: urn:test
            servers:
              - url: first
                baseChannel: base
              - url: second
              - url: third
            "#,
        );

        let converted = from_2_0_0_rc1_to_2_0_0_rc2(document, &ConvertOptions::default()).unwrap();

        let servers = converted["servers"].as_object().unwrap();
        let names: Vec<&String> = servers.keys().collect();
        assert_eq!(names, vec!["default", "server1", "server2"]);
        assert_eq!(servers["default"], json!({"url": "first"}));
        assert_eq!(servers["server2"], json!({"url": "third"}));
        assert!(converted.get("id").is_none());
    }

    #[test]
    fn test_parameters_follow_placeholders() {
        let document = yaml(
            r#"
            asyncapi: 2.0.0-rc1
            channels:
              'users/{userId}/{action}':
                parameters:
                  - name: user
                    schema: {type: string}
                  - schema: {type: string}
                  - name: extra
                  - description: anonymous
                protocolInfo:
                  kafka: {}
            components:
              parameters:
                shared:
                  name: shared
                  schema: {type: string}
            "#,
        );

        let converted = from_2_0_0_rc1_to_2_0_0_rc2(document, &ConvertOptions::default()).unwrap();

        let channel = &converted["channels"]["users/{userId}/{action}"];
        assert_eq!(
            channel["parameters"],
            json!({
                "userId": {"schema": {"type": "string"}},
                "action": {"schema": {"type": "string"}},
                "extra": {},
                "parameter3": {"description": "anonymous"}
            })
        );
        assert_eq!(channel["bindings"], json!({"kafka": {}}));
        assert!(channel.get("protocolInfo").is_none());
        assert_eq!(
            converted["components"]["parameters"]["shared"],
            json!({"schema": {"type": "string"}})
        );
    }

    #[test]
    fn test_messages_get_bindings_and_header_schemas() {
        let document = yaml(
            r#"
            asyncapi: 2.0.0-rc1
            channels:
              lights:
                publish:
                  protocolInfo:
                    mqtt: {qos: 1}
                  message:
                    protocolInfo:
                      mqtt: {retain: true}
                    headers:
                      correlationId: {type: string}
                subscribe:
                  message:
                    oneOf:
                      - headers:
                          trace: {type: string}
                      - payload: {type: string}
            "#,
        );

        let converted = from_2_0_0_rc1_to_2_0_0_rc2(document, &ConvertOptions::default()).unwrap();

        let publish = &converted["channels"]["lights"]["publish"];
        assert_eq!(publish["bindings"], json!({"mqtt": {"qos": 1}}));
        assert_eq!(
            publish["message"],
            json!({
                "bindings": {"mqtt": {"retain": true}},
                "headers": {"type": "object", "properties": {"correlationId": {"type": "string"}}}
            })
        );
        assert_eq!(
            converted["channels"]["lights"]["subscribe"]["message"]["oneOf"][0]["headers"],
            json!({"type": "object", "properties": {"trace": {"type": "string"}}})
        );
    }

    #[test]
    fn test_id_kept_when_requested() {
        let options = ConvertOptions::default().with_id("urn:kept");
        let converted =
            from_2_0_0_rc1_to_2_0_0_rc2(json!({"asyncapi": "2.0.0-rc1", "id": "urn:kept"}), &options)
                .unwrap();
        assert_eq!(converted["id"], "urn:kept");

        let converted = from_2_0_0_rc2_to_2_0_0(converted, &options).unwrap();
        assert_eq!(converted, json!({"asyncapi": "2.0.0", "id": "urn:kept"}));
    }
}
