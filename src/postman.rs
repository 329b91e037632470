//! Postman collections to AsyncAPI, by way of an intermediate OpenAPI 3.0.3
//! document.

use crate::document::{serialize_input, Input, Output};
use crate::error::ConvertError;
use crate::openapi::convert_openapi_document;
use crate::options::{camel_case_id, ConvertOptions};
use crate::refs::{remove_empty_values, Object};
use crate::transformers::third::unique_id;
use crate::version::{is_supported_postman, DocumentFamily, POSTMAN_TARGET_VERSIONS};
use regex::Regex;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use once_cell::sync::Lazy;
use tracing::{debug, warn};

const OPENAPI_VERSION: &str = "3.0.3";

/// Convert a Postman collection given as text or as a parsed tree.
pub fn convert_postman(
    input: Input<'_>,
    target: &str,
    options: &ConvertOptions,
) -> Result<Output, ConvertError> {
    let mut input = serialize_input(input)?;
    let document = std::mem::take(&mut input.document);
    let converted = convert_postman_document(document, target, options)?;
    Output::render(converted, &input)
}

/// Convert a parsed Postman collection into an AsyncAPI document.
pub fn convert_postman_document(
    collection: Value,
    target: &str,
    options: &ConvertOptions,
) -> Result<Value, ConvertError> {
    let version = match DocumentFamily::detect(&collection) {
        DocumentFamily::Postman(Some(version)) if is_supported_postman(&version) => version,
        DocumentFamily::Postman(version) => {
            return Err(ConvertError::UnsupportedSchemaVersion {
                family: "Postman collection".to_string(),
                version: version.unwrap_or_else(|| "undefined".to_string()),
            });
        }
        family @ (DocumentFamily::AsyncApi(_) | DocumentFamily::OpenApi(_)) => {
            return Err(ConvertError::WrongConverter {
                family: family.name().to_string(),
                entry_point: "convert_postman".to_string(),
            });
        }
        DocumentFamily::Unknown => {
            return Err(ConvertError::UnsupportedSchemaVersion {
                family: "Postman collection".to_string(),
                version: "undefined".to_string(),
            });
        }
    };

    if !POSTMAN_TARGET_VERSIONS.contains(&target) {
        return Err(ConvertError::UnknownVersion {
            from: version,
            to: target.to_string(),
        });
    }

    let openapi = postman_to_openapi(&collection)?;
    debug!(postman = %version, openapi = OPENAPI_VERSION, "collection transpiled");
    convert_openapi_document(openapi, options)
}

/// Transpile a Postman collection into an OpenAPI 3.0.3 document.
pub fn postman_to_openapi(collection: &Value) -> Result<Value, ConvertError> {
    let collection: Collection =
        serde_json::from_value(collection.clone()).map_err(|err| ConvertError::InvalidDocument {
            reason: format!("malformed Postman collection: {}", err),
        })?;

    let title = collection
        .info
        .name
        .clone()
        .ok_or_else(|| ConvertError::MissingField {
            path: "info.name".to_string(),
        })?;

    let variables: HashMap<String, String> = collection
        .variable
        .iter()
        .filter(|variable| !variable.disabled)
        .filter_map(|variable| Some((variable.key.clone()?, variable.text()?)))
        .collect();

    let mut builder = Builder::new(variables);
    let mut folders = Vec::new();
    builder.walk(&collection.item, &mut folders);

    let mut info = Object::new();
    info.insert("title".to_string(), json!(title));
    let version = builder.variables.get("version").cloned();
    info.insert(
        "version".to_string(),
        json!(version.unwrap_or_else(|| "1.0.0".to_string())),
    );
    if let Some(description) = collection.info.description.as_ref().and_then(Description::text) {
        info.insert("description".to_string(), json!(description));
    }

    let servers: Vec<Value> = builder.servers.iter().map(|url| json!({ "url": url })).collect();
    let tags: Vec<Value> = builder.tags.iter().map(|name| json!({ "name": name })).collect();

    let mut openapi = Object::new();
    openapi.insert("openapi".to_string(), json!(OPENAPI_VERSION));
    openapi.insert("info".to_string(), Value::Object(info));
    openapi.insert("servers".to_string(), Value::Array(servers));
    openapi.insert("tags".to_string(), Value::Array(tags));
    openapi.insert("paths".to_string(), Value::Object(builder.paths));
    remove_empty_values(&mut openapi);
    openapi
        .entry("paths")
        .or_insert_with(|| Value::Object(Object::new()));
    Ok(Value::Object(openapi))
}

#[derive(Debug, Deserialize)]
struct Collection {
    info: CollectionInfo,
    #[serde(default)]
    item: Vec<Item>,
    #[serde(default)]
    variable: Vec<KeyValue>,
}

#[derive(Debug, Deserialize)]
struct CollectionInfo {
    name: Option<String>,
    description: Option<Description>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Description {
    Text(String),
    Content { content: Option<String> },
}

impl Description {
    fn text(&self) -> Option<String> {
        let text = match self {
            Description::Text(text) => Some(text.clone()),
            Description::Content { content } => content.clone(),
        };
        text.filter(|text| !text.is_empty())
    }
}

#[derive(Debug, Deserialize)]
struct Item {
    name: Option<String>,
    description: Option<Description>,
    item: Option<Vec<Item>>,
    request: Option<Request>,
    #[serde(default)]
    response: Vec<SavedResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Request {
    Url(String),
    Details(RequestDetails),
}

#[derive(Debug, Deserialize)]
struct RequestDetails {
    method: Option<String>,
    url: Option<Url>,
    header: Option<Headers>,
    body: Option<Body>,
    description: Option<Description>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Url {
    Raw(String),
    Parts(UrlParts),
}

#[derive(Debug, Default, Deserialize)]
struct UrlParts {
    raw: Option<String>,
    protocol: Option<String>,
    host: Option<Segments>,
    port: Option<Value>,
    path: Option<Segments>,
    #[serde(default)]
    query: Vec<KeyValue>,
    #[serde(default)]
    variable: Vec<KeyValue>,
}

/// A host or path, written either whole or as a list of segments.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Segments {
    Joined(String),
    List(Vec<Value>),
}

impl Segments {
    fn parts(&self, separator: char) -> Vec<String> {
        match self {
            Segments::Joined(text) => text
                .split(separator)
                .filter(|part| !part.is_empty())
                .map(str::to_string)
                .collect(),
            Segments::List(parts) => parts
                .iter()
                .filter_map(|part| match part {
                    Value::String(text) => Some(text.clone()),
                    Value::Object(object) => object.get("value").and_then(scalar_text),
                    _ => None,
                })
                .filter(|part| !part.is_empty())
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Headers {
    List(Vec<KeyValue>),
    Raw(String),
}

impl Headers {
    /// Enabled `(name, value)` pairs.
    fn pairs(&self) -> Vec<(String, String)> {
        match self {
            Headers::List(entries) => entries
                .iter()
                .filter(|entry| !entry.disabled)
                .filter_map(|entry| Some((entry.key.clone()?, entry.text().unwrap_or_default())))
                .collect(),
            Headers::Raw(text) => text
                .lines()
                .filter_map(|line| line.split_once(':'))
                .map(|(name, value)| (name.trim().to_string(), value.trim().to_string()))
                .filter(|(name, _)| !name.is_empty())
                .collect(),
        }
    }

    fn content_type(&self) -> Option<String> {
        self.pairs()
            .into_iter()
            .find(|(name, _)| name.eq_ignore_ascii_case("content-type"))
            .map(|(_, value)| value)
            .filter(|value| !value.is_empty())
    }
}

#[derive(Debug, Deserialize)]
struct KeyValue {
    key: Option<String>,
    value: Option<Value>,
    #[serde(default)]
    disabled: bool,
    description: Option<Description>,
    #[serde(rename = "type")]
    kind: Option<String>,
}

impl KeyValue {
    fn text(&self) -> Option<String> {
        self.value.as_ref().and_then(scalar_text)
    }
}

#[derive(Debug, Deserialize)]
struct Body {
    mode: Option<String>,
    raw: Option<String>,
    #[serde(default)]
    urlencoded: Vec<KeyValue>,
    #[serde(default)]
    formdata: Vec<KeyValue>,
    options: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct SavedResponse {
    name: Option<String>,
    code: Option<u16>,
    status: Option<String>,
    header: Option<Headers>,
    body: Option<String>,
    #[serde(rename = "_postman_previewlanguage")]
    preview_language: Option<String>,
}

/// A request URL split into the parts OpenAPI keeps apart.
#[derive(Debug, Default, PartialEq)]
struct ParsedUrl {
    server: Option<String>,
    path: String,
    path_params: Vec<String>,
    query: Vec<(String, String)>,
}

struct Builder {
    variables: HashMap<String, String>,
    servers: Vec<String>,
    tags: Vec<String>,
    paths: Object,
    operation_ids: HashSet<String>,
}

impl Builder {
    fn new(variables: HashMap<String, String>) -> Self {
        Self {
            variables,
            servers: Vec::new(),
            tags: Vec::new(),
            paths: Object::new(),
            operation_ids: HashSet::new(),
        }
    }

    fn walk(&mut self, items: &[Item], folders: &mut Vec<String>) {
        for item in items {
            if let Some(children) = &item.item {
                let name = item.name.clone().filter(|name| !name.is_empty());
                if let Some(name) = &name {
                    if !self.tags.contains(name) {
                        self.tags.push(name.clone());
                    }
                    folders.push(name.clone());
                }
                self.walk(children, folders);
                if name.is_some() {
                    folders.pop();
                }
            } else if let Some(request) = &item.request {
                self.add_request(item, request, folders);
            }
        }
    }

    fn add_request(&mut self, item: &Item, request: &Request, folders: &[String]) {
        let empty = RequestDetails {
            method: None,
            url: None,
            header: None,
            body: None,
            description: None,
        };
        let (details, url) = match request {
            Request::Url(url) => (&empty, self.parse_raw_url(url)),
            Request::Details(details) => {
                let url = match &details.url {
                    Some(Url::Raw(raw)) => self.parse_raw_url(raw),
                    Some(Url::Parts(parts)) => self.parse_url_parts(parts),
                    None => ParsedUrl {
                        path: "/".to_string(),
                        ..ParsedUrl::default()
                    },
                };
                (details, url)
            }
        };

        if let Some(server) = &url.server {
            if !self.servers.contains(server) {
                self.servers.push(server.clone());
            }
        }

        let method = details
            .method
            .as_deref()
            .unwrap_or("GET")
            .to_ascii_lowercase();
        let path_item = self
            .paths
            .entry(url.path.clone())
            .or_insert_with(|| Value::Object(Object::new()));
        let Value::Object(path_item) = path_item else {
            return;
        };
        if path_item.contains_key(&method) {
            warn!(method = %method, path = %url.path, "skipping duplicate request");
            return;
        }

        let mut operation = Object::new();
        if !folders.is_empty() {
            operation.insert("tags".to_string(), json!(folders));
        }
        if let Some(name) = &item.name {
            operation.insert("summary".to_string(), json!(name));
            if let Some(id) = camel_case_id(name) {
                let id = unique_id(id, &self.operation_ids);
                self.operation_ids.insert(id.clone());
                operation.insert("operationId".to_string(), json!(id));
            }
        }
        let description = details
            .description
            .as_ref()
            .or(item.description.as_ref())
            .and_then(Description::text);
        if let Some(description) = description {
            operation.insert("description".to_string(), json!(description));
        }

        let mut parameters = Vec::new();
        for name in &url.path_params {
            let mut parameter = json!({
                "name": name,
                "in": "path",
                "required": true,
                "schema": { "type": "string" }
            });
            if let Some(description) = url_variable_description(details, name) {
                parameter["description"] = json!(description);
            }
            parameters.push(parameter);
        }
        for (name, value) in &url.query {
            parameters.push(simple_parameter(name, "query", value));
        }
        let headers = details.header.as_ref().map(Headers::pairs).unwrap_or_default();
        for (name, value) in &headers {
            if !name.eq_ignore_ascii_case("content-type") {
                parameters.push(simple_parameter(name, "header", value));
            }
        }
        if !parameters.is_empty() {
            operation.insert("parameters".to_string(), Value::Array(parameters));
        }

        let content_type = details.header.as_ref().and_then(Headers::content_type);
        if let Some(body) = details.body.as_ref().and_then(|body| request_body(body, content_type)) {
            operation.insert("requestBody".to_string(), body);
        }

        operation.insert("responses".to_string(), Value::Object(responses(&item.response)));
        debug!(method = %method, path = %url.path, "transpiled request");
        path_item.insert(method, Value::Object(operation));
    }

    /// Replace `{{name}}` with the collection variable's value, or with
    /// `{name}` when the collection does not define it.
    fn substitute(&self, text: &str) -> String {
        RE_VARIABLE
            .replace_all(text, |captures: &regex::Captures<'_>| {
                let name = &captures[1];
                match self.variables.get(name) {
                    Some(value) => value.clone(),
                    None => format!("{{{}}}", name),
                }
            })
            .into_owned()
    }

    fn parse_raw_url(&self, raw: &str) -> ParsedUrl {
        let (address, query) = match raw.split_once('?') {
            Some((address, query)) => (address, Some(query)),
            None => (raw, None),
        };
        let (protocol, rest) = match address.split_once("://") {
            Some((protocol, rest)) => (Some(protocol), rest),
            None => (None, address),
        };
        let (host, path) = if rest.starts_with('/') {
            ("", rest)
        } else {
            match rest.split_once('/') {
                Some((host, path)) => (host, path),
                None => (rest, ""),
            }
        };

        let mut url = ParsedUrl {
            server: self.server_url(protocol, host, None),
            ..ParsedUrl::default()
        };
        let segments: Vec<String> = path
            .split('/')
            .filter(|segment| !segment.is_empty())
            .map(str::to_string)
            .collect();
        self.fill_path(&mut url, &segments);
        if let Some(query) = query {
            url.query = query
                .split('&')
                .filter(|pair| !pair.is_empty())
                .map(|pair| match pair.split_once('=') {
                    Some((name, value)) => (name.to_string(), value.to_string()),
                    None => (pair.to_string(), String::new()),
                })
                .collect();
        }
        url
    }

    fn parse_url_parts(&self, parts: &UrlParts) -> ParsedUrl {
        if parts.host.is_none() && parts.path.is_none() {
            if let Some(raw) = &parts.raw {
                let mut url = self.parse_raw_url(raw);
                if !parts.query.is_empty() {
                    url.query = enabled_pairs(&parts.query);
                }
                return url;
            }
        }

        let host = parts
            .host
            .as_ref()
            .map(|host| host.parts('.').join("."))
            .unwrap_or_default();
        let port = parts.port.as_ref().and_then(scalar_text);
        let mut url = ParsedUrl {
            server: self.server_url(parts.protocol.as_deref(), &host, port.as_deref()),
            query: enabled_pairs(&parts.query),
            ..ParsedUrl::default()
        };
        let segments = parts
            .path
            .as_ref()
            .map(|path| path.parts('/'))
            .unwrap_or_default();
        self.fill_path(&mut url, &segments);
        url
    }

    fn server_url(&self, protocol: Option<&str>, host: &str, port: Option<&str>) -> Option<String> {
        if host.is_empty() {
            return None;
        }
        let host = self.substitute(host);
        let mut server = if host.contains("://") {
            host
        } else {
            format!("{}://{}", protocol.unwrap_or("https"), host)
        };
        if let Some(port) = port.filter(|port| !port.is_empty()) {
            server.push(':');
            server.push_str(port);
        }
        Some(server.trim_end_matches('/').to_string())
    }

    /// `:name` and `{{name}}` segments become `{name}` path parameters.
    fn fill_path(&self, url: &mut ParsedUrl, segments: &[String]) {
        let mut path = String::new();
        for segment in segments {
            let parameter = match segment.strip_prefix(':') {
                Some(name) if !name.is_empty() => Some(name.to_string()),
                _ => RE_SEGMENT_VARIABLE
                    .captures(segment)
                    .map(|captures| captures[1].to_string()),
            };
            path.push('/');
            match parameter {
                Some(name) => {
                    path.push_str(&format!("{{{}}}", name));
                    if !url.path_params.contains(&name) {
                        url.path_params.push(name);
                    }
                }
                None => path.push_str(&self.substitute(segment)),
            }
        }
        url.path = if path.is_empty() { "/".to_string() } else { path };
    }
}

// `{{name}}` anywhere, and a path segment that is nothing but one
static RE_VARIABLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{\s*([^{}\s]+)\s*\}\}").expect("Invalid regex"));
static RE_SEGMENT_VARIABLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\{\{\s*([^{}\s]+)\s*\}\}$").expect("Invalid regex"));

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

fn enabled_pairs(entries: &[KeyValue]) -> Vec<(String, String)> {
    entries
        .iter()
        .filter(|entry| !entry.disabled)
        .filter_map(|entry| Some((entry.key.clone()?, entry.text().unwrap_or_default())))
        .collect()
}

fn url_variable_description(details: &RequestDetails, name: &str) -> Option<String> {
    let Some(Url::Parts(parts)) = &details.url else {
        return None;
    };
    parts
        .variable
        .iter()
        .find(|variable| variable.key.as_deref() == Some(name))
        .and_then(|variable| variable.description.as_ref())
        .and_then(Description::text)
}

fn simple_parameter(name: &str, location: &str, value: &str) -> Value {
    let mut schema = json!({ "type": "string" });
    if !value.is_empty() {
        schema["example"] = json!(value);
    }
    json!({ "name": name, "in": location, "schema": schema })
}

fn request_body(body: &Body, content_type: Option<String>) -> Option<Value> {
    let (content_type, media) = match body.mode.as_deref() {
        Some("raw") => {
            let raw = body.raw.as_deref().unwrap_or_default();
            if raw.trim().is_empty() {
                return None;
            }
            let content_type = content_type
                .or_else(|| raw_language(body).map(str::to_string))
                .unwrap_or_else(|| "text/plain".to_string());
            let media = text_media(raw, &content_type);
            (content_type, media)
        }
        Some("urlencoded") => (
            "application/x-www-form-urlencoded".to_string(),
            json!({ "schema": form_schema(&body.urlencoded) }),
        ),
        Some("formdata") => (
            "multipart/form-data".to_string(),
            json!({ "schema": form_schema(&body.formdata) }),
        ),
        Some("file") => (
            "application/octet-stream".to_string(),
            json!({ "schema": { "type": "string", "format": "binary" } }),
        ),
        Some("graphql") => (
            "application/json".to_string(),
            json!({
                "schema": {
                    "type": "object",
                    "properties": {
                        "query": { "type": "string" },
                        "variables": { "type": "object" }
                    }
                }
            }),
        ),
        _ => return None,
    };

    Some(json!({ "content": { content_type: media } }))
}

fn raw_language(body: &Body) -> Option<&'static str> {
    let language = body
        .options
        .as_ref()
        .and_then(|options| options.get("raw"))
        .and_then(|raw| raw.get("language"))
        .and_then(Value::as_str)?;
    match language {
        "json" => Some("application/json"),
        "xml" => Some("application/xml"),
        "html" => Some("text/html"),
        "javascript" => Some("application/javascript"),
        "text" => Some("text/plain"),
        _ => None,
    }
}

/// A media type object for a textual body: JSON bodies get an inferred
/// schema and their parsed value as the example.
fn text_media(text: &str, content_type: &str) -> Value {
    if content_type.contains("json") {
        if let Ok(example) = serde_json::from_str::<Value>(text) {
            return json!({ "schema": infer_schema(&example), "example": example });
        }
    }
    json!({ "schema": { "type": "string" }, "example": text })
}

fn form_schema(entries: &[KeyValue]) -> Value {
    let mut properties = Object::new();
    for entry in entries.iter().filter(|entry| !entry.disabled) {
        let Some(key) = &entry.key else {
            continue;
        };
        let property = if entry.kind.as_deref() == Some("file") {
            json!({ "type": "string", "format": "binary" })
        } else {
            match entry.text().filter(|value| !value.is_empty()) {
                Some(value) => json!({ "type": "string", "example": value }),
                None => json!({ "type": "string" }),
            }
        };
        properties.insert(key.clone(), property);
    }
    json!({ "type": "object", "properties": properties })
}

fn responses(saved: &[SavedResponse]) -> Object {
    let mut responses = Object::new();
    for response in saved {
        let code = response.code.unwrap_or(200).to_string();
        if responses.contains_key(&code) {
            continue;
        }
        let description = response
            .name
            .clone()
            .or_else(|| response.status.clone())
            .unwrap_or_else(|| "OK".to_string());

        let mut converted = Object::new();
        converted.insert("description".to_string(), json!(description));
        if let Some(body) = response.body.as_deref().filter(|body| !body.trim().is_empty()) {
            let content_type = response
                .header
                .as_ref()
                .and_then(Headers::content_type)
                .or_else(|| match response.preview_language.as_deref() {
                    Some("json") => Some("application/json".to_string()),
                    Some("xml") => Some("application/xml".to_string()),
                    Some("html") => Some("text/html".to_string()),
                    _ => None,
                })
                .unwrap_or_else(|| {
                    if serde_json::from_str::<Value>(body).is_ok() {
                        "application/json".to_string()
                    } else {
                        "text/plain".to_string()
                    }
                });
            let media = text_media(body, &content_type);
            converted.insert("content".to_string(), json!({ content_type: media }));
        }
        responses.insert(code, Value::Object(converted));
    }

    if responses.is_empty() {
        responses.insert("200".to_string(), json!({ "description": "OK" }));
    }
    responses
}

/// A JSON schema describing the shape of `value`.
fn infer_schema(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullable": true }),
        Value::Bool(_) => json!({ "type": "boolean" }),
        Value::Number(number) if number.is_i64() || number.is_u64() => json!({ "type": "integer" }),
        Value::Number(_) => json!({ "type": "number" }),
        Value::String(_) => json!({ "type": "string" }),
        Value::Array(items) => {
            let items = items.first().map(infer_schema).unwrap_or_else(|| json!({}));
            json!({ "type": "array", "items": items })
        }
        Value::Object(object) => {
            let properties: Object = object
                .iter()
                .map(|(key, value)| (key.clone(), infer_schema(value)))
                .collect();
            json!({ "type": "object", "properties": properties })
        }
    }
}
