//! Security requirement and security scheme conversion.

use crate::refs::{create_ref_object, dereference, get_value_by_path, Object};
use serde_json::Value;

/// OAuth2 flow kinds whose `scopes` are renamed to `availableScopes`.
const OAUTH_FLOWS: [&str; 4] = ["implicit", "password", "clientCredentials", "authorizationCode"];

/// Rename `scopes` to `availableScopes` in every OAuth2 flow of `scheme`.
pub fn convert_security_scheme(scheme: &mut Value) {
    let Some(flows) = scheme.get_mut("flows").and_then(Value::as_object_mut) else {
        return;
    };
    for kind in OAUTH_FLOWS {
        if let Some(Value::Object(flow)) = flows.get_mut(kind) {
            if let Some(scopes) = flow.shift_remove("scopes") {
                flow.insert("availableScopes".to_string(), scopes);
            }
        }
    }
}

/// Convert an OpenAPI security scheme into its AsyncAPI 3.0.0 counterpart.
pub fn convert_openapi_security_scheme(scheme: &mut Value) {
    if let Some(Value::String(kind)) = scheme.get_mut("type") {
        match kind.as_str() {
            "apiKey" => *kind = "httpApiKey".to_string(),
            "mutualTLS" => *kind = "X509".to_string(),
            _ => {}
        }
    }
    convert_security_scheme(scheme);
}

/// Turn a list of security requirements (`[{ name: [scopes] }]`) into the
/// 3.0.0 form: plain references when no scopes are listed, otherwise an
/// inline copy of the referenced scheme carrying the required `scopes`.
///
/// Schemes are looked up in `document.components.securitySchemes` and passed
/// through `convert_scheme` before being inlined.
pub fn convert_security_requirements(
    requirements: &Value,
    document: &Value,
    convert_scheme: fn(&mut Value),
) -> Vec<Value> {
    let Some(requirements) = requirements.as_array() else {
        return Vec::new();
    };

    let mut converted = Vec::new();
    for requirement in requirements.iter().filter_map(Value::as_object) {
        for (name, scopes) in requirement {
            let scopes = scopes.as_array().cloned().unwrap_or_default();
            if scopes.is_empty() {
                converted.push(create_ref_object(&["components", "securitySchemes", name]));
                continue;
            }

            let mut scheme = get_value_by_path(document, &["components", "securitySchemes", name])
                .and_then(|scheme| dereference(document, scheme))
                .cloned()
                .unwrap_or_else(|| Value::Object(Object::new()));
            convert_scheme(&mut scheme);
            if let Value::Object(object) = &mut scheme {
                object.insert("scopes".to_string(), Value::Array(scopes));
            }
            converted.push(scheme);
        }
    }
    converted
}
