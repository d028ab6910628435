//! Response wrapping.
//!
//! Handlers return bare values; clients receive every result under a named
//! key so that responses can grow new fields without breaking callers.

use serde_json::{json, Value};

/// Wrap a handler result in the envelope expected for `method`.
pub fn wrap_response(method: &str, result: Value) -> Value {
    match method {
        "get_schema_element" => json!({ "element": result }),

        "list_schemas" => json!({
            "schemas": if result.is_null() { json!([]) } else { result }
        }),

        "get_schema_details" => json!({ "schema": result }),

        "expand_path" => json!({
            "paths": if result.is_null() { json!([]) } else { result }
        }),

        _ => result,
    }
}

/// Key under which [`wrap_response`] stores the result of `method`.
pub fn response_key(method: &str) -> Option<&'static str> {
    match method {
        "get_schema_element" => Some("element"),
        "list_schemas" => Some("schemas"),
        "get_schema_details" => Some("schema"),
        "expand_path" => Some("paths"),
        _ => None,
    }
}
