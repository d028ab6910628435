//! Shared handler utilities used across RPC methods.

use schema_core::{SchemaError, SchemaIdentity};
use serde_json::Value;

/// Extract an optional string parameter, supporting both snake_case and camelCase.
pub(crate) fn get_str_param<'a>(params: &'a Value, snake: &str, camel: &str) -> Option<&'a str> {
    params
        .get(snake)
        .or_else(|| params.get(camel))
        .and_then(|v| v.as_str())
}

/// Extract a required string parameter or return an error.
pub(crate) fn require_str_param(
    params: &Value,
    snake: &str,
    camel: &str,
) -> schema_core::Result<String> {
    get_str_param(params, snake, camel)
        .map(String::from)
        .ok_or_else(|| SchemaError::InvalidParams {
            message: format!("Missing required parameter: {}", snake),
        })
}

/// Extract the schema identity, either flat (`name`, `vendor`, `version`) or
/// nested under a `schema` object.
pub(crate) fn require_identity(params: &Value) -> schema_core::Result<SchemaIdentity> {
    let source = params.get("schema").filter(|v| v.is_object()).unwrap_or(params);
    Ok(SchemaIdentity::new(
        require_str_param(source, "name", "name")?,
        require_str_param(source, "vendor", "vendor")?,
        require_str_param(source, "version", "version")?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_snake_and_camel_case() {
        let params = json!({"schema_name": "a", "schemaVendor": "b"});
        assert_eq!(get_str_param(&params, "schema_name", "schemaName"), Some("a"));
        assert_eq!(get_str_param(&params, "schema_vendor", "schemaVendor"), Some("b"));
        assert!(require_str_param(&params, "missing", "missing").is_err());
    }

    #[test]
    fn test_identity_flat_or_nested() {
        let flat = json!({"name": "test", "vendor": "x", "version": "1"});
        let nested = json!({"schema": {"name": "test", "vendor": "x", "version": "1"}, "path": "a"});
        assert_eq!(require_identity(&flat).unwrap(), SchemaIdentity::new("test", "x", "1"));
        assert_eq!(require_identity(&nested).unwrap(), SchemaIdentity::new("test", "x", "1"));

        let partial = json!({"name": "test"});
        assert!(matches!(
            require_identity(&partial),
            Err(SchemaError::InvalidParams { .. })
        ));
    }
}
