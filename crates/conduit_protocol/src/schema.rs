//! A JSON Schema subset sufficient for `type`, `enum`, and `required` —
//! exactly what tool input schemas are specified to need. Not a general
//! validator: nested `$ref`, `oneOf`, and format keywords are not
//! recognized and silently pass.

use serde_json::Value;

/// Checks `input` against `schema`'s `required`/`type`/`enum` constraints.
/// Returns a human-readable mismatch description on the first failure found.
pub fn validate(schema: &Value, input: &Value) -> Result<(), String> {
    let Some(schema_obj) = schema.as_object() else {
        return Ok(());
    };

    if let Some(required) = schema_obj.get("required").and_then(Value::as_array) {
        let input_obj = input.as_object();
        for field in required {
            let Some(name) = field.as_str() else { continue };
            let present = input_obj.map(|o| o.contains_key(name)).unwrap_or(false);
            if !present {
                return Err(format!("missing required field '{name}'"));
            }
        }
    }

    if let Some(properties) = schema_obj.get("properties").and_then(Value::as_object) {
        if let Some(input_obj) = input.as_object() {
            for (name, prop_schema) in properties {
                if let Some(value) = input_obj.get(name) {
                    validate_property(name, prop_schema, value)?;
                }
            }
        }
    }

    Ok(())
}

fn validate_property(name: &str, schema: &Value, value: &Value) -> Result<(), String> {
    let Some(schema_obj) = schema.as_object() else {
        return Ok(());
    };

    if let Some(expected_type) = schema_obj.get("type").and_then(Value::as_str) {
        if !matches_type(expected_type, value) {
            return Err(format!(
                "field '{name}' expected type '{expected_type}', found {}",
                json_type_name(value)
            ));
        }
    }

    if let Some(allowed) = schema_obj.get("enum").and_then(Value::as_array) {
        if !allowed.contains(value) {
            return Err(format!("field '{name}' must be one of {allowed:?}"));
        }
    }

    Ok(())
}

fn matches_type(expected: &str, value: &Value) -> bool {
    match expected {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        "object" => value.is_object(),
        "array" => value.is_array(),
        "null" => value.is_null(),
        _ => true,
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_matching_input() {
        let schema = json!({
            "type": "object",
            "required": ["topic"],
            "properties": { "topic": { "type": "string" } },
        });
        assert!(validate(&schema, &json!({ "topic": "rust" })).is_ok());
    }

    #[test]
    fn rejects_missing_required_field() {
        let schema = json!({ "required": ["topic"] });
        assert!(validate(&schema, &json!({})).is_err());
    }

    #[test]
    fn rejects_wrong_type() {
        let schema = json!({ "properties": { "count": { "type": "integer" } } });
        assert!(validate(&schema, &json!({ "count": "five" })).is_err());
    }

    #[test]
    fn rejects_value_outside_enum() {
        let schema = json!({ "properties": { "mode": { "enum": ["fast", "slow"] } } });
        assert!(validate(&schema, &json!({ "mode": "medium" })).is_err());
    }
}
