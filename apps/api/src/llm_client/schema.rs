//! Declared response shapes for schema-typed generation calls.
//!
//! A `Schema` is sent to the backend (upper-case type vocabulary) and used
//! again locally to validate whatever comes back before deserialization.

use serde::{Serialize, Serializer};
use serde_json::{json, Map, Value};

#[derive(Debug, Clone, PartialEq)]
pub enum Schema {
    String,
    Number,
    Array(Box<Schema>),
    Object {
        properties: Vec<(String, Schema)>,
        required: Vec<String>,
    },
}

impl Schema {
    pub fn string() -> Self {
        Schema::String
    }

    pub fn number() -> Self {
        Schema::Number
    }

    pub fn array(items: Schema) -> Self {
        Schema::Array(Box::new(items))
    }

    /// An object whose properties are all required.
    pub fn object<'a>(properties: impl IntoIterator<Item = (&'a str, Schema)>) -> Self {
        let properties: Vec<(String, Schema)> = properties
            .into_iter()
            .map(|(name, schema)| (name.to_string(), schema))
            .collect();
        let required = properties.iter().map(|(name, _)| name.clone()).collect();
        Schema::Object {
            properties,
            required,
        }
    }

    /// Renders the schema in the backend's wire format.
    pub fn to_json(&self) -> Value {
        match self {
            Schema::String => json!({ "type": "STRING" }),
            Schema::Number => json!({ "type": "NUMBER" }),
            Schema::Array(items) => json!({ "type": "ARRAY", "items": items.to_json() }),
            Schema::Object {
                properties,
                required,
            } => {
                let props: Map<String, Value> = properties
                    .iter()
                    .map(|(name, schema)| (name.clone(), schema.to_json()))
                    .collect();
                json!({
                    "type": "OBJECT",
                    "properties": props,
                    "required": required,
                })
            }
        }
    }

    /// Checks `value` against this schema. Extra object properties are allowed;
    /// missing or null required ones are not. Errors name the offending path.
    pub fn validate(&self, value: &Value) -> Result<(), String> {
        self.validate_at(value, "$")
    }

    fn validate_at(&self, value: &Value, path: &str) -> Result<(), String> {
        match self {
            Schema::String => expect(value.is_string(), path, "a string", value),
            Schema::Number => expect(value.is_number(), path, "a number", value),
            Schema::Array(items) => {
                let array = value
                    .as_array()
                    .ok_or_else(|| mismatch(path, "an array", value))?;
                array
                    .iter()
                    .enumerate()
                    .try_for_each(|(i, item)| items.validate_at(item, &format!("{path}[{i}]")))
            }
            Schema::Object {
                properties,
                required,
            } => {
                let object = value
                    .as_object()
                    .ok_or_else(|| mismatch(path, "an object", value))?;
                for name in required {
                    match object.get(name) {
                        None | Some(Value::Null) => {
                            return Err(format!("{path}.{name}: required field is missing"))
                        }
                        Some(_) => {}
                    }
                }
                for (name, schema) in properties {
                    match object.get(name) {
                        None | Some(Value::Null) => {}
                        Some(field) => schema.validate_at(field, &format!("{path}.{name}"))?,
                    }
                }
                Ok(())
            }
        }
    }
}

impl Serialize for Schema {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

fn expect(ok: bool, path: &str, expected: &str, value: &Value) -> Result<(), String> {
    if ok {
        Ok(())
    } else {
        Err(mismatch(path, expected, value))
    }
}

fn mismatch(path: &str, expected: &str, value: &Value) -> String {
    let found = match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    };
    format!("{path}: expected {expected}, found {found}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry_schema() -> Schema {
        Schema::object([
            ("company", Schema::string()),
            ("bullets", Schema::array(Schema::string())),
        ])
    }

    #[test]
    fn test_wire_format_uses_upper_case_types() {
        let json = entry_schema().to_json();
        assert_eq!(json["type"], "OBJECT");
        assert_eq!(json["properties"]["bullets"]["type"], "ARRAY");
        assert_eq!(json["properties"]["bullets"]["items"]["type"], "STRING");
        assert_eq!(json["required"], json!(["company", "bullets"]));
    }

    #[test]
    fn test_validate_accepts_matching_value_with_extra_fields() {
        let value = json!({"company": "Acme", "bullets": ["a", "b"], "extra": 1});
        assert!(entry_schema().validate(&value).is_ok());
    }

    #[test]
    fn test_validate_reports_missing_required_field() {
        let value = json!({"bullets": []});
        let err = entry_schema().validate(&value).unwrap_err();
        assert!(err.contains("$.company"), "{err}");
    }

    #[test]
    fn test_validate_reports_nested_type_mismatch_path() {
        let schema = Schema::array(entry_schema());
        let value = json!([{"company": "Acme", "bullets": ["ok", 3]}]);
        let err = schema.validate(&value).unwrap_err();
        assert_eq!(err, "$[0].bullets[1]: expected a string, found a number");
    }

    #[test]
    fn test_null_required_field_counts_as_missing() {
        let value = json!({"company": null, "bullets": []});
        let err = entry_schema().validate(&value).unwrap_err();
        assert_eq!(err, "$.company: required field is missing");
    }
}
