use std::sync::Arc;

use jsonschema::Validator;
use schemagate_store::DEFAULT_KIND;
use serde_json::{Map, Value};

use crate::config::DialectConfig;
use crate::dialect::{CompiledSchema, Dialect, Validation};
use crate::error::{Result, SchemaError};

/// JSON Schema dialect (`type: "jsonschema"`).
#[derive(Debug, Clone, Default)]
pub struct JsonSchemaDialect {
    config: DialectConfig,
}

impl JsonSchemaDialect {
    pub fn new(config: DialectConfig) -> Self {
        Self { config }
    }
}

impl Dialect for JsonSchemaDialect {
    fn kind(&self) -> &str {
        DEFAULT_KIND
    }

    fn compile(&self, body: &str) -> Result<Arc<dyn CompiledSchema>> {
        let mut schema: Value = serde_json::from_str(body)?;
        if self.config.strict_objects {
            close_objects(&mut schema);
        }

        let validator = jsonschema::validator_for(&schema)
            .map_err(|err| SchemaError::CompileFailed(err.to_string()))?;

        Ok(Arc::new(CompiledJsonSchema {
            validator,
            max_errors: self.config.max_errors.max(1),
        }))
    }
}

struct CompiledJsonSchema {
    validator: Validator,
    max_errors: usize,
}

impl CompiledSchema for CompiledJsonSchema {
    fn validate(&self, payload: &[u8]) -> Validation {
        let value: Value = match serde_json::from_slice(payload) {
            Ok(value) => value,
            Err(err) => {
                return Validation::from_errors(vec![format!("payload is not valid JSON: {err}")])
            }
        };

        let errors: Vec<String> = self
            .validator
            .iter_errors(&value)
            .take(self.max_errors)
            .map(|err| err.to_string())
            .collect();

        Validation::from_errors(errors)
    }
}

// Keywords whose value is a map of subschemas.
const SCHEMA_MAPS: [&str; 5] = [
    "properties",
    "patternProperties",
    "dependentSchemas",
    "$defs",
    "definitions",
];

// Keywords whose value is a single subschema.
const SCHEMA_SINGLES: [&str; 11] = [
    "propertyNames",
    "additionalProperties",
    "unevaluatedProperties",
    "items",
    "contains",
    "additionalItems",
    "unevaluatedItems",
    "not",
    "if",
    "then",
    "else",
];

// Keywords whose value is an array of subschemas.
const SCHEMA_ARRAYS: [&str; 4] = ["prefixItems", "allOf", "anyOf", "oneOf"];

// Keywords that only make sense on object schemas.
const OBJECT_KEYWORDS: [&str; 8] = [
    "properties",
    "patternProperties",
    "additionalProperties",
    "unevaluatedProperties",
    "required",
    "dependentRequired",
    "dependentSchemas",
    "propertyNames",
];

/// Add `additionalProperties: false` to every object schema that does not set it.
fn close_objects(value: &mut Value) {
    match value {
        Value::Object(map) => {
            if describes_object(map) && !map.contains_key("additionalProperties") {
                map.insert("additionalProperties".to_string(), Value::Bool(false));
            }
            for key in SCHEMA_MAPS {
                if let Some(Value::Object(children)) = map.get_mut(key) {
                    children.values_mut().for_each(close_objects);
                }
            }
            for key in SCHEMA_SINGLES {
                if let Some(child) = map.get_mut(key) {
                    close_objects(child);
                }
            }
            for key in SCHEMA_ARRAYS {
                if let Some(Value::Array(children)) = map.get_mut(key) {
                    children.iter_mut().for_each(close_objects);
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(close_objects),
        _ => {}
    }
}

fn describes_object(map: &Map<String, Value>) -> bool {
    match map.get("type") {
        Some(Value::String(kind)) => kind == "object",
        Some(Value::Array(kinds)) => kinds.iter().any(|k| k.as_str() == Some("object")),
        _ => OBJECT_KEYWORDS.iter().any(|keyword| map.contains_key(*keyword)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORDER_SCHEMA: &str = r#"{
        "type": "object",
        "properties": {
            "id": { "type": "integer" },
            "item": { "type": "string" }
        },
        "required": ["id", "item"]
    }"#;

    fn compile(config: DialectConfig, body: &str) -> Arc<dyn CompiledSchema> {
        JsonSchemaDialect::new(config)
            .compile(body)
            .expect("schema should compile")
    }

    #[test]
    fn number_schema_accepts_numbers_only() {
        let schema = compile(DialectConfig::default(), r#"{"type":"number"}"#);
        assert!(schema.validate(b"1").is_valid());
        assert!(schema.validate(b"2.5").is_valid());
        assert!(!schema.validate(b"\"one\"").is_valid());
    }

    #[test]
    fn non_json_payload_is_a_validation_failure() {
        let schema = compile(DialectConfig::default(), r#"{"type":"number"}"#);
        let validation = schema.validate(b"abc");
        assert!(!validation.is_valid());
        assert_eq!(validation.errors().len(), 1);
        assert!(validation.message().starts_with("payload is not valid JSON"));
    }

    #[test]
    fn reports_every_error_up_to_limit() {
        let schema = compile(DialectConfig::default(), ORDER_SCHEMA);
        let validation = schema.validate(br#"{"id":"x","item":7}"#);
        assert_eq!(validation.errors().len(), 2);
        assert!(validation.message().contains(", "));

        let limited = compile(
            DialectConfig {
                max_errors: 1,
                ..DialectConfig::default()
            },
            ORDER_SCHEMA,
        );
        assert_eq!(limited.validate(br#"{"id":"x","item":7}"#).errors().len(), 1);
    }

    #[test]
    fn strict_objects_rejects_undeclared_properties() {
        let payload = br#"{"id":1,"item":"book","extra":true}"#;
        let permissive = compile(DialectConfig::default(), ORDER_SCHEMA);
        let strict = compile(
            DialectConfig {
                strict_objects: true,
                ..DialectConfig::default()
            },
            ORDER_SCHEMA,
        );
        assert!(permissive.validate(payload).is_valid());
        assert!(!strict.validate(payload).is_valid());
    }

    #[test]
    fn strict_objects_reaches_nested_and_untyped_objects() {
        let body = r#"{
            "properties": {
                "nested": {
                    "type": "object",
                    "properties": { "v": { "type": "integer" } }
                }
            }
        }"#;
        let strict = compile(
            DialectConfig {
                strict_objects: true,
                ..DialectConfig::default()
            },
            body,
        );
        assert!(strict.validate(br#"{"nested":{"v":1}}"#).is_valid());
        assert!(!strict.validate(br#"{"nested":{"v":1,"w":2}}"#).is_valid());
        assert!(!strict.validate(br#"{"other":1}"#).is_valid());
    }

    #[test]
    fn close_objects_keeps_explicit_additional_properties() {
        let mut value: Value =
            serde_json::from_str(r#"{"type":"object","additionalProperties":true}"#).unwrap();
        close_objects(&mut value);
        assert_eq!(value["additionalProperties"], Value::Bool(true));
    }

    #[test]
    fn bad_bodies_fail_to_compile() {
        let dialect = JsonSchemaDialect::default();
        assert!(matches!(
            dialect.compile("not json"),
            Err(SchemaError::InvalidJson(_))
        ));
        assert!(matches!(
            dialect.compile(r#"{"type":"definitely-not-a-type"}"#),
            Err(SchemaError::CompileFailed(_))
        ));
    }
}
