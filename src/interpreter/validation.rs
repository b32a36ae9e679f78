use jsonschema::JSONSchema;
use lazy_static::lazy_static;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{error, warn};

use super::envelope::SectionKind;

lazy_static! {
    static ref PAYLOAD_SCHEMA: Value = build_payload_schema();
    static ref COMPILED_PAYLOAD_SCHEMA: Option<JSONSchema> = match JSONSchema::compile(&PAYLOAD_SCHEMA) {
        Ok(compiled) => Some(compiled),
        Err(e) => {
            error!("Structured payload schema failed to compile: {}", e);
            None
        }
    };
}

fn build_payload_schema() -> Value {
    let kinds: Vec<&str> = SectionKind::ALL.iter().map(SectionKind::as_str).collect();
    json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "title": "StructuredContent",
        "type": "object",
        "required": ["sections"],
        "properties": {
            "sections": {
                "type": "array",
                "minItems": 1,
                "items": {
                    "type": "object",
                    "required": ["type"],
                    "properties": {
                        "type": { "enum": kinds },
                        "content": { "type": "string" },
                        "metadata": { "type": "object" }
                    }
                }
            },
            "language": { "enum": ["en", "ar"] }
        }
    })
}

/// JSON Schema every structured payload is checked against
pub fn payload_schema() -> &'static Value {
    &PAYLOAD_SCHEMA
}

/// One advisory finding about a model payload
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationWarning {
    pub path: String,
    pub message: String,
}

/// Advisory validation result. Warnings never block rendering.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationReport {
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationReport {
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }

    fn push(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ValidationWarning {
            path: path.into(),
            message: message.into(),
        });
    }

    pub fn log(&self) {
        for warning in &self.warnings {
            warn!(path = %warning.path, "Structured payload warning: {}", warning.message);
        }
    }
}

/// Check a structured payload against the declared schema and collect every
/// violation instead of stopping at the first one.
pub fn validate_payload(payload: &Value) -> ValidationReport {
    let mut report = ValidationReport::default();

    if let Some(compiled) = COMPILED_PAYLOAD_SCHEMA.as_ref() {
        if let Err(errors) = compiled.validate(payload) {
            for e in errors {
                report.push(e.instance_path.to_string(), e.to_string());
            }
        }
    }

    if payload.get("language").is_none() {
        report.push("/language", "language missing; the caller's fallback language applies");
    }

    report
}

/// Validate an instance against an arbitrary schema, returning the violation
/// messages. A schema that does not compile is reported as a violation.
pub fn check_against_schema(schema: &Value, instance: &Value) -> Result<(), Vec<String>> {
    let compiled = JSONSchema::compile(schema)
        .map_err(|e| vec![format!("schema failed to compile: {}", e)])?;

    let violations: Vec<String> = match compiled.validate(instance) {
        Ok(()) => return Ok(()),
        Err(errors) => errors
            .map(|e| {
                let path = e.instance_path.to_string();
                if path.is_empty() {
                    e.to_string()
                } else {
                    format!("{}: {}", path, e)
                }
            })
            .collect(),
    };
    Err(violations)
}
