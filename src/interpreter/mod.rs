/// Response interpretation for model output
///
/// Turns the raw text of one model turn into a [`ResponseEnvelope`]: either a
/// tool call to hand to the coordinator or a list of typed sections to render.
/// Interpretation is a pure, total function. Malformed or missing JSON always
/// degrades to a single paragraph holding the original text.
pub mod envelope;
pub mod extract;
pub mod validation;

pub use self::envelope::{Language, ResponseEnvelope, Section, SectionKind};
pub use self::validation::{payload_schema, validate_payload, ValidationReport, ValidationWarning};

use serde_json::{Map, Value};
use tracing::{debug, warn};

/// Interpret raw model output. `fallback_language` is a locale tag used when
/// the payload does not name its own language.
pub fn interpret(text: &str, fallback_language: &str) -> ResponseEnvelope {
    let language = Language::from_tag(fallback_language);

    match extract::extract_payload(text) {
        Some((strategy, parsed)) => {
            debug!("Model output recognized by {} extraction", strategy);
            categorize(parsed, language, text)
        }
        None => {
            if !text.trim().is_empty() {
                debug!("No structured payload found; rendering model output as plain text");
            }
            ResponseEnvelope::fallback(text, language)
        }
    }
}

/// Same as [`interpret`], treating absent output as empty text
pub fn interpret_optional(text: Option<&str>, fallback_language: &str) -> ResponseEnvelope {
    interpret(text.unwrap_or_default(), fallback_language)
}

/// Classify a parsed value. A `tool` string wins over a `sections` array when
/// both are present.
pub fn categorize(parsed: Value, language: Language, raw_text: &str) -> ResponseEnvelope {
    if let Some(name) = parsed.get("tool").and_then(Value::as_str) {
        return ResponseEnvelope::ToolCall {
            name: name.to_string(),
            arguments: tool_arguments(name, parsed.get("args")),
        };
    }

    if let Some(entries) = parsed.get("sections").and_then(Value::as_array) {
        let report = validate_payload(&parsed);
        if report.is_clean() {
            debug!("Structured payload passed validation");
        } else {
            report.log();
        }

        if entries.is_empty() {
            warn!("Model returned an empty sections array; rendering raw output");
            return ResponseEnvelope::fallback(raw_text, language);
        }

        let language = parsed
            .get("language")
            .and_then(Value::as_str)
            .and_then(Language::from_payload)
            .unwrap_or(language);

        return ResponseEnvelope::Structured {
            sections: entries.iter().map(Section::from_json).collect(),
            language,
        };
    }

    debug!("Parsed JSON has neither tool nor sections; wrapping it as a paragraph");
    let content = match parsed {
        Value::String(text) => text,
        other => other.to_string(),
    };
    ResponseEnvelope::fallback(content, language)
}

fn tool_arguments(tool: &str, args: Option<&Value>) -> Map<String, Value> {
    match args {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(arguments)) => arguments.clone(),
        Some(other) => {
            warn!("Tool {} received non-object args; keeping them under 'value'", tool);
            let mut arguments = Map::new();
            arguments.insert("value".to_string(), other.clone());
            arguments
        }
    }
}
