use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;
use tracing::debug;

/// An independent way of pulling a JSON value out of model output
pub type Strategy = fn(&str) -> Option<Value>;

lazy_static! {
    static ref FENCED_BLOCK: Regex =
        Regex::new(r"(?s)```(?i:json)?\s*(.*?)\s*```").expect("fenced block pattern");
}

/// Strategies used to find an interpretable payload, in priority order
pub const PAYLOAD_STRATEGIES: [(&str, Strategy); 3] = [
    ("fenced_block", from_fenced_block),
    ("whole_text", from_whole_text),
    ("embedded_object", from_embedded_object),
];

/// Strategies used for content generation, where any JSON object is accepted
pub const OBJECT_STRATEGIES: [(&str, Strategy); 3] = [
    ("fenced_block", from_fenced_block),
    ("whole_text", from_whole_text),
    ("first_object", from_first_object),
];

/// Run strategies in order and return the first value produced, with the
/// name of the strategy that produced it.
pub fn first_success(text: &str, strategies: &[(&'static str, Strategy)]) -> Option<(&'static str, Value)> {
    strategies.iter().find_map(|(name, strategy)| {
        let value = strategy(text);
        if value.is_none() {
            debug!("Extraction strategy {} found nothing", name);
        }
        value.map(|value| (*name, value))
    })
}

/// Extract a value the interpreter can classify
pub fn extract_payload(text: &str) -> Option<(&'static str, Value)> {
    first_success(text, &PAYLOAD_STRATEGIES)
}

/// Extract the first JSON object from free-form model output
pub fn extract_object(text: &str) -> Option<Value> {
    first_success(text, &OBJECT_STRATEGIES)
        .map(|(_, value)| value)
        .filter(Value::is_object)
}

/// Inner content of the first fenced block that parses as JSON
pub fn from_fenced_block(text: &str) -> Option<Value> {
    FENCED_BLOCK
        .captures_iter(text)
        .filter_map(|captures| captures.get(1))
        .find_map(|inner| parse(inner.as_str()))
}

/// The whole text, when it is nothing but one JSON object
pub fn from_whole_text(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if trimmed.starts_with('{') && trimmed.ends_with('}') {
        parse(trimmed)
    } else {
        None
    }
}

/// An object embedded in surrounding prose. Every `{` is tried as the start
/// of a JSON value; the first object with a `sections` array wins, then the
/// first object with a `tool` name. Key order inside the object is irrelevant.
pub fn from_embedded_object(text: &str) -> Option<Value> {
    embedded_objects(text)
        .find(|value| value.get("sections").is_some_and(Value::is_array))
        .or_else(|| embedded_objects(text).find(|value| value.get("tool").is_some_and(Value::is_string)))
}

/// The first JSON object that parses anywhere in the text
pub fn from_first_object(text: &str) -> Option<Value> {
    embedded_objects(text).next()
}

/// Objects starting at each `{`, in order of position. Text after the
/// object is ignored.
fn embedded_objects(text: &str) -> impl Iterator<Item = Value> + '_ {
    text.match_indices('{').filter_map(move |(offset, _)| {
        serde_json::Deserializer::from_str(&text[offset..])
            .into_iter::<Value>()
            .next()
            .and_then(Result::ok)
            .filter(Value::is_object)
    })
}

fn parse(candidate: &str) -> Option<Value> {
    match serde_json::from_str(candidate) {
        Ok(value) => Some(value),
        Err(e) => {
            debug!("Candidate is not valid JSON ({}): {:.80}", e, candidate);
            None
        }
    }
}
