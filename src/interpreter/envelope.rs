use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;

/// Display language of a structured response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Ar,
}

impl Language {
    /// Resolve a caller-supplied locale tag. Anything that is not Arabic
    /// (`ar`, `ar-SA`, `AR`, ...) falls back to English.
    pub fn from_tag(tag: &str) -> Self {
        let tag = tag.trim().to_ascii_lowercase();
        if tag == "ar" || tag.starts_with("ar-") || tag.starts_with("ar_") {
            Language::Ar
        } else {
            Language::En
        }
    }

    /// Strict parse used for the `language` field of a model payload.
    /// Only the exact codes `en` and `ar` are accepted.
    pub fn from_payload(value: &str) -> Option<Self> {
        match value {
            "en" => Some(Language::En),
            "ar" => Some(Language::Ar),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Ar => "ar",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The closed set of renderable section kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionKind {
    Header,
    Paragraph,
    BulletList,
    NumberedList,
    Table,
    Stats,
    Card,
    InfoBox,
    Highlight,
    ActionButtons,
    Code,
    Divider,
}

impl SectionKind {
    pub const ALL: [SectionKind; 12] = [
        SectionKind::Header,
        SectionKind::Paragraph,
        SectionKind::BulletList,
        SectionKind::NumberedList,
        SectionKind::Table,
        SectionKind::Stats,
        SectionKind::Card,
        SectionKind::InfoBox,
        SectionKind::Highlight,
        SectionKind::ActionButtons,
        SectionKind::Code,
        SectionKind::Divider,
    ];

    pub fn from_type(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == value)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SectionKind::Header => "header",
            SectionKind::Paragraph => "paragraph",
            SectionKind::BulletList => "bullet_list",
            SectionKind::NumberedList => "numbered_list",
            SectionKind::Table => "table",
            SectionKind::Stats => "stats",
            SectionKind::Card => "card",
            SectionKind::InfoBox => "info_box",
            SectionKind::Highlight => "highlight",
            SectionKind::ActionButtons => "action_buttons",
            SectionKind::Code => "code",
            SectionKind::Divider => "divider",
        }
    }
}

/// One typed block of a structured response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    #[serde(rename = "type")]
    pub kind: SectionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Kind-specific attributes such as `items`, `columns`/`rows` or `actions`
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

impl Section {
    pub fn new(kind: SectionKind, content: impl Into<String>) -> Self {
        Self {
            kind,
            content: Some(content.into()),
            metadata: Map::new(),
        }
    }

    pub fn paragraph(content: impl Into<String>) -> Self {
        Self::new(SectionKind::Paragraph, content)
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Build a section from one entry of a model's `sections` array.
    ///
    /// Keys written beside `type` (an `items` array, `columns`, ...) are
    /// folded into `metadata`, with explicit `metadata` keys taking priority.
    /// Entries with an unrecognized type are coerced to a paragraph holding
    /// the serialized entry so nothing the model produced is lost.
    pub fn from_json(entry: &Value) -> Self {
        let Value::Object(fields) = entry else {
            return Self::coerce(entry, None);
        };

        let declared = fields.get("type").and_then(Value::as_str);
        let Some(kind) = declared.and_then(SectionKind::from_type) else {
            return Self::coerce(entry, declared);
        };

        let mut metadata = Map::new();
        for (key, value) in fields {
            if !matches!(key.as_str(), "type" | "content" | "metadata") {
                metadata.insert(key.clone(), value.clone());
            }
        }
        if let Some(Value::Object(explicit)) = fields.get("metadata") {
            for (key, value) in explicit {
                metadata.insert(key.clone(), value.clone());
            }
        }

        Self {
            kind,
            content: fields.get("content").and_then(content_text),
            metadata,
        }
    }

    fn coerce(entry: &Value, declared: Option<&str>) -> Self {
        let section = Self::paragraph(entry.to_string());
        match declared {
            Some(original) => section.with_metadata("original_type", json!(original)),
            None => section,
        }
    }
}

fn content_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}

/// Normalized result of interpreting one model turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResponseEnvelope {
    ToolCall {
        name: String,
        arguments: Map<String, Value>,
    },
    Structured {
        sections: Vec<Section>,
        language: Language,
    },
}

impl ResponseEnvelope {
    /// Single-paragraph envelope carrying `text` verbatim
    pub fn fallback(text: impl Into<String>, language: Language) -> Self {
        ResponseEnvelope::Structured {
            sections: vec![Section::paragraph(text)],
            language,
        }
    }

    pub fn is_tool_call(&self) -> bool {
        matches!(self, ResponseEnvelope::ToolCall { .. })
    }

    pub fn sections(&self) -> &[Section] {
        match self {
            ResponseEnvelope::Structured { sections, .. } => sections,
            ResponseEnvelope::ToolCall { .. } => &[],
        }
    }

    /// The JSON shape a model would emit to produce this envelope
    pub fn to_payload(&self) -> Value {
        match self {
            ResponseEnvelope::ToolCall { name, arguments } => json!({
                "tool": name,
                "args": arguments,
            }),
            ResponseEnvelope::Structured { sections, language } => json!({
                "sections": sections,
                "language": language,
            }),
        }
    }
}
