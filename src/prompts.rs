use lazy_static::lazy_static;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;

use crate::coordinator::ToolInfo;
use crate::errors::{AssistantError, AssistantResult};
use crate::interpreter::{payload_schema, Language};

pub const ASSISTANT_CHAT_TEMPLATE: &str = "assistant_chat";
pub const IDEA_ENHANCEMENT_TEMPLATE: &str = "idea_enhancement";
pub const CHALLENGE_BRIEF_TEMPLATE: &str = "challenge_brief";
pub const PILOT_SUMMARY_TEMPLATE: &str = "pilot_summary";

// Default prompts for the assistant
pub const DEFAULT_CHAT_SYSTEM_PROMPT_EN: &str = "You are the innovation assistant of a municipality. You help employees and citizens submit ideas, describe challenges, plan pilots and track solutions. Be concise and practical.";
pub const DEFAULT_CHAT_SYSTEM_PROMPT_AR: &str = "أنت المساعد الذكي لإدارة الابتكار في البلدية. تساعد الموظفين والمواطنين على تقديم الأفكار ووصف التحديات وتخطيط التجارب ومتابعة الحلول. كن موجزاً وعملياً، وأجب باللغة العربية.";
pub const DEFAULT_CHAT_USER_PROMPT: &str = "{{message}}";

pub const DEFAULT_IDEA_SYSTEM_PROMPT_EN: &str = "You are an innovation analyst who refines citizen ideas into clear, actionable proposals for municipal teams.";
pub const DEFAULT_IDEA_SYSTEM_PROMPT_AR: &str = "أنت محلل ابتكار تقوم بتحسين أفكار المواطنين وتحويلها إلى مقترحات واضحة وقابلة للتنفيذ لفرق البلدية. أجب باللغة العربية.";
pub const DEFAULT_IDEA_USER_PROMPT: &str = "Refine the following idea. Keep the submitter's intent, make it specific, and list its expected benefits.\n\nTitle: {{title}}\nDescription: {{description}}";

pub const DEFAULT_CHALLENGE_SYSTEM_PROMPT_EN: &str = "You are a strategy advisor who turns municipal problems into well-scoped innovation challenges.";
pub const DEFAULT_CHALLENGE_SYSTEM_PROMPT_AR: &str = "أنت مستشار استراتيجي يحوّل مشكلات البلدية إلى تحديات ابتكارية محددة النطاق. أجب باللغة العربية.";
pub const DEFAULT_CHALLENGE_USER_PROMPT: &str = "Write a challenge brief for the {{department}} department about the following topic. State the problem, the objectives and how success will be measured.\n\nTopic: {{topic}}";

pub const DEFAULT_PILOT_SYSTEM_PROMPT_EN: &str = "You are a program manager who summarizes pilot projects for municipal leadership.";
pub const DEFAULT_PILOT_SYSTEM_PROMPT_AR: &str = "أنت مدير برامج تلخص المشاريع التجريبية لقيادة البلدية. أجب باللغة العربية.";
pub const DEFAULT_PILOT_USER_PROMPT: &str = "Summarize the pilot below, classify its status, and list its risks and next steps.\n\nPilot: {{pilot_name}}\nNotes: {{notes}}";

lazy_static! {
    static ref PLACEHOLDER: Regex = Regex::new(r"\{\{\s*([A-Za-z0-9_]+)\s*\}\}").expect("placeholder pattern");
}

/// A prompt template with per-language system prompts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptTemplate {
    pub id: String,
    pub system_en: String,
    pub system_ar: String,
    pub user: String,
    /// Schema the model's JSON answer must satisfy, for content-generation templates
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<Value>,
}

/// User overrides for a template, loaded from configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PromptOverride {
    pub system_en: Option<String>,
    pub system_ar: Option<String>,
    pub user: Option<String>,
}

/// A prompt ready to be sent to the gateway
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedPrompt {
    pub template_id: String,
    pub system: String,
    pub user: String,
    pub language: Language,
}

impl RenderedPrompt {
    pub fn append_system(mut self, appendix: &str) -> Self {
        if !appendix.is_empty() {
            self.system.push_str("\n\n");
            self.system.push_str(appendix);
        }
        self
    }
}

impl PromptTemplate {
    /// Substitute `{{name}}` placeholders. Every placeholder must have a value.
    pub fn render(&self, vars: &HashMap<String, String>, language: Language) -> AssistantResult<RenderedPrompt> {
        if let Some(missing) = PLACEHOLDER
            .captures_iter(&self.user)
            .map(|captures| captures[1].to_string())
            .find(|name| !vars.contains_key(name))
        {
            return Err(AssistantError::TemplateVariableMissing {
                template: self.id.clone(),
                variable: missing,
            });
        }

        let user = PLACEHOLDER
            .replace_all(&self.user, |captures: &Captures| {
                vars.get(&captures[1]).cloned().unwrap_or_default()
            })
            .into_owned();

        let mut system = match language {
            Language::En => self.system_en.clone(),
            Language::Ar => self.system_ar.clone(),
        };
        if let Some(schema) = &self.output_schema {
            system.push_str("\n\n");
            system.push_str(&output_instructions(schema, language));
        }

        Ok(RenderedPrompt {
            template_id: self.id.clone(),
            system,
            user,
            language,
        })
    }
}

/// The set of prompt templates available to the assistant
#[derive(Debug, Clone)]
pub struct PromptCatalog {
    templates: HashMap<String, PromptTemplate>,
}

impl Default for PromptCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl PromptCatalog {
    pub fn builtin() -> Self {
        let templates = vec![
            PromptTemplate {
                id: ASSISTANT_CHAT_TEMPLATE.to_string(),
                system_en: DEFAULT_CHAT_SYSTEM_PROMPT_EN.to_string(),
                system_ar: DEFAULT_CHAT_SYSTEM_PROMPT_AR.to_string(),
                user: DEFAULT_CHAT_USER_PROMPT.to_string(),
                output_schema: None,
            },
            PromptTemplate {
                id: IDEA_ENHANCEMENT_TEMPLATE.to_string(),
                system_en: DEFAULT_IDEA_SYSTEM_PROMPT_EN.to_string(),
                system_ar: DEFAULT_IDEA_SYSTEM_PROMPT_AR.to_string(),
                user: DEFAULT_IDEA_USER_PROMPT.to_string(),
                output_schema: Some(json!({
                    "type": "object",
                    "required": ["title", "description", "benefits"],
                    "properties": {
                        "title": { "type": "string", "minLength": 1 },
                        "description": { "type": "string", "minLength": 1 },
                        "benefits": { "type": "array", "items": { "type": "string" } },
                        "category": { "type": "string" }
                    }
                })),
            },
            PromptTemplate {
                id: CHALLENGE_BRIEF_TEMPLATE.to_string(),
                system_en: DEFAULT_CHALLENGE_SYSTEM_PROMPT_EN.to_string(),
                system_ar: DEFAULT_CHALLENGE_SYSTEM_PROMPT_AR.to_string(),
                user: DEFAULT_CHALLENGE_USER_PROMPT.to_string(),
                output_schema: Some(json!({
                    "type": "object",
                    "required": ["title", "problem_statement", "objectives", "success_metrics"],
                    "properties": {
                        "title": { "type": "string", "minLength": 1 },
                        "problem_statement": { "type": "string", "minLength": 1 },
                        "objectives": { "type": "array", "minItems": 1, "items": { "type": "string" } },
                        "success_metrics": { "type": "array", "items": { "type": "string" } }
                    }
                })),
            },
            PromptTemplate {
                id: PILOT_SUMMARY_TEMPLATE.to_string(),
                system_en: DEFAULT_PILOT_SYSTEM_PROMPT_EN.to_string(),
                system_ar: DEFAULT_PILOT_SYSTEM_PROMPT_AR.to_string(),
                user: DEFAULT_PILOT_USER_PROMPT.to_string(),
                output_schema: Some(json!({
                    "type": "object",
                    "required": ["summary", "status", "risks", "next_steps"],
                    "properties": {
                        "summary": { "type": "string", "minLength": 1 },
                        "status": { "enum": ["planned", "running", "completed", "on_hold"] },
                        "risks": { "type": "array", "items": { "type": "string" } },
                        "next_steps": { "type": "array", "items": { "type": "string" } }
                    }
                })),
            },
        ];

        Self {
            templates: templates
                .into_iter()
                .map(|template| (template.id.clone(), template))
                .collect(),
        }
    }

    /// Apply configured overrides on top of the current templates. Overrides
    /// for unknown template ids are ignored.
    pub fn with_overrides(mut self, overrides: &HashMap<String, PromptOverride>) -> Self {
        for (id, prompt_override) in overrides {
            let Some(template) = self.templates.get_mut(id) else {
                tracing::warn!("Ignoring prompt override for unknown template: {}", id);
                continue;
            };
            if let Some(system_en) = &prompt_override.system_en {
                template.system_en = system_en.clone();
            }
            if let Some(system_ar) = &prompt_override.system_ar {
                template.system_ar = system_ar.clone();
            }
            if let Some(user) = &prompt_override.user {
                template.user = user.clone();
            }
        }
        self
    }

    pub fn get(&self, id: &str) -> AssistantResult<&PromptTemplate> {
        self.templates
            .get(id)
            .ok_or_else(|| AssistantError::UnknownTemplate(id.to_string()))
    }

    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.templates.keys().cloned().collect();
        ids.sort();
        ids
    }
}

fn output_instructions(schema: &Value, language: Language) -> String {
    let schema_text = serde_json::to_string_pretty(schema).unwrap_or_else(|_| schema.to_string());
    match language {
        Language::En => format!(
            "Respond with a single JSON object inside a ```json fenced block. It must satisfy this JSON Schema:\n{}",
            schema_text
        ),
        Language::Ar => format!(
            "أجب بكائن JSON واحد داخل كتلة ```json. يجب أن يطابق مخطط JSON التالي (أبقِ أسماء الحقول بالإنجليزية):\n{}",
            schema_text
        ),
    }
}

/// Instructions telling the model how to answer in the chat: either a tool
/// call or a structured sections payload.
pub fn chat_response_instructions(tools: &[ToolInfo], language: Language) -> String {
    let schema_text =
        serde_json::to_string_pretty(payload_schema()).unwrap_or_else(|_| payload_schema().to_string());

    let tool_lines: Vec<String> = tools
        .iter()
        .map(|tool| format!("- {}: {} args schema: {}", tool.name, tool.description, tool.input_schema))
        .collect();

    let (format_rules, tools_heading, no_tools) = match language {
        Language::En => (
            "Always answer with exactly one JSON object inside a ```json fenced block.\nTo perform an action answer {\"tool\": \"<name>\", \"args\": {...}}.\nOtherwise answer {\"sections\": [...], \"language\": \"en\"} matching this JSON Schema:",
            "Available tools:",
            "No tools are available; always answer with sections.",
        ),
        Language::Ar => (
            "أجب دائماً بكائن JSON واحد داخل كتلة ```json.\nلتنفيذ إجراء أجب بالشكل {\"tool\": \"<name>\", \"args\": {...}}.\nوإلا فأجب بالشكل {\"sections\": [...], \"language\": \"ar\"} المطابق لمخطط JSON التالي:",
            "الأدوات المتاحة:",
            "لا توجد أدوات متاحة؛ أجب دائماً بالأقسام.",
        ),
    };

    let tools_text = if tool_lines.is_empty() {
        no_tools.to_string()
    } else {
        format!("{}\n{}", tools_heading, tool_lines.join("\n"))
    };

    format!("{}\n{}\n\n{}", format_rules, schema_text, tools_text)
}
