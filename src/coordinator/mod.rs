/// Coordinator between the interpreter and the rest of the system
///
/// Structured content is passed through for rendering. Tool calls are looked
/// up in the [`ToolRegistry`], validated against the tool's input schema and
/// either executed or parked as a pending confirmation according to the
/// [`ConfirmationPolicy`]. All state lives in an explicitly passed
/// [`ConversationState`] handle.
pub mod registry;
pub mod state;
pub mod tools;

pub use self::registry::{AssistantTool, ToolInfo, ToolOutput, ToolRegistry};
pub use self::state::{ConversationState, PendingAction, Record, RecordKind};
pub use self::tools::builtin_registry;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{info, warn};

use crate::errors::ToolError;
use crate::interpreter::{Language, ResponseEnvelope, Section};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmationMode {
    /// Ask only for tools that declare `requires_confirmation`
    #[default]
    PerTool,
    Always,
    Never,
}

/// Which tool calls must be confirmed by the user before they run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfirmationPolicy {
    #[serde(default)]
    pub mode: ConfirmationMode,
    /// Tools that always need confirmation, whatever the mode
    #[serde(default)]
    pub always_confirm: Vec<String>,
    /// Tools that never need confirmation, whatever the mode
    #[serde(default)]
    pub never_confirm: Vec<String>,
}

impl ConfirmationPolicy {
    pub fn needs_confirmation(&self, tool: &dyn AssistantTool) -> bool {
        let name = tool.name();
        if self.always_confirm.iter().any(|t| t == name) {
            return true;
        }
        if self.never_confirm.iter().any(|t| t == name) {
            return false;
        }
        match self.mode {
            ConfirmationMode::PerTool => tool.requires_confirmation(),
            ConfirmationMode::Always => true,
            ConfirmationMode::Never => false,
        }
    }
}

/// What the caller should do with one interpreted turn
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CoordinatorOutcome {
    Render {
        sections: Vec<Section>,
        language: Language,
    },
    Executed {
        tool: String,
        output: ToolOutput,
    },
    PendingConfirmation {
        confirmation_id: String,
        tool: String,
        arguments: Map<String, Value>,
        message: String,
        expires_at: DateTime<Utc>,
    },
    Failed {
        tool: String,
        error: String,
    },
}

pub struct Coordinator {
    registry: Arc<ToolRegistry>,
    policy: ConfirmationPolicy,
    state: ConversationState,
}

impl Coordinator {
    pub fn new(registry: Arc<ToolRegistry>, policy: ConfirmationPolicy, state: ConversationState) -> Self {
        Self {
            registry,
            policy,
            state,
        }
    }

    pub fn state(&self) -> &ConversationState {
        &self.state
    }

    pub fn tools(&self) -> Vec<ToolInfo> {
        self.registry.list()
    }

    /// Route an envelope to the renderer or to tool execution
    pub async fn dispatch(&self, envelope: ResponseEnvelope, language: Language) -> CoordinatorOutcome {
        match envelope {
            ResponseEnvelope::Structured { sections, language } => {
                CoordinatorOutcome::Render { sections, language }
            }
            ResponseEnvelope::ToolCall { name, arguments } => {
                self.dispatch_tool(name, arguments, language).await
            }
        }
    }

    async fn dispatch_tool(
        &self,
        name: String,
        arguments: Map<String, Value>,
        language: Language,
    ) -> CoordinatorOutcome {
        let Some(tool) = self.registry.get(&name) else {
            warn!("Model requested unknown tool: {}", name);
            return failed(&name, ToolError::NotFound(name.clone()));
        };

        if let Err(e) = tool.validate_args(&arguments) {
            warn!("Rejected arguments for {}: {}", name, e);
            return failed(&name, e);
        }

        if self.policy.needs_confirmation(tool.as_ref()) {
            let action = self.state.add_pending(&name, arguments);
            info!("Tool {} is waiting for confirmation {}", name, action.id);
            return CoordinatorOutcome::PendingConfirmation {
                message: confirmation_message(&name, language),
                confirmation_id: action.id,
                tool: action.tool,
                arguments: action.arguments,
                expires_at: action.expires_at,
            };
        }

        self.execute(tool.as_ref(), &arguments).await
    }

    /// Run a pending action. Each confirmation id can be used once.
    pub async fn confirm(&self, confirmation_id: &str) -> Result<CoordinatorOutcome, ToolError> {
        let action = self
            .state
            .take_pending(confirmation_id)
            .ok_or_else(|| ToolError::ConfirmationNotFound(confirmation_id.to_string()))?;

        let Some(tool) = self.registry.get(&action.tool) else {
            return Ok(failed(&action.tool, ToolError::NotFound(action.tool.clone())));
        };

        Ok(self.execute(tool.as_ref(), &action.arguments).await)
    }

    pub fn cancel(&self, confirmation_id: &str) -> Result<(), ToolError> {
        if self.state.cancel_pending(confirmation_id) {
            info!("Cancelled pending action {}", confirmation_id);
            Ok(())
        } else {
            Err(ToolError::ConfirmationNotFound(confirmation_id.to_string()))
        }
    }

    async fn execute(&self, tool: &dyn AssistantTool, arguments: &Map<String, Value>) -> CoordinatorOutcome {
        info!("Executing tool: {}", tool.name());
        match tool.execute(arguments, &self.state).await {
            Ok(output) => CoordinatorOutcome::Executed {
                tool: tool.name().to_string(),
                output,
            },
            Err(e) => {
                warn!("Tool {} failed: {}", tool.name(), e);
                failed(tool.name(), e)
            }
        }
    }
}

fn failed(tool: &str, error: ToolError) -> CoordinatorOutcome {
    CoordinatorOutcome::Failed {
        tool: tool.to_string(),
        error: error.to_string(),
    }
}

fn confirmation_message(tool: &str, language: Language) -> String {
    match language {
        Language::En => format!("The assistant wants to run '{}'. Confirm to continue.", tool),
        Language::Ar => format!("يرغب المساعد في تنفيذ '{}'. يرجى التأكيد للمتابعة.", tool),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::interpret;

    fn coordinator(policy: ConfirmationPolicy) -> Coordinator {
        Coordinator::new(Arc::new(builtin_registry()), policy, ConversationState::default())
    }

    #[tokio::test]
    async fn test_structured_content_is_rendered() {
        let coordinator = coordinator(ConfirmationPolicy::default());
        let envelope = interpret("hello there", "ar");

        let outcome = coordinator.dispatch(envelope, Language::Ar).await;
        assert_eq!(
            outcome,
            CoordinatorOutcome::Render {
                sections: vec![Section::paragraph("hello there")],
                language: Language::Ar,
            }
        );
    }

    #[tokio::test]
    async fn test_safe_tool_runs_immediately() {
        let coordinator = coordinator(ConfirmationPolicy::default());
        let envelope = interpret(r#"{"tool":"navigate","args":{"path":"/ideas"}}"#, "en");

        match coordinator.dispatch(envelope, Language::En).await {
            CoordinatorOutcome::Executed { tool, output } => {
                assert_eq!(tool, "navigate");
                assert_eq!(output.message, "Navigating to /ideas");
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_create_tool_waits_for_confirmation_then_runs_once() {
        let coordinator = coordinator(ConfirmationPolicy::default());
        let envelope = interpret(
            "```json\n{\"tool\":\"create_pilot\",\"args\":{\"title\":\"X\"}}\n```",
            "ar",
        );

        let CoordinatorOutcome::PendingConfirmation { confirmation_id, message, tool, .. } =
            coordinator.dispatch(envelope, Language::Ar).await
        else {
            panic!("expected a pending confirmation");
        };
        assert_eq!(tool, "create_pilot");
        assert!(message.contains("create_pilot"));
        assert!(coordinator.state().records(None).is_empty());

        let outcome = coordinator.confirm(&confirmation_id).await.unwrap();
        assert!(matches!(outcome, CoordinatorOutcome::Executed { .. }));
        assert_eq!(coordinator.state().records(Some(RecordKind::Pilot)).len(), 1);

        assert_eq!(
            coordinator.confirm(&confirmation_id).await,
            Err(ToolError::ConfirmationNotFound(confirmation_id.clone()))
        );
    }

    #[tokio::test]
    async fn test_cancelled_action_never_runs() {
        let coordinator = coordinator(ConfirmationPolicy::default());
        let envelope = interpret(r#"{"tool":"create_idea","args":{"title":"Y"}}"#, "en");

        let CoordinatorOutcome::PendingConfirmation { confirmation_id, .. } =
            coordinator.dispatch(envelope, Language::En).await
        else {
            panic!("expected a pending confirmation");
        };

        assert!(coordinator.cancel(&confirmation_id).is_ok());
        assert!(coordinator.cancel(&confirmation_id).is_err());
        assert!(coordinator.confirm(&confirmation_id).await.is_err());
        assert!(coordinator.state().records(None).is_empty());
    }

    #[tokio::test]
    async fn test_unknown_tool_and_bad_args_fail_softly() {
        let coordinator = coordinator(ConfirmationPolicy::default());

        let unknown = coordinator
            .dispatch(interpret(r#"{"tool":"launch_rocket","args":{}}"#, "en"), Language::En)
            .await;
        assert_eq!(
            unknown,
            CoordinatorOutcome::Failed {
                tool: "launch_rocket".to_string(),
                error: "Tool not found: launch_rocket".to_string(),
            }
        );

        let bad_args = coordinator
            .dispatch(interpret(r#"{"tool":"create_idea","args":{}}"#, "en"), Language::En)
            .await;
        assert!(matches!(bad_args, CoordinatorOutcome::Failed { ref tool, .. } if tool == "create_idea"));
        assert_eq!(coordinator.state().pending_count(), 0);
    }

    #[tokio::test]
    async fn test_policy_overrides() {
        let never = coordinator(ConfirmationPolicy {
            mode: ConfirmationMode::Never,
            ..ConfirmationPolicy::default()
        });
        let outcome = never
            .dispatch(interpret(r#"{"tool":"create_idea","args":{"title":"Z"}}"#, "en"), Language::En)
            .await;
        assert!(matches!(outcome, CoordinatorOutcome::Executed { .. }));

        let strict = coordinator(ConfirmationPolicy {
            mode: ConfirmationMode::Never,
            always_confirm: vec!["navigate".to_string()],
            never_confirm: vec![],
        });
        let outcome = strict
            .dispatch(interpret(r#"{"tool":"navigate","args":{"path":"/"}}"#, "en"), Language::En)
            .await;
        assert!(matches!(outcome, CoordinatorOutcome::PendingConfirmation { .. }));

        let relaxed = ConfirmationPolicy {
            mode: ConfirmationMode::Always,
            always_confirm: vec![],
            never_confirm: vec!["list_records".to_string()],
        };
        assert!(!relaxed.needs_confirmation(&tools::ListRecordsTool));
        assert!(relaxed.needs_confirmation(&tools::NavigateTool));
    }

    #[test]
    fn test_outcome_serialization_is_tagged() {
        let outcome = CoordinatorOutcome::Failed {
            tool: "x".to_string(),
            error: "boom".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&outcome).unwrap(),
            serde_json::json!({ "status": "failed", "tool": "x", "error": "boom" })
        );
    }
}
