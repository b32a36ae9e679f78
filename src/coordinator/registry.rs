use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use super::state::ConversationState;
use crate::errors::ToolError;
use crate::interpreter::validation::check_against_schema;

/// Core trait that all assistant tools implement
#[async_trait]
pub trait AssistantTool: Send + Sync {
    /// Unique name the model uses in `{"tool": "<name>"}`
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON schema for the `args` object
    fn input_schema(&self) -> Value;

    /// Whether the default policy holds this tool for user confirmation
    fn requires_confirmation(&self) -> bool {
        false
    }

    async fn execute(
        &self,
        args: &Map<String, Value>,
        state: &ConversationState,
    ) -> Result<ToolOutput, ToolError>;

    /// Validate arguments against the input schema
    fn validate_args(&self, args: &Map<String, Value>) -> Result<(), ToolError> {
        check_against_schema(&self.input_schema(), &Value::Object(args.clone())).map_err(
            |violations| ToolError::InvalidParams {
                tool: self.name().to_string(),
                violations,
            },
        )
    }
}

/// Result of a successful tool execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolOutput {
    pub message: String,
    #[serde(default)]
    pub data: Value,
}

impl ToolOutput {
    pub fn new(message: impl Into<String>, data: Value) -> Self {
        Self {
            message: message.into(),
            data,
        }
    }
}

/// Tool information for discovery and for the chat prompt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
    pub requires_confirmation: bool,
}

/// Registry of the tools a conversation may call
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn AssistantTool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new tool. Names must be unique.
    pub fn register(&mut self, tool: Arc<dyn AssistantTool>) -> Result<(), ToolError> {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            return Err(ToolError::AlreadyRegistered(name));
        }

        info!("Registering tool: {}", name);
        self.tools.insert(name, tool);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn AssistantTool>> {
        let tool = self.tools.get(name).cloned();
        if tool.is_none() {
            debug!("Tool lookup missed: {}", name);
        }
        tool
    }

    /// Registered tools sorted by name
    pub fn list(&self) -> Vec<ToolInfo> {
        let mut infos: Vec<ToolInfo> = self
            .tools
            .values()
            .map(|tool| ToolInfo {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                input_schema: tool.input_schema(),
                requires_confirmation: tool.requires_confirmation(),
            })
            .collect();
        infos.sort_by(|a, b| a.name.cmp(&b.name));
        infos
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
