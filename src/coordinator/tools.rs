use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::info;

use super::registry::{AssistantTool, ToolOutput, ToolRegistry};
use super::state::{ConversationState, Record, RecordKind};
use crate::errors::{ErrorContext, ToolError};

/// Creates an idea, challenge, pilot or solution record
pub struct CreateRecordTool {
    kind: RecordKind,
    name: String,
    description: String,
}

impl CreateRecordTool {
    pub fn new(kind: RecordKind) -> Self {
        Self {
            kind,
            name: format!("create_{}", kind),
            description: format!(
                "Create a new {} with a title, an optional description and any extra attributes",
                kind
            ),
        }
    }
}

#[async_trait]
impl AssistantTool for CreateRecordTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "title": { "type": "string", "minLength": 1 },
                "description": { "type": "string" }
            },
            "required": ["title"]
        })
    }

    fn requires_confirmation(&self) -> bool {
        true
    }

    async fn execute(
        &self,
        args: &Map<String, Value>,
        state: &ConversationState,
    ) -> Result<ToolOutput, ToolError> {
        let title = args
            .get("title")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|title| !title.is_empty())
            .ok_or_else(|| ToolError::ExecutionFailed("title must be a non-empty string".to_string()))?;

        let mut record = Record::new(self.kind, title);
        record.description = args
            .get("description")
            .and_then(Value::as_str)
            .map(str::to_string);
        record.attributes = args
            .iter()
            .filter(|(key, _)| !matches!(key.as_str(), "title" | "description"))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        let data = serde_json::to_value(&record).with_context("serializing record")?;
        state.insert_record(record);

        info!("Created {} '{}'", self.kind, title);
        Ok(ToolOutput::new(format!("Created {} '{}'", self.kind, title), data))
    }
}

/// Lists the records created so far
pub struct ListRecordsTool;

#[async_trait]
impl AssistantTool for ListRecordsTool {
    fn name(&self) -> &str {
        "list_records"
    }

    fn description(&self) -> &str {
        "List ideas, challenges, pilots and solutions, optionally filtered by kind"
    }

    fn input_schema(&self) -> Value {
        let kinds: Vec<&str> = RecordKind::ALL.iter().map(RecordKind::as_str).collect();
        json!({
            "type": "object",
            "properties": {
                "kind": { "enum": kinds }
            }
        })
    }

    async fn execute(
        &self,
        args: &Map<String, Value>,
        state: &ConversationState,
    ) -> Result<ToolOutput, ToolError> {
        let kind = match args.get("kind").and_then(Value::as_str) {
            Some(name) => Some(
                RecordKind::from_name(name)
                    .ok_or_else(|| ToolError::ExecutionFailed(format!("unknown record kind: {}", name)))?,
            ),
            None => None,
        };

        let records = state.records(kind);
        let data = serde_json::to_value(&records).with_context("serializing records")?;
        Ok(ToolOutput::new(format!("Found {} records", records.len()), data))
    }
}

/// Asks the client to open a page; has no server-side effect
pub struct NavigateTool;

#[async_trait]
impl AssistantTool for NavigateTool {
    fn name(&self) -> &str {
        "navigate"
    }

    fn description(&self) -> &str {
        "Open a page of the innovation portal, e.g. /ideas or /pilots/new"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "pattern": "^/" }
            },
            "required": ["path"]
        })
    }

    async fn execute(
        &self,
        args: &Map<String, Value>,
        _state: &ConversationState,
    ) -> Result<ToolOutput, ToolError> {
        let path = args
            .get("path")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::ExecutionFailed("path must be a string".to_string()))?;
        Ok(ToolOutput::new(format!("Navigating to {}", path), json!({ "route": path })))
    }
}

/// Registry preloaded with the built-in tools
pub fn builtin_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    let tools: Vec<Arc<dyn AssistantTool>> = RecordKind::ALL
        .into_iter()
        .map(|kind| Arc::new(CreateRecordTool::new(kind)) as Arc<dyn AssistantTool>)
        .chain([
            Arc::new(ListRecordsTool) as Arc<dyn AssistantTool>,
            Arc::new(NavigateTool) as Arc<dyn AssistantTool>,
        ])
        .collect();

    for tool in tools {
        if let Err(e) = registry.register(tool) {
            tracing::warn!("Skipping built-in tool: {}", e);
        }
    }
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("test args must be an object"),
        }
    }

    #[test]
    fn test_builtin_registry_contents() {
        let registry = builtin_registry();
        let names: Vec<String> = registry.list().into_iter().map(|tool| tool.name).collect();
        assert_eq!(
            names,
            vec![
                "create_challenge",
                "create_idea",
                "create_pilot",
                "create_solution",
                "list_records",
                "navigate"
            ]
        );
        assert!(registry.get("create_pilot").unwrap().requires_confirmation());
        assert!(!registry.get("navigate").unwrap().requires_confirmation());
    }

    #[tokio::test]
    async fn test_create_record_keeps_extra_attributes() {
        let state = ConversationState::default();
        let tool = CreateRecordTool::new(RecordKind::Pilot);

        let output = tool
            .execute(
                &args(json!({ "title": "  Smart parking  ", "description": "Sensors", "district": "Al Malqa" })),
                &state,
            )
            .await
            .unwrap();

        assert_eq!(output.message, "Created pilot 'Smart parking'");
        let records = state.records(Some(RecordKind::Pilot));
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].title, "Smart parking");
        assert_eq!(records[0].description.as_deref(), Some("Sensors"));
        assert_eq!(records[0].attributes["district"], json!("Al Malqa"));
        assert_eq!(output.data["id"], json!(records[0].id));
    }

    #[tokio::test]
    async fn test_create_record_rejects_blank_title() {
        let tool = CreateRecordTool::new(RecordKind::Idea);
        let result = tool.execute(&args(json!({ "title": "   " })), &ConversationState::default()).await;
        assert!(matches!(result, Err(ToolError::ExecutionFailed(_))));
    }

    #[tokio::test]
    async fn test_list_records_filters_by_kind() {
        let state = ConversationState::default();
        state.insert_record(Record::new(RecordKind::Idea, "a"));
        state.insert_record(Record::new(RecordKind::Challenge, "b"));

        let all = ListRecordsTool.execute(&Map::new(), &state).await.unwrap();
        assert_eq!(all.message, "Found 2 records");

        let ideas = ListRecordsTool
            .execute(&args(json!({ "kind": "idea" })), &state)
            .await
            .unwrap();
        assert_eq!(ideas.data.as_array().map(Vec::len), Some(1));

        let unknown = ListRecordsTool.execute(&args(json!({ "kind": "budget" })), &state).await;
        assert!(unknown.is_err());
    }

    #[tokio::test]
    async fn test_navigate_schema_and_output() {
        let tool = NavigateTool;
        assert!(tool.validate_args(&args(json!({ "path": "ideas" }))).is_err());

        let output = tool
            .execute(&args(json!({ "path": "/pilots" })), &ConversationState::default())
            .await
            .unwrap();
        assert_eq!(output.data, json!({ "route": "/pilots" }));
    }
}
