use actix_web::{web, HttpResponse, Responder};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, warn};

use crate::assistant::Assistant;
use crate::coordinator::{CoordinatorOutcome, Record, RecordKind, ToolInfo};
use crate::errors::{AssistantError, ToolError};
use crate::interpreter::{interpret_optional, ResponseEnvelope};

pub struct AppState {
    pub assistant: Arc<Assistant>,
}

// Request body for interpreting raw model output
#[derive(Debug, Deserialize)]
pub struct InterpretRequest {
    pub text: Option<String>,
    pub language: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct InterpretResponse {
    pub success: bool,
    pub message: String,
    pub envelope: ResponseEnvelope,
}

// Request body for one chat turn
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    pub language: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct OutcomeResponse {
    pub success: bool,
    pub message: String,
    pub outcome: CoordinatorOutcome,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ToolsResponse {
    pub success: bool,
    pub message: String,
    pub tools: Vec<ToolInfo>,
}

#[derive(Debug, Deserialize)]
pub struct RecordsQuery {
    pub kind: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RecordsResponse {
    pub success: bool,
    pub message: String,
    pub records: Vec<Record>,
}

#[derive(Debug, Serialize)]
pub struct RecordResponse {
    pub success: bool,
    pub message: String,
    pub record: Record,
}

// Request body for a content-generation template
#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    #[serde(default)]
    pub variables: HashMap<String, String>,
    pub language: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub success: bool,
    pub message: String,
    pub content: Value,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub violations: Vec<String>,
}

fn error_response(e: &AssistantError) -> HttpResponse {
    let violations = match e {
        AssistantError::SchemaViolation(violations) => violations.clone(),
        AssistantError::Tool(ToolError::InvalidParams { violations, .. }) => violations.clone(),
        _ => Vec::new(),
    };
    let body = ErrorResponse {
        success: false,
        message: e.to_string(),
        violations,
    };

    match e {
        AssistantError::Gateway(_) => {
            error!("Gateway call failed: {}", e);
            HttpResponse::BadGateway().json(body)
        }
        AssistantError::UnknownTemplate(_) | AssistantError::TemplateVariableMissing { .. } => {
            HttpResponse::BadRequest().json(body)
        }
        AssistantError::NoStructuredOutput | AssistantError::SchemaViolation(_) => {
            warn!("Rejected generated content: {}", e);
            HttpResponse::UnprocessableEntity().json(body)
        }
        AssistantError::Tool(ToolError::NotFound(_) | ToolError::ConfirmationNotFound(_)) => {
            HttpResponse::NotFound().json(body)
        }
        AssistantError::Tool(ToolError::InvalidParams { .. }) => HttpResponse::BadRequest().json(body),
        _ => {
            error!("Assistant request failed: {}", e);
            HttpResponse::InternalServerError().json(body)
        }
    }
}

fn outcome_response(outcome: CoordinatorOutcome) -> HttpResponse {
    let (success, message) = match &outcome {
        CoordinatorOutcome::Render { sections, .. } => (true, format!("{} sections", sections.len())),
        CoordinatorOutcome::Executed { output, .. } => (true, output.message.clone()),
        CoordinatorOutcome::PendingConfirmation { message, .. } => (true, message.clone()),
        CoordinatorOutcome::Failed { error, .. } => (false, error.clone()),
    };
    HttpResponse::Ok().json(OutcomeResponse {
        success,
        message,
        outcome,
    })
}

// API endpoint to interpret raw model output without calling the gateway
pub async fn interpret_handler(
    request: web::Json<InterpretRequest>,
    data: web::Data<AppState>,
) -> impl Responder {
    let request = request.into_inner();
    let language = data.assistant.resolve_language(request.language.as_deref());

    let envelope = interpret_optional(request.text.as_deref(), language.as_str());
    let message = if envelope.is_tool_call() {
        "Tool call".to_string()
    } else {
        format!("{} sections", envelope.sections().len())
    };

    HttpResponse::Ok().json(InterpretResponse {
        success: true,
        message,
        envelope,
    })
}

// API endpoint for one chat turn
pub async fn chat_handler(request: web::Json<ChatRequest>, data: web::Data<AppState>) -> impl Responder {
    let request = request.into_inner();
    match data
        .assistant
        .handle_message(&request.message, request.language.as_deref())
        .await
    {
        Ok(outcome) => outcome_response(outcome),
        Err(e) => error_response(&e),
    }
}

// API endpoint to run a pending tool call
pub async fn confirm_handler(path: web::Path<String>, data: web::Data<AppState>) -> impl Responder {
    let confirmation_id = path.into_inner();
    match data.assistant.coordinator().confirm(&confirmation_id).await {
        Ok(outcome) => outcome_response(outcome),
        Err(e) => error_response(&AssistantError::from(e)),
    }
}

// API endpoint to drop a pending tool call
pub async fn cancel_handler(path: web::Path<String>, data: web::Data<AppState>) -> impl Responder {
    let confirmation_id = path.into_inner();
    match data.assistant.coordinator().cancel(&confirmation_id) {
        Ok(()) => HttpResponse::Ok().json(MessageResponse {
            success: true,
            message: format!("Cancelled {}", confirmation_id),
        }),
        Err(e) => error_response(&AssistantError::from(e)),
    }
}

pub async fn tools_handler(data: web::Data<AppState>) -> impl Responder {
    let tools = data.assistant.coordinator().tools();
    HttpResponse::Ok().json(ToolsResponse {
        success: true,
        message: format!("{} tools available", tools.len()),
        tools,
    })
}

pub async fn records_handler(query: web::Query<RecordsQuery>, data: web::Data<AppState>) -> impl Responder {
    let kind = match query.kind.as_deref() {
        Some(name) => match RecordKind::from_name(name) {
            Some(kind) => Some(kind),
            None => {
                return HttpResponse::BadRequest().json(ErrorResponse {
                    success: false,
                    message: format!("Unknown record kind: {}", name),
                    violations: Vec::new(),
                });
            }
        },
        None => None,
    };

    let records = data.assistant.state().records(kind);
    HttpResponse::Ok().json(RecordsResponse {
        success: true,
        message: format!("Found {} records", records.len()),
        records,
    })
}

pub async fn record_handler(path: web::Path<String>, data: web::Data<AppState>) -> impl Responder {
    let id = path.into_inner();
    match data.assistant.state().record(&id) {
        Some(record) => HttpResponse::Ok().json(RecordResponse {
            success: true,
            message: format!("Found {} '{}'", record.kind, record.title),
            record,
        }),
        None => HttpResponse::NotFound().json(ErrorResponse {
            success: false,
            message: format!("Record not found: {}", id),
            violations: Vec::new(),
        }),
    }
}

// API endpoint to generate content with a prompt template
pub async fn generate_handler(
    path: web::Path<String>,
    request: web::Json<GenerateRequest>,
    data: web::Data<AppState>,
) -> impl Responder {
    let template_id = path.into_inner();
    let request = request.into_inner();
    match data
        .assistant
        .generate(&template_id, &request.variables, request.language.as_deref())
        .await
    {
        Ok(content) => HttpResponse::Ok().json(GenerateResponse {
            success: true,
            message: format!("Generated with {}", template_id),
            content,
        }),
        Err(e) => error_response(&e),
    }
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/assistant")
            .route("/interpret", web::post().to(interpret_handler))
            .route("/chat", web::post().to(chat_handler))
            .route("/confirm/{id}", web::post().to(confirm_handler))
            .route("/confirm/{id}", web::delete().to(cancel_handler))
            .route("/tools", web::get().to(tools_handler))
            .route("/records", web::get().to(records_handler))
            .route("/records/{id}", web::get().to(record_handler))
            .route("/generate/{template}", web::post().to(generate_handler)),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assistant::testing::ScriptedGateway;
    use crate::errors::GatewayError;
    use crate::project_config::AssistantConfig;
    use actix_web::http::StatusCode;
    use actix_web::{test, App};
    use serde_json::json;

    fn app_state(gateway: Arc<ScriptedGateway>) -> web::Data<AppState> {
        let assistant = Assistant::with_gateway(&AssistantConfig::default(), gateway);
        web::Data::new(AppState {
            assistant: Arc::new(assistant),
        })
    }

    #[actix_web::test]
    async fn test_interpret_endpoint() {
        let app = test::init_service(
            App::new()
                .app_data(app_state(Arc::new(ScriptedGateway::default())))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/assistant/interpret")
            .set_json(json!({ "text": "```json\n{\"tool\":\"navigate\",\"args\":{\"path\":\"/ideas\"}}\n```" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["envelope"]["kind"], "tool_call");
        assert_eq!(body["envelope"]["name"], "navigate");

        let req = test::TestRequest::post()
            .uri("/api/assistant/interpret")
            .set_json(json!({}))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["envelope"]["kind"], "structured");
        assert_eq!(body["envelope"]["language"], "ar");
        assert_eq!(body["envelope"]["sections"][0], json!({ "type": "paragraph", "content": "" }));
    }

    #[actix_web::test]
    async fn test_chat_confirm_and_cancel_flow() {
        let gateway = Arc::new(ScriptedGateway::replying(&[
            r#"{"tool":"create_challenge","args":{"title":"Flooded underpasses"}}"#,
            r#"{"tool":"create_idea","args":{"title":"Rain sensors"}}"#,
        ]));
        let app = test::init_service(App::new().app_data(app_state(gateway)).configure(configure_routes)).await;

        let req = test::TestRequest::post()
            .uri("/api/assistant/chat")
            .set_json(json!({ "message": "log this challenge", "language": "en" }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["outcome"]["status"], "pending_confirmation");
        let confirmation_id = body["outcome"]["confirmation_id"].as_str().unwrap().to_string();

        let req = test::TestRequest::post()
            .uri(&format!("/api/assistant/confirm/{}", confirmation_id))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["outcome"]["status"], "executed");
        assert_eq!(body["message"], "Created challenge 'Flooded underpasses'");

        let req = test::TestRequest::post()
            .uri(&format!("/api/assistant/confirm/{}", confirmation_id))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);

        let req = test::TestRequest::post()
            .uri("/api/assistant/chat")
            .set_json(json!({ "message": "and an idea" }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        let confirmation_id = body["outcome"]["confirmation_id"].as_str().unwrap().to_string();

        let req = test::TestRequest::delete()
            .uri(&format!("/api/assistant/confirm/{}", confirmation_id))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

        let req = test::TestRequest::get()
            .uri("/api/assistant/records?kind=challenge")
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["records"].as_array().map(Vec::len), Some(1));
        let record_id = body["records"][0]["id"].as_str().unwrap().to_string();

        let req = test::TestRequest::get()
            .uri(&format!("/api/assistant/records/{}", record_id))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["record"]["kind"], "challenge");
        assert_eq!(body["record"]["title"], "Flooded underpasses");

        let req = test::TestRequest::get().uri("/api/assistant/records/missing").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["success"], false);

        let req = test::TestRequest::get().uri("/api/assistant/records?kind=idea").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["records"], json!([]));

        let req = test::TestRequest::get().uri("/api/assistant/records?kind=budget").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_gateway_failure_is_bad_gateway() {
        let gateway = Arc::new(ScriptedGateway::default());
        gateway.push(Err(GatewayError::Transport {
            provider: "test".to_string(),
            message: "connection refused".to_string(),
        }));
        let app = test::init_service(App::new().app_data(app_state(gateway)).configure(configure_routes)).await;

        let req = test::TestRequest::post()
            .uri("/api/assistant/chat")
            .set_json(json!({ "message": "hi" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["success"], false);
    }

    #[actix_web::test]
    async fn test_generate_status_codes() {
        let gateway = Arc::new(ScriptedGateway::replying(&[
            r#"{"summary":"Going well","status":"running","risks":[],"next_steps":["expand"]}"#,
            r#"{"summary":"Going well","status":"paused"}"#,
        ]));
        let app = test::init_service(App::new().app_data(app_state(gateway)).configure(configure_routes)).await;
        let variables = json!({ "variables": { "pilot_name": "Smart bins", "notes": "sensors installed" } });

        let req = test::TestRequest::post()
            .uri("/api/assistant/generate/pilot_summary")
            .set_json(&variables)
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["content"]["status"], "running");

        let req = test::TestRequest::post()
            .uri("/api/assistant/generate/pilot_summary")
            .set_json(&variables)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body: Value = test::read_body_json(resp).await;
        assert!(!body["violations"].as_array().unwrap().is_empty());

        let req = test::TestRequest::post()
            .uri("/api/assistant/generate/pilot_summary")
            .set_json(json!({ "variables": { "pilot_name": "Smart bins" } }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::post()
            .uri("/api/assistant/generate/budget_plan")
            .set_json(json!({}))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_tools_endpoint() {
        let app = test::init_service(
            App::new()
                .app_data(app_state(Arc::new(ScriptedGateway::default())))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::get().uri("/api/assistant/tools").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        let names: Vec<&str> = body["tools"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|tool| tool["name"].as_str())
            .collect();
        assert!(names.contains(&"navigate"));
        assert!(names.contains(&"create_solution"));
    }
}
