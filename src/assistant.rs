use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::coordinator::{builtin_registry, ConversationState, Coordinator, CoordinatorOutcome};
use crate::errors::{AssistantError, AssistantResult};
use crate::interpreter::validation::check_against_schema;
use crate::interpreter::{extract, interpret, Language};
use crate::llm_handler::{HttpGateway, LlmGateway};
use crate::project_config::AssistantConfig;
use crate::prompts::{chat_response_instructions, PromptCatalog, ASSISTANT_CHAT_TEMPLATE};

/// One conversational turn: prompt, gateway, interpreter, coordinator
pub struct Assistant {
    gateway: Arc<dyn LlmGateway>,
    catalog: PromptCatalog,
    coordinator: Coordinator,
    default_language: Language,
}

impl Assistant {
    pub fn new(
        gateway: Arc<dyn LlmGateway>,
        catalog: PromptCatalog,
        coordinator: Coordinator,
        default_language: Language,
    ) -> Self {
        Self {
            gateway,
            catalog,
            coordinator,
            default_language,
        }
    }

    /// Build the assistant with the HTTP gateway and built-in tools
    pub fn from_config(config: &AssistantConfig) -> AssistantResult<Self> {
        let gateway = HttpGateway::new(&config.gateway)?;
        Ok(Self::with_gateway(config, Arc::new(gateway)))
    }

    /// Build the assistant around any gateway, using the rest of `config`
    pub fn with_gateway(config: &AssistantConfig, gateway: Arc<dyn LlmGateway>) -> Self {
        let state = ConversationState::new(config.pending_ttl());
        let coordinator = Coordinator::new(
            Arc::new(builtin_registry()),
            config.confirmation.clone(),
            state,
        );
        let catalog = PromptCatalog::builtin().with_overrides(&config.prompt_overrides);
        Self::new(gateway, catalog, coordinator, config.default_language)
    }

    pub fn default_language(&self) -> Language {
        self.default_language
    }

    pub fn catalog(&self) -> &PromptCatalog {
        &self.catalog
    }

    pub fn coordinator(&self) -> &Coordinator {
        &self.coordinator
    }

    /// Map an optional locale tag onto a supported language
    pub fn resolve_language(&self, tag: Option<&str>) -> Language {
        match tag.map(str::trim).filter(|tag| !tag.is_empty()) {
            Some(tag) => Language::from_tag(tag),
            None => self.default_language,
        }
    }

    pub async fn handle_message(
        &self,
        message: &str,
        language: Option<&str>,
    ) -> AssistantResult<CoordinatorOutcome> {
        let language = self.resolve_language(language);

        let vars = HashMap::from([("message".to_string(), message.to_string())]);
        let prompt = self
            .catalog
            .get(ASSISTANT_CHAT_TEMPLATE)?
            .render(&vars, language)?
            .append_system(&chat_response_instructions(&self.coordinator.tools(), language));

        let raw = self.gateway.complete(&prompt).await?;
        debug!("Model replied with {} chars", raw.len());

        let envelope = interpret(&raw, language.as_str());
        Ok(self.coordinator.dispatch(envelope, language).await)
    }

    /// Run a content-generation template and return its validated JSON object
    pub async fn generate(
        &self,
        template_id: &str,
        vars: &HashMap<String, String>,
        language: Option<&str>,
    ) -> AssistantResult<Value> {
        let language = self.resolve_language(language);
        let template = self.catalog.get(template_id)?;
        let prompt = template.render(vars, language)?;

        let raw = self.gateway.complete(&prompt).await?;
        let generated = extract::extract_object(&raw).ok_or_else(|| {
            warn!("Template {} produced no JSON object", template_id);
            AssistantError::NoStructuredOutput
        })?;

        if let Some(schema) = &template.output_schema {
            check_against_schema(schema, &generated).map_err(AssistantError::SchemaViolation)?;
        }

        info!("Generated content with template {}", template_id);
        Ok(generated)
    }

    pub fn state(&self) -> &ConversationState {
        self.coordinator.state()
    }
}
