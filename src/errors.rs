use serde::Serialize;

/// Error handling for the assistant pipeline
///
/// The response interpreter is a total function and has no error type of its
/// own. Everything around it (gateway calls, tool execution, configuration and
/// prompt rendering) reports failures through the enums below.
pub type AssistantResult<T> = Result<T, AssistantError>;

/// Main error type for all assistant operations
#[derive(Debug, thiserror::Error)]
pub enum AssistantError {
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Unknown prompt template: {0}")]
    UnknownTemplate(String),

    #[error("Template {template} is missing a value for variable '{variable}'")]
    TemplateVariableMissing { template: String, variable: String },

    #[error("Generated content did not contain a JSON object")]
    NoStructuredOutput,

    #[error("Generated content violates the declared schema: {}", .0.join("; "))]
    SchemaViolation(Vec<String>),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Hosted LLM gateway errors
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("{0} environment variable not set")]
    MissingApiKey(String),

    #[error("Failed to send request to {provider}: {message}")]
    Transport { provider: String, message: String },

    #[error("{provider} returned HTTP {status}: {body}")]
    Status {
        provider: String,
        status: u16,
        body: String,
    },

    #[error("Failed to parse {provider} response: {message}")]
    Decode { provider: String, message: String },

    #[error("No response from {0}")]
    EmptyResponse(String),
}

/// Tool lookup and execution errors
#[derive(Debug, Clone, PartialEq, Serialize, thiserror::Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Tool already registered: {0}")]
    AlreadyRegistered(String),

    #[error("Invalid parameters for {tool}: {}", .violations.join("; "))]
    InvalidParams {
        tool: String,
        violations: Vec<String>,
    },

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Pending confirmation not found or expired: {0}")]
    ConfirmationNotFound(String),
}

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid value for {key}: {value}")]
    InvalidOverride { key: String, value: String },
}

/// Helper trait for adding context to errors
pub trait ErrorContext<T> {
    fn with_context(self, context: impl Into<String>) -> Result<T, ToolError>;
}

impl<T, E> ErrorContext<T> for Result<T, E>
where
    E: std::fmt::Display,
{
    fn with_context(self, context: impl Into<String>) -> Result<T, ToolError> {
        self.map_err(|e| ToolError::ExecutionFailed(format!("{}: {}", context.into(), e)))
    }
}
