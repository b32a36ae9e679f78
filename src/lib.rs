pub mod assistant;
pub mod assistant_handlers;
pub mod coordinator;
pub mod errors;
pub mod interpreter;
pub mod llm_handler;
pub mod logging;
pub mod project_config;
pub mod prompts;
