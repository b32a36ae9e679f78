use actix_web::{web, App, HttpServer};
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

use civic_assist::assistant::Assistant;
use civic_assist::assistant_handlers::{configure_routes, AppState};
use civic_assist::interpreter::interpret;
use civic_assist::logging::init_tracing;
use civic_assist::project_config::{AssistantConfigManager, ASSISTANT_CONFIG_FILE};
use civic_assist::prompts::PromptCatalog;

#[derive(Parser)]
#[command(name = "civic-assist", version, about = "Bilingual innovation assistant service")]
struct Cli {
    /// Path to the JSON configuration file
    #[arg(long, global = true, default_value = ASSISTANT_CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API
    Serve {
        /// Override the configured port
        #[arg(long)]
        port: Option<u16>,
    },
    /// Interpret model output from a file or stdin and print the envelope
    Interpret {
        #[arg(long)]
        file: Option<PathBuf>,
        /// Fallback language tag, e.g. ar or en
        #[arg(long)]
        language: Option<String>,
    },
    /// List prompt template ids
    Templates,
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenv().ok();
    let cli = Cli::parse();

    let config_manager = AssistantConfigManager::new(&cli.config);
    let mut config = config_manager
        .load_with_env()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    let _log_guard = init_tracing(&config.logging);

    match cli.command {
        Commands::Templates => {
            let catalog = PromptCatalog::builtin().with_overrides(&config.prompt_overrides);
            for id in catalog.ids() {
                println!("{}", id);
            }
            Ok(())
        }
        Commands::Interpret { file, language } => {
            let text = match file {
                Some(path) => fs::read_to_string(path)?,
                None => {
                    let mut text = String::new();
                    io::stdin().read_to_string(&mut text)?;
                    text
                }
            };
            let language = language.unwrap_or_else(|| config.default_language.as_str().to_string());

            let envelope = interpret(&text, &language);
            let output = serde_json::to_string_pretty(&envelope)?;
            println!("{}", output);
            Ok(())
        }
        Commands::Serve { port } => {
            if let Some(port) = port {
                config.server.port = port;
            }

            let assistant = Assistant::from_config(&config).map_err(|e| {
                error!("Failed to start assistant: {}", e);
                io::Error::other(e)
            })?;
            let app_state = web::Data::new(AppState {
                assistant: Arc::new(assistant),
            });

            let bind_address = (config.server.bind_address.clone(), config.server.port);
            info!("Starting server at http://{}:{}", bind_address.0, bind_address.1);

            HttpServer::new(move || {
                App::new()
                    .app_data(app_state.clone())
                    .configure(configure_routes)
            })
            .bind(bind_address)?
            .run()
            .await
        }
    }
}
