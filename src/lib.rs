pub mod cli;
pub mod config;
pub mod llm;
pub mod models;
pub mod prediction;
pub mod server;
pub mod widget;

use cli::{ ChatArgs, Cli, Command, ServeArgs };
use config::prompt::{ load_prompts, PromptConfig };
use llm::LlmConfig;
use llm::chat::new_client as new_chat_client;
use prediction::PredictionClient;
use server::Server;
use server::api::AppState;
use widget::ChatWidget;
use widget::console::run_console;
use widget::proxy::HttpChatProxy;
use widget::store::create_transcript_store;
use log::{ info, warn };
use std::error::Error;
use std::sync::Arc;
use tokio::io::BufReader;

pub async fn run(cli: Cli) -> Result<(), Box<dyn Error + Send + Sync>> {
    match cli.command {
        Command::Serve(args) => run_server(args).await,
        Command::Chat(args) => run_chat(args).await,
    }
}

pub async fn run_server(args: ServeArgs) -> Result<(), Box<dyn Error + Send + Sync>> {
    info!("--- Core Configuration ---");
    info!("Server Address: {}", args.server_addr);
    info!("Chat LLM Type: {}", args.chat_llm_type);
    info!("Chat Model: {}", args.chat_model);
    info!("Chat Temperature: {}", args.chat_temperature);
    info!("Chat Max Tokens: {}", args.chat_max_tokens);
    info!("Prompts Path: {}", args.prompts_path.as_deref().unwrap_or("built-in"));
    info!("Prediction Service: {}", args.prediction_url);
    info!("Rate Limit (req/s): {}", args.rate_limit_per_second);
    info!("TLS Enabled: {}", args.enable_tls);
    info!("-------------------------");

    if args.chat_api_key.is_empty() {
        warn!("OPENROUTER_API_KEY is empty; the chat provider will reject completions.");
    }

    let llm_config = LlmConfig {
        llm_type: args.chat_llm_type.parse()?,
        api_key: args.chat_api_key.clone(),
        completion_model: args.chat_model.clone(),
        base_url: args.chat_base_url.clone(),
        temperature: args.chat_temperature,
        max_tokens: args.chat_max_tokens,
    };
    let chat_client = new_chat_client(&llm_config)?;

    let prompt_config = match &args.prompts_path {
        Some(path) => load_prompts(path)?,
        None => Arc::new(PromptConfig::default()),
    };

    let prediction = PredictionClient::new(&args.prediction_url)?;
    let state = AppState::new(
        chat_client,
        prompt_config,
        args.prompts_path.clone(),
        prediction,
        args.rate_limit_per_second
    );

    info!("Starting server on: {}", args.server_addr);
    let server = Server::new(args.server_addr.clone(), state, &args)?;
    server.run().await?;

    Ok(())
}

pub async fn run_chat(args: ChatArgs) -> Result<(), Box<dyn Error + Send + Sync>> {
    info!("Chat proxy endpoint: {}", args.proxy_url);

    let store = create_transcript_store(&args.store_type, &args.store_location, &args.redis_prefix)?;
    let proxy = Arc::new(HttpChatProxy::new(args.proxy_url.clone()));
    let widget = ChatWidget::initialize(store, proxy).await;

    run_console(&widget, BufReader::new(tokio::io::stdin()), tokio::io::stdout()).await
}
