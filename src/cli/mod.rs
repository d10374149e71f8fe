use clap::{ Args, Parser, Subcommand };

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the HTTP server (chat proxy, prediction passthrough, health)
    Serve(ServeArgs),
    /// Chat with the assistant from the terminal through a running proxy
    Chat(ChatArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    // --- Chat LLM Provider Args ---
    /// Type of OpenAI-compatible provider for chat completion (openrouter, openai, ollama)
    #[arg(long, env = "CHAT_LLM_TYPE", default_value = "openrouter")]
    pub chat_llm_type: String,

    /// Base URL for the provider API (e.g., https://openrouter.ai/api/v1)
    #[arg(long, env = "CHAT_BASE_URL")] // No default, the provider type picks one
    pub chat_base_url: Option<String>,

    /// API key for the chat provider. Not validated here; the provider rejects a missing key.
    #[arg(long, env = "OPENROUTER_API_KEY", default_value = "", hide_env_values = true)]
    pub chat_api_key: String,

    /// Model name for chat completion
    #[arg(long, env = "CHAT_MODEL", default_value = "deepseek/deepseek-r1-distill-llama-70b:free")]
    pub chat_model: String,

    /// Sampling temperature sent with every completion
    #[arg(long, env = "CHAT_TEMPERATURE", default_value = "0.2")]
    pub chat_temperature: f32,

    /// Output token ceiling sent with every completion
    #[arg(long, env = "CHAT_MAX_TOKENS", default_value = "1000")]
    pub chat_max_tokens: u32,

    // --- Prompt Args ---
    /// Optional JSON file overriding the prompt preamble and reference text.
    #[arg(long, env = "PROMPTS_PATH")]
    pub prompts_path: Option<String>,

    // --- Prediction Service Args ---
    /// Base URL of the external prediction service (POST /predict)
    #[arg(long, env = "PREDICTION_URL", default_value = "http://localhost:5000")]
    pub prediction_url: String,

    // --- General App Args ---
    /// Host address and port for the server to listen on.
    #[arg(long, env = "SERVER_ADDR", default_value = "127.0.0.1:3000")]
    pub server_addr: String,

    /// Requests per second accepted on the chat and predict routes. 0 disables the limit.
    #[arg(long, env = "RATE_LIMIT_PER_SECOND", default_value = "10")]
    pub rate_limit_per_second: u32,

    /// Optional path to the TLS certificate file (PEM format). Requires --tls-key-path.
    #[arg(long, env = "TLS_CERT_PATH")]
    pub tls_cert_path: Option<String>,

    /// Optional path to the TLS private key file (PEM format). Requires --tls-cert-path.
    #[arg(long, env = "TLS_KEY_PATH")]
    pub tls_key_path: Option<String>,

    #[arg(long, env = "ENABLE_TLS", default_value = "false")]
    pub enable_tls: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ChatArgs {
    /// Chat proxy endpoint the terminal widget talks to
    #[arg(long, env = "CHAT_PROXY_URL", default_value = "http://127.0.0.1:3000/api/rag")]
    pub proxy_url: String,

    /// Transcript store type (file, redis, memory)
    #[arg(long, env = "TRANSCRIPT_STORE", default_value = "file")]
    pub store_type: String,

    /// Directory for the file store, or connection URL for redis (e.g., redis://127.0.0.1:6379)
    #[arg(long, env = "TRANSCRIPT_LOCATION", default_value = ".hct-chat")]
    pub store_location: String,

    /// Prefix for redis transcript keys.
    #[arg(long, env = "TRANSCRIPT_REDIS_PREFIX", default_value = "transcript:")]
    pub redis_prefix: String,
}
