pub mod openai;

use async_trait::async_trait;
use std::sync::Arc;
use log::info;
use super::{ LlmConfig, LlmError };
use self::openai::OpenAIChatClient;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionResponse {
    /// Text of the first choice; `None` when the provider produced nothing usable.
    pub response: Option<String>,
}

#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<CompletionResponse, LlmError>;

    fn get_model(&self) -> String;
    fn get_base_url(&self) -> String;
}

pub fn new_client(config: &LlmConfig) -> Result<Arc<dyn ChatClient>, LlmError> {
    let client = OpenAIChatClient::from_config(config)?;
    info!(
        "Chat client configured: Type={}, Model={}, BaseURL={}",
        config.llm_type,
        client.get_model(),
        client.get_base_url()
    );
    Ok(Arc::new(client))
}
