use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde::Serialize;
use thiserror::Error;

use crate::models::chat::{ ChatMessage, ChatReply };

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("{0}")]
    Http(#[from] reqwest::Error),
    #[error("Failed to get response (status {0})")]
    Status(u16),
}

/// The chat proxy as seen from the widget.
#[async_trait]
pub trait ChatProxy: Send + Sync {
    async fn ask(&self, message: &str, history: &[ChatMessage]) -> Result<String, ProxyError>;
}

#[derive(Serialize)]
struct AskBody<'a> {
    message: &'a str,
    history: &'a [ChatMessage],
}

pub struct HttpChatProxy {
    http: HttpClient,
    endpoint: String,
}

impl HttpChatProxy {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self { http: HttpClient::new(), endpoint: endpoint.into() }
    }
}

#[async_trait]
impl ChatProxy for HttpChatProxy {
    async fn ask(&self, message: &str, history: &[ChatMessage]) -> Result<String, ProxyError> {
        let resp = self.http
            .post(&self.endpoint)
            .json(&AskBody { message, history })
            .send().await?;

        if !resp.status().is_success() {
            return Err(ProxyError::Status(resp.status().as_u16()));
        }

        let reply = resp.json::<ChatReply>().await?;
        Ok(reply.response)
    }
}
