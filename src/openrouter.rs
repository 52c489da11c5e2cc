//! Backend de chat sobre la API de OpenRouter (compatible con OpenAI).

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, warn};

use crate::config::LlmConfig;
use crate::error::QueryError;
use crate::llm::{ChatBackend, ChatRequest, FragmentStream};
use crate::streaming::SseFragmentStream;

#[derive(Clone)]
pub struct OpenRouterBackend {
    http_client: Client,
    api_key: String,
    base_url: String,
    site_url: Option<String>,
    site_name: Option<String>,
}

impl OpenRouterBackend {
    pub fn new(cfg: &LlmConfig) -> Self {
        Self {
            http_client: Client::new(),
            api_key: cfg.api_key.clone(),
            base_url: cfg.base_url.clone(),
            site_url: cfg.site_url.clone(),
            site_name: cfg.site_name.clone(),
        }
    }
}

#[async_trait]
impl ChatBackend for OpenRouterBackend {
    async fn stream_chat(&self, request: ChatRequest) -> Result<FragmentStream, QueryError> {
        let url = format!("{}/chat/completions", self.base_url);
        debug!(url = %url, model = %request.model, "Abriendo stream de chat");

        let mut builder = self
            .http_client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request);
        if let Some(site_url) = &self.site_url {
            builder = builder.header("HTTP-Referer", site_url);
        }
        if let Some(site_name) = &self.site_name {
            builder = builder.header("X-Title", site_name);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| QueryError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, error = %body, "Error de la API de OpenRouter");
            return Err(QueryError::Api {
                status: status.as_u16(),
                body,
            });
        }

        Ok(Box::pin(SseFragmentStream::new(response.bytes_stream())))
    }
}
