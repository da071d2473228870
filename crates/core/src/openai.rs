//! Minimal client for the hosted chat-completion and embedding endpoints.
//!
//! Every request goes through [`OpenAiClient::post_json`], which applies the
//! configured timeout and retries transient failures (429, 5xx, connect and
//! timeout errors) with exponential backoff.

use crate::config::{PipelineConfig, RetryPolicy};
use crate::error::ModelError;
use crate::models::Embedding;
use crate::traits::{ChatMessage, ChatModel};
use crate::embeddings::Embedder;
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};
use url::Url;

pub struct OpenAiClient {
    http: Client,
    api_base: Url,
    api_key: String,
    retry: RetryPolicy,
}

impl OpenAiClient {
    pub fn new(config: &PipelineConfig) -> Result<Self, ModelError> {
        let http = Client::builder().timeout(config.request_timeout).build()?;
        Ok(Self {
            http,
            api_base: config.api_base.clone(),
            api_key: config.api_key.clone(),
            retry: config.retry,
        })
    }

    async fn post_json<B, R>(&self, path: &str, body: &B) -> Result<R, ModelError>
    where
        B: Serialize + ?Sized + Sync,
        R: DeserializeOwned,
    {
        let url = self.api_base.join(path)?;
        let mut attempt = 0usize;

        loop {
            attempt += 1;
            match self.send_once(&url, body).await {
                Ok(parsed) => return Ok(parsed),
                Err(error) if error.is_transient() && attempt < self.retry.max_attempts => {
                    let delay = self.retry.backoff_for(attempt);
                    warn!(
                        endpoint = path,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        %error,
                        "transient model api failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(error) if error.is_transient() => {
                    return Err(ModelError::RetriesExhausted {
                        attempts: attempt,
                        last: Box::new(error),
                    });
                }
                Err(error) => return Err(error),
            }
        }
    }

    async fn send_once<B, R>(&self, url: &Url, body: &B) -> Result<R, ModelError>
    where
        B: Serialize + ?Sized + Sync,
        R: DeserializeOwned,
    {
        let response = self
            .http
            .post(url.clone())
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let details = response.text().await.unwrap_or_default();
            return Err(ModelError::Api {
                status: status.as_u16(),
                details: api_error_message(&details),
            });
        }

        Ok(response.json::<R>().await?)
    }

    pub async fn chat_completion(&self, request: &ChatRequest<'_>) -> Result<String, ModelError> {
        let response: ChatResponse = self.post_json("chat/completions", request).await?;
        response.into_text()
    }

    pub async fn embeddings(&self, model: &str, input: &[String]) -> Result<Vec<Embedding>, ModelError> {
        let request = EmbeddingRequest { model, input };
        let response: EmbeddingResponse = self.post_json("embeddings", &request).await?;
        response.into_vectors(input.len())
    }
}

#[derive(Debug, Serialize)]
pub struct ChatRequest<'a> {
    pub model: &'a str,
    pub messages: &'a [ChatMessage],
    pub temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl ChatResponse {
    fn into_text(self) -> Result<String, ModelError> {
        self.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| ModelError::InvalidResponse("chat completion had no content".to_string()))
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Embedding,
}

impl EmbeddingResponse {
    /// Orders vectors by their `index`, which the API does not guarantee.
    fn into_vectors(mut self, expected: usize) -> Result<Vec<Embedding>, ModelError> {
        if self.data.len() != expected {
            return Err(ModelError::InvalidResponse(format!(
                "expected {expected} embeddings, received {}",
                self.data.len()
            )));
        }
        self.data.sort_by_key(|item| item.index);
        if self.data.iter().enumerate().any(|(position, item)| position != item.index) {
            return Err(ModelError::InvalidResponse(
                "embedding indices are not contiguous".to_string(),
            ));
        }
        Ok(self.data.into_iter().map(|item| item.embedding).collect())
    }
}

fn api_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            value
                .pointer("/error/message")
                .and_then(serde_json::Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string())
}

pub struct OpenAiChatModel {
    client: Arc<OpenAiClient>,
    model: String,
    temperature: f32,
}

impl OpenAiChatModel {
    pub fn new(client: Arc<OpenAiClient>, model: impl Into<String>, temperature: f32) -> Self {
        Self {
            client,
            model: model.into(),
            temperature,
        }
    }
}

#[async_trait]
impl ChatModel for OpenAiChatModel {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, ModelError> {
        let request = ChatRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
        };
        self.client.chat_completion(&request).await
    }
}

pub struct OpenAiEmbedder {
    client: Arc<OpenAiClient>,
    model: String,
    batch_size: usize,
}

impl OpenAiEmbedder {
    pub fn new(client: Arc<OpenAiClient>, model: impl Into<String>, batch_size: usize) -> Self {
        Self {
            client,
            model: model.into(),
            batch_size: batch_size.max(1),
        }
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Embedding>, ModelError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            debug!(model = %self.model, batch = batch.len(), "requesting embeddings");
            vectors.extend(self.client.embeddings(&self.model, batch).await?);
        }
        Ok(vectors)
    }

    async fn embed_query(&self, text: &str) -> Result<Embedding, ModelError> {
        let input = [text.to_string()];
        self.client
            .embeddings(&self.model, &input)
            .await?
            .pop()
            .ok_or_else(|| ModelError::InvalidResponse("empty embedding response".to_string()))
    }
}
