//! Ollama Inference Client
//!
//! Wraps the Ollama `/api/chat` endpoint. One request per generation,
//! no streaming; the response's `message.content` field is all the bot
//! ever consumes.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use crate::types::{ChatMessage, InferenceClient, InferenceOptions, InferenceResponse};

/// Inference client for Ollama-style chat completions.
pub struct OllamaClient {
    api_url: String,
    model: String,
    max_tokens: u32,
    http: Client,
}

impl OllamaClient {
    /// Create a new inference client.
    ///
    /// * `api_url` - Base URL for the Ollama API (e.g. `http://localhost:11434`).
    /// * `model` - Model identifier (e.g. `nous-hermes2-mixtral:latest`).
    /// * `max_tokens` - Default token budget per completion.
    pub fn new(api_url: String, model: String, max_tokens: u32) -> Self {
        Self {
            api_url,
            model,
            max_tokens,
            http: Client::new(),
        }
    }
}

#[async_trait]
impl InferenceClient for OllamaClient {
    /// Send a chat request and return the completion text.
    async fn chat(
        &self,
        messages: Vec<ChatMessage>,
        options: Option<InferenceOptions>,
    ) -> Result<InferenceResponse> {
        let num_predict = options
            .as_ref()
            .and_then(|o| o.num_predict)
            .unwrap_or(self.max_tokens);

        let mut request_options = serde_json::json!({ "num_predict": num_predict });
        if let Some(temperature) = options.as_ref().and_then(|o| o.temperature) {
            request_options["temperature"] = serde_json::json!(temperature);
        }

        let body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "stream": false,
            "options": request_options,
        });

        let url = format!("{}/api/chat", self.api_url);
        let resp = self
            .http
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .context("Inference request failed")?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            anyhow::bail!("Inference error: {}: {}", status.as_u16(), text);
        }

        let data: Value = resp
            .json()
            .await
            .context("Failed to parse inference response")?;

        let content = data["message"]["content"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("No message content in inference response"))?
            .to_string();

        Ok(InferenceResponse {
            model: data["model"].as_str().unwrap_or(&self.model).to_string(),
            content,
        })
    }
}
