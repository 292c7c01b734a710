//! Guo - Type Definitions
//!
//! Shared types and capability traits for the philosopher bot runtime.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

// ─── Configuration ───────────────────────────────────────────────

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BotConfig {
    /// Topics the generator samples from when composing a post.
    pub topics: Vec<String>,
    /// Base URL of the platform web front end.
    pub base_url: String,
    /// Model identifier passed to the inference backend.
    pub engine: String,
    /// Sampling temperature for generations.
    pub temperature: f64,
    /// Token budget per generation.
    pub max_tokens: u32,
    /// Base URL of the inference API.
    pub api_url: String,
    /// WebDriver endpoint the publisher drives the browser through.
    pub webdriver_url: String,
    /// Maximum number of history entries kept in memory.
    pub history_limit: usize,
    pub log_level: LogLevel,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Directive string accepted by the tracing env filter.
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Returns the default `BotConfig`. Every field can be overridden from
/// `config.yaml`; missing keys fall back to these values.
pub fn default_config() -> BotConfig {
    BotConfig {
        topics: vec![
            "Web3".to_string(),
            "philosophy".to_string(),
            "technology".to_string(),
            "consciousness".to_string(),
            "digital gnosis".to_string(),
            "techno-mysticism".to_string(),
            "meme mutation".to_string(),
            "quantum spirituality".to_string(),
            "cyber-theology".to_string(),
            "digital asceticism".to_string(),
            "hyperstition".to_string(),
        ],
        base_url: "https://twitter.com".to_string(),
        engine: "nous-hermes2-mixtral:latest".to_string(),
        temperature: 0.7,
        max_tokens: 280,
        api_url: "http://localhost:11434".to_string(),
        webdriver_url: "http://localhost:9515".to_string(),
        history_limit: 256,
        log_level: LogLevel::Info,
    }
}

/// Platform credentials, loaded from the environment.
#[derive(Clone, Debug)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

// ─── Inference ───────────────────────────────────────────────────

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}

/// Per-call overrides for an inference request.
#[derive(Clone, Debug, Default)]
pub struct InferenceOptions {
    pub temperature: Option<f64>,
    pub num_predict: Option<u32>,
}

#[derive(Clone, Debug)]
pub struct InferenceResponse {
    pub model: String,
    pub content: String,
}

/// Chat-completion backend the content generator talks to.
#[async_trait]
pub trait InferenceClient: Send + Sync {
    async fn chat(
        &self,
        messages: Vec<ChatMessage>,
        options: Option<InferenceOptions>,
    ) -> anyhow::Result<InferenceResponse>;
}

// ─── Publisher ───────────────────────────────────────────────────

/// An inbound message referencing the bot's account.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Mention {
    pub text: String,
}

/// Capability interface to the social platform.
///
/// Implementations handle their own failures: errors are logged and mapped
/// to `false` / an empty list, never propagated to the run loop.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Authenticate the session. Must succeed before the run loop starts.
    async fn login(&self) -> bool;

    /// Publish a standalone post. Returns whether the post went out.
    async fn post_content(&self, text: &str) -> bool;

    /// Fetch recent mentions, most recent first, capped at 10.
    async fn fetch_mentions(&self) -> Vec<Mention>;

    /// Reply to the mention whose text matches `mention_text`.
    async fn reply_to(&self, mention_text: &str, reply_text: &str) -> bool;

    /// Release the underlying session. Best-effort.
    async fn shutdown(&self);
}

// ─── History ─────────────────────────────────────────────────────

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HistoryKind {
    Tweet,
    Reply,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub id: String,
    pub timestamp: String,
    pub kind: HistoryKind,
    pub content: String,
    /// For replies: the mention text that prompted the reply.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mention: Option<String>,
}
