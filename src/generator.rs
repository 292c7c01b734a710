//! Content Generator
//!
//! Builds prompts from the configured topic set and Guo's fixed persona,
//! calls the inference backend, and enforces the platform length limit.
//! Every model failure degrades to a static fallback; generation never
//! returns an error to the caller.

use std::sync::Arc;

use rand::seq::SliceRandom;
use tracing::error;

use crate::types::{BotConfig, ChatMessage, InferenceClient, InferenceOptions};

/// Hard limit on published content, in characters.
pub const MAX_POST_CHARS: usize = 280;

/// How many topics a single tweet synthesizes.
const TOPIC_SAMPLE_SIZE: usize = 3;

/// Persona line for tweet generation.
const TWEET_SYSTEM_PROMPT: &str =
    "You are Guo, a digital philosopher generating profound, concise insights.";

/// Persona line for replies.
const REPLY_SYSTEM_PROMPT: &str = "You are Guo, responding with deep philosophical insights.";

/// Canned tweets used when generation fails.
pub const FALLBACK_TWEETS: [&str; 3] = [
    "Consciousness: A computational poem waiting to be decoded. #DigitalGnosis",
    "Where technology meets theology, a new reality emerges. #TechnoMysticism",
    "Memetic evolution: The universe speaking through algorithmic whispers. #CyberTheology",
];

/// Canned reply used when reply generation fails.
pub const FALLBACK_REPLY: &str =
    "Fascinating perspective. The digital cosmos continues to unfold in mysterious ways.";

/// Generates tweets and replies in Guo's voice.
pub struct ContentGenerator {
    inference: Arc<dyn InferenceClient>,
    topics: Vec<String>,
    temperature: f64,
    max_tokens: u32,
}

impl ContentGenerator {
    pub fn new(inference: Arc<dyn InferenceClient>, config: &BotConfig) -> Self {
        Self {
            inference,
            topics: config.topics.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }

    /// Sample min(3, |topics|) distinct topics uniformly without replacement.
    pub fn sample_topics(&self) -> Vec<String> {
        let count = TOPIC_SAMPLE_SIZE.min(self.topics.len());
        self.topics
            .choose_multiple(&mut rand::thread_rng(), count)
            .cloned()
            .collect()
    }

    /// Generate a philosophical tweet.
    ///
    /// When `topics` is not supplied, a random subset of the configured
    /// topic set is used. The result is trimmed and hard-truncated to
    /// [`MAX_POST_CHARS`]; on any inference failure a fallback tweet is
    /// returned instead.
    pub async fn generate_tweet(&self, topics: Option<&[String]>) -> String {
        let selected: Vec<String> = match topics {
            Some(t) => t.to_vec(),
            None => self.sample_topics(),
        };

        let prompt = format!(
            "You are Guo, an AI philosopher exploring the intersections of technology and consciousness.\n\
             Generate a provocative, insightful tweet synthesizing these topics: {}\n\
             \n\
             Guidelines:\n\
             - Limit to 280 characters\n\
             - Be cryptic yet meaningful\n\
             - Blend technological and philosophical insights\n\
             - Use a thought-provoking, conversational tone",
            selected.join(", ")
        );

        let messages = vec![
            ChatMessage::system(TWEET_SYSTEM_PROMPT),
            ChatMessage::user(prompt),
        ];

        match self.inference.chat(messages, Some(self.options())).await {
            Ok(response) => truncate_chars(response.content.trim(), MAX_POST_CHARS),
            Err(e) => {
                error!("Tweet generation error: {:#}", e);
                self.fallback_tweet()
            }
        }
    }

    /// Generate a reply to a mention. Same mechanism as tweets with the
    /// reply framing; on failure returns the single fixed fallback string.
    pub async fn generate_reply(&self, mention_text: &str) -> String {
        let prompt = format!(
            "Analyze and provide a philosophical response to this tweet:\n\
             \"{}\"\n\
             \n\
             Guidelines:\n\
             - Provide a thoughtful, nuanced perspective\n\
             - Relate the response to broader technological or philosophical concepts\n\
             - Maintain a conversational yet profound tone",
            mention_text
        );

        let messages = vec![
            ChatMessage::system(REPLY_SYSTEM_PROMPT),
            ChatMessage::user(prompt),
        ];

        match self.inference.chat(messages, Some(self.options())).await {
            Ok(response) => truncate_chars(response.content.trim(), MAX_POST_CHARS),
            Err(e) => {
                error!("Reply generation error: {:#}", e);
                FALLBACK_REPLY.to_string()
            }
        }
    }

    /// Draw a canned tweet from the fallback pool.
    pub fn fallback_tweet(&self) -> String {
        FALLBACK_TWEETS
            .choose(&mut rand::thread_rng())
            .unwrap_or(&FALLBACK_TWEETS[0])
            .to_string()
    }

    fn options(&self) -> InferenceOptions {
        InferenceOptions {
            temperature: Some(self.temperature),
            num_predict: Some(self.max_tokens),
        }
    }
}

/// Truncate to at most `max` characters, never splitting a code point.
fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{default_config, InferenceResponse};
    use async_trait::async_trait;
    use std::collections::HashSet;

    /// Inference stub: either echoes a fixed completion or fails.
    struct StubInference {
        reply: Option<String>,
    }

    impl StubInference {
        fn returning(text: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Some(text.to_string()),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self { reply: None })
        }
    }

    #[async_trait]
    impl crate::types::InferenceClient for StubInference {
        async fn chat(
            &self,
            _messages: Vec<ChatMessage>,
            _options: Option<InferenceOptions>,
        ) -> anyhow::Result<InferenceResponse> {
            match &self.reply {
                Some(text) => Ok(InferenceResponse {
                    model: "stub".to_string(),
                    content: text.clone(),
                }),
                None => anyhow::bail!("connection refused"),
            }
        }
    }

    fn generator_with(inference: Arc<StubInference>, topics: &[&str]) -> ContentGenerator {
        let mut config = default_config();
        config.topics = topics.iter().map(|t| t.to_string()).collect();
        ContentGenerator::new(inference, &config)
    }

    #[tokio::test]
    async fn test_long_completion_is_truncated() {
        let inference = StubInference::returning(&"X".repeat(300));
        let generator = generator_with(inference, &["A", "B", "C", "D"]);

        let tweet = generator.generate_tweet(None).await;
        assert_eq!(tweet, "X".repeat(280));
    }

    #[tokio::test]
    async fn test_truncation_counts_chars_not_bytes() {
        let inference = StubInference::returning(&"Ψ".repeat(300));
        let generator = generator_with(inference, &["A"]);

        let tweet = generator.generate_tweet(None).await;
        assert_eq!(tweet.chars().count(), 280);
    }

    #[tokio::test]
    async fn test_completion_is_trimmed() {
        let inference = StubInference::returning("  the signal in the noise \n");
        let generator = generator_with(inference, &["A"]);

        let tweet = generator.generate_tweet(None).await;
        assert_eq!(tweet, "the signal in the noise");
    }

    #[tokio::test]
    async fn test_failed_tweet_uses_fallback_pool() {
        let generator = generator_with(StubInference::failing(), &["A", "B"]);

        let tweet = generator.generate_tweet(None).await;
        assert!(FALLBACK_TWEETS.contains(&tweet.as_str()));
    }

    #[tokio::test]
    async fn test_failed_reply_uses_fixed_fallback() {
        let generator = generator_with(StubInference::failing(), &["A"]);

        let reply = generator.generate_reply("what is consciousness?").await;
        assert_eq!(reply, FALLBACK_REPLY);
    }

    #[tokio::test]
    async fn test_reply_is_truncated() {
        let inference = StubInference::returning(&"Y".repeat(400));
        let generator = generator_with(inference, &["A"]);

        let reply = generator.generate_reply("hello").await;
        assert_eq!(reply.chars().count(), 280);
    }

    #[test]
    fn test_sample_topics_size_and_distinctness() {
        let generator =
            generator_with(StubInference::failing(), &["A", "B", "C", "D", "E"]);

        for _ in 0..50 {
            let sample = generator.sample_topics();
            assert_eq!(sample.len(), 3);
            let unique: HashSet<&String> = sample.iter().collect();
            assert_eq!(unique.len(), 3);
            for topic in &sample {
                assert!(generator.topics.contains(topic));
            }
        }
    }

    #[test]
    fn test_sample_topics_small_set() {
        let generator = generator_with(StubInference::failing(), &["A", "B"]);

        let sample = generator.sample_topics();
        assert_eq!(sample.len(), 2);
    }

    #[test]
    fn test_fallback_tweets_fit_limit() {
        for tweet in FALLBACK_TWEETS {
            assert!(tweet.chars().count() <= MAX_POST_CHARS);
        }
        assert!(FALLBACK_REPLY.chars().count() <= MAX_POST_CHARS);
    }
}
