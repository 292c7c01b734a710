//! The Run Loop
//!
//! One cycle: generate a tweet, publish it, poll mentions, reply to each,
//! then sleep one to two hours. A failed publish gets a single fallback
//! attempt; a failed reply never blocks the remaining mentions; anything
//! escaping a whole cycle is logged and retried after a fixed backoff.
//! The loop has no terminal state.

use std::sync::Arc;

use anyhow::Result;
use rand::Rng;
use tokio::time::{sleep, Duration};
use tracing::{error, info, warn};

use crate::generator::ContentGenerator;
use crate::history::History;
use crate::types::Publisher;

/// Bounds of the randomized pause between cycles, in seconds.
const CYCLE_SLEEP_MIN_SECS: u64 = 3600;
const CYCLE_SLEEP_MAX_SECS: u64 = 7200;

/// Pause after a cycle-level failure before retrying.
const ERROR_BACKOFF_SECS: u64 = 1800;

/// Everything the run loop needs. Built once in `main` and consumed by
/// [`run_loop`].
pub struct RunLoopOptions {
    pub generator: ContentGenerator,
    pub publisher: Arc<dyn Publisher>,
    pub history: History,
}

/// Outcome of a single cycle, for logging and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub posted: bool,
    pub used_fallback_post: bool,
    pub mentions_seen: usize,
    pub replies_sent: usize,
}

/// Execute one full cycle: tweet, then work through the mentions.
pub async fn run_cycle(
    generator: &ContentGenerator,
    publisher: &dyn Publisher,
    history: &mut History,
) -> Result<CycleReport> {
    let tweet = generator.generate_tweet(None).await;
    info!("Generated tweet: {}", tweet);

    let mut used_fallback_post = false;
    let posted = publisher.post_content(&tweet).await;
    if posted {
        history.record_tweet(&tweet);
    } else {
        // One bounded retry with canned content; the result is not
        // checked further.
        warn!("Posting failed, attempting one fallback tweet");
        used_fallback_post = true;
        let fallback = generator.fallback_tweet();
        if publisher.post_content(&fallback).await {
            history.record_tweet(&fallback);
        }
    }

    let mentions = publisher.fetch_mentions().await;
    let mentions_seen = mentions.len();
    let mut replies_sent = 0;

    for mention in &mentions {
        // generate_reply degrades to the fixed apology internally, so a
        // model failure still produces something to post. A failed post
        // is logged and the remaining mentions are still attempted.
        let reply = generator.generate_reply(&mention.text).await;
        if publisher.reply_to(&mention.text, &reply).await {
            history.record_reply(&reply, &mention.text);
            replies_sent += 1;
        } else {
            warn!("Reply failed for mention: {}", mention.text);
        }
    }

    Ok(CycleReport {
        posted,
        used_fallback_post,
        mentions_seen,
        replies_sent,
    })
}

/// Run cycles forever. Only process termination ends the loop.
pub async fn run_loop(options: RunLoopOptions) -> Result<()> {
    let RunLoopOptions {
        generator,
        publisher,
        mut history,
    } = options;

    loop {
        match run_cycle(&generator, publisher.as_ref(), &mut history).await {
            Ok(report) => {
                info!(
                    "Cycle complete: posted={} fallback={} mentions={} replies={} history={}",
                    report.posted,
                    report.used_fallback_post,
                    report.mentions_seen,
                    report.replies_sent,
                    history.len(),
                );

                let secs = next_sleep_secs(&mut rand::thread_rng());
                info!("Sleeping {}s until next cycle", secs);
                sleep(Duration::from_secs(secs)).await;
            }
            Err(e) => {
                error!("Cycle failed: {:#}", e);
                sleep(Duration::from_secs(ERROR_BACKOFF_SECS)).await;
            }
        }
    }
}

/// Uniformly random pause between cycles, inclusive on both ends.
pub fn next_sleep_secs(rng: &mut impl Rng) -> u64 {
    rng.gen_range(CYCLE_SLEEP_MIN_SECS..=CYCLE_SLEEP_MAX_SECS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::{FALLBACK_REPLY, FALLBACK_TWEETS};
    use crate::types::{
        default_config, ChatMessage, InferenceClient, InferenceOptions, InferenceResponse,
        Mention,
    };
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    struct StubInference {
        reply: Option<String>,
    }

    #[async_trait]
    impl InferenceClient for StubInference {
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

    /// Scripted publisher: records every call, pops scripted results,
    /// defaults to success.
    #[derive(Default)]
    struct ScriptedPublisher {
        mentions: Vec<Mention>,
        post_results: Mutex<VecDeque<bool>>,
        reply_results: Mutex<VecDeque<bool>>,
        posts: Mutex<Vec<String>>,
        replies: Mutex<Vec<(String, String)>>,
        fetch_calls: Mutex<usize>,
    }

    impl ScriptedPublisher {
        fn with_mentions(count: usize) -> Self {
            Self {
                mentions: (0..count)
                    .map(|i| Mention {
                        text: format!("mention number {}", i),
                    })
                    .collect(),
                ..Default::default()
            }
        }

        fn script_posts(&self, results: &[bool]) {
            *self.post_results.lock().unwrap() = results.iter().copied().collect();
        }

        fn script_replies(&self, results: &[bool]) {
            *self.reply_results.lock().unwrap() = results.iter().copied().collect();
        }
    }

    #[async_trait]
    impl Publisher for ScriptedPublisher {
        async fn login(&self) -> bool {
            true
        }

        async fn post_content(&self, text: &str) -> bool {
            self.posts.lock().unwrap().push(text.to_string());
            self.post_results.lock().unwrap().pop_front().unwrap_or(true)
        }

        async fn fetch_mentions(&self) -> Vec<Mention> {
            *self.fetch_calls.lock().unwrap() += 1;
            self.mentions.clone()
        }

        async fn reply_to(&self, mention_text: &str, reply_text: &str) -> bool {
            self.replies
                .lock()
                .unwrap()
                .push((mention_text.to_string(), reply_text.to_string()));
            self.reply_results.lock().unwrap().pop_front().unwrap_or(true)
        }

        async fn shutdown(&self) {}
    }

    fn generator_returning(text: Option<&str>, topics: &[&str]) -> ContentGenerator {
        let mut config = default_config();
        config.topics = topics.iter().map(|t| t.to_string()).collect();
        ContentGenerator::new(
            Arc::new(StubInference {
                reply: text.map(|t| t.to_string()),
            }),
            &config,
        )
    }

    #[tokio::test]
    async fn test_cycle_posts_and_replies() {
        let generator = generator_returning(Some("the ghost in the machine"), &["A", "B"]);
        let publisher = ScriptedPublisher::with_mentions(2);
        let mut history = History::with_limit(16);

        let report = run_cycle(&generator, &publisher, &mut history)
            .await
            .unwrap();

        assert!(report.posted);
        assert!(!report.used_fallback_post);
        assert_eq!(report.mentions_seen, 2);
        assert_eq!(report.replies_sent, 2);
        assert_eq!(
            publisher.posts.lock().unwrap().as_slice(),
            &["the ghost in the machine".to_string()]
        );
        // One tweet plus two replies recorded.
        assert_eq!(history.len(), 3);
    }

    #[tokio::test]
    async fn test_post_failure_publishes_exactly_one_fallback() {
        let generator = generator_returning(Some("unpostable insight"), &["A"]);
        let publisher = ScriptedPublisher::with_mentions(1);
        publisher.script_posts(&[false, false]);
        let mut history = History::with_limit(16);

        let report = run_cycle(&generator, &publisher, &mut history)
            .await
            .unwrap();

        let posts = publisher.posts.lock().unwrap();
        assert_eq!(posts.len(), 2);
        assert!(FALLBACK_TWEETS.contains(&posts[1].as_str()));
        assert!(report.used_fallback_post);
        // The cycle still moved on to mention processing.
        assert_eq!(*publisher.fetch_calls.lock().unwrap(), 1);
        assert_eq!(report.mentions_seen, 1);
    }

    #[tokio::test]
    async fn test_reply_failures_do_not_abort_remaining_mentions() {
        let generator = generator_returning(Some("a thought"), &["A"]);
        let publisher = ScriptedPublisher::with_mentions(10);
        // Several scattered failures among the ten replies.
        publisher.script_replies(&[
            true, false, true, false, false, true, true, false, true, true,
        ]);
        let mut history = History::with_limit(32);

        let report = run_cycle(&generator, &publisher, &mut history)
            .await
            .unwrap();

        assert_eq!(publisher.replies.lock().unwrap().len(), 10);
        assert_eq!(report.mentions_seen, 10);
        assert_eq!(report.replies_sent, 6);
    }

    #[tokio::test]
    async fn test_model_failure_still_replies_with_apology() {
        let generator = generator_returning(None, &["A"]);
        let publisher = ScriptedPublisher::with_mentions(1);
        let mut history = History::with_limit(16);

        run_cycle(&generator, &publisher, &mut history)
            .await
            .unwrap();

        let replies = publisher.replies.lock().unwrap();
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].1, FALLBACK_REPLY);
    }

    #[tokio::test]
    async fn test_overlong_completion_posts_truncated() {
        let long = "X".repeat(300);
        let generator = generator_returning(Some(&long), &["A", "B", "C", "D"]);
        let publisher = ScriptedPublisher::default();
        let mut history = History::with_limit(16);

        run_cycle(&generator, &publisher, &mut history)
            .await
            .unwrap();

        assert_eq!(
            publisher.posts.lock().unwrap().as_slice(),
            &["X".repeat(280)]
        );
    }

    #[test]
    fn test_sleep_window_bounds() {
        let mut rng = rand::thread_rng();
        for _ in 0..200 {
            let secs = next_sleep_secs(&mut rng);
            assert!((CYCLE_SLEEP_MIN_SECS..=CYCLE_SLEEP_MAX_SECS).contains(&secs));
        }
    }
}
