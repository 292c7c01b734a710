//! Publication History
//!
//! Bounded in-memory log of everything the bot has published. Oldest
//! entries are evicted once the cap is reached; nothing is persisted
//! across restarts.

use std::collections::VecDeque;

use chrono::Utc;
use uuid::Uuid;

use crate::types::{HistoryEntry, HistoryKind};

/// Bounded log of published tweets and replies.
pub struct History {
    entries: VecDeque<HistoryEntry>,
    limit: usize,
}

impl History {
    /// Create a history log that keeps at most `limit` entries.
    /// A limit of 0 disables recording entirely.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(limit.min(64)),
            limit,
        }
    }

    /// Record a published tweet.
    pub fn record_tweet(&mut self, content: &str) {
        self.push(HistoryEntry {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now().to_rfc3339(),
            kind: HistoryKind::Tweet,
            content: content.to_string(),
            mention: None,
        });
    }

    /// Record a published reply together with the mention that prompted it.
    pub fn record_reply(&mut self, content: &str, mention_text: &str) {
        self.push(HistoryEntry {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now().to_rfc3339(),
            kind: HistoryKind::Reply,
            content: content.to_string(),
            mention: Some(mention_text.to_string()),
        });
    }

    fn push(&mut self, entry: HistoryEntry) {
        if self.limit == 0 {
            return;
        }
        while self.entries.len() >= self.limit {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in insertion order, oldest first.
    pub fn entries(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entries_kept_in_order() {
        let mut history = History::with_limit(10);
        history.record_tweet("first");
        history.record_reply("second", "a mention");
        history.record_tweet("third");

        let contents: Vec<&str> = history.entries().map(|e| e.content.as_str()).collect();
        assert_eq!(contents, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_cap_evicts_oldest() {
        let mut history = History::with_limit(3);
        for i in 0..5 {
            history.record_tweet(&format!("tweet {}", i));
        }

        assert_eq!(history.len(), 3);
        let contents: Vec<&str> = history.entries().map(|e| e.content.as_str()).collect();
        assert_eq!(contents, vec!["tweet 2", "tweet 3", "tweet 4"]);
    }

    #[test]
    fn test_zero_limit_records_nothing() {
        let mut history = History::with_limit(0);
        history.record_tweet("dropped");
        assert!(history.is_empty());
    }

    #[test]
    fn test_reply_keeps_mention_text() {
        let mut history = History::with_limit(4);
        history.record_reply("a reply", "original mention");

        let entry = history.entries().next().unwrap();
        assert_eq!(entry.kind, HistoryKind::Reply);
        assert_eq!(entry.mention.as_deref(), Some("original mention"));
    }
}
