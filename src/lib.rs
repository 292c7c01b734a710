//! Guo -- Autonomous Philosopher Bot
//!
//! A bot that periodically generates short philosophical posts via a
//! language-model backend, publishes them through a browser session,
//! and replies to incoming mentions in the same voice.

pub mod agent;
pub mod config;
pub mod generator;
pub mod history;
pub mod inference;
pub mod publisher;
pub mod types;
