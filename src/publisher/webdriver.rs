//! WebDriver Publisher
//!
//! Drives a real browser session against the platform web UI through a
//! chromedriver endpoint, speaking the W3C WebDriver wire protocol over
//! HTTP. The UI markup is third-party and changes without notice, so every
//! operation here is best-effort: failures are logged and reported as
//! `false` / empty rather than propagated.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::types::{Credentials, Mention, Publisher};

/// W3C element identifier key in WebDriver responses.
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

/// Code point WebDriver maps to the Return key.
const KEY_RETURN: char = '\u{e006}';

/// How long to poll for an element or condition before giving up.
const WAIT_TIMEOUT: Duration = Duration::from_secs(10);
/// Poll interval while waiting.
const POLL_INTERVAL: Duration = Duration::from_millis(500);
/// Pause after a full page navigation.
const PAGE_SETTLE: Duration = Duration::from_secs(3);
/// Pause after opening the composer or advancing a login step.
const STEP_SETTLE: Duration = Duration::from_secs(2);
/// Pause after typing, before submitting.
const TYPE_SETTLE: Duration = Duration::from_secs(1);

/// Most mentions returned per fetch.
const MENTION_LIMIT: usize = 10;

// UI hooks. data-testid attributes are the most stable handles the
// front end exposes.
const SEL_LOGIN_USERNAME: &str = "input[name='text']";
const SEL_LOGIN_PASSWORD: &str = "input[name='password']";
const SEL_COMPOSE_BUTTON: &str = "a[data-testid='SideNav-NewTweet-Button']";
const SEL_COMPOSER: &str = "div[data-testid='tweetTextarea-0']";
const SEL_SUBMIT_BUTTON: &str = "button[data-testid='tweetButtonInner']";
const SEL_TWEET: &str = "div[data-testid='tweet']";
const SEL_TWEET_TEXT: &str = "div[lang]";
const SEL_REPLY_BUTTON: &str = "button[data-testid='replyButton']";

/// Errors from the WebDriver wire layer.
#[derive(Debug, Error)]
pub enum WebDriverError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("webdriver returned {status}: {body}")]
    Protocol { status: u16, body: String },

    #[error("malformed webdriver response: {0}")]
    Malformed(String),

    #[error("timed out after {timeout_secs}s waiting for {what}")]
    WaitTimeout { what: String, timeout_secs: u64 },

    #[error("no mention starting with '{0}' on the page")]
    MentionNotFound(String),
}

/// Publisher backed by a live browser session.
pub struct WebDriverPublisher {
    driver_url: String,
    base_url: String,
    credentials: Credentials,
    session_id: String,
    http: Client,
}

impl WebDriverPublisher {
    /// Start a browser session on the chromedriver at `driver_url`.
    pub async fn connect(
        driver_url: String,
        base_url: String,
        credentials: Credentials,
    ) -> Result<Self, WebDriverError> {
        let http = Client::new();

        let capabilities = serde_json::json!({
            "capabilities": {
                "alwaysMatch": {
                    "browserName": "chrome",
                    "goog:chromeOptions": {
                        "args": ["--no-sandbox", "--disable-dev-shm-usage"]
                    }
                }
            }
        });

        let url = format!("{}/session", driver_url);
        let resp = http.post(&url).json(&capabilities).send().await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(WebDriverError::Protocol {
                status: status.as_u16(),
                body,
            });
        }

        let data: Value = resp.json().await?;
        let session_id = data["value"]["sessionId"]
            .as_str()
            .ok_or_else(|| WebDriverError::Malformed("no sessionId in response".to_string()))?
            .to_string();

        info!("WebDriver session {} started", session_id);

        Ok(Self {
            driver_url,
            base_url,
            credentials,
            session_id,
            http,
        })
    }

    // ── Wire operations ───────────────────────────────────────────

    /// Send a command scoped to this session and return the `value` field.
    async fn command(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, WebDriverError> {
        let url = format!(
            "{}/session/{}{}",
            self.driver_url, self.session_id, path
        );

        let mut builder = self.http.request(method, &url);
        if let Some(b) = body {
            builder = builder.json(&b);
        }

        let resp = builder.send().await?;
        let status = resp.status();
        let data: Value = match resp.json().await {
            Ok(v) => v,
            Err(_) if status.is_success() => Value::Null,
            Err(e) => return Err(WebDriverError::Transport(e)),
        };

        if !status.is_success() {
            return Err(WebDriverError::Protocol {
                status: status.as_u16(),
                body: data["value"]["message"]
                    .as_str()
                    .unwrap_or("unknown error")
                    .to_string(),
            });
        }

        Ok(data["value"].clone())
    }

    async fn navigate(&self, url: &str) -> Result<(), WebDriverError> {
        self.command(
            reqwest::Method::POST,
            "/url",
            Some(serde_json::json!({ "url": url })),
        )
        .await?;
        Ok(())
    }

    async fn current_url(&self) -> Result<String, WebDriverError> {
        let value = self.command(reqwest::Method::GET, "/url", None).await?;
        value
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| WebDriverError::Malformed("current url is not a string".to_string()))
    }

    async fn find_element(&self, selector: &str) -> Result<String, WebDriverError> {
        let value = self
            .command(
                reqwest::Method::POST,
                "/element",
                Some(locator(selector)),
            )
            .await?;
        element_id(&value)
    }

    async fn find_elements(&self, selector: &str) -> Result<Vec<String>, WebDriverError> {
        let value = self
            .command(
                reqwest::Method::POST,
                "/elements",
                Some(locator(selector)),
            )
            .await?;

        let items = value
            .as_array()
            .ok_or_else(|| WebDriverError::Malformed("elements response is not a list".to_string()))?;

        items.iter().map(element_id).collect()
    }

    async fn find_child_element(
        &self,
        parent: &str,
        selector: &str,
    ) -> Result<String, WebDriverError> {
        let value = self
            .command(
                reqwest::Method::POST,
                &format!("/element/{}/element", parent),
                Some(locator(selector)),
            )
            .await?;
        element_id(&value)
    }

    async fn click(&self, element: &str) -> Result<(), WebDriverError> {
        self.command(
            reqwest::Method::POST,
            &format!("/element/{}/click", element),
            Some(serde_json::json!({})),
        )
        .await?;
        Ok(())
    }

    async fn send_keys(&self, element: &str, text: &str) -> Result<(), WebDriverError> {
        self.command(
            reqwest::Method::POST,
            &format!("/element/{}/value", element),
            Some(serde_json::json!({ "text": text })),
        )
        .await?;
        Ok(())
    }

    async fn element_text(&self, element: &str) -> Result<String, WebDriverError> {
        let value = self
            .command(
                reqwest::Method::GET,
                &format!("/element/{}/text", element),
                None,
            )
            .await?;
        value
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| WebDriverError::Malformed("element text is not a string".to_string()))
    }

    /// Poll for an element until it appears or the wait deadline passes.
    async fn wait_for_element(&self, selector: &str) -> Result<String, WebDriverError> {
        let deadline = tokio::time::Instant::now() + WAIT_TIMEOUT;
        loop {
            match self.find_element(selector).await {
                Ok(id) => return Ok(id),
                Err(WebDriverError::Transport(e)) => return Err(WebDriverError::Transport(e)),
                Err(_) if tokio::time::Instant::now() < deadline => {
                    sleep(POLL_INTERVAL).await;
                }
                Err(_) => {
                    return Err(WebDriverError::WaitTimeout {
                        what: format!("element {}", selector),
                        timeout_secs: WAIT_TIMEOUT.as_secs(),
                    })
                }
            }
        }
    }

    /// Poll until the browser URL contains `fragment`.
    async fn wait_for_url_contains(&self, fragment: &str) -> Result<(), WebDriverError> {
        let deadline = tokio::time::Instant::now() + WAIT_TIMEOUT;
        loop {
            if self.current_url().await?.contains(fragment) {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(WebDriverError::WaitTimeout {
                    what: format!("url containing '{}'", fragment),
                    timeout_secs: WAIT_TIMEOUT.as_secs(),
                });
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    // ── Flows ─────────────────────────────────────────────────────

    async fn try_login(&self) -> Result<(), WebDriverError> {
        self.navigate(&format!("{}/login", self.base_url)).await?;
        sleep(PAGE_SETTLE).await;

        let username_input = self.wait_for_element(SEL_LOGIN_USERNAME).await?;
        self.send_keys(
            &username_input,
            &format!("{}{}", self.credentials.username, KEY_RETURN),
        )
        .await?;
        sleep(STEP_SETTLE).await;

        let password_input = self.wait_for_element(SEL_LOGIN_PASSWORD).await?;
        self.send_keys(
            &password_input,
            &format!("{}{}", self.credentials.password, KEY_RETURN),
        )
        .await?;

        self.wait_for_url_contains("home").await
    }

    async fn try_post(&self, text: &str) -> Result<(), WebDriverError> {
        let compose = self.wait_for_element(SEL_COMPOSE_BUTTON).await?;
        self.click(&compose).await?;
        sleep(STEP_SETTLE).await;

        let composer = self.wait_for_element(SEL_COMPOSER).await?;
        self.send_keys(&composer, text).await?;
        sleep(TYPE_SETTLE).await;

        let submit = self.find_element(SEL_SUBMIT_BUTTON).await?;
        self.click(&submit).await?;
        sleep(PAGE_SETTLE).await;
        Ok(())
    }

    async fn try_fetch_mentions(&self) -> Result<Vec<Mention>, WebDriverError> {
        self.navigate(&format!("{}/notifications/mentions", self.base_url))
            .await?;
        sleep(PAGE_SETTLE).await;

        let tweets = self.find_elements(SEL_TWEET).await?;

        let mut mentions = Vec::new();
        for tweet in tweets.into_iter().take(MENTION_LIMIT) {
            let text = match self.find_child_element(&tweet, SEL_TWEET_TEXT).await {
                Ok(node) => self.element_text(&node).await,
                Err(e) => Err(e),
            };
            match text {
                Ok(text) => mentions.push(Mention { text }),
                Err(e) => warn!("Could not parse mention: {}", e),
            }
        }

        Ok(mentions)
    }

    /// Reply to the mention matching `mention_text`. Assumes the mentions
    /// timeline is the current page, which holds when called after
    /// `fetch_mentions` within the same cycle.
    async fn try_reply(&self, mention_text: &str, reply_text: &str) -> Result<(), WebDriverError> {
        let needle = prefix_chars(mention_text, 20);

        let tweets = self.find_elements(SEL_TWEET).await?;
        let mut reply_button = None;
        for tweet in tweets {
            let node = match self.find_child_element(&tweet, SEL_TWEET_TEXT).await {
                Ok(node) => node,
                Err(_) => continue,
            };
            let text = match self.element_text(&node).await {
                Ok(text) => text,
                Err(_) => continue,
            };
            if text.contains(&needle) {
                reply_button = Some(self.find_child_element(&tweet, SEL_REPLY_BUTTON).await?);
                break;
            }
        }

        let reply_button =
            reply_button.ok_or_else(|| WebDriverError::MentionNotFound(needle.clone()))?;

        self.click(&reply_button).await?;
        sleep(STEP_SETTLE).await;

        let composer = self.wait_for_element(SEL_COMPOSER).await?;
        self.send_keys(&composer, reply_text).await?;
        sleep(TYPE_SETTLE).await;

        let submit = self.find_element(SEL_SUBMIT_BUTTON).await?;
        self.click(&submit).await?;
        sleep(PAGE_SETTLE).await;
        Ok(())
    }
}

#[async_trait]
impl Publisher for WebDriverPublisher {
    async fn login(&self) -> bool {
        match self.try_login().await {
            Ok(()) => {
                info!("Successfully logged in");
                true
            }
            Err(e) => {
                error!("Login failed: {}", e);
                false
            }
        }
    }

    async fn post_content(&self, text: &str) -> bool {
        match self.try_post(text).await {
            Ok(()) => {
                info!("Posted: {}", text);
                true
            }
            Err(e) => {
                error!("Posting failed: {}", e);
                false
            }
        }
    }

    async fn fetch_mentions(&self) -> Vec<Mention> {
        match self.try_fetch_mentions().await {
            Ok(mentions) => {
                debug!("Fetched {} mentions", mentions.len());
                mentions
            }
            Err(e) => {
                error!("Retrieving mentions failed: {}", e);
                Vec::new()
            }
        }
    }

    async fn reply_to(&self, mention_text: &str, reply_text: &str) -> bool {
        match self.try_reply(mention_text, reply_text).await {
            Ok(()) => {
                info!("Replied to mention: {}", reply_text);
                true
            }
            Err(e) => {
                error!("Replying to mention failed: {}", e);
                false
            }
        }
    }

    async fn shutdown(&self) {
        let url = format!("{}/session/{}", self.driver_url, self.session_id);
        match self.http.delete(&url).send().await {
            Ok(_) => debug!("WebDriver session {} closed", self.session_id),
            Err(e) => debug!("Failed to close WebDriver session: {}", e),
        }
    }
}

/// CSS locator body for element lookups.
fn locator(selector: &str) -> Value {
    serde_json::json!({ "using": "css selector", "value": selector })
}

/// Extract the element id from a WebDriver element object.
fn element_id(value: &Value) -> Result<String, WebDriverError> {
    value[ELEMENT_KEY]
        .as_str()
        .map(|s| s.to_string())
        .ok_or_else(|| WebDriverError::Malformed("no element id in response".to_string()))
}

/// First `max` characters of `s`, never splitting a code point.
fn prefix_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_id_extracted() {
        let value = serde_json::json!({ ELEMENT_KEY: "abc-123" });
        assert_eq!(element_id(&value).unwrap(), "abc-123");
    }

    #[test]
    fn test_element_id_missing_is_error() {
        let value = serde_json::json!({ "unexpected": true });
        assert!(element_id(&value).is_err());
    }

    #[test]
    fn test_prefix_chars_is_char_safe() {
        assert_eq!(prefix_chars("ΨΦΩ consciousness", 3), "ΨΦΩ");
        assert_eq!(prefix_chars("short", 20), "short");
    }

    #[test]
    fn test_locator_uses_css() {
        let body = locator("div[lang]");
        assert_eq!(body["using"], "css selector");
        assert_eq!(body["value"], "div[lang]");
    }
}
