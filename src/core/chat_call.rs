//! Outbound chat calls and their retry policy.
//!
//! One call sends the submitted text as a single user turn and resolves to
//! the reply text or a classified error. Overload responses (HTTP 429/503)
//! are retried on a fixed delay until the attempt budget runs out; every
//! other failure is terminal. Calls are dispatched from the event loop via
//! [`CallDispatcher`], which reports outcomes over a channel tagged with
//! the request id so stale settlements can be recognized.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::api::{GenerateRequest, GenerateResponse, EMPTY_REPLY_FALLBACK};
use crate::utils::url::construct_generate_url;

pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(3000);

#[derive(Debug, Error)]
pub enum CallError {
    /// Non-retryable HTTP status, carrying the response body text.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// The transient-retry budget ran out without a successful response.
    #[error("max retries exceeded after {attempts} attempts; please try again later")]
    RetriesExhausted { attempts: u32 },

    /// The attempt never produced an HTTP response (DNS failure, refused
    /// or reset connection). Terminal: only overload statuses are retried.
    #[error("network error: {0}")]
    Network(String),
}

pub type CallResult = Result<String, CallError>;

fn is_transient(status: u16) -> bool {
    matches!(status, 429 | 503)
}

/// A raw HTTP exchange as seen by the retry loop.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Transport seam for the chat endpoint. Production uses [`HttpTransport`];
/// tests script status/body sequences.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn post_generate(&self, request: &GenerateRequest) -> Result<RawResponse, CallError>;
}

/// Reqwest-backed transport posting to the configured model endpoint with
/// the credential attached as a query parameter.
pub struct HttpTransport {
    client: reqwest::Client,
    url: String,
    api_key: String,
}

impl HttpTransport {
    pub fn new(client: reqwest::Client, base_url: &str, model: &str, api_key: String) -> Self {
        Self {
            client,
            url: construct_generate_url(base_url, model),
            api_key,
        }
    }
}

#[async_trait]
impl ChatTransport for HttpTransport {
    async fn post_generate(&self, request: &GenerateRequest) -> Result<RawResponse, CallError> {
        let response = self
            .client
            .post(&self.url)
            .query(&[("key", self.api_key.as_str())])
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| CallError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| CallError::Network(e.to_string()))?;

        Ok(RawResponse { status, body })
    }
}

/// Attempt budget and pause for one call. No jitter, no backoff growth.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, the first included.
    pub attempts: u32,
    /// Fixed pause between transient attempts.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_RETRY_ATTEMPTS,
            delay: DEFAULT_RETRY_DELAY,
        }
    }
}

pub struct ChatCallService<T: ChatTransport> {
    transport: T,
    policy: RetryPolicy,
}

impl<T: ChatTransport> ChatCallService<T> {
    pub fn new(transport: T, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    /// Send `prompt` as a single user turn and resolve to the reply text.
    ///
    /// A 2xx response always resolves, even when the payload is missing the
    /// expected candidate path; extraction degrades through the fallback
    /// chain instead of failing.
    pub async fn execute(&self, prompt: &str) -> CallResult {
        let request = GenerateRequest::from_prompt(prompt);

        for attempt in 1..=self.policy.attempts {
            let response = self.transport.post_generate(&request).await?;

            if response.is_success() {
                debug!(attempt, "chat call succeeded");
                return Ok(extract_reply(&response.body));
            }

            if is_transient(response.status) {
                warn!(
                    status = response.status,
                    attempt, "model overloaded, retrying"
                );
                if attempt < self.policy.attempts {
                    tokio::time::sleep(self.policy.delay).await;
                }
                continue;
            }

            return Err(CallError::Http {
                status: response.status,
                body: response.body,
            });
        }

        Err(CallError::RetriesExhausted {
            attempts: self.policy.attempts,
        })
    }
}

fn extract_reply(body: &str) -> String {
    match serde_json::from_str::<GenerateResponse>(body) {
        Ok(response) => response.reply_text(),
        Err(_) => EMPTY_REPLY_FALLBACK.to_string(),
    }
}

/// Hands call outcomes back to the event loop. Each outcome carries the
/// request id it settles, so the conversation can ignore anything stale.
#[derive(Clone)]
pub struct CallDispatcher {
    tx: mpsc::UnboundedSender<(u64, CallResult)>,
}

impl CallDispatcher {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<(u64, CallResult)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn spawn_call<T: ChatTransport + 'static>(
        &self,
        service: Arc<ChatCallService<T>>,
        request_id: u64,
        prompt: String,
    ) {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let outcome = service.execute(&prompt).await;
            let _ = tx.send((request_id, outcome));
        });
    }
}
