use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::api::GenerateRequest;
use crate::core::chat_call::{CallError, ChatTransport, RawResponse};

/// Transport that replays a scripted sequence of exchanges, recording how
/// many attempts the retry loop actually made.
pub struct ScriptedTransport {
    responses: Mutex<VecDeque<Result<RawResponse, CallError>>>,
    calls: Arc<AtomicU32>,
}

impl ScriptedTransport {
    pub fn with_statuses(script: &[(u16, String)]) -> Self {
        let responses = script
            .iter()
            .map(|(status, body)| {
                Ok(RawResponse {
                    status: *status,
                    body: body.clone(),
                })
            })
            .collect();
        Self {
            responses: Mutex::new(responses),
            calls: Arc::new(AtomicU32::new(0)),
        }
    }

    pub fn failing_with(message: &str) -> Self {
        let mut responses = VecDeque::new();
        responses.push_back(Err(CallError::Network(message.to_string())));
        Self {
            responses: Mutex::new(responses),
            calls: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Attempt counter handle that stays readable after the transport has
    /// been moved into a service.
    pub fn call_count(&self) -> CallCount {
        CallCount(self.calls.clone())
    }
}

pub struct CallCount(Arc<AtomicU32>);

impl CallCount {
    pub fn get(&self) -> u32 {
        self.0.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatTransport for ScriptedTransport {
    async fn post_generate(&self, _request: &GenerateRequest) -> Result<RawResponse, CallError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(CallError::Network("transport script exhausted".to_string())))
    }
}

pub fn reply_body(text: &str) -> String {
    format!(r#"{{"candidates":[{{"content":{{"parts":[{{"text":"{text}"}}]}}}}]}}"#)
}
