//! Deterministic backend that replays canned responses.
//!
//! Used by the demo binary when no API key is configured and throughout the tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use super::{ModelBackend, ModelRequest, ModelResponse, StreamEvent, TextStream};
use crate::error::AgentError;
use crate::Result;

pub struct ScriptedModel {
    responses: Mutex<VecDeque<ModelResponse>>,
    fallback: Option<ModelResponse>,
    failure: Option<String>,
    stream_reply: String,
    delay: Duration,
    calls: AtomicUsize,
    requests: Mutex<Vec<ModelRequest>>,
}

impl ScriptedModel {
    /// Replay `responses` in order, then fail once they run out.
    pub fn new(responses: Vec<ModelResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            fallback: None,
            failure: None,
            stream_reply: "{\"value\": null}".to_string(),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Answer every call with the same response.
    pub fn repeating(response: ModelResponse) -> Self {
        let mut model = Self::new(Vec::new());
        model.fallback = Some(response);
        model
    }

    /// Fail every call with a backend error.
    pub fn failing(message: impl Into<String>) -> Self {
        let mut model = Self::new(Vec::new());
        model.failure = Some(message.into());
        model
    }

    /// Sleep before each completion (uses tokio time, so paused clocks apply).
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Text returned by `stream`.
    pub fn with_stream_reply(mut self, reply: impl Into<String>) -> Self {
        self.stream_reply = reply.into();
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<ModelRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    fn next_response(&self) -> Result<ModelResponse> {
        if let Some(message) = &self.failure {
            return Err(AgentError::ModelBackend(message.clone()));
        }
        let scripted = self
            .responses
            .lock()
            .map_err(|_| AgentError::ModelBackend("scripted model poisoned".to_string()))?
            .pop_front();
        scripted
            .or_else(|| self.fallback.clone())
            .ok_or_else(|| AgentError::ModelBackend("scripted model has no more responses".to_string()))
    }
}

#[async_trait::async_trait]
impl ModelBackend for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &ModelRequest) -> Result<ModelResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.next_response()
    }

    async fn stream(&self, _prompt: &str, _system_prompt: &str) -> Result<TextStream> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = &self.failure {
            return Err(AgentError::ModelBackend(message.clone()));
        }
        let events = vec![Ok(StreamEvent::Delta(self.stream_reply.clone())), Ok(StreamEvent::Done)];
        Ok(Box::pin(futures::stream::iter(events)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::collect_text;
    use serde_json::json;

    fn request() -> ModelRequest {
        ModelRequest {
            system_prompt: String::new(),
            prompt: "hi".to_string(),
            history: Vec::new(),
            tools: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_replays_in_order_then_fails() {
        let model = ScriptedModel::new(vec![
            ModelResponse::tool_call("get_current_datetime", json!({})),
            ModelResponse::answer("done"),
        ]);
        assert_eq!(model.complete(&request()).await.unwrap().tool_calls.len(), 1);
        assert_eq!(model.complete(&request()).await.unwrap().answer_text(), Some("done"));
        assert!(model.complete(&request()).await.is_err());
        assert_eq!(model.call_count(), 3);
        assert_eq!(model.requests().len(), 3);
    }

    #[tokio::test]
    async fn test_stream_reply() {
        let model = ScriptedModel::new(Vec::new()).with_stream_reply("{\"value\": 1800}");
        let text = collect_text(model.stream("p", "s").await.unwrap()).await.unwrap();
        assert_eq!(text, "{\"value\": 1800}");
    }
}
