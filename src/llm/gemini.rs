//! Gemini API backend
//!
//! Function calling over `generateContent` and text streaming over
//! `streamGenerateContent?alt=sse`. Uses a long-lived reqwest::Client for
//! connection pooling.

use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::{ChatTurn, ModelBackend, ModelRequest, ModelResponse, StreamEvent, TextStream, ToolCallRequest, TurnRole};
use crate::error::AgentError;
use crate::tools::ToolDescriptor;
use crate::Result;

const BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Schema keywords Gemini's function declarations reject.
const UNSUPPORTED_SCHEMA_KEYS: &[&str] = &["additionalProperties", "$schema", "default", "exclusiveMinimum", "exclusiveMaximum"];

/// Reusable Gemini client (connection-pooled)
pub struct GeminiBackend {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiBackend {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| AgentError::ModelBackend(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            model: model.into(),
            base_url: BASE_URL.to_string(),
        })
    }

    /// Point the client at a different API host (proxies, tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn url(&self, method: &str) -> String {
        format!("{}/{}:{}", self.base_url, self.model, method)
    }

    fn ensure_key(&self) -> Result<()> {
        if self.api_key.is_empty() {
            return Err(AgentError::ModelBackend("GEMINI_API_KEY not configured".to_string()));
        }
        Ok(())
    }

    async fn post(&self, url: &str, query: &[(&str, &str)], body: &GeminiRequest) -> Result<reqwest::Response> {
        let response = self
            .client
            .post(url)
            .query(&[("key", self.api_key.as_str())])
            .query(query)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                error!("Gemini API request failed: {}", e);
                AgentError::ModelBackend(format!("Gemini API request failed: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!(%status, "Gemini API error response: {}", error_text);
            return Err(AgentError::ModelBackend(format!(
                "Gemini API returned {}: {}",
                status, error_text
            )));
        }
        Ok(response)
    }
}

#[async_trait::async_trait]
impl ModelBackend for GeminiBackend {
    fn name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &ModelRequest) -> Result<ModelResponse> {
        self.ensure_key()?;

        let body = build_request(request);
        info!(model = %self.model, tools = request.tools.len(), "Calling Gemini API");

        let response = self.post(&self.url("generateContent"), &[], &body).await?;
        let gemini_response: GeminiResponse = response.json().await.map_err(|e| {
            error!("Failed to parse Gemini response: {}", e);
            AgentError::ModelBackend(format!("Gemini parse error: {}", e))
        })?;

        parse_response(gemini_response)
    }

    async fn stream(&self, prompt: &str, system_prompt: &str) -> Result<TextStream> {
        self.ensure_key()?;

        let body = build_request(&ModelRequest {
            system_prompt: system_prompt.to_string(),
            prompt: prompt.to_string(),
            history: Vec::new(),
            tools: Vec::new(),
        });

        debug!(model = %self.model, "Starting Gemini streaming request");
        let response = self
            .post(&self.url("streamGenerateContent"), &[("alt", "sse")], &body)
            .await?;

        let mut bytes = response.bytes_stream();
        let stream = async_stream::stream! {
            let mut decoder = SseLineDecoder::default();
            while let Some(chunk) = bytes.next().await {
                match chunk {
                    Ok(chunk) => {
                        for line in decoder.push(&chunk) {
                            if let Some(delta) = parse_sse_line(&line) {
                                yield Ok(StreamEvent::Delta(delta));
                            }
                        }
                    }
                    Err(e) => {
                        yield Err(AgentError::ModelBackend(format!("Gemini stream error: {}", e)));
                        return;
                    }
                }
            }
            if let Some(delta) = decoder.finish().as_deref().and_then(parse_sse_line) {
                yield Ok(StreamEvent::Delta(delta));
            }
            yield Ok(StreamEvent::Done);
        };

        Ok(Box::pin(stream))
    }
}

// ============================================================================
// Request / response mapping
// ============================================================================

fn build_request(request: &ModelRequest) -> GeminiRequest {
    let mut contents: Vec<Content> = request.history.iter().map(content_from_turn).collect();
    contents.push(Content {
        role: Some("user".to_string()),
        parts: vec![Part::Text {
            text: request.prompt.clone(),
        }],
    });

    let tools = if request.tools.is_empty() {
        None
    } else {
        Some(vec![GeminiTool {
            function_declarations: request.tools.iter().map(declaration_from_descriptor).collect(),
        }])
    };

    GeminiRequest {
        contents,
        system_instruction: Some(Content {
            role: None,
            parts: vec![Part::Text {
                text: request.system_prompt.clone(),
            }],
        }),
        generation_config: GenerationConfig {
            temperature: 0.3,
            top_p: 0.9,
            top_k: 40,
            max_output_tokens: 1024,
        },
        tools,
    }
}

fn content_from_turn(turn: &ChatTurn) -> Content {
    let role = match turn.role {
        TurnRole::User => "user",
        TurnRole::Assistant => "model",
    };
    Content {
        role: Some(role.to_string()),
        parts: vec![Part::Text {
            text: turn.content.clone(),
        }],
    }
}

fn declaration_from_descriptor(tool: &ToolDescriptor) -> FunctionDeclaration {
    FunctionDeclaration {
        name: tool.name.clone(),
        description: tool.description.clone(),
        parameters: Some(gemini_schema(&tool.input_schema)),
    }
}

/// Strip schema keywords the function-declaration dialect does not accept.
fn gemini_schema(schema: &Value) -> Value {
    match schema {
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(key, _)| !UNSUPPORTED_SCHEMA_KEYS.contains(&key.as_str()))
                .map(|(key, value)| (key.clone(), gemini_schema(value)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(gemini_schema).collect()),
        other => other.clone(),
    }
}

fn parse_response(response: GeminiResponse) -> Result<ModelResponse> {
    if let Some(err) = response.error {
        return Err(AgentError::ModelBackend(format!("Gemini API error: {}", err.message)));
    }

    let candidate = response
        .candidates
        .unwrap_or_default()
        .into_iter()
        .next()
        .ok_or_else(|| AgentError::ModelBackend("No response from Gemini API".to_string()))?;

    if let Some(reason) = candidate.finish_reason.as_deref() {
        if reason != "STOP" {
            warn!(finish_reason = %reason, "Gemini finished early");
        }
    }

    let mut text = String::new();
    let mut tool_calls = Vec::new();
    for part in candidate.content.map(|c| c.parts).unwrap_or_default() {
        match part {
            Part::Text { text: t } => text.push_str(&t),
            Part::FunctionCall { function_call } => tool_calls.push(ToolCallRequest {
                name: function_call.name,
                arguments: function_call.args.unwrap_or_else(|| Value::Object(Default::default())),
            }),
        }
    }

    // Text that accompanies function calls is narration, not an answer.
    let answer = if tool_calls.is_empty() && !text.trim().is_empty() {
        Some(text)
    } else {
        if !text.trim().is_empty() {
            debug!("Dropping narration that accompanied tool calls");
        }
        None
    };

    Ok(ModelResponse { answer, tool_calls })
}

/// Splits a byte stream into SSE lines. Bytes are only decoded once a full
/// line is buffered, so multi-byte characters may straddle chunks.
#[derive(Debug, Default)]
struct SseLineDecoder {
    buffer: Vec<u8>,
}

impl SseLineDecoder {
    fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(newline) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=newline).collect();
            lines.push(String::from_utf8_lossy(&line).trim_end().to_string());
        }
        lines
    }

    fn finish(self) -> Option<String> {
        let rest = String::from_utf8_lossy(&self.buffer).trim_end().to_string();
        (!rest.is_empty()).then_some(rest)
    }
}

fn parse_sse_line(line: &str) -> Option<String> {
    let data = line.strip_prefix("data:")?.trim();
    if data.is_empty() || data == "[DONE]" {
        return None;
    }
    match serde_json::from_str::<GeminiResponse>(data) {
        Ok(chunk) => {
            let text: String = chunk
                .candidates
                .unwrap_or_default()
                .into_iter()
                .next()
                .and_then(|c| c.content)
                .map(|c| {
                    c.parts
                        .into_iter()
                        .filter_map(|p| match p {
                            Part::Text { text } => Some(text),
                            Part::FunctionCall { .. } => None,
                        })
                        .collect()
                })
                .unwrap_or_default();
            (!text.is_empty()).then_some(text)
        }
        Err(e) => {
            warn!(error = %e, "Failed to parse streaming chunk");
            None
        }
    }
}

// ============================================================================
// API Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    generation_config: GenerationConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<GeminiTool>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum Part {
    Text {
        text: String,
    },
    FunctionCall {
        #[serde(rename = "functionCall")]
        function_call: FunctionCall,
    },
}

#[derive(Debug, Serialize, Deserialize)]
struct FunctionCall {
    name: String,
    #[serde(default)]
    args: Option<Value>,
}

#[derive(Debug, Serialize)]
struct GeminiTool {
    function_declarations: Vec<FunctionDeclaration>,
}

#[derive(Debug, Serialize)]
struct FunctionDeclaration {
    name: String,
    description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    parameters: Option<Value>,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
    top_k: i32,
    max_output_tokens: i32,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    candidates: Option<Vec<Candidate>>,
    error: Option<GeminiError>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    message: String,
}
