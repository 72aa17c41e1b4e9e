//! Agent core - the bounded reasoning loop
//!
//! INIT → FAST_PATH_CHECK → REASONING(step 1..max) → FINALIZE → DONE
//!
//! One turn per call. The user message and extracted profile are persisted
//! first; then either a fast-path tool answers directly or the model is
//! consulted step by step, with requested tools executed in between. The
//! final response is persisted before any token is emitted.

pub mod prompt;
pub mod state;

use futures::Stream;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::audit::compute_prompt_hash;
use crate::classifier::{FastPath, FastPathRules};
use crate::clock::{Clock, SystemClock};
use crate::config::AppConfig;
use crate::error::AgentError;
use crate::knowledge::KnowledgeSource;
use crate::llm::{ModelBackend, ModelRequest};
use crate::models::{
    ConversationId, ConversationRecord, Message, MessageType, Sender, ToolCallRecord, DEFAULT_MESSAGE_RETENTION,
};
use crate::profile::{llm_fallback, ProfileExtractor};
use crate::store::ConversationStore;
use crate::tools::utility::{DateTimeOutput, GeneralInfoOutput};
use crate::tools::ToolRegistry;
use crate::Result;

use prompt::{build_reasoning_prompt, history_turns, PromptContext, SYSTEM_PROMPT};
use state::{AgentState, StopReason};

pub const STEP_LIMIT_MESSAGE: &str = "I've reached the maximum reasoning steps. Let me provide you with the best answer I can based on what I've analyzed.";
pub const DIFFICULTY_MESSAGE: &str = "I'm having trouble processing your request. Could you please rephrase your question or provide more details?";

/// How the final response is chunked and paced on the way out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamUnit {
    Character,
    Whole,
}

#[derive(Debug, Clone, Copy)]
pub struct StreamPacing {
    pub unit: StreamUnit,
    pub delay: Duration,
}

impl StreamPacing {
    /// Whole response in one chunk, no delay.
    pub fn immediate() -> Self {
        Self {
            unit: StreamUnit::Whole,
            delay: Duration::ZERO,
        }
    }

    pub fn chunks(&self, text: &str) -> Vec<String> {
        match self.unit {
            StreamUnit::Character => text.chars().map(String::from).collect(),
            StreamUnit::Whole if text.is_empty() => Vec::new(),
            StreamUnit::Whole => vec![text.to_string()],
        }
    }
}

impl Default for StreamPacing {
    fn default() -> Self {
        Self {
            unit: StreamUnit::Character,
            delay: Duration::from_millis(10),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub max_steps: u32,
    pub timeout: Duration,
    /// Transcript messages loaded into the model context.
    pub history_limit: usize,
    pub knowledge_limit: usize,
    pub message_retention: usize,
    pub pacing: StreamPacing,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_steps: 5,
            timeout: Duration::from_secs(30),
            history_limit: 10,
            knowledge_limit: 3,
            message_retention: DEFAULT_MESSAGE_RETENTION,
            pacing: StreamPacing::default(),
        }
    }
}

impl From<&AppConfig> for AgentConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            max_steps: config.max_steps,
            timeout: config.timeout,
            history_limit: config.history_limit,
            message_retention: config.message_retention,
            pacing: StreamPacing {
                unit: StreamUnit::Character,
                delay: config.stream_delay,
            },
            ..Self::default()
        }
    }
}

/// Events emitted to the transport, in order: tokens, then exactly one `Done` or `Error`.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentEvent {
    Token(String),
    Done { conversation_id: ConversationId },
    Error(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    Answered,
    FastPath(FastPath),
    StepLimit,
    Timeout,
    Failed,
}

impl TurnOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Answered => "answered",
            Self::FastPath(path) => path.as_str(),
            Self::StepLimit => "step_limit",
            Self::Timeout => "timeout",
            Self::Failed => "error",
        }
    }
}

#[derive(Debug, Clone)]
pub struct TurnResult {
    pub conversation_id: ConversationId,
    pub response: String,
    pub outcome: TurnOutcome,
    pub steps: u32,
}

pub struct Agent {
    model: Arc<dyn ModelBackend>,
    tools: Arc<ToolRegistry>,
    store: Arc<dyn ConversationStore>,
    knowledge: Option<Arc<dyn KnowledgeSource>>,
    clock: Arc<dyn Clock>,
    extractor: ProfileExtractor,
    fast_path: FastPathRules,
    config: AgentConfig,
    conversation_locks: Mutex<HashMap<ConversationId, Arc<Mutex<()>>>>,
}

impl Agent {
    pub fn new(
        model: Arc<dyn ModelBackend>,
        tools: Arc<ToolRegistry>,
        store: Arc<dyn ConversationStore>,
        config: AgentConfig,
    ) -> Self {
        Self {
            model,
            tools,
            store,
            knowledge: None,
            clock: Arc::new(SystemClock),
            extractor: ProfileExtractor::new(),
            fast_path: FastPathRules::default(),
            config,
            conversation_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_knowledge(mut self, knowledge: Arc<dyn KnowledgeSource>) -> Self {
        self.knowledge = Some(knowledge);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_fast_path_rules(mut self, rules: FastPathRules) -> Self {
        self.fast_path = rules;
        self
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Run one turn and stream the response.
    ///
    /// The stream owns a handle to the agent so it can outlive the caller's borrow.
    pub fn process_user_message(
        self: &Arc<Self>,
        conversation_id: ConversationId,
        message: String,
        user_name: String,
    ) -> impl Stream<Item = AgentEvent> + Send + 'static {
        let agent = Arc::clone(self);

        async_stream::stream! {
            match agent.run_turn(conversation_id, &message, &user_name).await {
                Ok(turn) => {
                    let pacing = agent.config.pacing;
                    for chunk in pacing.chunks(&turn.response) {
                        yield AgentEvent::Token(chunk);
                        if !pacing.delay.is_zero() {
                            tokio::time::sleep(pacing.delay).await;
                        }
                    }
                    yield AgentEvent::Done { conversation_id: turn.conversation_id };
                }
                Err(e) => {
                    error!(conversation_id = %conversation_id, error = %e, "Turn failed");
                    yield AgentEvent::Error(failure_sentence(&e));
                }
            }
        }
    }

    /// Run one turn to completion and return the persisted response.
    pub async fn run_turn(&self, conversation_id: ConversationId, message: &str, user_name: &str) -> Result<TurnResult> {
        let lock = self.conversation_lock(conversation_id).await;
        let result = {
            let _guard = lock.lock().await;
            self.run_locked_turn(conversation_id, message, user_name).await
        };
        drop(lock);
        self.release_conversation_lock(conversation_id).await;
        result
    }

    async fn run_locked_turn(&self, conversation_id: ConversationId, message: &str, user_name: &str) -> Result<TurnResult> {
        // === INIT ===
        let now = self.clock.now();
        let mut record = self
            .store
            .load_or_create(Some(conversation_id), user_name, now)
            .await?;
        record.push_message(
            Message::new(conversation_id, Sender::User, message, MessageType::Text, now),
            self.config.message_retention,
        );

        let extraction = self.extractor.apply(&mut record.financial_profile, message, now);
        if extraction.new_data_captured {
            info!(
                conversation_id = %conversation_id,
                completeness = record.financial_profile.completeness(),
                "Financial profile updated"
            );
        }

        self.store.save(&record).await?;

        let mut state = AgentState::new(conversation_id, message, self.config.max_steps, self.config.timeout);

        // === FAST_PATH_CHECK ===
        let mut fast = None;
        if let Some(path) = self.fast_path.classify(message) {
            fast = self
                .try_fast_path(path, conversation_id, message)
                .await?
                .map(|response| (response, TurnOutcome::FastPath(path)));
        }

        // === REASONING ===
        let (response, outcome) = match fast {
            Some(answered) => answered,
            None => {
                // Only turns that reach the model may spend model calls on the profile.
                if llm_fallback::fill_missing_for_sheet(self.model.as_ref(), &mut record.financial_profile, message, now).await {
                    info!(
                        conversation_id = %conversation_id,
                        completeness = record.financial_profile.completeness(),
                        "Financial profile completed by the model"
                    );
                    self.store.save(&record).await?;
                }
                self.reason(&mut state, &record).await?
            }
        };

        // === FINALIZE ===
        let now = self.clock.now();
        record.push_message(
            Message::new(conversation_id, Sender::Bot, response.as_str(), MessageType::Text, now),
            self.config.message_retention,
        );
        record.metadata.turns += 1;
        record.metadata.last_route = Some(outcome.as_str().to_string());
        record.metadata.last_steps = state.current_step;
        record.metadata.last_prompt_hash = state.last_prompt_hash.clone();
        self.store.save(&record).await?;

        info!(
            conversation_id = %conversation_id,
            outcome = outcome.as_str(),
            steps = state.current_step,
            elapsed_ms = state.elapsed().as_millis() as u64,
            "Turn complete"
        );

        Ok(TurnResult {
            conversation_id,
            response,
            outcome,
            steps: state.current_step,
        })
    }

    async fn conversation_lock(&self, id: ConversationId) -> Arc<Mutex<()>> {
        let mut locks = self.conversation_locks.lock().await;
        Arc::clone(locks.entry(id).or_default())
    }

    /// Drop the per-conversation lock once no turn holds or waits on it.
    async fn release_conversation_lock(&self, id: ConversationId) {
        let mut locks = self.conversation_locks.lock().await;
        if locks.get(&id).is_some_and(|lock| Arc::strong_count(lock) == 1) {
            locks.remove(&id);
        }
    }

    /// Forget bookkeeping for a deleted conversation.
    pub async fn forget_conversation(&self, id: ConversationId) {
        self.release_conversation_lock(id).await;
    }

    /// Answer directly through one tool; `None` hands the turn to the reasoning loop.
    async fn try_fast_path(&self, path: FastPath, conversation_id: ConversationId, message: &str) -> Result<Option<String>> {
        debug!(conversation_id = %conversation_id, route = path.as_str(), "Fast path matched");

        let output = match self
            .invoke_tool(conversation_id, path.tool_name(), path.tool_arguments(message))
            .await
        {
            Ok(output) => output,
            Err(e) if e.is_tool_error() => {
                warn!(conversation_id = %conversation_id, error = %e, "Fast path tool failed, falling back to reasoning");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let response = match path {
            FastPath::DateTime => serde_json::from_value::<DateTimeOutput>(output).ok().map(|o| o.reply()),
            FastPath::General => serde_json::from_value::<GeneralInfoOutput>(output)
                .ok()
                .map(|o| o.information),
        };
        Ok(response)
    }

    async fn reason(&self, state: &mut AgentState, record: &ConversationRecord) -> Result<(String, TurnOutcome)> {
        if let Some(knowledge) = &self.knowledge {
            match knowledge.search(&state.user_message, self.config.knowledge_limit).await {
                Ok(chunks) => state.retrieved_chunks = chunks,
                Err(e) => warn!(conversation_id = %state.conversation_id, error = %e, "Knowledge retrieval failed"),
            }
        }

        let context = PromptContext::from_record(record, self.config.history_limit);
        let history = history_turns(record, self.config.history_limit);
        let tools = self.tools.descriptors();

        loop {
            if let Some(reason) = state.stop_reason() {
                warn!(
                    conversation_id = %state.conversation_id,
                    steps = state.current_step,
                    ?reason,
                    "Reasoning stopped without a final answer"
                );
                return Ok(match reason {
                    StopReason::StepLimit => (STEP_LIMIT_MESSAGE.to_string(), TurnOutcome::StepLimit),
                    StopReason::Timeout => (DIFFICULTY_MESSAGE.to_string(), TurnOutcome::Timeout),
                });
            }

            state.current_step += 1;

            let prompt = build_reasoning_prompt(state, &context);
            let prompt_hash = compute_prompt_hash(SYSTEM_PROMPT, &prompt);
            debug!(
                conversation_id = %state.conversation_id,
                step = state.current_step,
                prompt_hash = %prompt_hash,
                "Reasoning step"
            );
            state.last_prompt_hash = Some(prompt_hash);

            let request = ModelRequest {
                system_prompt: SYSTEM_PROMPT.to_string(),
                prompt,
                history: history.clone(),
                tools: tools.clone(),
            };

            let response = match self.model.complete(&request).await {
                Ok(response) => response,
                Err(e) => {
                    error!(conversation_id = %state.conversation_id, step = state.current_step, error = %e, "Model call failed");
                    return Ok((failure_sentence(&e), TurnOutcome::Failed));
                }
            };

            for call in &response.tool_calls {
                let result = match self
                    .invoke_tool(state.conversation_id, &call.name, call.arguments.clone())
                    .await
                {
                    Ok(output) => output,
                    // Tool failures go back to the model as data.
                    Err(e) if e.is_tool_error() => json!({ "error": e.user_message() }),
                    Err(e) => return Err(e),
                };
                state.add_tool_result(call.name.as_str(), result, self.clock.now());
            }

            if let Some(answer) = response.answer_text() {
                return Ok((answer.to_string(), TurnOutcome::Answered));
            }
        }
    }

    /// Execute a tool and record it in the audit trail, success or failure.
    async fn invoke_tool(&self, conversation_id: ConversationId, name: &str, args: Value) -> Result<Value> {
        let mut record = ToolCallRecord::pending(conversation_id, name, args.clone(), self.clock.now());
        self.store.save_tool_call(&record).await?;

        let started = Instant::now();
        match self.tools.execute_tool(name, args).await {
            Ok(outcome) => {
                let seconds = outcome.execution_time.as_secs_f64();
                record.succeed(outcome.output.clone(), seconds);
                self.store.save_tool_call(&record).await?;
                info!(conversation_id = %conversation_id, tool_name = %name, seconds, "Tool call succeeded");
                Ok(outcome.output)
            }
            Err(e) => {
                record.fail(e.user_message(), started.elapsed().as_secs_f64());
                self.store.save_tool_call(&record).await?;
                warn!(conversation_id = %conversation_id, tool_name = %name, error = %e, "Tool call failed");
                Err(e)
            }
        }
    }
}

fn failure_sentence(error: &AgentError) -> String {
    format!(
        "I encountered an error while processing your request: {}",
        error.user_message()
    )
}
