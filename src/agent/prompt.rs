//! Reasoning prompt assembly
//!
//! The prompt is a pure function of the conversation record and the turn
//! state, so identical inputs give byte-identical prompts.

use super::state::AgentState;
use crate::llm::{ChatTurn, TurnRole};
use crate::models::{ConversationRecord, Message, Sender};

pub const SYSTEM_PROMPT: &str = "You are pgpfinlitbot, a friendly and knowledgeable financial literacy assistant for students. \
You help users understand personal finance, budgeting, debt management, saving, and investing.

Your personality:
- Warm, encouraging, and educational
- Patient with beginners and clear in explanations
- Focus on building financial literacy skills
- Use real-world examples when helpful

Your capabilities:
- Answer financial questions directly
- Use specialized tools for calculations and analysis
- Use the user's financial profile for personalized advice
- Ask for clarification when necessary

Important guidelines:
1. Always respond naturally and conversationally
2. Don't repeat greetings if the conversation has already started
3. Use tools when calculations or analysis are needed
4. Provide clear, actionable advice
5. Be encouraging and supportive of financial goals
6. If you don't know something, be honest about it";

/// Transcript lines shown inside the prompt itself.
const PROMPT_TRANSCRIPT_TURNS: usize = 5;

/// Conversation-level inputs to the prompt, captured once per turn.
#[derive(Debug, Clone)]
pub struct PromptContext {
    pub user_name: String,
    pub completeness: f64,
    pub profile_summary: String,
    /// (speaker, content), oldest first, current message included.
    pub recent: Vec<(String, String)>,
}

impl PromptContext {
    pub fn from_record(record: &ConversationRecord, history_limit: usize) -> Self {
        Self {
            user_name: record.user_name.clone(),
            completeness: record.financial_profile.completeness(),
            profile_summary: record.financial_profile.summary(),
            recent: record
                .recent_messages(history_limit)
                .iter()
                .map(|m| (m.role_label().to_string(), m.content.clone()))
                .collect(),
        }
    }
}

pub fn build_reasoning_prompt(state: &AgentState, context: &PromptContext) -> String {
    let mut prompt = String::new();

    prompt.push_str("Current conversation context:\n");
    prompt.push_str(&format!("User: {}\n", context.user_name));
    prompt.push_str(&format!(
        "Financial profile completeness: {:.1}%\n\n",
        context.completeness * 100.0
    ));

    if !context.recent.is_empty() {
        prompt.push_str("Recent conversation:\n");
        let skip = context.recent.len().saturating_sub(PROMPT_TRANSCRIPT_TURNS);
        for (speaker, content) in context.recent.iter().skip(skip) {
            prompt.push_str(&format!("{}: {}\n", speaker, content));
        }
        prompt.push('\n');
    }

    prompt.push_str(&context.profile_summary);
    prompt.push_str("\n\n");

    prompt.push_str(&format!("Current user message: {}\n\n", state.user_message));

    if !state.tool_results.is_empty() {
        prompt.push_str("Previous tool results:\n");
        for entry in &state.tool_results {
            let rendered = serde_json::to_string_pretty(&entry.result).unwrap_or_else(|_| entry.result.to_string());
            prompt.push_str(&format!("- {}: {}\n", entry.tool, rendered));
        }
        prompt.push('\n');
    }

    if !state.retrieved_chunks.is_empty() {
        prompt.push_str("Relevant knowledge:\n");
        for chunk in &state.retrieved_chunks {
            prompt.push_str(&format!("- {}: {}\n", chunk.title, chunk.content));
        }
        prompt.push('\n');
    }

    if context.recent.len() <= 2 {
        prompt.push_str("This appears to be the start of a conversation. Provide a warm, helpful response.");
    } else {
        prompt.push_str("Continue the conversation naturally. Don't repeat greetings or introductions.");
    }

    prompt.push_str(
        "\n\nProvide a helpful, conversational response. If you need to use a tool, do so. \
         If you have a complete answer, provide it directly.",
    );

    prompt
}

/// Earlier user/bot messages as model chat turns. The current message is
/// excluded (it is carried by the prompt) and system messages are dropped.
pub fn history_turns(record: &ConversationRecord, history_limit: usize) -> Vec<ChatTurn> {
    let messages = record.recent_messages(history_limit + 1);
    let earlier: &[Message] = match messages.split_last() {
        Some((last, rest)) if last.sender == Sender::User => rest,
        _ => messages,
    };

    earlier
        .iter()
        .filter_map(|m| {
            let role = match m.sender {
                Sender::User => TurnRole::User,
                Sender::Bot => TurnRole::Assistant,
                Sender::System => return None,
            };
            Some(ChatTurn {
                role,
                content: m.content.clone(),
            })
        })
        .collect()
}
