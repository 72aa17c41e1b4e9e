//! Financial Literacy Agent
//!
//! A conversational financial-literacy assistant for students that:
//! - Extracts a structured financial profile from free text
//! - Answers trivial requests through deterministic fast paths
//! - Runs a bounded reasoning loop over a language model and typed tools
//! - Audits every tool invocation
//! - Streams responses over Server-Sent Events
//!
//! TURN LOOP:
//! INPUT → PROFILE → FAST_PATH? → REASON ⇄ TOOLS → FINALIZE → STREAM

pub mod agent;
pub mod api;
pub mod audit;
pub mod calculators;
pub mod classifier;
pub mod clock;
pub mod config;
pub mod error;
pub mod export;
pub mod guardrails;
pub mod knowledge;
pub mod llm;
pub mod models;
pub mod profile;
pub mod store;
pub mod tools;

pub use error::Result;

// Re-export common types
pub use agent::{Agent, AgentConfig, AgentEvent};
pub use models::*;
pub use profile::FinancialProfile;
