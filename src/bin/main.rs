use finlit_agent::{
    agent::{Agent, AgentConfig, AgentEvent, StreamPacing},
    clock::SystemClock,
    config::AppConfig,
    export::CsvBudgetExporter,
    knowledge::KeywordKnowledgeBase,
    llm::{GeminiBackend, ModelBackend, ModelResponse, ScriptedModel},
    models::ConversationId,
    store::{ConversationStore, InMemoryConversationStore},
    tools::create_default_registry,
};
use futures::StreamExt;
use serde_json::json;
use std::io::Write;
use std::sync::Arc;
use tracing::info;

/// Canned model turns used when no API key is configured.
fn offline_model() -> ScriptedModel {
    ScriptedModel::new(vec![
        ModelResponse::answer("Thanks! With $2,000 a month you can start from a simple student budget."),
        ModelResponse::tool_call("calculate_loan_payment", json!({"principal": 10000, "annual_rate": 5.0, "years": 10})),
        ModelResponse::answer("A $10,000 loan at 5% over 10 years costs about $106.07 a month."),
    ])
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    info!("Financial literacy agent demo starting");

    let config = AppConfig::from_env()?;
    let model: Arc<dyn ModelBackend> = match config.gemini_api_key.as_deref() {
        Some(key) => Arc::new(GeminiBackend::new(key, config.gemini_model.as_str())?),
        None => Arc::new(offline_model()),
    };

    // Create components
    let store = Arc::new(InMemoryConversationStore::new());
    let exporter = Arc::new(CsvBudgetExporter::new(config.exports_dir.clone()));
    let registry = Arc::new(create_default_registry(Arc::new(SystemClock), exporter)?);
    let agent_config = AgentConfig {
        pacing: StreamPacing::immediate(),
        ..AgentConfig::from(&config)
    };
    let agent = Arc::new(
        Agent::new(model, registry, store.clone(), agent_config)
            .with_knowledge(Arc::new(KeywordKnowledgeBase::new())),
    );

    let conversation_id = ConversationId::new();
    let turns = [
        "hello",
        "my income is 2000 and my rent is 700",
        "what time is it",
        "how much would a $10,000 loan at 5% for 10 years cost per month?",
    ];

    for turn in turns {
        println!("\nYou: {}", turn);
        print!("Bot: ");
        let mut events = Box::pin(agent.process_user_message(conversation_id, turn.to_string(), "Demo".to_string()));
        while let Some(event) = events.next().await {
            match event {
                AgentEvent::Token(token) => print!("{}", token),
                AgentEvent::Done { .. } => println!(),
                AgentEvent::Error(message) => println!("{}", message),
            }
            std::io::stdout().flush()?;
        }
    }

    if let Some(record) = store.load(conversation_id).await? {
        println!("\n=== FINANCIAL PROFILE ===");
        println!("{}", record.financial_profile.summary());
        println!("Completeness: {:.0}%", record.financial_profile.completeness() * 100.0);
    }

    let audit = store.tool_calls(conversation_id).await?;
    println!("\n=== TOOL CALLS ===");
    for call in audit {
        println!("  {} [{}]", call.tool_name, call.status.as_str());
    }

    Ok(())
}
