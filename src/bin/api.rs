use finlit_agent::{
    agent::{Agent, AgentConfig},
    api::{start_server, ApiState},
    clock::SystemClock,
    config::AppConfig,
    export::CsvBudgetExporter,
    knowledge::KeywordKnowledgeBase,
    llm::{GeminiBackend, ModelBackend, ModelResponse, ScriptedModel},
    store::build_store,
    tools::create_default_registry,
};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const OFFLINE_REPLY: &str = "I'm running without a language model right now, so I can only answer date/time questions and greetings. Set GEMINI_API_KEY to enable full answers.";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AppConfig::from_env()?;

    info!("🚀 Financial Literacy Agent - API Server");
    info!("📍 Port: {}", config.port);

    let model: Arc<dyn ModelBackend> = match config.gemini_api_key.as_deref() {
        Some(key) => Arc::new(GeminiBackend::new(key, config.gemini_model.as_str())?),
        None => {
            warn!("⚠️  GEMINI_API_KEY not set, using the offline model");
            Arc::new(ScriptedModel::repeating(ModelResponse::answer(OFFLINE_REPLY)))
        }
    };

    // Create components
    let store = build_store(config.database_url.as_deref());
    let exporter = Arc::new(CsvBudgetExporter::new(config.exports_dir.clone()));
    let registry = Arc::new(create_default_registry(Arc::new(SystemClock), exporter)?);
    info!("🧰 Tools: {}", registry.list().join(", "));

    let agent = Arc::new(
        Agent::new(model, registry.clone(), store.clone(), AgentConfig::from(&config))
            .with_knowledge(Arc::new(KeywordKnowledgeBase::new())),
    );

    info!("✅ Agent initialized (store: {})", store.backend_name());
    info!("📡 Starting API server...");

    let state = ApiState {
        agent,
        store,
        registry,
        exports_dir: config.exports_dir.clone(),
    };
    start_server(state, config.port).await?;

    Ok(())
}
