use banking_chat_orchestrator::{
    agent::Orchestrator,
    api::start_server,
    banking::{BankingApi, PaystackClient, SandboxBank},
    config::AgentConfig,
    memory::build_pattern_store,
    state::InMemorySessionStore,
};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load environment variables
    let config = AgentConfig::from_env()?;

    info!("🚀 Banking Chat Orchestrator - API Server");
    info!("📍 Port: {}", config.port);

    let bank: Arc<dyn BankingApi> = match &config.paystack_secret_key {
        Some(key) => {
            info!("Banking backend: paystack");
            Arc::new(PaystackClient::new(key, config.paystack_base_url.as_deref())?)
        }
        None => {
            warn!("⚠️  PAYSTACK_SECRET_KEY not set, using the sandbox bank");
            Arc::new(SandboxBank::demo())
        }
    };
    let sessions = Arc::new(InMemorySessionStore::new(config.history_window));
    let patterns = build_pattern_store(config.database_url.as_deref());

    let orchestrator = Arc::new(Orchestrator::new(bank, sessions, patterns, &config));

    info!("✅ Orchestrator initialized");
    info!("📡 Starting API server...");

    start_server(orchestrator, config.port).await?;

    Ok(())
}
