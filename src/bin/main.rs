//! Terminal chat against the orchestrator. Uses the sandbox bank unless a
//! Paystack key is configured.

use banking_chat_orchestrator::{
    agent::Orchestrator,
    banking::{BankingApi, PaystackClient, SandboxBank},
    config::AgentConfig,
    memory::build_pattern_store,
    models::SessionId,
    state::InMemorySessionStore,
};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing (quiet by default so replies stay readable)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let config = AgentConfig::from_env()?;

    let bank: Arc<dyn BankingApi> = match &config.paystack_secret_key {
        Some(key) => Arc::new(PaystackClient::new(key, config.paystack_base_url.as_deref())?),
        None => Arc::new(SandboxBank::demo()),
    };
    let sessions = Arc::new(InMemorySessionStore::new(config.history_window));
    let patterns = build_pattern_store(config.database_url.as_deref());
    let orchestrator = Orchestrator::new(bank, sessions, patterns, &config);

    let user = std::env::var("USER").unwrap_or_else(|_| "local".to_string());
    let session_id = SessionId::new("cli", &user);
    info!(session_id = %session_id, "Chat session started");

    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    stdout
        .write_all(b"Banking assistant. Type \"help\" for examples, \"quit\" to exit.\n> ")
        .await?;
    stdout.flush().await?;

    while let Some(line) = lines.next_line().await? {
        let text = line.trim();
        if text.eq_ignore_ascii_case("quit") || text.eq_ignore_ascii_case("exit") {
            break;
        }
        if !text.is_empty() {
            let response = orchestrator.handle_message(&session_id, text).await;
            stdout.write_all(format!("{}\n", response.text).as_bytes()).await?;
        }
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;
    }

    Ok(())
}
