//! Binary entry point: CLI dispatch, subsystem wiring, and the HTTP server
//! (§6). `serve` is the default subcommand; `validate-config` and
//! `reload-rules` are operator conveniences that skip the network stack.

mod auth;
mod cli;
mod config;
mod logging;
mod ollama_admin;
mod routes;
mod state;

use anyhow::Context;
use bridge::types::now_millis;
use clap::Parser;
use cli::{Cli, Command};
use config::Config;
use ollama_admin::PullTracker;
use state::AppState;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_tracing();

    let cli = Cli::parse();
    let config_path = cli::config_path();

    match cli.command.unwrap_or(Command::Serve) {
        Command::ValidateConfig => validate_config(&config_path),
        Command::ReloadRules => reload_rules(&config_path),
        Command::Serve => serve(&config_path).await,
    }
}

fn validate_config(config_path: &str) -> anyhow::Result<()> {
    let config = Config::load(config_path);
    let issues = config.validate();
    if issues.is_empty() {
        println!("configuration OK");
        return Ok(());
    }
    for issue in &issues {
        println!("{issue}");
    }
    let has_errors = issues.iter().any(|issue| issue.severity == config::ConfigSeverity::Error);
    if has_errors {
        anyhow::bail!("{} configuration error(s) found", issues.len());
    }
    Ok(())
}

fn reload_rules(config_path: &str) -> anyhow::Result<()> {
    let config = Config::load(config_path);
    let rule_store = rule_engine::RuleStore::load(&config.rules.rules_path).context("failed to load rule store")?;
    rule_store.reload().context("failed to reload rule files")?;
    println!("rules reloaded from {}", config.rules.rules_path.display());
    Ok(())
}

async fn serve(config_path: &str) -> anyhow::Result<()> {
    let config = Config::load(config_path);
    for issue in config.validate() {
        tracing::warn!(%issue, "configuration issue");
    }
    let config = Arc::new(config);

    let rule_store =
        Arc::new(rule_engine::RuleStore::load(&config.rules.rules_path).context("failed to load rule store")?);
    let model_rules = Arc::new(rule_engine::ModelRuleManager::new());
    let events =
        Arc::new(rule_engine::EventLogger::load(&config.audit.audit_log_path).context("failed to load event log")?);
    let api_keys =
        Arc::new(auth::ApiKeyStore::load(&config.security.api_keys_path).context("failed to load api keys")?);
    let rate_limiter = Arc::new(auth::RateLimiter::new());

    let aggregator_config = bridge::AggregatorConfig {
        context_aware_detection: config.security.enable_context_aware_detection,
        model_specific_detection: config.security.enable_model_specific_detection,
    };
    let aggregator = Arc::new(bridge::Aggregator::new(
        Arc::clone(&rule_store),
        Arc::clone(&model_rules),
        Arc::clone(&events),
        aggregator_config,
    ));

    let conversations = Arc::new(bridge::ConversationTracker::new(30 * 60 * 1000));

    let registry = state::build_provider_registry(&config);
    let provider_registry = Arc::new(registry.clone());
    let forwarder = Arc::new(bridge::UpstreamForwarder::new(registry));

    let queue = Arc::new(bridge::PriorityQueue::new(config.proxy.request_queue_size));
    let workers = Arc::new(bridge::WorkerPool::new(10, config.proxy.max_concurrent_requests));
    let interceptor = Arc::new(bridge::Interceptor::new(
        Arc::clone(&aggregator),
        Arc::clone(&forwarder),
        Arc::clone(&conversations),
        queue,
        workers,
    ));

    let state = AppState {
        config: Arc::clone(&config),
        rule_store,
        model_rules,
        events,
        aggregator,
        conversations: Arc::clone(&conversations),
        provider_registry,
        interceptor,
        api_keys,
        rate_limiter,
        pull_tracker: PullTracker::new(),
        http_client: reqwest::Client::new(),
        started_at_millis: now_millis(),
    };

    spawn_conversation_pruner(Arc::clone(&conversations));

    let app = routes::build_router(state);
    let addr: SocketAddr = format!("{}:{}", config.proxy.host, config.proxy.port)
        .parse()
        .context("invalid proxy.host/proxy.port combination")?;

    tracing::info!(%addr, "starting security gateway");
    let listener = tokio::net::TcpListener::bind(addr).await.context("failed to bind listener")?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .await
        .context("server error")?;

    Ok(())
}

/// Evicts idle conversations on a fixed interval so the tracker doesn't grow
/// unbounded across a long-running process (§4.12 `conversationTtl`).
fn spawn_conversation_pruner(conversations: Arc<bridge::ConversationTracker>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        loop {
            interval.tick().await;
            conversations.prune(now_millis());
        }
    });
}
