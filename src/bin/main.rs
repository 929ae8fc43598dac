use std::process::ExitCode;
use std::sync::Arc;

use genie_relay::config::constants::{
    BASE_URL_ENV, CONFIG_PATH_ENV, DEFAULT_BASE_URL, HEARTBEAT_SERVICE_ENV, LOG_FORMAT_ENV,
    METRICS_PORT_ENV,
};
use genie_relay::ops::telemetry;
use genie_relay::{AgentConfig, AlertDispatcher, AlertGateway};

#[tokio::main]
async fn main() -> ExitCode {
    // * Initialize Telemetry
    match std::env::var(LOG_FORMAT_ENV).as_deref() {
        Ok("pretty") => telemetry::init_tracing_pretty(),
        _ => telemetry::init_tracing(),
    }

    let agent = match std::env::var(CONFIG_PATH_ENV) {
        Ok(path) => match AgentConfig::load(&path) {
            Ok(agent) => agent,
            Err(e) => {
                tracing::error!(error = %e, "Failed to load agent config");
                return ExitCode::FAILURE;
            }
        },
        Err(_) => AgentConfig::default(),
    };

    // * The environment key wins over the file, resolved once here
    let config = agent.gateway.clone().with_env_override();

    let base_url = std::env::var(BASE_URL_ENV)
        .ok()
        .or(agent.base_url.clone())
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

    let gateway = match AlertGateway::with_base_url(&base_url) {
        Ok(gateway) => Arc::new(gateway),
        Err(e) => {
            tracing::error!(error = %e, base_url = %base_url, "Invalid alerting endpoint");
            return ExitCode::FAILURE;
        }
    };
    let dispatcher = AlertDispatcher::new(Arc::clone(&gateway));

    let metrics = match std::env::var(METRICS_PORT_ENV).ok().map(|p| p.parse::<u16>()) {
        Some(Ok(port)) => Some(telemetry::start_metrics_server(port).await),
        Some(Err(e)) => {
            tracing::warn!(error = %e, "Ignoring invalid metrics port");
            None
        }
        None => None,
    };

    tracing::info!(base_url = %base_url, "Alert relay initialized");

    let service = std::env::var(HEARTBEAT_SERVICE_ENV)
        .ok()
        .or(agent.heartbeat_service.clone());
    if let Some(service) = service {
        dispatcher.send_heartbeat(&service, &config).await;
    }

    gateway.ensure_cache(&config, false).await;
    tracing::info!(
        cache_state = ?gateway.cache().state(),
        open_alerts = gateway.cache().len(),
        "Open alert cache warmed"
    );

    if let Some(handle) = metrics {
        handle.shutdown();
    }

    ExitCode::SUCCESS
}
