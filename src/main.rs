use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::signal;
use tracing::{info, warn};

use toolgate::api::routes::{create_router, AppState};
use toolgate::audit::{AuditSink, JsonLinesSink};
use toolgate::config::Config;
use toolgate::observability::{init_tracing, MetricsRegistry};
use toolgate::policy::PolicyEngine;
use toolgate::proxy::Gateway;
use toolgate::ratelimit::RateLimiter;
use toolgate::upstream::HttpUpstream;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse configuration
    let config = Config::parse();

    // Initialize tracing
    init_tracing(&config.log_level, config.log_json);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting toolgate"
    );

    let metrics = Arc::new(MetricsRegistry::new());

    // Load policies in order; the first one drives default decisions
    let engine = Arc::new(PolicyEngine::with_mode(config.evaluation_mode()));
    for path in &config.policies {
        engine
            .load_file(path)
            .with_context(|| format!("failed to load policy {}", path.display()))?;
        metrics.record_policy_load();
    }
    if config.policies.is_empty() {
        warn!("No policies configured, every tool call will be denied");
    }

    // Rate limiter with background eviction of idle buckets
    let limiter = Arc::new(RateLimiter::new(config.rate_limit()));
    let sweep_handle = if config.limiter_sweep_secs > 0 {
        Some(limiter.spawn_cleanup(config.limiter_sweep_interval()))
    } else {
        None
    };

    // Audit sink
    let auditor: Arc<dyn AuditSink> = match &config.audit_log {
        Some(path) => {
            let sink = JsonLinesSink::open(path)
                .with_context(|| format!("failed to open audit log {}", path.display()))?;
            info!(path = sink.description(), "Audit log enabled");
            Arc::new(sink)
        }
        None => {
            info!("Audit log on stdout");
            Arc::new(JsonLinesSink::stdout())
        }
    };

    let mut gateway = Gateway::new(engine.clone())
        .with_limiter(limiter)
        .with_auditor(auditor)
        .with_metrics(metrics)
        .with_audit_forwarding(config.audit_upstream);

    match &config.upstream_url {
        Some(url) => {
            let upstream = HttpUpstream::new(url.as_str(), config.upstream_timeout())
                .context("failed to create upstream client")?;
            info!(upstream = %url, timeout_ms = config.upstream_timeout_ms, "Upstream configured");
            gateway = gateway.with_upstream(Arc::new(upstream));
        }
        None => warn!("No upstream configured, allowed requests will fail"),
    }

    info!(
        rule_sets = engine.rule_set_count(),
        mode = ?engine.mode(),
        rps = config.rps,
        burst = config.burst,
        "Gateway ready"
    );

    // Create router
    let app = create_router(Arc::new(AppState::new(gateway)));

    // Parse listen address
    let addr: SocketAddr = config.listen_addr.parse()?;

    info!(addr = %addr, "Starting HTTP server");

    // Create TCP listener
    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Run server with graceful shutdown
    if config.graceful_shutdown {
        let server = async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown_signal())
                .await
        };
        let drain = config.shutdown_timeout();

        tokio::select! {
            result = server => result?,
            _ = async {
                shutdown_signal().await;
                tokio::time::sleep(drain).await;
            } => warn!(timeout_secs = drain.as_secs(), "Shutdown timed out, dropping open connections"),
        }
    } else {
        axum::serve(listener, app).await?;
    }

    // Cleanup
    info!("Shutting down...");
    if let Some(handle) = sweep_handle {
        handle.abort();
    }

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Received shutdown signal");
}
