use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::policy::EvaluationMode;
use crate::ratelimit::RateLimiterConfig;

/// Gateway configuration.
#[derive(Debug, Clone, Parser)]
#[command(name = "toolgate")]
#[command(about = "Policy-enforcing reverse proxy for agent tool calls")]
pub struct Config {
    /// HTTP server listen address
    #[arg(long, default_value = "0.0.0.0:8080", env = "TOOLGATE_LISTEN_ADDR")]
    pub listen_addr: String,

    /// Upstream tool server URL (optional; without it every forward fails)
    #[arg(long, env = "TOOLGATE_UPSTREAM_URL")]
    pub upstream_url: Option<String>,

    /// Policy files (JSON or YAML), loaded in order
    #[arg(long = "policy", env = "TOOLGATE_POLICY", value_delimiter = ',')]
    pub policies: Vec<PathBuf>,

    /// Audit log file in JSON lines (stdout if not set)
    #[arg(long, env = "TOOLGATE_AUDIT_LOG")]
    pub audit_log: Option<PathBuf>,

    /// Also audit the upstream outcome of forwarded tool calls
    #[arg(long, default_value = "false", env = "TOOLGATE_AUDIT_UPSTREAM")]
    pub audit_upstream: bool,

    /// Sustained tool calls per second, per agent and tool
    #[arg(long, default_value = "10", env = "TOOLGATE_RPS")]
    pub rps: f64,

    /// Burst capacity per agent and tool
    #[arg(long, default_value = "20", env = "TOOLGATE_BURST")]
    pub burst: u32,

    /// Evict limiter buckets idle for longer than this many seconds
    #[arg(long, default_value = "300", env = "TOOLGATE_LIMITER_IDLE_SECS")]
    pub limiter_idle_secs: u64,

    /// Interval between idle bucket sweeps in seconds
    #[arg(long, default_value = "60", env = "TOOLGATE_LIMITER_SWEEP_SECS")]
    pub limiter_sweep_secs: u64,

    /// Upstream request timeout in milliseconds
    #[arg(long, default_value = "30000", env = "TOOLGATE_UPSTREAM_TIMEOUT_MS")]
    pub upstream_timeout_ms: u64,

    /// Scan every loaded policy in order instead of only the first
    #[arg(long, default_value = "false", env = "TOOLGATE_MERGE_POLICIES")]
    pub merge_policies: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    pub log_level: String,

    /// Emit logs as JSON
    #[arg(long, default_value = "false", env = "TOOLGATE_LOG_JSON")]
    pub log_json: bool,

    /// Enable graceful shutdown
    #[arg(long, default_value = "true", env = "TOOLGATE_GRACEFUL_SHUTDOWN")]
    pub graceful_shutdown: bool,

    /// Graceful shutdown timeout in seconds
    #[arg(long, default_value = "30", env = "TOOLGATE_SHUTDOWN_TIMEOUT_SECS")]
    pub shutdown_timeout_secs: u64,
}

impl Config {
    /// Get limiter settings.
    pub fn rate_limit(&self) -> RateLimiterConfig {
        RateLimiterConfig::new(self.rps, self.burst).with_idle_eviction(self.limiter_idle())
    }

    /// Get limiter idle eviction as Duration.
    pub fn limiter_idle(&self) -> Duration {
        Duration::from_secs(self.limiter_idle_secs)
    }

    /// Get limiter sweep interval as Duration.
    pub fn limiter_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.limiter_sweep_secs)
    }

    /// Get upstream timeout as Duration.
    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_millis(self.upstream_timeout_ms)
    }

    /// Get shutdown timeout as Duration.
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    pub fn evaluation_mode(&self) -> EvaluationMode {
        if self.merge_policies {
            EvaluationMode::Merged
        } else {
            EvaluationMode::FirstOnly
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            listen_addr: "0.0.0.0:8080".to_string(),
            upstream_url: None,
            policies: Vec::new(),
            audit_log: None,
            audit_upstream: false,
            rps: 10.0,
            burst: 20,
            limiter_idle_secs: 300,
            limiter_sweep_secs: 60,
            upstream_timeout_ms: 30_000,
            merge_policies: false,
            log_level: "info".to_string(),
            log_json: false,
            graceful_shutdown: true,
            shutdown_timeout_secs: 30,
        }
    }
}
