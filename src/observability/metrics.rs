use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crate::audit::EventKind;

/// Metrics registry for the gateway.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    /// Total tool calls seen
    pub tool_calls_total: AtomicU64,

    /// Tool calls by outcome
    pub tool_calls_allowed: AtomicU64,
    pub tool_calls_audited: AtomicU64,
    pub tool_calls_denied: AtomicU64,
    pub tool_calls_rate_limited: AtomicU64,

    /// Non tool-call requests forwarded without inspection
    pub passthrough_total: AtomicU64,

    /// Decision latency by range (rate limit + policy, excluding upstream).
    /// Each counter holds only its own range; export accumulates them.
    pub latency_under_1ms: AtomicU64,
    pub latency_1_5ms: AtomicU64,
    pub latency_5_10ms: AtomicU64,
    pub latency_10_50ms: AtomicU64,
    pub latency_50_100ms: AtomicU64,
    pub latency_over_100ms: AtomicU64,
    pub latency_sum_micros: AtomicU64,

    /// Upstream forwarding
    pub upstream_requests_total: AtomicU64,
    pub upstream_errors_total: AtomicU64,

    /// Audit sink failures
    pub audit_errors_total: AtomicU64,

    /// Policy files loaded at startup
    pub policy_loads_total: AtomicU64,
}

impl MetricsRegistry {
    /// Create a new metrics registry.
    pub fn new() -> Self {
        MetricsRegistry::default()
    }

    /// Record the outcome of a tool call.
    pub fn record_outcome(&self, kind: EventKind) {
        self.tool_calls_total.fetch_add(1, Ordering::Relaxed);

        let counter = match kind {
            EventKind::Allowed => &self.tool_calls_allowed,
            EventKind::Audited => &self.tool_calls_audited,
            EventKind::Denied => &self.tool_calls_denied,
            EventKind::RateLimited => &self.tool_calls_rate_limited,
            EventKind::Error | EventKind::Complete => return,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_passthrough(&self) {
        self.passthrough_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Record decision latency.
    pub fn record_latency(&self, start: Instant) {
        let micros = start.elapsed().as_micros() as u64;
        self.latency_sum_micros.fetch_add(micros, Ordering::Relaxed);

        let bucket = if micros < 1000 {
            &self.latency_under_1ms
        } else if micros < 5000 {
            &self.latency_1_5ms
        } else if micros < 10000 {
            &self.latency_5_10ms
        } else if micros < 50000 {
            &self.latency_10_50ms
        } else if micros < 100000 {
            &self.latency_50_100ms
        } else {
            &self.latency_over_100ms
        };
        bucket.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an upstream round-trip.
    pub fn record_upstream(&self, success: bool) {
        self.upstream_requests_total.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.upstream_errors_total.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_audit_error(&self) {
        self.audit_errors_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a successfully loaded policy file.
    pub fn record_policy_load(&self) {
        self.policy_loads_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Cumulative latency bucket counts, in `le` order ending with `+Inf`.
    pub fn latency_buckets(&self) -> [u64; 6] {
        let ranges = [
            &self.latency_under_1ms,
            &self.latency_1_5ms,
            &self.latency_5_10ms,
            &self.latency_10_50ms,
            &self.latency_50_100ms,
            &self.latency_over_100ms,
        ];

        let mut buckets = [0u64; 6];
        let mut total = 0;
        for (bucket, range) in buckets.iter_mut().zip(ranges) {
            total += range.load(Ordering::Relaxed);
            *bucket = total;
        }
        buckets
    }

    /// Export metrics in Prometheus format.
    pub fn to_prometheus(&self) -> String {
        let buckets = self.latency_buckets();
        let latency_sum = self.latency_sum_micros.load(Ordering::Relaxed) as f64 / 1_000_000.0;

        format!(
            r#"# HELP toolgate_tool_calls_total Total number of tool calls
# TYPE toolgate_tool_calls_total counter
toolgate_tool_calls_total {}

# HELP toolgate_tool_calls Tool calls by outcome
# TYPE toolgate_tool_calls counter
toolgate_tool_calls{{outcome="allowed"}} {}
toolgate_tool_calls{{outcome="audited"}} {}
toolgate_tool_calls{{outcome="denied"}} {}
toolgate_tool_calls{{outcome="rate_limited"}} {}

# HELP toolgate_passthrough_total Requests forwarded without inspection
# TYPE toolgate_passthrough_total counter
toolgate_passthrough_total {}

# HELP toolgate_decision_latency_seconds Decision latency histogram
# TYPE toolgate_decision_latency_seconds histogram
toolgate_decision_latency_seconds_bucket{{le="0.001"}} {}
toolgate_decision_latency_seconds_bucket{{le="0.005"}} {}
toolgate_decision_latency_seconds_bucket{{le="0.01"}} {}
toolgate_decision_latency_seconds_bucket{{le="0.05"}} {}
toolgate_decision_latency_seconds_bucket{{le="0.1"}} {}
toolgate_decision_latency_seconds_bucket{{le="+Inf"}} {}
toolgate_decision_latency_seconds_sum {}
toolgate_decision_latency_seconds_count {}

# HELP toolgate_upstream_requests_total Requests forwarded upstream
# TYPE toolgate_upstream_requests_total counter
toolgate_upstream_requests_total {}

# HELP toolgate_upstream_errors_total Upstream failures
# TYPE toolgate_upstream_errors_total counter
toolgate_upstream_errors_total {}

# HELP toolgate_audit_errors_total Audit sink write failures
# TYPE toolgate_audit_errors_total counter
toolgate_audit_errors_total {}

# HELP toolgate_policy_loads_total Policy files loaded
# TYPE toolgate_policy_loads_total counter
toolgate_policy_loads_total {}
"#,
            self.tool_calls_total.load(Ordering::Relaxed),
            self.tool_calls_allowed.load(Ordering::Relaxed),
            self.tool_calls_audited.load(Ordering::Relaxed),
            self.tool_calls_denied.load(Ordering::Relaxed),
            self.tool_calls_rate_limited.load(Ordering::Relaxed),
            self.passthrough_total.load(Ordering::Relaxed),
            buckets[0],
            buckets[1],
            buckets[2],
            buckets[3],
            buckets[4],
            buckets[5],
            latency_sum,
            buckets[5],
            self.upstream_requests_total.load(Ordering::Relaxed),
            self.upstream_errors_total.load(Ordering::Relaxed),
            self.audit_errors_total.load(Ordering::Relaxed),
            self.policy_loads_total.load(Ordering::Relaxed),
        )
    }
}

/// Guard for timing operations.
pub struct TimingGuard<'a> {
    registry: &'a MetricsRegistry,
    start: Instant,
}

impl<'a> TimingGuard<'a> {
    pub fn new(registry: &'a MetricsRegistry) -> Self {
        TimingGuard {
            registry,
            start: Instant::now(),
        }
    }
}

impl<'a> Drop for TimingGuard<'a> {
    fn drop(&mut self) {
        self.registry.record_latency(self.start);
    }
}
