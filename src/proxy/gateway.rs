use bytes::Bytes;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::api::request::JsonRpcRequest;
use crate::api::response::{ErrorCode, JsonRpcErrorResponse};
use crate::audit::{AuditEvent, AuditSink, EventKind};
use crate::domain::{Action, Decision, ToolCall};
use crate::observability::metrics::{MetricsRegistry, TimingGuard};
use crate::policy::PolicyEngine;
use crate::ratelimit::RateLimiter;
use crate::upstream::{Upstream, UpstreamError, UpstreamResponse};

/// Request bodies the pipeline refuses before any decision logic runs.
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("invalid JSON-RPC: {0}")]
    InvalidJsonRpc(#[from] serde_json::Error),
}

/// What the transport should send back.
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayReply {
    /// Upstream status and body, byte-for-byte
    Relay(UpstreamResponse),
    /// Synthesized JSON-RPC error
    Error(JsonRpcErrorResponse),
}

impl GatewayReply {
    pub fn error(id: Value, code: ErrorCode, message: impl Into<String>) -> Self {
        GatewayReply::Error(JsonRpcErrorResponse::new(id, code, message))
    }
}

fn upstream_failure(id: Value, e: UpstreamError) -> GatewayReply {
    match e {
        UpstreamError::NotConfigured => {
            GatewayReply::error(id, ErrorCode::NoUpstream, e.to_string())
        }
        e => GatewayReply::error(id, ErrorCode::UpstreamFailed, format!("upstream error: {}", e)),
    }
}

/// The decision pipeline: rate limit, policy, audit, then forward or reject.
pub struct Gateway {
    engine: Arc<PolicyEngine>,
    limiter: Option<Arc<RateLimiter>>,
    auditor: Option<Arc<dyn AuditSink>>,
    upstream: Option<Arc<dyn Upstream>>,
    metrics: Arc<MetricsRegistry>,
    audit_forwarding: bool,
}

impl Gateway {
    /// Create a gateway with no limiter, no audit sink and no upstream.
    pub fn new(engine: Arc<PolicyEngine>) -> Self {
        Gateway {
            engine,
            limiter: None,
            auditor: None,
            upstream: None,
            metrics: Arc::new(MetricsRegistry::new()),
            audit_forwarding: false,
        }
    }

    pub fn with_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    pub fn with_auditor(mut self, auditor: Arc<dyn AuditSink>) -> Self {
        self.auditor = Some(auditor);
        self
    }

    pub fn with_upstream(mut self, upstream: Arc<dyn Upstream>) -> Self {
        self.upstream = Some(upstream);
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Also record the upstream outcome of forwarded tool calls as a
    /// separate `complete` or `error` event.
    pub fn with_audit_forwarding(mut self, enabled: bool) -> Self {
        self.audit_forwarding = enabled;
        self
    }

    pub fn engine(&self) -> &PolicyEngine {
        &self.engine
    }

    pub fn metrics(&self) -> &MetricsRegistry {
        &self.metrics
    }

    pub fn upstream_target(&self) -> Option<&str> {
        self.upstream.as_deref().map(|u| u.target())
    }

    /// Handle one request body.
    ///
    /// Only `tools/call` requests are gated; everything else goes upstream
    /// unexamined. Each tool call produces exactly one decision audit event.
    pub async fn handle(&self, body: Bytes, agent_id: &str) -> Result<GatewayReply, GatewayError> {
        let req: JsonRpcRequest = serde_json::from_slice(&body)?;

        if !req.is_tool_call() {
            debug!(method = %req.method, "Passing through");
            self.metrics.record_passthrough();
            return Ok(match self.forward(body).await {
                Ok(response) => GatewayReply::Relay(response),
                Err(e) => upstream_failure(req.id, e),
            });
        }

        let call = req.to_tool_call(agent_id);
        let start = Instant::now();

        let decision = {
            let _timer = TimingGuard::new(&self.metrics);
            match self.decide(&call) {
                Ok(decision) => decision,
                Err(reply) => return Ok(reply.into_reply(req.id)),
            }
        };

        let result = self.forward(body).await;

        if self.audit_forwarding {
            let duration_ms = start.elapsed().as_secs_f64() * 1000.0;
            let kind = if result.is_ok() { EventKind::Complete } else { EventKind::Error };
            let mut event = AuditEvent::tool_call(
                kind,
                &call.tool_name,
                &call.agent_id,
                &decision.rule_id,
                decision.action.as_str(),
                "",
            );
            event = match &result {
                Ok(response) => event.with_metadata("status", response.status),
                Err(e) => event.with_error(e.to_string()),
            };
            self.audit(event.with_duration_ms(duration_ms));
        }

        Ok(match result {
            Ok(response) => GatewayReply::Relay(response),
            Err(e) => upstream_failure(req.id, e),
        })
    }

    /// Rate limit, then policy. Returns the decision to forward under, or the
    /// rejection to send back. Emits exactly one audit event either way.
    fn decide(&self, call: &ToolCall) -> Result<Decision, Rejection> {
        if let Some(limiter) = &self.limiter {
            if !limiter.allow(&call.rate_limit_key()) {
                info!(
                    agent_id = %call.agent_id,
                    anonymous = call.is_anonymous(),
                    tool = %call.tool_name,
                    "Tool call rate limited"
                );
                self.record(AuditEvent::tool_call(
                    EventKind::RateLimited,
                    &call.tool_name,
                    &call.agent_id,
                    "",
                    "deny",
                    "rate limited",
                ));
                return Err(Rejection::RateLimited);
            }
        }

        let decision = self.engine.evaluate(call);

        let (kind, reason) = match decision.action {
            Action::Deny => {
                info!(
                    agent_id = %call.agent_id,
                    tool = %call.tool_name,
                    rule_id = %decision.rule_id,
                    reason = %decision.reason,
                    "Tool call denied"
                );
                (EventKind::Denied, decision.reason.as_str())
            }
            Action::Audit => {
                warn!(
                    agent_id = %call.agent_id,
                    tool = %call.tool_name,
                    rule_id = %decision.rule_id,
                    "Tool call flagged for audit"
                );
                (EventKind::Audited, "allowed with audit")
            }
            Action::Allow => {
                debug!(
                    agent_id = %call.agent_id,
                    tool = %call.tool_name,
                    rule_id = %decision.rule_id,
                    "Tool call allowed"
                );
                (EventKind::Allowed, "")
            }
        };

        self.record(AuditEvent::tool_call(
            kind,
            &call.tool_name,
            &call.agent_id,
            &decision.rule_id,
            decision.action.as_str(),
            reason,
        ));

        if decision.action.forwards() {
            Ok(decision)
        } else {
            Err(Rejection::Denied(decision.reason))
        }
    }

    /// Count the outcome and write the decision event.
    fn record(&self, event: AuditEvent) {
        self.metrics.record_outcome(event.event_type);
        self.audit(event);
    }

    /// Write an event. Sink failures are logged and never alter the decision.
    fn audit(&self, event: AuditEvent) {
        if let Some(auditor) = &self.auditor {
            if let Err(e) = auditor.log(&event) {
                self.metrics.record_audit_error();
                warn!(error = %e, event_type = %event.event_type, "Failed to write audit event");
            }
        }
    }

    async fn forward(&self, body: Bytes) -> Result<UpstreamResponse, UpstreamError> {
        let Some(upstream) = &self.upstream else {
            return Err(UpstreamError::NotConfigured);
        };

        match upstream.forward(body).await {
            Ok(response) => {
                self.metrics.record_upstream(true);
                Ok(response)
            }
            Err(e) => {
                self.metrics.record_upstream(false);
                warn!(upstream = upstream.target(), error = %e, "Upstream request failed");
                Err(e)
            }
        }
    }
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("engine", &self.engine)
            .field("limiter", &self.limiter)
            .field("upstream", &self.upstream_target())
            .field("audit_forwarding", &self.audit_forwarding)
            .finish_non_exhaustive()
    }
}

/// Why a tool call was not forwarded.
#[derive(Debug)]
enum Rejection {
    RateLimited,
    Denied(String),
}

impl Rejection {
    fn into_reply(self, id: Value) -> GatewayReply {
        match self {
            Rejection::RateLimited => GatewayReply::error(id, ErrorCode::RateLimited, "rate limited"),
            Rejection::Denied(reason) => GatewayReply::error(
                id,
                ErrorCode::PolicyDenied,
                format!("tool call denied: {}", reason),
            ),
        }
    }
}
