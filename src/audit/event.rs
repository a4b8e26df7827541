use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use uuid::Uuid;

/// Classifies audit events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    #[serde(rename = "tool_call.allowed")]
    Allowed,
    #[serde(rename = "tool_call.denied")]
    Denied,
    #[serde(rename = "tool_call.audited")]
    Audited,
    #[serde(rename = "tool_call.rate_limited")]
    RateLimited,
    #[serde(rename = "tool_call.error")]
    Error,
    #[serde(rename = "tool_call.complete")]
    Complete,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Allowed => "tool_call.allowed",
            EventKind::Denied => "tool_call.denied",
            EventKind::Audited => "tool_call.audited",
            EventKind::RateLimited => "tool_call.rate_limited",
            EventKind::Error => "tool_call.error",
            EventKind::Complete => "tool_call.complete",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single audit log entry: one self-contained record per line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub timestamp: DateTime<Utc>,

    pub event_id: Uuid,

    pub event_type: EventKind,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub agent_id: String,

    pub tool_name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub rule_id: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub action: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reason: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

impl AuditEvent {
    /// Create an event for a tool call decision, stamped now.
    pub fn tool_call(
        kind: EventKind,
        tool_name: impl Into<String>,
        agent_id: impl Into<String>,
        rule_id: impl Into<String>,
        action: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        AuditEvent {
            timestamp: Utc::now(),
            event_id: Uuid::new_v4(),
            event_type: kind,
            agent_id: agent_id.into(),
            tool_name: tool_name.into(),
            rule_id: rule_id.into(),
            action: action.into(),
            reason: reason.into(),
            duration_ms: None,
            error: None,
            metadata: Map::new(),
        }
    }

    pub fn with_duration_ms(mut self, duration_ms: f64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}
