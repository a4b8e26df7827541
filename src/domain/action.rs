use serde::{Deserialize, Serialize};
use std::fmt;

/// What the gateway does with a tool call once a rule (or a default) applies.
///
/// The set is closed: policy documents naming any other action fail to load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum Action {
    /// Forward the call
    Allow,
    /// Reject the call with a protocol error
    Deny,
    /// Forward the call, but flag it as suspicious in the audit trail
    Audit,
}

impl Action {
    /// Accepted spellings, used in parse errors.
    pub const VARIANTS: &'static [&'static str] = &["allow", "deny", "audit"];

    /// Parse the exact lowercase wire name.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "allow" => Some(Action::Allow),
            "deny" => Some(Action::Deny),
            "audit" => Some(Action::Audit),
            _ => None,
        }
    }

    /// Returns the lowercase wire name.
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Allow => "allow",
            Action::Deny => "deny",
            Action::Audit => "audit",
        }
    }

    /// Returns true if the call is forwarded to the upstream.
    #[inline]
    pub fn forwards(&self) -> bool {
        !matches!(self, Action::Deny)
    }
}

impl Default for Action {
    fn default() -> Self {
        Action::Deny
    }
}

impl TryFrom<String> for Action {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Action::from_str(&value).ok_or_else(|| {
            format!(
                "unknown action `{}`, expected one of {}",
                value,
                Action::VARIANTS.join(", ")
            )
        })
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
