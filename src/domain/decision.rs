use serde::{Deserialize, Serialize};

use super::Action;

/// Reason given when the engine has nothing to evaluate against.
pub const NO_POLICIES_REASON: &str = "no policies loaded";

/// Outcome of evaluating a tool call against the loaded policies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    /// The action to take
    pub action: Action,

    /// Rule that produced the decision (empty for defaults)
    #[serde(rename = "ruleId", default, skip_serializing_if = "String::is_empty")]
    pub rule_id: String,

    /// Human-readable reason, populated for denials and defaults
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reason: String,
}

impl Decision {
    /// Fail-closed decision used when no rule set has been loaded.
    pub fn no_policies() -> Self {
        Decision {
            action: Action::Deny,
            rule_id: String::new(),
            reason: NO_POLICIES_REASON.to_string(),
        }
    }

    /// Decision produced by an explicit rule match.
    ///
    /// Denials carry the rule description as their reason, falling back to
    /// naming the rule. Other actions carry no reason.
    pub fn from_rule(action: Action, rule_id: &str, description: Option<&str>) -> Self {
        let reason = match action {
            Action::Deny => match description {
                Some(desc) if !desc.is_empty() => desc.to_string(),
                _ => format!("denied by rule {}", rule_id),
            },
            Action::Allow | Action::Audit => String::new(),
        };

        Decision {
            action,
            rule_id: rule_id.to_string(),
            reason,
        }
    }

    /// Decision taken from a rule set's default action.
    pub fn default_action(action: Action) -> Self {
        Decision {
            action,
            rule_id: String::new(),
            reason: format!("no matching rule; default {}", action),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_policies_is_deny() {
        let d = Decision::no_policies();
        assert_eq!(d.action, Action::Deny);
        assert!(d.rule_id.is_empty());
        assert_eq!(d.reason, "no policies loaded");
    }

    #[test]
    fn test_deny_reason_prefers_description() {
        let d = Decision::from_rule(Action::Deny, "R1", Some("no path traversal"));
        assert_eq!(d.reason, "no path traversal");

        let d = Decision::from_rule(Action::Deny, "R1", None);
        assert_eq!(d.reason, "denied by rule R1");

        let d = Decision::from_rule(Action::Deny, "R1", Some(""));
        assert_eq!(d.reason, "denied by rule R1");
    }

    #[test]
    fn test_allow_has_no_reason() {
        let d = Decision::from_rule(Action::Allow, "R2", Some("reads are fine"));
        assert_eq!(d.rule_id, "R2");
        assert!(d.reason.is_empty());
    }

    #[test]
    fn test_default_reason() {
        let d = Decision::default_action(Action::Audit);
        assert_eq!(d.reason, "no matching rule; default audit");
        assert!(d.rule_id.is_empty());
    }

    #[test]
    fn test_decision_serialization() {
        let d = Decision::from_rule(Action::Deny, "R9", Some("blocked"));
        let json = serde_json::to_string(&d).unwrap();

        assert!(json.contains("\"action\":\"deny\""));
        assert!(json.contains("\"ruleId\":\"R9\""));
        assert!(json.contains("blocked"));
    }
}
