pub mod pattern;
pub mod rule;

pub use pattern::{Pattern, PatternSet};
pub use rule::{MatchReason, Rule};

use crate::domain::{Action, Decision, PolicyDocument, ToolCall};

/// Result of scanning a rule set's rules (defaults not applied).
#[derive(Debug, Clone)]
pub struct RuleMatch<'a> {
    pub rule: &'a Rule,
    pub reason: MatchReason,
}

/// Collection of compiled rules ready for evaluation.
///
/// Immutable once built; the engine shares it behind an `Arc`.
#[derive(Debug, Clone)]
pub struct RuleSet {
    pub name: String,
    pub description: Option<String>,
    pub default_action: Action,
    pub rules: Vec<Rule>,
}

impl RuleSet {
    /// Build rules from a policy document.
    pub fn from_document(doc: &PolicyDocument) -> Self {
        RuleSet {
            name: doc.name.clone(),
            description: doc.description.clone(),
            default_action: doc.default_action,
            rules: doc.rules.iter().map(Rule::compile).collect(),
        }
    }

    /// Find the first rule matching the call.
    pub fn first_match(&self, call: &ToolCall) -> Option<RuleMatch<'_>> {
        self.rules.iter().find_map(|rule| {
            rule.matches(call)
                .map(|reason| RuleMatch { rule, reason })
        })
    }

    /// Evaluate the call: first matching rule wins, else the default action.
    pub fn evaluate(&self, call: &ToolCall) -> Decision {
        match self.first_match(call) {
            Some(m) => m.rule.decision(),
            None => Decision::default_action(self.default_action),
        }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
