use crate::domain::{Action, Decision, RuleDef, ToolCall};

use super::pattern::PatternSet;

/// Why a rule matched a call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchReason {
    /// A forbidden substring was found in the named argument
    ArgDeny { key: String },
    /// The call carried more arguments than allowed
    TooManyArgs { count: usize, max: usize },
    /// Tool and agent filters admitted the call and nothing else applied
    Admitted,
}

/// A forbidden substring for one argument, lowercased at compile time.
#[derive(Debug, Clone)]
struct ArgDeny {
    key: String,
    needle: String,
}

/// A compiled rule ready for evaluation.
#[derive(Debug, Clone)]
pub struct Rule {
    id: String,
    description: Option<String>,
    action: Action,
    tools: PatternSet,
    agents: PatternSet,
    arg_deny: Vec<ArgDeny>,
    max_args: Option<usize>,
}

impl Rule {
    /// Compile a rule from its definition.
    pub fn compile(def: &RuleDef) -> Self {
        let arg_deny = def
            .arg_deny
            .iter()
            .map(|(key, needle)| ArgDeny {
                key: key.clone(),
                needle: needle.to_lowercase(),
            })
            .collect();

        Rule {
            id: def.id.clone(),
            description: def.description.clone(),
            action: def.action,
            tools: PatternSet::new(&def.tools),
            agents: PatternSet::new(&def.agents),
            arg_deny,
            max_args: def.max_args,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Decision this rule produces when it matches.
    pub fn decision(&self) -> Decision {
        Decision::from_rule(self.action, &self.id, self.description.as_deref())
    }

    /// Check a call against this rule.
    ///
    /// Criteria are checked in a fixed order: tool patterns, agent patterns,
    /// argument deny list, argument count. A present argument deny list is the
    /// final word: if none of its entries fire, the rule does not match.
    pub fn matches(&self, call: &ToolCall) -> Option<MatchReason> {
        if !self.tools.admits(&call.tool_name) {
            return None;
        }

        if !self.agents.admits(&call.agent_id) {
            return None;
        }

        if !self.arg_deny.is_empty() {
            return self
                .arg_deny
                .iter()
                .find(|deny| {
                    call.str_arg(&deny.key)
                        .map(|value| value.to_lowercase().contains(&deny.needle))
                        .unwrap_or(false)
                })
                .map(|deny| MatchReason::ArgDeny {
                    key: deny.key.clone(),
                });
        }

        if let Some(max) = self.max_args {
            let count = call.arg_count();
            if count > max {
                return Some(MatchReason::TooManyArgs { count, max });
            }
        }

        Some(MatchReason::Admitted)
    }
}
