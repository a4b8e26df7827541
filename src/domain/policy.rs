use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::BTreeMap;

use super::Action;

/// Pattern list for tool names or agent ids.
pub type PatternList = SmallVec<[String; 4]>;

/// A policy document: one named rule set as written by an operator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyDocument {
    /// Policy name
    pub name: String,

    /// Optional description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Action applied when no rule matches (fail-closed if unspecified)
    #[serde(default, deserialize_with = "fail_closed")]
    pub default_action: Action,

    /// Rules, evaluated in listed order
    #[serde(default)]
    pub rules: Vec<RuleDef>,
}

impl PolicyDocument {
    /// Create an empty document with the given default.
    pub fn empty(name: impl Into<String>, default_action: Action) -> Self {
        PolicyDocument {
            name: name.into(),
            description: None,
            default_action,
            rules: Vec::new(),
        }
    }
}

/// Definition of a single rule.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleDef {
    /// Rule identifier, unique within its document
    pub id: String,

    /// Human-readable description, used as the reason for denials
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Action to take when the rule matches
    pub action: Action,

    /// Tool name patterns (`*` wildcard, `prefix*`)
    #[serde(default, skip_serializing_if = "SmallVec::is_empty")]
    pub tools: PatternList,

    /// Agent id patterns (`*` wildcard, `prefix*`)
    #[serde(default, skip_serializing_if = "SmallVec::is_empty")]
    pub agents: PatternList,

    /// Argument key to forbidden substring
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub arg_deny: BTreeMap<String, String>,

    /// Maximum number of arguments
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_args: Option<usize>,
}

impl RuleDef {
    /// Create a rule with no match criteria.
    pub fn new(id: impl Into<String>, action: Action) -> Self {
        RuleDef {
            id: id.into(),
            action,
            ..Default::default()
        }
    }

    /// Returns true if the rule has no criteria and so matches every call.
    pub fn is_unconditional(&self) -> bool {
        self.tools.is_empty()
            && self.agents.is_empty()
            && self.arg_deny.is_empty()
            && self.max_args.is_none()
    }
}

/// Missing, null, or empty `default_action` resolves to deny. Anything else
/// must be an exact action name.
fn fail_closed<'de, D>(deserializer: D) -> Result<Action, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw.as_deref() {
        None | Some("") => Ok(Action::Deny),
        Some(s) => Action::from_str(s).ok_or_else(|| de::Error::unknown_variant(s, Action::VARIANTS)),
    }
}
