use parking_lot::RwLock;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use crate::domain::{Decision, PolicyDocument, ToolCall};
use crate::rules::RuleSet;

use super::loader::{load_policy, parse_policy, PolicyError, PolicyFormat};

/// How the engine treats rule sets loaded after the first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EvaluationMode {
    /// Only the first loaded rule set is consulted; later sets are inert.
    #[default]
    FirstOnly,
    /// Rules of every set are scanned in load order. The first set's
    /// default applies once all sets are exhausted without a match.
    Merged,
}

/// Evaluates tool calls against loaded rule sets.
///
/// Rule sets are append-only. Loads take the write lock, so concurrent
/// loads against a live engine never tear the list.
#[derive(Debug, Default)]
pub struct PolicyEngine {
    rule_sets: RwLock<Vec<Arc<RuleSet>>>,
    mode: EvaluationMode,
}

impl PolicyEngine {
    /// Create an empty engine in the default mode.
    pub fn new() -> Self {
        PolicyEngine::default()
    }

    /// Create an empty engine with the given evaluation mode.
    pub fn with_mode(mode: EvaluationMode) -> Self {
        PolicyEngine {
            rule_sets: RwLock::new(Vec::new()),
            mode,
        }
    }

    pub fn mode(&self) -> EvaluationMode {
        self.mode
    }

    /// Append an already-parsed policy document.
    pub fn load_document(&self, doc: &PolicyDocument) {
        let rule_set = Arc::new(RuleSet::from_document(doc));

        info!(
            policy = %rule_set.name,
            rules = rule_set.len(),
            default_action = %rule_set.default_action,
            "Loaded policy"
        );

        self.rule_sets.write().push(rule_set);
    }

    /// Parse a JSON policy definition and append it.
    ///
    /// On error nothing is appended and already-loaded sets are untouched.
    pub fn load_json(&self, data: &[u8]) -> Result<(), PolicyError> {
        let doc = parse_policy(data, PolicyFormat::Json)?;
        self.load_document(&doc);
        Ok(())
    }

    /// Load a policy file (JSON or YAML by extension) and append it.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<(), PolicyError> {
        let doc = load_policy(path)?;
        self.load_document(&doc);
        Ok(())
    }

    /// Number of loaded rule sets.
    pub fn rule_set_count(&self) -> usize {
        self.rule_sets.read().len()
    }

    /// Evaluate a tool call. Never fails: absence of data resolves to deny.
    pub fn evaluate(&self, call: &ToolCall) -> Decision {
        let rule_sets = self.rule_sets.read();

        let Some(first) = rule_sets.first() else {
            return Decision::no_policies();
        };

        let scanned: &[Arc<RuleSet>] = match self.mode {
            EvaluationMode::FirstOnly => std::slice::from_ref(first),
            EvaluationMode::Merged => &rule_sets[..],
        };

        for rule_set in scanned {
            if let Some(m) = rule_set.first_match(call) {
                debug!(
                    policy = %rule_set.name,
                    rule_id = m.rule.id(),
                    reason = ?m.reason,
                    tool = %call.tool_name,
                    "Rule matched"
                );
                return m.rule.decision();
            }
        }

        Decision::default_action(first.default_action)
    }
}
