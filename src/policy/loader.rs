use std::collections::HashSet;
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::warn;

use crate::domain::PolicyDocument;

/// Errors that can occur during policy loading.
#[derive(Error, Debug)]
pub enum PolicyError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse policy JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("parse policy YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Encoding of a policy document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyFormat {
    Json,
    Yaml,
}

impl PolicyFormat {
    /// Pick a format from a file extension, defaulting to JSON.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
                PolicyFormat::Yaml
            }
            _ => PolicyFormat::Json,
        }
    }
}

/// Parse and validate a policy document.
pub fn parse_policy(data: &[u8], format: PolicyFormat) -> Result<PolicyDocument, PolicyError> {
    let doc: PolicyDocument = match format {
        PolicyFormat::Json => serde_json::from_slice(data)?,
        PolicyFormat::Yaml => serde_yaml::from_slice(data)?,
    };

    validate_policy(&doc)?;

    Ok(doc)
}

/// Load a policy document from a file.
pub fn load_policy(path: impl AsRef<Path>) -> Result<PolicyDocument, PolicyError> {
    let path = path.as_ref();
    let content = fs::read(path)?;

    parse_policy(&content, PolicyFormat::from_path(path))
}

/// Validate policy structure.
fn validate_policy(doc: &PolicyDocument) -> Result<(), PolicyError> {
    let mut seen_ids = HashSet::new();
    for rule in &doc.rules {
        if rule.id.trim().is_empty() {
            return Err(PolicyError::Validation(format!(
                "Rule without id in policy {}",
                doc.name
            )));
        }
        if !seen_ids.insert(rule.id.as_str()) {
            return Err(PolicyError::Validation(format!(
                "Duplicate rule ID: {}",
                rule.id
            )));
        }
    }

    let unreachable = unreachable_rules(doc);
    if !unreachable.is_empty() {
        warn!(
            policy = %doc.name,
            rules = ?unreachable,
            "Rules after an unconditional rule can never match"
        );
    }

    Ok(())
}

/// Ids of rules listed after the first rule with no match criteria.
pub fn unreachable_rules(doc: &PolicyDocument) -> Vec<&str> {
    match doc.rules.iter().position(|r| r.is_unconditional()) {
        Some(pos) => doc.rules[pos + 1..].iter().map(|r| r.id.as_str()).collect(),
        None => Vec::new(),
    }
}
