/// A compiled tool-name or agent-id pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pattern {
    /// `*`: matches any value, including the empty string
    Any,
    /// `prefix*`: matches values starting with the prefix
    Prefix(String),
    /// Matches exactly this value
    Exact(String),
}

impl Pattern {
    /// Compile a pattern from its textual form.
    pub fn parse(raw: &str) -> Self {
        if raw == "*" {
            return Pattern::Any;
        }

        match raw.strip_suffix('*') {
            Some(prefix) => Pattern::Prefix(prefix.to_string()),
            None => Pattern::Exact(raw.to_string()),
        }
    }

    /// Check whether a value satisfies this pattern.
    #[inline]
    pub fn matches(&self, value: &str) -> bool {
        match self {
            Pattern::Any => true,
            Pattern::Prefix(prefix) => value.starts_with(prefix.as_str()),
            Pattern::Exact(exact) => value == exact,
        }
    }
}

/// An OR'd list of patterns. An empty list places no constraint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatternSet {
    patterns: Vec<Pattern>,
}

impl PatternSet {
    pub fn new<S: AsRef<str>>(raw: &[S]) -> Self {
        PatternSet {
            patterns: raw.iter().map(|p| Pattern::parse(p.as_ref())).collect(),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Returns true if at least one pattern matches.
    #[inline]
    pub fn matches_any(&self, value: &str) -> bool {
        self.patterns.iter().any(|p| p.matches(value))
    }

    /// Returns true if the set is empty or any pattern matches.
    #[inline]
    pub fn admits(&self, value: &str) -> bool {
        self.is_empty() || self.matches_any(value)
    }
}
