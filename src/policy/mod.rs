pub mod engine;
pub mod loader;

pub use engine::{EvaluationMode, PolicyEngine};
pub use loader::{load_policy, parse_policy, unreachable_rules, PolicyError, PolicyFormat};
