pub mod api;
pub mod audit;
pub mod config;
pub mod domain;
pub mod observability;
pub mod policy;
pub mod proxy;
pub mod ratelimit;
pub mod rules;
pub mod upstream;

pub use config::Config;
pub use domain::{Action, Decision, PolicyDocument, ToolCall};
pub use policy::PolicyEngine;
pub use proxy::{Gateway, GatewayReply};
pub use ratelimit::{RateLimiter, RateLimiterConfig};
pub use rules::RuleSet;
