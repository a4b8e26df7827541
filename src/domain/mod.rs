pub mod action;
pub mod call;
pub mod decision;
pub mod policy;

pub use action::Action;
pub use call::ToolCall;
pub use decision::Decision;
pub use policy::{PolicyDocument, RuleDef};
