pub mod event;
pub mod memory;
pub mod sink;

pub use event::{AuditEvent, EventKind};
pub use memory::MemorySink;
pub use sink::{AuditError, AuditSink, JsonLinesSink};
