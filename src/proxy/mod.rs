pub mod gateway;

pub use gateway::{Gateway, GatewayError, GatewayReply};
