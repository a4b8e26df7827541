pub mod request;
pub mod response;
pub mod routes;

pub use request::JsonRpcRequest;
pub use response::{ErrorCode, JsonRpcErrorResponse};
pub use routes::{create_router, AppState};
