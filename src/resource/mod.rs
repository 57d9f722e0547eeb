//! Resource handlers
//!
//! Translates one request against one entity kind into engine operations.
//! Every kind shares the same [`ResourceHandler`]; what differs per kind is
//! its [`Schema`](crate::model::Schema).

mod errors;
mod handler;
mod payload;

pub use errors::{ErrorResponse, ResourceError, ResourceResult};
pub use handler::ResourceHandler;
pub use payload::RequestBody;
