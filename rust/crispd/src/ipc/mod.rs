mod envelope;
mod handlers;
mod helpers;
mod router;
mod types;

pub use envelope::{bad_json, err};
pub use handlers::core::open_workspace;
pub use router::handle_request;
pub use types::{AppState, Request};
