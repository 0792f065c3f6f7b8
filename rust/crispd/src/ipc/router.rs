use super::handlers;
use super::types::{AppState, Request};
use crate::ipc::envelope::err;

pub fn handle_request(state: &mut AppState, req: Request) -> serde_json::Value {
    if let Some(resp) = handlers::core::try_handle(state, &req) {
        return resp;
    }
    if let Some(resp) = handlers::users::try_handle(state, &req) {
        return resp;
    }
    if let Some(resp) = handlers::assessments::try_handle(state, &req) {
        return resp;
    }
    if let Some(resp) = handlers::submissions::try_handle(state, &req) {
        return resp;
    }
    if let Some(resp) = handlers::results::try_handle(state, &req) {
        return resp;
    }

    err(
        Some(req.id.as_str()),
        "not_implemented",
        format!("unknown method: {}", req.method),
        None,
    )
}
