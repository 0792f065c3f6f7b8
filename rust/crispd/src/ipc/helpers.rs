use rusqlite::Connection;
use tracing::warn;

use crate::error::{ServiceError, ServiceResult};
use crate::ipc::envelope::{err, ok};
use crate::ipc::types::{AppState, Request};

pub fn required_str(params: &serde_json::Value, key: &str) -> ServiceResult<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ServiceError::bad_request(format!("missing {}", key)))
}

pub fn optional_str(params: &serde_json::Value, key: &str) -> Option<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

pub fn required_f64(params: &serde_json::Value, key: &str) -> ServiceResult<f64> {
    params
        .get(key)
        .and_then(|v| v.as_f64())
        .ok_or_else(|| ServiceError::bad_request(format!("missing numeric {}", key)))
}

pub fn optional_bool(params: &serde_json::Value, key: &str) -> ServiceResult<Option<bool>> {
    match params.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(v) => v
            .as_bool()
            .map(Some)
            .ok_or_else(|| ServiceError::bad_request(format!("{} must be a boolean", key))),
    }
}

/// Run a handler body against the open workspace and wrap the outcome.
pub fn with_db<F>(state: &AppState, req: &Request, body: F) -> serde_json::Value
where
    F: FnOnce(&Connection, &serde_json::Value) -> ServiceResult<serde_json::Value>,
{
    let Some(conn) = state.db.as_ref() else {
        return err(Some(req.id.as_str()), "no_workspace", "select a workspace first", None);
    };
    match body(conn, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(e) => {
            warn!(method = %req.method, code = e.code(), "{}", e);
            e.response(&req.id)
        }
    }
}
