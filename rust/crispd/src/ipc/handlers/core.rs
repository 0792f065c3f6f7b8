use crate::db;
use crate::ipc::envelope::{err, ok};
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Open (or switch to) the workspace database at `path`.
pub fn open_workspace(state: &mut AppState, path: &Path) -> anyhow::Result<()> {
    let conn = db::open_db(path)?;
    state.workspace = Some(path.to_path_buf());
    state.db = Some(conn);
    info!(workspace = %path.to_string_lossy(), "workspace opened");
    Ok(())
}

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "workspacePath": state.workspace_path()
        }),
    )
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    let p = req
        .params
        .get("path")
        .and_then(|v| v.as_str())
        .map(PathBuf::from);
    let Some(path) = p else {
        return err(Some(req.id.as_str()), "bad_request", "missing params.path", None);
    };

    match open_workspace(state, &path) {
        Ok(()) => ok(&req.id, json!({ "workspacePath": path.to_string_lossy() })),
        Err(e) => {
            warn!(workspace = %path.to_string_lossy(), "failed to open workspace: {e:#}");
            err(Some(req.id.as_str()), "db_open_failed", format!("{e:#}"), None)
        }
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "workspace.select" => Some(handle_workspace_select(state, req)),
        _ => None,
    }
}
