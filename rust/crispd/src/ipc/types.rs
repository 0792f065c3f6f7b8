use std::path::PathBuf;

use rusqlite::Connection;
use serde::Deserialize;

/// One line of input: `{ "id", "method", "params" }`.
#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

#[derive(Default)]
pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
}

impl AppState {
    pub fn workspace_path(&self) -> Option<String> {
        self.workspace
            .as_ref()
            .map(|p| p.to_string_lossy().to_string())
    }
}
