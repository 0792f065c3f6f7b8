mod config;
mod db;
mod error;
mod ipc;
mod model;
mod scoring;
mod submissions;
mod validate;

use std::io::{self, BufRead, Write};

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn init_tracing(filter: &str) {
    let filter = EnvFilter::try_new(filter)
        .unwrap_or_else(|_| EnvFilter::new(config::DEFAULT_LOG_FILTER));
    // stdout carries the protocol, so logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let config = config::Config::from_env();
    init_tracing(&config.log_filter);

    let mut state = ipc::AppState::default();
    if let Some(path) = config.workspace.as_deref() {
        if let Err(e) = ipc::open_workspace(&mut state, path) {
            error!(workspace = %path.to_string_lossy(), "failed to open workspace: {e:#}");
        }
    }
    info!(version = env!("CARGO_PKG_VERSION"), "crispd ready");

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(_) => break,
        };
        if line.trim().is_empty() {
            continue;
        }

        let resp = match serde_json::from_str::<ipc::Request>(&line) {
            Ok(req) => ipc::handle_request(&mut state, req),
            Err(e) => ipc::bad_json(&e),
        };
        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }
}
