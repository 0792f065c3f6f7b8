use std::path::PathBuf;

pub const DEFAULT_LOG_FILTER: &str = "crispd=info";

#[derive(Debug, Clone)]
pub struct Config {
    /// Workspace opened before the first request, if any.
    pub workspace: Option<PathBuf>,
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workspace: None,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let default = Self::default();
        Self {
            workspace: lookup("CRISPD_WORKSPACE")
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
            log_filter: lookup("CRISPD_LOG")
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or(default.log_filter),
        }
    }
}
