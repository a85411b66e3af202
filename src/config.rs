use std::path::PathBuf;

pub const WORKSPACE_ENV: &str = "TASKBOARD_WORKSPACE";
pub const SEED_ENV: &str = "TASKBOARD_SEED";
pub const LOG_ENV: &str = "TASKBOARD_LOG";

const DEFAULT_LOG_FILTER: &str = "taskboardd=info";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Opened at startup as if `workspace.select` had been called.
    pub workspace: Option<PathBuf>,
    pub seed_sample_data: bool,
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workspace: None,
            seed_sample_data: true,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let workspace = lookup(WORKSPACE_ENV)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);
        let seed_sample_data = lookup(SEED_ENV)
            .and_then(|v| parse_flag(&v))
            .unwrap_or(defaults.seed_sample_data);
        let log_filter = lookup(LOG_ENV)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or(defaults.log_filter);
        Self {
            workspace,
            seed_sample_data,
            log_filter,
        }
    }
}

fn parse_flag(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
