//! Environment configuration helpers

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use tracing::debug;

/// Load a `.env` file from the working directory or its parents, if any
///
/// Returns the loaded path. Variables already set in the process win.
pub fn load_env() -> Option<PathBuf> {
    match dotenv::dotenv() {
        Ok(path) => {
            debug!(path = %path.display(), "Loaded .env file");
            Some(path)
        }
        Err(_) => None,
    }
}

/// Non-empty value of `key`
pub fn env_opt(key: &str) -> Option<String> {
    non_empty(env::var(key).ok())
}

/// Value of `key`, or `default` when unset or empty
pub fn env_or(key: &str, default: &str) -> String {
    env_opt(key).unwrap_or_else(|| default.to_string())
}

/// Parsed value of `key`; unparsable values are treated as unset
pub fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    env_opt(key).and_then(|v| v.parse().ok())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
