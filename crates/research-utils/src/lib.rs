//! Shared utilities for the research workspace
//!
//! Logging setup and environment handling used by the binaries.

pub mod config;
pub mod logging;

pub use config::{env_opt, env_or, env_parse, load_env};
pub use logging::{init_tracing, LogFormat};
