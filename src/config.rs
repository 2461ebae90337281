//! Process configuration from the environment

use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_MODEL: &str = "gpt-4";
pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_SESSION_IDLE_SECS: u64 = 1800;

/// Startup configuration
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub port: u16,
    pub api_key: Option<String>,
    pub model: String,
    pub api_base: String,
    pub request_timeout: Duration,
    /// A session with no commands and no stream subscribers for this long is dropped
    pub session_idle_timeout: Duration,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable source; unset or blank values take the default
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        Self {
            port: parse_or(var("PARLOR_PORT"), "PARLOR_PORT", DEFAULT_PORT),
            api_key: var("OPENAI_API_KEY"),
            model: var("PARLOR_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            api_base: var("PARLOR_API_BASE").unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            request_timeout: seconds_or(
                var("PARLOR_REQUEST_TIMEOUT_SECS"),
                "PARLOR_REQUEST_TIMEOUT_SECS",
                DEFAULT_REQUEST_TIMEOUT_SECS,
            ),
            session_idle_timeout: seconds_or(
                var("PARLOR_SESSION_IDLE_SECS"),
                "PARLOR_SESSION_IDLE_SECS",
                DEFAULT_SESSION_IDLE_SECS,
            ),
        }
    }
}

/// A positive number of seconds; zero is rejected like any unparseable value
fn seconds_or(value: Option<String>, name: &str, default: u64) -> Duration {
    let secs = match parse_or(value, name, default) {
        0 => {
            tracing::warn!(var = name, default, "Zero duration, using default");
            default
        }
        secs => secs,
    };
    Duration::from_secs(secs)
}

fn parse_or<T>(value: Option<String>, name: &str, default: T) -> T
where
    T: FromStr + Copy + std::fmt::Display,
{
    let Some(raw) = value else {
        return default;
    };
    raw.trim().parse().unwrap_or_else(|_| {
        tracing::warn!(
            var = name,
            value = %raw,
            default = %default,
            "Unparseable value, using default"
        );
        default
    })
}
