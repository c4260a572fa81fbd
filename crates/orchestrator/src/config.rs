//! Orchestrator configuration loaded from environment variables.

use std::str::FromStr;
use std::time::Duration;

use saga::RetryPolicy;
use thiserror::Error;

/// A configuration value that could not be parsed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Invalid value {value:?} for {key}: expected {expected}")]
pub struct ConfigError {
    pub key: &'static str,
    pub value: String,
    pub expected: &'static str,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => Err(()),
        }
    }
}

/// Orchestrator configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT`: `text` or `json` (default: `text`)
/// - `SAGA_RETRY_ATTEMPTS`: publish attempts per command (default: `3`)
/// - `SAGA_RETRY_BASE_DELAY_MS`: delay before the first retry (default: `100`)
/// - `DEMO_TIMEOUT_SECS`: how long the demo waits for its payment (default: `5`)
/// - `DEMO_FAIL_HOLD`: make the simulated wallet reject holds (default: `false`)
/// - `DEMO_FAIL_AUTHORIZE`: make the simulated gateway decline (default: `false`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub log_level: String,
    pub log_format: LogFormat,
    pub retry_attempts: u32,
    pub retry_base_delay: Duration,
    pub demo_timeout: Duration,
    pub fail_hold: bool,
    pub fail_authorize: bool,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through `lookup`, which returns a variable's value if set.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let log_format = match lookup("LOG_FORMAT") {
            Some(value) => value.parse().map_err(|()| ConfigError {
                key: "LOG_FORMAT",
                value,
                expected: "text or json",
            })?,
            None => defaults.log_format,
        };
        let retry_attempts = match lookup("SAGA_RETRY_ATTEMPTS") {
            Some(value) => match value.parse::<u32>() {
                Ok(attempts) if attempts > 0 => attempts,
                _ => {
                    return Err(ConfigError {
                        key: "SAGA_RETRY_ATTEMPTS",
                        value,
                        expected: "a positive integer",
                    });
                }
            },
            None => defaults.retry_attempts,
        };

        Ok(Self {
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            log_format,
            retry_attempts,
            retry_base_delay: parse_millis(&lookup, "SAGA_RETRY_BASE_DELAY_MS")?
                .unwrap_or(defaults.retry_base_delay),
            demo_timeout: parse_secs(&lookup, "DEMO_TIMEOUT_SECS")?
                .unwrap_or(defaults.demo_timeout),
            fail_hold: parse_flag(&lookup, "DEMO_FAIL_HOLD")?.unwrap_or(defaults.fail_hold),
            fail_authorize: parse_flag(&lookup, "DEMO_FAIL_AUTHORIZE")?
                .unwrap_or(defaults.fail_authorize),
        })
    }

    /// Returns the publish retry policy for outbound commands.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::exponential(self.retry_attempts, self.retry_base_delay)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            retry_attempts: 3,
            retry_base_delay: Duration::from_millis(100),
            demo_timeout: Duration::from_secs(5),
            fail_hold: false,
            fail_authorize: false,
        }
    }
}

fn parse_u64<F>(lookup: &F, key: &'static str) -> Result<Option<u64>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|value| {
            value.parse().map_err(|_| ConfigError {
                key,
                value,
                expected: "a non-negative integer",
            })
        })
        .transpose()
}

fn parse_millis<F>(lookup: &F, key: &'static str) -> Result<Option<Duration>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    Ok(parse_u64(lookup, key)?.map(Duration::from_millis))
}

fn parse_secs<F>(lookup: &F, key: &'static str) -> Result<Option<Duration>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    Ok(parse_u64(lookup, key)?.map(Duration::from_secs))
}

fn parse_flag<F>(lookup: &F, key: &'static str) -> Result<Option<bool>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|value| match value.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError {
                key,
                value,
                expected: "true or false",
            }),
        })
        .transpose()
}
