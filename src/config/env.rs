//! Environment variable support for [`HarnessConfig`].
//!
//! # Supported Environment Variables
//!
//! | Variable | Type | Maps to |
//! |----------|------|---------|
//! | `RESOLVE_STRESS_RESOLVE_NAME` | `String` | [`Mode::ResolveByName`] selector |
//! | `RESOLVE_STRESS_FS_TYPE` | `String` | [`Mode::CheckFilesystemType`] selector |
//! | `RESOLVE_STRESS_WORKERS` | `usize` | `workers` |
//! | `RESOLVE_STRESS_ITERATION_BOUND` | `u64` | busy-poll `iteration_bound` |
//! | `RESOLVE_STRESS_WAKER` | `spin` \| `notified` | `waker` |
//! | `RESOLVE_STRESS_THREAD_PREFIX` | `String` | `thread_name_prefix` |
//! | `RESOLVE_STRESS_COMPLETION_TIMEOUT_MS` | `u64` | `completion_timeout` |
//!
//! Only variables that are set are applied; programmatic values that were
//! already placed in the config are overwritten.

use std::time::Duration;

use super::{HarnessConfig, Mode, WakerStrategy, DEFAULT_ITERATION_BOUND};
use crate::error::ConfigError;

/// Environment variable selecting resolve-by-name mode.
pub const ENV_RESOLVE_NAME: &str = "RESOLVE_STRESS_RESOLVE_NAME";
/// Environment variable selecting filesystem-type mode.
pub const ENV_FS_TYPE: &str = "RESOLVE_STRESS_FS_TYPE";
/// Environment variable name for worker count.
pub const ENV_WORKERS: &str = "RESOLVE_STRESS_WORKERS";
/// Environment variable name for the busy-poll iteration bound.
pub const ENV_ITERATION_BOUND: &str = "RESOLVE_STRESS_ITERATION_BOUND";
/// Environment variable name for the waker strategy.
pub const ENV_WAKER: &str = "RESOLVE_STRESS_WAKER";
/// Environment variable name for the thread name prefix.
pub const ENV_THREAD_PREFIX: &str = "RESOLVE_STRESS_THREAD_PREFIX";
/// Environment variable name for the completion wait bound in milliseconds.
pub const ENV_COMPLETION_TIMEOUT_MS: &str = "RESOLVE_STRESS_COMPLETION_TIMEOUT_MS";

/// Reads the mode selectors from the environment.
pub fn mode_from_env() -> Result<Mode, ConfigError> {
    mode_from_lookup(read_env)
}

/// Apply environment variable overrides to a [`HarnessConfig`].
///
/// Returns an error if a variable is set but contains an unparseable value.
/// The result is not validated, so later overrides (command-line flags) can
/// still replace an out-of-range value; call [`HarnessConfig::validate`] once
/// every source has been applied.
pub fn apply_env_overrides(config: &mut HarnessConfig) -> Result<(), ConfigError> {
    apply_overrides_with(config, read_env)
}

pub(crate) fn mode_from_lookup<F>(lookup: F) -> Result<Mode, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    Mode::from_selectors(lookup(ENV_RESOLVE_NAME), lookup(ENV_FS_TYPE))
}

pub(crate) fn apply_overrides_with<F>(
    config: &mut HarnessConfig,
    lookup: F,
) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(val) = lookup(ENV_WORKERS) {
        config.workers = parse_usize(ENV_WORKERS, &val)?;
    }
    if let Some(val) = lookup(ENV_WAKER) {
        config.waker = parse_waker(&val, config.waker)?;
    }
    // The bound implies busy-poll, regardless of order.
    if let Some(val) = lookup(ENV_ITERATION_BOUND) {
        config.waker = WakerStrategy::BusyPoll {
            iteration_bound: parse_u64(ENV_ITERATION_BOUND, &val)?,
        };
    }
    if let Some(val) = lookup(ENV_THREAD_PREFIX) {
        config.thread_name_prefix = val;
    }
    if let Some(val) = lookup(ENV_COMPLETION_TIMEOUT_MS) {
        let millis = parse_u64(ENV_COMPLETION_TIMEOUT_MS, &val)?;
        config.completion_timeout = Some(Duration::from_millis(millis));
    }
    Ok(())
}

/// Read an environment variable, returning `None` if unset.
fn read_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

fn parse_usize(var: &'static str, val: &str) -> Result<usize, ConfigError> {
    val.trim()
        .parse::<usize>()
        .map_err(|e| invalid(var, val, format!("expected unsigned integer ({e})")))
}

fn parse_u64(var: &'static str, val: &str) -> Result<u64, ConfigError> {
    val.trim()
        .parse::<u64>()
        .map_err(|e| invalid(var, val, format!("expected u64 ({e})")))
}

fn parse_waker(val: &str, current: WakerStrategy) -> Result<WakerStrategy, ConfigError> {
    match val.trim().to_lowercase().as_str() {
        "spin" | "busy-poll" | "busy_poll" => Ok(match current {
            busy @ WakerStrategy::BusyPoll { .. } => busy,
            WakerStrategy::Notified => WakerStrategy::BusyPoll {
                iteration_bound: DEFAULT_ITERATION_BOUND,
            },
        }),
        "notified" | "condvar" => Ok(WakerStrategy::Notified),
        _ => Err(invalid(ENV_WAKER, val, "expected spin or notified".into())),
    }
}

fn invalid(var: &'static str, val: &str, reason: String) -> ConfigError {
    ConfigError::InvalidEnv {
        var,
        value: val.to_string(),
        reason,
    }
}
