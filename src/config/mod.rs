//! Configuration APIs for fastmem
//!
//! The [`Config`] trait gives every configuration type validation,
//! environment initialization, presets and JSON file persistence.
//! [`CopyConfig`] is the one configuration the copy dispatcher consumes.
//!
//! # Preset Configurations
//!
//! ```rust
//! use fastmem::config::{Config, CopyConfig};
//!
//! // Stream above the last-level cache (the default)
//! let config = CopyConfig::performance_preset();
//!
//! // Stream above L2, leaving L3 to other data
//! let config = CopyConfig::memory_preset();
//!
//! // Shorter prefetch distance for lower per-call latency
//! let config = CopyConfig::realtime_preset();
//! ```
//!
//! # Environment Initialization
//!
//! ```rust
//! use fastmem::config::{Config, CopyConfig};
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Reads FASTMEM_SIMD_ENABLE, FASTMEM_STREAMING_THRESHOLD, ...
//! let config = CopyConfig::from_env()?;
//!
//! // Same variables under a custom prefix
//! let config = CopyConfig::from_env_with_prefix("MYAPP_")?;
//! # Ok(())
//! # }
//! ```
//!
//! Configuration can only narrow the kernel choice. It never enables a kernel
//! the build did not compile in or the host cannot run.

use crate::error::{FastMemError, Result};
use std::env;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

pub mod copy;

#[cfg(test)]
mod tests;

pub use copy::{CopyConfig, StreamingThreshold};

/// Environment variable prefix used by [`Config::from_env`]
pub const ENV_PREFIX: &str = "FASTMEM_";

/// Common configuration trait providing validation, environment initialization,
/// and preset management functionality.
pub trait Config: Clone + fmt::Debug {
    /// Validate the configuration for correctness and consistency.
    fn validate(&self) -> Result<()>;

    /// Initialize configuration from environment variables.
    ///
    /// Variables use the format `FASTMEM_{FIELD}`, for example
    /// `FASTMEM_PREFETCH_DISTANCE=4`. Unset variables keep their defaults.
    fn from_env() -> Result<Self>
    where
        Self: Default,
    {
        Self::from_env_with_prefix(ENV_PREFIX)
    }

    /// Initialize configuration from environment variables with a custom prefix.
    fn from_env_with_prefix(prefix: &str) -> Result<Self>
    where
        Self: Default;

    /// Get a performance-optimized preset configuration.
    fn performance_preset() -> Self;

    /// Get a memory-optimized preset configuration.
    ///
    /// Favors leaving cache capacity to other data over raw copy speed.
    fn memory_preset() -> Self;

    /// Get a real-time preset configuration.
    fn realtime_preset() -> Self;

    /// Get a balanced preset configuration.
    fn balanced_preset() -> Self
    where
        Self: Default,
    {
        Self::default()
    }

    /// Save configuration to a JSON file.
    fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()>;

    /// Load and validate configuration from a JSON file.
    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self>;
}

/// Parse an environment variable, keeping `default` when it is unset.
///
/// A variable that is set but does not parse is an error rather than a
/// silent fallback.
pub fn parse_env_var<T>(var_name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match env::var(var_name) {
        Ok(raw) => raw.trim().parse().map_err(|e| {
            FastMemError::configuration(format!("{}={:?} is not valid: {}", var_name, raw, e))
        }),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(e) => Err(FastMemError::configuration(format!("{}: {}", var_name, e))),
    }
}

/// Parse a boolean environment variable.
///
/// Accepts "true", "1", "yes", "on" and "false", "0", "no", "off"
/// (case-insensitive).
pub fn parse_env_bool(var_name: &str, default: bool) -> Result<bool> {
    match env::var(var_name) {
        Ok(raw) => match raw.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" => Ok(false),
            _ => Err(FastMemError::configuration(format!(
                "{}={:?} is not a boolean",
                var_name, raw
            ))),
        },
        Err(env::VarError::NotPresent) => Ok(default),
        Err(e) => Err(FastMemError::configuration(format!("{}: {}", var_name, e))),
    }
}
