//! Error handling for the fastmem library
//!
//! The raw copy entry points never fail: detection problems degrade to
//! defaults and precondition violations are undefined behavior. Errors only
//! come out of the safe surface, that is slice wrappers, configuration
//! parsing and configuration file I/O.

use thiserror::Error;

/// Main error type for the fastmem library
#[derive(Error, Debug)]
pub enum FastMemError {
    /// I/O related errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid data format, e.g. an unparsable cache size string
    #[error("Invalid data: {message}")]
    InvalidData {
        /// Error message describing the issue
        message: String,
    },

    /// Source and destination slices passed to a safe wrapper differ in length
    #[error("Length mismatch: destination is {dst} bytes, source is {src} bytes")]
    LengthMismatch {
        /// Destination length in bytes
        dst: usize,
        /// Source length in bytes
        src: usize,
    },

    /// Configuration or parameter errors
    #[error("Invalid configuration: {message}")]
    Configuration {
        /// Configuration error message
        message: String,
    },
}

impl FastMemError {
    /// Create an invalid data error
    pub fn invalid_data<S: Into<String>>(message: S) -> Self {
        Self::InvalidData { message: message.into() }
    }

    /// Create a length mismatch error
    pub fn length_mismatch(dst: usize, src: usize) -> Self {
        Self::LengthMismatch { dst, src }
    }

    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration { message: message.into() }
    }

    /// Get the error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            Self::Io(_) => "io",
            Self::InvalidData { .. } => "data",
            Self::LengthMismatch { .. } => "length",
            Self::Configuration { .. } => "config",
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, FastMemError>;

/// Fail with [`FastMemError::LengthMismatch`] unless both lengths agree
#[inline]
pub fn check_same_len(dst: usize, src: usize) -> Result<()> {
    if dst != src {
        Err(FastMemError::length_mismatch(dst, src))
    } else {
        Ok(())
    }
}
