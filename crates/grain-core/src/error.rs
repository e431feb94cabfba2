//! Error types for the Grain allocator.
//!
//! Contract violations (operating an uninitialized arena, installing the
//! sentinel twice, and the like) are programming errors and panic. The only
//! recoverable failures are configuration problems detected at setup time.

use std::error::Error;
use std::fmt;

/// Errors reported while validating allocator or heap configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// A configuration value is out of range or inconsistent.
    InvalidConfig {
        /// Human-readable description of the problem.
        reason: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidConfig { reason } => write!(f, "invalid configuration: {reason}"),
        }
    }
}

impl Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_reason() {
        let err = ConfigError::InvalidConfig {
            reason: "heap_word_size must be a power of two".into(),
        };
        assert_eq!(
            err.to_string(),
            "invalid configuration: heap_word_size must be a power of two"
        );
    }
}
