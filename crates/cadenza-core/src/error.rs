//! Error types for the Cadenza integrator framework.
//!
//! Two subsystems can fail in a recoverable-to-report way: configuration
//! (setup values, option strings, buffer keys) and buffer dependency
//! resolution. Both are fatal to the run; neither is retried.

use std::error::Error;
use std::fmt;

use crate::buffer::BufferKey;

/// Errors from configuration and setup validation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// A buffer key is outside the known buffer table.
    UnknownBuffer {
        /// The raw key value.
        key: u32,
    },
    /// No buffer carries the given printable name.
    UnknownBufferName {
        /// The name that was looked up.
        name: String,
    },
    /// A token of a comma-separated device list is not a device number.
    InvalidDeviceToken {
        /// The offending token.
        token: String,
    },
    /// A device list parsed to zero devices.
    EmptyDeviceList,
    /// The same device appears twice in a device list.
    DuplicateDevice {
        /// The repeated device number.
        device: u32,
    },
    /// An option value is not a recognized boolean.
    InvalidBoolOption {
        /// The option key.
        key: String,
        /// The rejected value.
        value: String,
    },
    /// The neighbor list rebuild frequency is zero.
    InvalidNeibFreq,
    /// The effective-pressure solver is enabled with a zero iteration cap.
    InvalidEffPresIterations,
    /// The run is capped at zero iterations.
    InvalidMaxIterations,
    /// A filter is enabled with a zero frequency.
    InvalidFilterFrequency {
        /// Name of the filter.
        filter: &'static str,
    },
    /// The same filter is enabled twice.
    DuplicateFilter {
        /// Name of the filter.
        filter: &'static str,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownBuffer { key } => write!(f, "unknown buffer key {key}"),
            Self::UnknownBufferName { name } => write!(f, "unknown buffer name '{name}'"),
            Self::InvalidDeviceToken { token } => {
                write!(f, "device token '{token}' is not a number")
            }
            Self::EmptyDeviceList => write!(f, "device list is empty"),
            Self::DuplicateDevice { device } => {
                write!(f, "device {device} listed more than once")
            }
            Self::InvalidBoolOption { key, value } => {
                write!(f, "invalid boolean value '{value}' for key '{key}'")
            }
            Self::InvalidNeibFreq => {
                write!(f, "neighbor list rebuild frequency must be positive")
            }
            Self::InvalidEffPresIterations => {
                write!(f, "effective pressure solver needs a positive iteration cap")
            }
            Self::InvalidMaxIterations => {
                write!(f, "final iteration must be positive when set")
            }
            Self::InvalidFilterFrequency { filter } => {
                write!(f, "filter '{filter}' enabled with zero frequency")
            }
            Self::DuplicateFilter { filter } => {
                write!(f, "filter '{filter}' enabled more than once")
            }
        }
    }
}

impl Error for ConfigError {}

/// Errors from resolving a command's declared buffers against the
/// live state table.
///
/// Any of these indicates a phase graph construction bug: a command
/// declares an input that the preceding commands never produced.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResolveError {
    /// The named state does not exist.
    MissingState {
        /// The requested state name.
        state: String,
    },
    /// The state exists but lacks a requested buffer.
    MissingBuffer {
        /// The state that was searched.
        state: String,
        /// The missing buffer.
        buffer: BufferKey,
    },
    /// The buffer exists in the state but holds no valid data.
    InvalidBuffer {
        /// The state that was searched.
        state: String,
        /// The invalid buffer.
        buffer: BufferKey,
    },
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingState { state } => write!(f, "state '{state}' does not exist"),
            Self::MissingBuffer { state, buffer } => {
                write!(f, "state '{state}' has no buffer {buffer}")
            }
            Self::InvalidBuffer { state, buffer } => {
                write!(f, "buffer {buffer} in state '{state}' is not valid")
            }
        }
    }
}

impl Error for ResolveError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_error_messages_name_state_and_buffer() {
        let err = ResolveError::MissingBuffer {
            state: "step n".into(),
            buffer: BufferKey::VEL,
        };
        assert_eq!(err.to_string(), "state 'step n' has no buffer Velocity");

        let err = ResolveError::InvalidBuffer {
            state: "step n*".into(),
            buffer: BufferKey::FORCES,
        };
        assert_eq!(err.to_string(), "buffer Force in state 'step n*' is not valid");
    }

    #[test]
    fn config_error_messages() {
        let err = ConfigError::InvalidBoolOption {
            key: "dem".into(),
            value: "maybe".into(),
        };
        assert_eq!(err.to_string(), "invalid boolean value 'maybe' for key 'dem'");
        assert_eq!(
            ConfigError::InvalidDeviceToken { token: "x".into() }.to_string(),
            "device token 'x' is not a number"
        );
    }
}
