use headfix_core::{ArrayKind, ConfigError};
use thiserror::Error;

/// Failures while generating or assembling a session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// No candidate satisfied every constraint within the attempt budget.
    #[error("session configuration infeasible after {attempts} attempts: {reason}")]
    ConfigInfeasible { attempts: u32, reason: String },

    #[error("{array} array has {actual} entries, expected {expected}")]
    ArrayLengthMismatch {
        array: ArrayKind,
        expected: usize,
        actual: usize,
    },

    #[error("{array} value {value} at index {index} does not fit a signed 32-bit field")]
    ValueOutOfRange {
        array: ArrayKind,
        index: usize,
        value: u32,
    },

    #[error(transparent)]
    InvalidConfig(#[from] ConfigError),
}

impl SessionError {
    pub(crate) fn infeasible(attempts: u32, reason: impl Into<String>) -> Self {
        SessionError::ConfigInfeasible {
            attempts,
            reason: reason.into(),
        }
    }
}
