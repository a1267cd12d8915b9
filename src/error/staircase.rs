// Staircase controller error types

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Staircase error code constants
///
/// Error code range: 3001-3002
pub struct StaircaseErrorCodes {}

impl StaircaseErrorCodes {
    /// Configuration violates its invariants
    pub const INVALID_CONFIG: i32 = 3001;

    /// Response fed to a run that already resolved its threshold
    pub const ALREADY_TERMINATED: i32 = 3002;
}

/// Log a staircase error with structured context
pub fn log_staircase_error(err: &StaircaseError, context: &str) {
    error!(
        "Staircase error in {}: code={}, component=StaircaseController, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Staircase controller errors
///
/// Both variants are programmer errors in the orchestrating layer rather
/// than runtime conditions.
#[derive(Debug, Clone, PartialEq)]
pub enum StaircaseError {
    /// Config violates `min <= initial <= max` or has a non-positive step/count
    InvalidConfig { reason: String },

    /// `advance` called after termination
    AlreadyTerminated { threshold: f32 },
}

impl ErrorCode for StaircaseError {
    fn code(&self) -> i32 {
        match self {
            StaircaseError::InvalidConfig { .. } => StaircaseErrorCodes::INVALID_CONFIG,
            StaircaseError::AlreadyTerminated { .. } => StaircaseErrorCodes::ALREADY_TERMINATED,
        }
    }

    fn message(&self) -> String {
        match self {
            StaircaseError::InvalidConfig { reason } => {
                format!("Invalid staircase config: {}", reason)
            }
            StaircaseError::AlreadyTerminated { threshold } => format!(
                "Staircase already terminated at {:.1} dB. Call initialize() for a new run.",
                threshold
            ),
        }
    }
}

impl fmt::Display for StaircaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "StaircaseError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for StaircaseError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_staircase_error_codes() {
        assert_eq!(
            StaircaseError::InvalidConfig {
                reason: "test".to_string()
            }
            .code(),
            StaircaseErrorCodes::INVALID_CONFIG
        );
        assert_eq!(
            StaircaseError::AlreadyTerminated { threshold: -30.0 }.code(),
            StaircaseErrorCodes::ALREADY_TERMINATED
        );
    }

    #[test]
    fn test_staircase_error_messages() {
        let err = StaircaseError::AlreadyTerminated { threshold: -32.0 };
        assert!(err.message().contains("-32.0 dB"));

        let err = StaircaseError::InvalidConfig {
            reason: "step_up must be > 0".to_string(),
        };
        assert_eq!(err.message(), "Invalid staircase config: step_up must be > 0");
    }
}
