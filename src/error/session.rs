// Session driver error types

use crate::error::{ErrorCode, PlaybackError, StaircaseError};
use log::error;
use std::fmt;

/// Session error code constants
///
/// Error code range: 4001-4004
pub struct SessionErrorCodes {}

impl SessionErrorCodes {
    /// Tone playback failed
    pub const PLAYBACK: i32 = 4001;

    /// Controller rejected a transition
    pub const STAIRCASE: i32 = 4002;

    /// Tone did not finish within the orchestrator's timeout
    pub const PLAYBACK_TIMEOUT: i32 = 4003;

    /// Response source ended the session
    pub const ABORTED: i32 = 4004;
}

/// Log a session error with structured context
pub fn log_session_error(err: &SessionError, context: &str) {
    error!(
        "Session error in {}: code={}, component=ThresholdSession, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Errors ending a threshold measurement
#[derive(Debug, Clone, PartialEq)]
pub enum SessionError {
    Playback(PlaybackError),
    Staircase(StaircaseError),
    PlaybackTimeout { timeout_ms: u64 },
    Aborted { reason: String },
}

impl ErrorCode for SessionError {
    fn code(&self) -> i32 {
        match self {
            SessionError::Playback(_) => SessionErrorCodes::PLAYBACK,
            SessionError::Staircase(_) => SessionErrorCodes::STAIRCASE,
            SessionError::PlaybackTimeout { .. } => SessionErrorCodes::PLAYBACK_TIMEOUT,
            SessionError::Aborted { .. } => SessionErrorCodes::ABORTED,
        }
    }

    fn message(&self) -> String {
        match self {
            SessionError::Playback(err) => err.message(),
            SessionError::Staircase(err) => err.message(),
            SessionError::PlaybackTimeout { timeout_ms } => {
                format!("Tone did not finish within {} ms", timeout_ms)
            }
            SessionError::Aborted { reason } => format!("Session aborted: {}", reason),
        }
    }
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SessionError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for SessionError {}

impl From<PlaybackError> for SessionError {
    fn from(err: PlaybackError) -> Self {
        SessionError::Playback(err)
    }
}

impl From<StaircaseError> for SessionError {
    fn from(err: StaircaseError) -> Self {
        SessionError::Staircase(err)
    }
}
