// Error types for the hearing check core
//
// This module defines custom error types for audio output, tone playback and
// the staircase controller, providing structured error handling with stable
// numeric codes for the orchestrating layer.

mod audio;
mod session;
mod staircase;

pub use audio::{
    log_audio_init_error, log_playback_error, AudioErrorCodes, AudioInitError, PlaybackError,
};
pub use session::{log_session_error, SessionError, SessionErrorCodes};
pub use staircase::{log_staircase_error, StaircaseError, StaircaseErrorCodes};

/// Error codes for structured error reporting
///
/// This trait provides a standard way to get error codes and messages
/// from custom error types, enabling consistent error handling across
/// the crate boundary.
pub trait ErrorCode {
    /// Get the numeric error code
    fn code(&self) -> i32;

    /// Get the human-readable error message
    fn message(&self) -> String;
}
