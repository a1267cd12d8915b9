// Audio output and tone playback error types

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Audio error code constants
///
/// Single source of truth for the numeric codes surfaced to the
/// orchestrating layer.
///
/// Error code ranges: 2001-2005 (acquisition), 2101-2105 (playback)
pub struct AudioErrorCodes {}

impl AudioErrorCodes {
    /// No output device is available on the default host
    pub const NO_OUTPUT_DEVICE: i32 = 2001;

    /// Output device offers no sample format the engine can write
    pub const UNSUPPORTED_FORMAT: i32 = 2002;

    /// Building the output stream failed
    pub const STREAM_BUILD_FAILED: i32 = 2003;

    /// Starting or resuming the output stream failed
    pub const STREAM_START_FAILED: i32 = 2004;

    /// Audio thread went away while the device was being acquired
    pub const OUTPUT_THREAD_FAILED: i32 = 2005;

    /// Engine has no acquired output
    pub const NOT_READY: i32 = 2101;

    /// Voice command queue to the audio thread is full
    pub const QUEUE_FULL: i32 = 2102;

    /// Tone completion signal was dropped before the release finished
    pub const INTERRUPTED: i32 = 2103;

    /// Mutex was poisoned
    pub const LOCK_POISONED: i32 = 2104;

    /// Lazy acquisition inside `play` failed
    pub const OUTPUT_UNAVAILABLE: i32 = 2105;
}

/// Log an acquisition error with structured context
///
/// The logging is non-blocking and will not panic on failure.
pub fn log_audio_init_error(err: &AudioInitError, context: &str) {
    error!(
        "Audio init error in {}: code={}, component=ToneEngine, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Log a per-tone playback error with structured context
pub fn log_playback_error(err: &PlaybackError, context: &str) {
    error!(
        "Playback error in {}: code={}, component=ToneEngine, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Output device could not be acquired or resumed
///
/// Fatal to the `ensure_ready`/`play` call that hit it. No partial output
/// state is retained, so the call can be retried after fresh user interaction.
#[derive(Debug, Clone, PartialEq)]
pub enum AudioInitError {
    /// No default output device found
    NoOutputDevice,

    /// Device sample format is not f32/i16/u16
    UnsupportedFormat { format: String },

    /// Stream could not be built
    StreamBuildFailed { reason: String },

    /// Stream could not be started or resumed
    StreamStartFailed { reason: String },

    /// Output thread exited before reporting readiness
    OutputThreadFailed { reason: String },
}

impl ErrorCode for AudioInitError {
    fn code(&self) -> i32 {
        match self {
            AudioInitError::NoOutputDevice => AudioErrorCodes::NO_OUTPUT_DEVICE,
            AudioInitError::UnsupportedFormat { .. } => AudioErrorCodes::UNSUPPORTED_FORMAT,
            AudioInitError::StreamBuildFailed { .. } => AudioErrorCodes::STREAM_BUILD_FAILED,
            AudioInitError::StreamStartFailed { .. } => AudioErrorCodes::STREAM_START_FAILED,
            AudioInitError::OutputThreadFailed { .. } => AudioErrorCodes::OUTPUT_THREAD_FAILED,
        }
    }

    fn message(&self) -> String {
        match self {
            AudioInitError::NoOutputDevice => "No default output device found".to_string(),
            AudioInitError::UnsupportedFormat { format } => {
                format!("Unsupported output sample format: {}", format)
            }
            AudioInitError::StreamBuildFailed { reason } => {
                format!("Failed to build output stream: {}", reason)
            }
            AudioInitError::StreamStartFailed { reason } => {
                format!("Failed to start output stream: {}", reason)
            }
            AudioInitError::OutputThreadFailed { reason } => {
                format!("Output thread failed: {}", reason)
            }
        }
    }
}

impl fmt::Display for AudioInitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "AudioInitError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for AudioInitError {}

/// Scheduling a single tone failed after the output was acquired
///
/// Isolated to that tone; other active tones keep sounding.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackError {
    /// Output was disposed while the tone was being scheduled
    NotReady,

    /// Audio thread command queue is full
    QueueFull { capacity: usize },

    /// Completion signal dropped before the tone finished
    Interrupted { tone_id: u64 },

    /// Mutex was poisoned
    LockPoisoned { component: String },

    /// Output acquisition failed while starting the tone
    OutputUnavailable { source: AudioInitError },
}

impl ErrorCode for PlaybackError {
    fn code(&self) -> i32 {
        match self {
            PlaybackError::NotReady => AudioErrorCodes::NOT_READY,
            PlaybackError::QueueFull { .. } => AudioErrorCodes::QUEUE_FULL,
            PlaybackError::Interrupted { .. } => AudioErrorCodes::INTERRUPTED,
            PlaybackError::LockPoisoned { .. } => AudioErrorCodes::LOCK_POISONED,
            PlaybackError::OutputUnavailable { .. } => AudioErrorCodes::OUTPUT_UNAVAILABLE,
        }
    }

    fn message(&self) -> String {
        match self {
            PlaybackError::NotReady => {
                "Audio output not ready. Call ensure_ready() first.".to_string()
            }
            PlaybackError::QueueFull { capacity } => {
                format!("Voice queue full ({} pending tones)", capacity)
            }
            PlaybackError::Interrupted { tone_id } => {
                format!("Tone {} ended without completing its release", tone_id)
            }
            PlaybackError::LockPoisoned { component } => {
                format!("Lock poisoned on {}", component)
            }
            PlaybackError::OutputUnavailable { source } => {
                format!("Audio output unavailable: {}", source.message())
            }
        }
    }
}

impl fmt::Display for PlaybackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PlaybackError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for PlaybackError {}

impl From<AudioInitError> for PlaybackError {
    fn from(source: AudioInitError) -> Self {
        PlaybackError::OutputUnavailable { source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_init_error_codes() {
        assert_eq!(
            AudioInitError::NoOutputDevice.code(),
            AudioErrorCodes::NO_OUTPUT_DEVICE
        );
        assert_eq!(
            AudioInitError::UnsupportedFormat {
                format: "I8".to_string()
            }
            .code(),
            AudioErrorCodes::UNSUPPORTED_FORMAT
        );
        assert_eq!(
            AudioInitError::StreamBuildFailed {
                reason: "test".to_string()
            }
            .code(),
            AudioErrorCodes::STREAM_BUILD_FAILED
        );
        assert_eq!(
            AudioInitError::StreamStartFailed {
                reason: "test".to_string()
            }
            .code(),
            AudioErrorCodes::STREAM_START_FAILED
        );
        assert_eq!(
            AudioInitError::OutputThreadFailed {
                reason: "test".to_string()
            }
            .code(),
            AudioErrorCodes::OUTPUT_THREAD_FAILED
        );
    }

    #[test]
    fn test_playback_error_codes() {
        assert_eq!(PlaybackError::NotReady.code(), AudioErrorCodes::NOT_READY);
        assert_eq!(
            PlaybackError::QueueFull { capacity: 8 }.code(),
            AudioErrorCodes::QUEUE_FULL
        );
        assert_eq!(
            PlaybackError::Interrupted { tone_id: 3 }.code(),
            AudioErrorCodes::INTERRUPTED
        );
        assert_eq!(
            PlaybackError::LockPoisoned {
                component: "test".to_string()
            }
            .code(),
            AudioErrorCodes::LOCK_POISONED
        );
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            AudioInitError::NoOutputDevice.message(),
            "No default output device found"
        );
        assert!(PlaybackError::NotReady.message().contains("ensure_ready"));
        assert_eq!(
            PlaybackError::QueueFull { capacity: 32 }.message(),
            "Voice queue full (32 pending tones)"
        );
    }

    #[test]
    fn test_error_display() {
        let err = AudioInitError::StreamStartFailed {
            reason: "device suspended".to_string(),
        };
        let display = format!("{}", err);
        assert!(display.contains("AudioInitError"));
        assert!(display.contains(&err.code().to_string()));
        assert!(display.contains("device suspended"));
    }

    #[test]
    fn test_init_error_wrapped_in_playback_error() {
        let err: PlaybackError = AudioInitError::NoOutputDevice.into();
        assert_eq!(err.code(), AudioErrorCodes::OUTPUT_UNAVAILABLE);
        assert!(err.message().contains("No default output device found"));
        assert_eq!(
            err,
            PlaybackError::OutputUnavailable {
                source: AudioInitError::NoOutputDevice
            }
        );
    }
}
