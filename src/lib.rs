// Hearing Check Core - pure-tone threshold measurement
// Adaptive staircase controller plus envelope-shaped, channel-routed tone playback

// Module declarations
pub mod audio;
pub mod config;
pub mod error;
pub mod gain;
pub mod logging;
pub mod session;
pub mod staircase;

// Re-exports for convenience
pub use audio::{Channel, OfflineBackend, Pace, ToneEngine, ToneRequest};
pub use config::AppConfig;
pub use error::{AudioInitError, ErrorCode, PlaybackError, SessionError, StaircaseError};
pub use logging::init_logging;
pub use session::{
    Presentation, ResponseSource, SimulatedListener, ThresholdResult, ThresholdSession, Trial,
};
pub use staircase::{Response, StaircaseConfig, StaircaseState, StaircaseStep};
