//! Backend abstractions for the tone playback engine.
//!
//! A backend acquires an output device (or a stand-in for one) and drives a
//! [`ToneMixer`] from its own audio thread. The engine only sees the
//! returned [`OutputStream`]; dropping it releases the device.

use crate::audio::mixer::ToneMixer;
use crate::error::AudioInitError;

/// Trait implemented by output backends.
pub trait OutputBackend: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Acquire the output and start rendering `mixer` on it.
    ///
    /// On failure nothing is left running.
    fn open(&self, mixer: ToneMixer) -> Result<Box<dyn OutputStream>, AudioInitError>;
}

/// Handle to an acquired output. Dropping it stops rendering and releases
/// the device.
pub trait OutputStream: Send {
    fn sample_rate(&self) -> u32;

    /// Resume a suspended output. Must be a no-op on a running one.
    fn resume(&mut self) -> Result<(), AudioInitError>;
}

mod cpal;
pub use self::cpal::CpalBackend;

mod offline;
pub use offline::{CaptureBuffer, OfflineBackend, Pace};
