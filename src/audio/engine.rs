//! ToneEngine - envelope-shaped, channel-routed probe tones
//!
//! This module provides the playback engine the orchestrator drives.
//! Key features:
//! - Lazy, idempotent acquisition of the output (`ensure_ready`)
//! - One voice chain per `play` call, any number in flight at once
//! - `play` resolves when the tone's release has finished
//! - `stop_all` silences every in-flight tone immediately
//!
//! Architecture:
//! - Control side: `ToneRegistry` tracks in-flight tones under one mutex
//! - Audio side: `ToneMixer` owns the voices, fed through an `rtrb` queue
//! - Backend: owns the device (or a device-free renderer) and its thread
//!
//! Thread safety:
//! - Output handle and voice producer: behind one `Mutex`
//! - Cancellation: `AtomicBool` per voice, read by the audio thread
//! - Completion: `tokio::sync::oneshot` per tone

use std::sync::{Arc, Mutex, MutexGuard};

use log::{debug, info, warn};
use rtrb::Producer;
use tokio::sync::oneshot;

use super::backend::{CpalBackend, OutputBackend, OutputStream};
use super::mixer::ToneMixer;
use super::registry::{ToneId, ToneRegistry};
use super::tone::ToneRequest;
use super::voice::{VoiceControl, VoiceSpec};
use crate::config::{AudioConfig, PlaybackConfig};
use crate::error::{log_audio_init_error, log_playback_error, AudioInitError, PlaybackError};

/// Acquired output plus the queue feeding its mixer
struct ActiveOutput {
    stream: Box<dyn OutputStream>,
    commands: Producer<VoiceSpec>,
}

/// Tone playback engine
///
/// Owns the output resource explicitly: `ensure_ready` acquires it,
/// `dispose` releases it, and dropping the engine disposes it.
///
/// # Example
/// ```ignore
/// let engine = ToneEngine::default_output();
/// engine.ensure_ready()?;
/// engine.play(ToneRequest::new(1000.0, Channel::Left, -20.0)).await?;
/// engine.dispose();
/// ```
pub struct ToneEngine {
    backend: Arc<dyn OutputBackend>,
    playback: PlaybackConfig,
    audio: AudioConfig,
    output: Mutex<Option<ActiveOutput>>,
    registry: ToneRegistry,
}

impl ToneEngine {
    pub fn new(backend: Arc<dyn OutputBackend>, playback: PlaybackConfig, audio: AudioConfig) -> Self {
        Self {
            backend,
            playback,
            audio,
            output: Mutex::new(None),
            registry: ToneRegistry::new(audio.max_voices),
        }
    }

    /// Engine on the default cpal output device with default settings
    pub fn default_output() -> Self {
        Self::new(
            Arc::new(CpalBackend::new()),
            PlaybackConfig::default(),
            AudioConfig::default(),
        )
    }

    /// Acquire the output if needed, or resume it if suspended
    ///
    /// Idempotent: repeated calls reuse the acquired output. On failure no
    /// output is retained, so the next call starts from scratch.
    ///
    /// # Errors
    /// `AudioInitError` if the device can't be acquired or resumed
    pub fn ensure_ready(&self) -> Result<(), AudioInitError> {
        let mut output = self.lock_output();

        if let Some(active) = output.as_mut() {
            return match active.stream.resume() {
                Ok(()) => Ok(()),
                Err(err) => {
                    log_audio_init_error(&err, "ensure_ready");
                    *output = None;
                    Err(err)
                }
            };
        }

        let (producer, consumer) = rtrb::RingBuffer::new(self.audio.command_queue_capacity);
        let mixer = ToneMixer::new(consumer, self.playback, self.audio.max_voices);
        let stream = self.backend.open(mixer).map_err(|err| {
            log_audio_init_error(&err, "ensure_ready");
            err
        })?;

        info!(
            "[ToneEngine] Output acquired via {} at {} Hz",
            self.backend.name(),
            stream.sample_rate()
        );
        *output = Some(ActiveOutput {
            stream,
            commands: producer,
        });
        Ok(())
    }

    /// Play one tone and wait until its release has finished
    ///
    /// Acquires the output first if needed. Tones from concurrent calls
    /// overlap; callers serialise when they need one tone at a time.
    ///
    /// If `stop_all` silences the tone, the future still resolves at the
    /// tone's scheduled end.
    ///
    /// # Errors
    /// * `PlaybackError::OutputUnavailable` - acquisition failed
    /// * `PlaybackError::QueueFull` - too many tones in flight
    /// * `PlaybackError::Interrupted` - output disposed before the tone ended
    pub async fn play(&self, request: ToneRequest) -> Result<(), PlaybackError> {
        self.ensure_ready()?;

        let (id, done) = self.schedule(request).map_err(|err| {
            log_playback_error(&err, "play");
            err
        })?;
        debug!(
            "[ToneEngine] Tone {} started: {} Hz, {:.1} dB, {}, {} ms",
            id,
            request.frequency,
            request.level,
            request.channel.display_name(),
            request.duration_ms
        );

        let outcome = done.await;
        self.registry.complete(id);

        outcome.map_err(|_| {
            let err = PlaybackError::Interrupted { tone_id: id };
            log_playback_error(&err, "play");
            err
        })
    }

    /// Silence every in-flight tone immediately and forget them
    ///
    /// Safe with zero tones. Never fails.
    pub fn stop_all(&self) {
        let silenced = self.registry.silence_all();
        if silenced > 0 {
            info!("[ToneEngine] Silenced {} active tone(s)", silenced);
        }
    }

    /// Stop everything and release the output
    ///
    /// A later `ensure_ready` or `play` acquires a fresh output. Never fails.
    pub fn dispose(&self) {
        self.stop_all();
        let released = self.lock_output().take();
        if let Some(active) = released {
            // Dropping the stream joins the audio thread
            drop(active);
            info!("[ToneEngine] Output released");
        }
    }

    pub fn is_ready(&self) -> bool {
        self.lock_output().is_some()
    }

    /// Number of tones currently tracked as sounding
    pub fn active_count(&self) -> usize {
        self.registry.len()
    }

    /// Ids and requests of the tones currently tracked
    pub fn active_tones(&self) -> Vec<(ToneId, ToneRequest)> {
        self.registry.snapshot()
    }

    /// Sample rate of the acquired output, if any
    pub fn sample_rate(&self) -> Option<u32> {
        self.lock_output()
            .as_ref()
            .map(|active| active.stream.sample_rate())
    }

    pub fn playback_config(&self) -> &PlaybackConfig {
        &self.playback
    }

    // ========================================================================
    // PRIVATE HELPER METHODS
    // ========================================================================

    /// Register a tone and hand its voice to the audio thread
    fn schedule(
        &self,
        request: ToneRequest,
    ) -> Result<(ToneId, oneshot::Receiver<()>), PlaybackError> {
        let mut output = self.lock_output();
        let active = output.as_mut().ok_or(PlaybackError::NotReady)?;

        let control = Arc::new(VoiceControl::new());
        let id = self.registry.register(request, Arc::clone(&control))?;
        let (done_tx, done_rx) = oneshot::channel();

        let spec = VoiceSpec {
            id,
            request,
            control,
            done: Some(done_tx),
        };
        if active.commands.push(spec).is_err() {
            self.registry.complete(id);
            return Err(PlaybackError::QueueFull {
                capacity: self.audio.command_queue_capacity,
            });
        }
        Ok((id, done_rx))
    }

    /// Lock the output slot, recovering from poisoning so teardown always works
    fn lock_output(&self) -> MutexGuard<'_, Option<ActiveOutput>> {
        self.output.lock().unwrap_or_else(|poisoned| {
            warn!("[ToneEngine] Recovering poisoned output lock");
            poisoned.into_inner()
        })
    }
}

impl Drop for ToneEngine {
    fn drop(&mut self) {
        self.dispose();
    }
}
