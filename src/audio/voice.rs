//! Voice - one sounding tone inside the mixer
//!
//! Each voice is a fixed chain evaluated per frame:
//! oscillator -> envelope gain -> level gain -> channel router
//!
//! Voices are plain data so the audio thread can start them without
//! allocating. Cancellation is an atomic flag shared with the control side.

use std::f32::consts::TAU;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::oneshot;

use super::registry::ToneId;
use super::tone::ToneRequest;
use crate::config::PlaybackConfig;
use crate::gain::{db_to_gain_with_reference, EnvelopeFrames, EnvelopeTiming};

/// State shared between a voice and the control side
///
/// `silenced` is written by the control side, `finished` by the audio thread.
#[derive(Debug, Default)]
pub struct VoiceControl {
    silenced: AtomicBool,
    finished: AtomicBool,
}

impl VoiceControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Force the level gain to zero for the rest of the tone
    pub fn silence(&self) {
        self.silenced.store(true, Ordering::Release);
    }

    pub fn is_silenced(&self) -> bool {
        self.silenced.load(Ordering::Acquire)
    }

    /// Set once the voice has left the mixer
    pub fn mark_finished(&self) {
        self.finished.store(true, Ordering::Release);
    }

    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }
}

/// Everything the audio thread needs to start a voice
pub struct VoiceSpec {
    pub id: ToneId,
    pub request: ToneRequest,
    pub control: Arc<VoiceControl>,
    /// Fired when the release ends
    pub done: Option<oneshot::Sender<()>>,
}

/// Running oscillator state for one tone
pub struct Voice {
    id: ToneId,
    phase: f32,
    phase_inc: f32,
    level_gain: f32,
    routing: (f32, f32),
    envelope: EnvelopeFrames,
    frame: u64,
    control: Arc<VoiceControl>,
    done: Option<oneshot::Sender<()>>,
}

impl Voice {
    pub fn new(spec: VoiceSpec, playback: &PlaybackConfig, sample_rate: u32) -> Self {
        let request = spec.request;
        let timing = EnvelopeTiming::new(
            request.duration_ms,
            playback.attack_ms,
            playback.release_ms,
        );
        Self {
            id: spec.id,
            phase: 0.0,
            phase_inc: TAU * request.frequency / sample_rate as f32,
            level_gain: db_to_gain_with_reference(request.level, playback.reference_gain),
            routing: request.channel.gains(),
            envelope: timing.to_frames(sample_rate),
            frame: 0,
            control: spec.control,
            done: spec.done,
        }
    }

    pub fn id(&self) -> ToneId {
        self.id
    }

    /// Render the next frame as (left, right) before the master stage.
    #[inline]
    pub fn next_frame(&mut self) -> (f32, f32) {
        if self.envelope.is_finished(self.frame) {
            return (0.0, 0.0);
        }

        let oscillator = self.phase.sin();
        let envelope = self.envelope.value_at(self.frame);
        let level = if self.control.is_silenced() {
            0.0
        } else {
            self.level_gain
        };
        let sample = oscillator * envelope * level;

        self.phase = (self.phase + self.phase_inc).rem_euclid(TAU);
        self.frame += 1;

        (sample * self.routing.0, sample * self.routing.1)
    }

    pub fn is_finished(&self) -> bool {
        self.envelope.is_finished(self.frame)
    }

    pub fn is_silenced(&self) -> bool {
        self.control.is_silenced()
    }

    /// Frames left until the scheduled end
    pub fn remaining_frames(&self) -> u64 {
        self.envelope.total.saturating_sub(self.frame)
    }

    /// Signal completion to the waiting `play` call. Idempotent.
    ///
    /// The finished flag is set before the send, so a registry that prunes
    /// finished tones never outlives a caller that stopped waiting.
    pub fn complete(&mut self) {
        self.control.mark_finished();
        if let Some(done) = self.done.take() {
            // Receiver may already be gone if the caller stopped waiting
            let _ = done.send(());
        }
    }

    /// Drop the voice without completing it; a waiting `play` sees the
    /// sender go away.
    pub fn release(self) {
        self.control.mark_finished();
    }
}

/// Render one tone through the voice chain and master stage without a device.
///
/// Returns interleaved stereo samples covering the full envelope.
pub fn render_tone(request: ToneRequest, playback: &PlaybackConfig, sample_rate: u32) -> Vec<f32> {
    let master = playback.effective_master_volume();
    let mut voice = Voice::new(
        VoiceSpec {
            id: 0,
            request,
            control: Arc::new(VoiceControl::new()),
            done: None,
        },
        playback,
        sample_rate,
    );

    let frames = voice.envelope.total as usize;
    let mut out = Vec::with_capacity(frames * 2);
    while !voice.is_finished() {
        let (left, right) = voice.next_frame();
        out.push(left * master);
        out.push(right * master);
    }
    out
}
