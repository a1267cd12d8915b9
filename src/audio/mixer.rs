//! ToneMixer - real-time render loop shared by every output backend
//!
//! The mixer runs on the audio thread. It receives new voices through a
//! lock-free SPSC queue, sums every active voice into the output buffer,
//! applies the master stage and retires voices whose release has ended.
//!
//! # Real-Time Safety
//! - No locks: voices arrive through `rtrb`, cancellation is an atomic flag
//! - No allocation: voice storage is reserved for `2 * max_voices`. The
//!   registry admits at most `max_voices` audible tones, so when storage is
//!   full at least one voice is a silenced leftover of `stop_all`, and the
//!   one closest to its end is retired early to make room
//! - Completion is signalled with a non-blocking oneshot send

use rtrb::Consumer;

use super::voice::{Voice, VoiceSpec};
use crate::config::PlaybackConfig;

/// Mixes all active voices into interleaved output frames
pub struct ToneMixer {
    commands: Consumer<VoiceSpec>,
    voices: Vec<Voice>,
    voice_capacity: usize,
    playback: PlaybackConfig,
    master_volume: f32,
    sample_rate: u32,
}

impl ToneMixer {
    pub fn new(commands: Consumer<VoiceSpec>, playback: PlaybackConfig, max_voices: usize) -> Self {
        let voice_capacity = max_voices.max(1) * 2;
        Self {
            commands,
            voices: Vec::with_capacity(voice_capacity),
            voice_capacity,
            playback,
            master_volume: playback.effective_master_volume(),
            sample_rate: 0,
        }
    }

    /// Set the device sample rate. Must be called before rendering.
    pub fn prepare(&mut self, sample_rate: u32) {
        self.sample_rate = sample_rate;
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn active_voices(&self) -> usize {
        self.voices.len()
    }

    /// Voices the mixer holds without reallocating
    pub fn voice_capacity(&self) -> usize {
        self.voice_capacity
    }

    /// No voice sounding and none waiting in the queue
    pub fn is_idle(&self) -> bool {
        self.voices.is_empty() && self.commands.is_empty()
    }

    /// Render interleaved f32 frames
    pub fn render(&mut self, out: &mut [f32], channels: usize) {
        self.render_with(out, channels, |sample| sample);
    }

    /// Render interleaved frames, converting each sample with `convert`
    ///
    /// Stereo layout: channel 0 is left, channel 1 is right, any further
    /// channels stay silent. Mono output takes the mean of both sides.
    pub fn render_with<T, F>(&mut self, out: &mut [T], channels: usize, convert: F)
    where
        F: Fn(f32) -> T,
    {
        self.drain_commands();

        let channels = channels.max(1);
        for frame in out.chunks_mut(channels) {
            let (mut left, mut right) = (0.0f32, 0.0f32);
            for voice in self.voices.iter_mut() {
                let (l, r) = voice.next_frame();
                left += l;
                right += r;
            }
            left *= self.master_volume;
            right *= self.master_volume;

            if channels == 1 {
                frame[0] = convert((left + right) * 0.5);
                continue;
            }
            for (ch, slot) in frame.iter_mut().enumerate() {
                *slot = match ch {
                    0 => convert(left),
                    1 => convert(right),
                    _ => convert(0.0),
                };
            }
        }

        self.retire_finished();
    }

    fn drain_commands(&mut self) {
        if self.sample_rate == 0 {
            return;
        }
        while let Ok(spec) = self.commands.pop() {
            if self.voices.len() >= self.voice_capacity {
                self.retire_one_silenced();
            }
            self.voices
                .push(Voice::new(spec, &self.playback, self.sample_rate));
        }
    }

    /// Complete the silenced voice nearest its scheduled end ahead of time
    fn retire_one_silenced(&mut self) {
        let nearest = self
            .voices
            .iter()
            .enumerate()
            .filter(|(_, voice)| voice.is_silenced())
            .min_by_key(|(_, voice)| voice.remaining_frames())
            .map(|(i, _)| i);
        if let Some(i) = nearest {
            let mut voice = self.voices.swap_remove(i);
            voice.complete();
        }
    }

    fn retire_finished(&mut self) {
        let mut i = 0;
        while i < self.voices.len() {
            if self.voices[i].is_finished() {
                let mut voice = self.voices.swap_remove(i);
                voice.complete();
            } else {
                i += 1;
            }
        }
    }
}

impl Drop for ToneMixer {
    fn drop(&mut self) {
        // Pending completions are dropped with their senders, so waiting
        // `play` calls observe the output going away.
        for voice in self.voices.drain(..) {
            voice.release();
        }
        while let Ok(spec) = self.commands.pop() {
            spec.control.mark_finished();
        }
    }
}
