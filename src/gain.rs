//! Envelope and gain math - pure functions shared by the playback engine
//!
//! Key features:
//! - Decibel to linear gain conversion against a fixed reference gain
//! - Attack/sustain/release timing expressed in milliseconds and in frames
//! - Per-frame envelope evaluation (linear ramps, no state)

/// Linear gain produced by a 0 dB request
pub const REFERENCE_GAIN: f32 = 0.3;

/// Master output stage shared by every tone. Callers cannot exceed it.
pub const MASTER_VOLUME: f32 = 0.5;

/// Envelope attack ramp (0 -> 1) in milliseconds
pub const ATTACK_MS: u32 = 10;

/// Envelope release ramp (1 -> 0) in milliseconds
pub const RELEASE_MS: u32 = 50;

/// Tone duration used when the caller does not specify one
pub const DEFAULT_DURATION_MS: u32 = 1000;

/// Converts a level in dB (relative to the reference) to a linear gain.
///
/// Formula: gain = reference_gain × 10^(level / 20)
///
/// # Examples
/// ```
/// use hearing_check::gain::db_to_gain;
/// assert!((db_to_gain(0.0) - 0.3).abs() < 1e-6);
/// assert!((db_to_gain(-20.0) - 0.03).abs() < 1e-6);
/// ```
#[inline]
pub fn db_to_gain(level_db: f32) -> f32 {
    db_to_gain_with_reference(level_db, REFERENCE_GAIN)
}

/// Same as [`db_to_gain`] with an explicit reference gain.
#[inline]
pub fn db_to_gain_with_reference(level_db: f32, reference_gain: f32) -> f32 {
    reference_gain * 10f32.powf(level_db / 20.0)
}

/// Number of whole frames covering `ms` milliseconds at `sample_rate`.
#[inline]
pub fn ms_to_frames(ms: u32, sample_rate: u32) -> u64 {
    (sample_rate as u64 * ms as u64) / 1000
}

/// Envelope timing for a single tone
///
/// The release ramp always ends exactly at `duration_ms`. When the duration is
/// shorter than attack + release the sustain collapses to zero; such durations
/// are the caller's responsibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvelopeTiming {
    pub attack_ms: u32,
    pub sustain_ms: u32,
    pub release_ms: u32,
}

impl EnvelopeTiming {
    pub fn new(duration_ms: u32, attack_ms: u32, release_ms: u32) -> Self {
        Self {
            attack_ms,
            sustain_ms: duration_ms.saturating_sub(attack_ms + release_ms),
            release_ms,
        }
    }

    /// Timing with the default 10 ms attack and 50 ms release.
    pub fn for_duration(duration_ms: u32) -> Self {
        Self::new(duration_ms, ATTACK_MS, RELEASE_MS)
    }

    pub fn total_ms(&self) -> u32 {
        self.attack_ms + self.sustain_ms + self.release_ms
    }

    /// Convert to frame counts at `sample_rate`.
    pub fn to_frames(self, sample_rate: u32) -> EnvelopeFrames {
        let attack = ms_to_frames(self.attack_ms, sample_rate);
        let release = ms_to_frames(self.release_ms, sample_rate);
        let total = ms_to_frames(self.total_ms(), sample_rate);
        EnvelopeFrames {
            attack,
            release_start: total.saturating_sub(release).max(attack),
            total,
        }
    }
}

/// Envelope boundaries in frames since tone start
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvelopeFrames {
    pub attack: u64,
    pub release_start: u64,
    pub total: u64,
}

impl EnvelopeFrames {
    /// Envelope gain in [0, 1] at `frame`.
    ///
    /// Zero at frame 0 and at or after `total`, so the tone starts and ends on
    /// silence.
    #[inline]
    pub fn value_at(&self, frame: u64) -> f32 {
        if frame >= self.total {
            return 0.0;
        }
        if frame < self.attack {
            return frame as f32 / self.attack as f32;
        }
        if frame < self.release_start {
            return 1.0;
        }
        let release_len = self.total - self.release_start;
        if release_len == 0 {
            return 0.0;
        }
        let remaining = self.total - frame;
        remaining as f32 / release_len as f32
    }

    pub fn is_finished(&self, frame: u64) -> bool {
        frame >= self.total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_to_gain_reference_points() {
        assert!((db_to_gain(0.0) - 0.3).abs() < 1e-6);
        assert!((db_to_gain(-20.0) - 0.03).abs() < 1e-6);
        assert!((db_to_gain(-60.0) - 0.0003).abs() < 1e-7);
    }

    #[test]
    fn test_db_to_gain_monotonic() {
        let mut previous = 0.0;
        for level in -60..=0 {
            let gain = db_to_gain(level as f32);
            assert!(gain > previous, "gain must grow with level ({} dB)", level);
            previous = gain;
        }
    }

    #[test]
    fn test_sustain_fills_remaining_duration() {
        let timing = EnvelopeTiming::for_duration(1000);
        assert_eq!(timing.attack_ms, 10);
        assert_eq!(timing.sustain_ms, 940);
        assert_eq!(timing.release_ms, 50);
        assert_eq!(timing.total_ms(), 1000);
    }

    #[test]
    fn test_short_duration_collapses_sustain() {
        let timing = EnvelopeTiming::for_duration(40);
        assert_eq!(timing.sustain_ms, 0);
        assert_eq!(timing.total_ms(), 60);
    }

    #[test]
    fn test_envelope_frames_at_48k() {
        let frames = EnvelopeTiming::for_duration(1000).to_frames(48000);
        assert_eq!(frames.attack, 480);
        assert_eq!(frames.release_start, 48000 - 2400);
        assert_eq!(frames.total, 48000);
    }

    #[test]
    fn test_envelope_shape() {
        let env = EnvelopeTiming::for_duration(1000).to_frames(48000);

        assert_eq!(env.value_at(0), 0.0);
        assert!((env.value_at(240) - 0.5).abs() < 1e-6);
        assert_eq!(env.value_at(480), 1.0);
        assert_eq!(env.value_at(20_000), 1.0);
        assert!((env.value_at(env.release_start + 1200) - 0.5).abs() < 1e-6);
        assert_eq!(env.value_at(env.total), 0.0);
        assert!(env.is_finished(env.total));
        assert!(!env.is_finished(env.total - 1));
    }

    #[test]
    fn test_envelope_has_no_jumps() {
        // Largest per-frame change is bounded by the steeper (attack) ramp
        let env = EnvelopeTiming::for_duration(200).to_frames(44100);
        let max_step = 1.0 / env.attack as f32 + 1e-6;
        let mut previous = env.value_at(0);
        for frame in 1..=env.total {
            let value = env.value_at(frame);
            assert!(
                (value - previous).abs() <= max_step,
                "Envelope jumps {} -> {} at frame {}",
                previous,
                value,
                frame
            );
            previous = value;
        }
    }
}
