//! OfflineBackend - device-free output for tests, simulation and rendering
//!
//! A worker thread drives the same `ToneMixer` a device callback would, either
//! paced like a real device or as fast as voices need. Rendered frames can be
//! collected in a `CaptureBuffer` for inspection.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use log::{info, warn};

use super::{OutputBackend, OutputStream};
use crate::audio::mixer::ToneMixer;
use crate::config::AudioConfig;
use crate::error::AudioInitError;

/// How fast the device-free backend consumes audio
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pace {
    /// One block per block duration, like a real device
    Realtime,
    /// Render as fast as possible while voices are active, idle otherwise
    Unthrottled,
}

/// Shared sink for rendered stereo frames
#[derive(Debug, Clone, Default)]
pub struct CaptureBuffer {
    samples: Arc<Mutex<Vec<f32>>>,
}

impl CaptureBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take everything captured so far (interleaved stereo)
    pub fn take(&self) -> Vec<f32> {
        match self.samples.lock() {
            Ok(mut samples) => std::mem::take(&mut *samples),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }

    fn extend(&self, block: &[f32]) {
        if let Ok(mut samples) = self.samples.lock() {
            samples.extend_from_slice(block);
        }
    }
}

/// Device-free backend used for deterministic testing and CLI simulation.
///
/// Renders stereo blocks on a worker thread, optionally recording them.
pub struct OfflineBackend {
    sample_rate: u32,
    block_frames: usize,
    pace: Pace,
    capture: Option<CaptureBuffer>,
}

impl OfflineBackend {
    pub fn new(sample_rate: u32, pace: Pace) -> Self {
        Self {
            sample_rate,
            block_frames: 480,
            pace,
            capture: None,
        }
    }

    pub fn from_config(config: &AudioConfig, pace: Pace) -> Self {
        Self::new(config.offline_sample_rate, pace).with_block_frames(config.offline_block_frames)
    }

    pub fn with_block_frames(mut self, block_frames: usize) -> Self {
        self.block_frames = block_frames.max(1);
        self
    }

    /// Record every rendered block into `capture`
    pub fn with_capture(mut self, capture: CaptureBuffer) -> Self {
        self.capture = Some(capture);
        self
    }
}

struct OfflineOutput {
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
    sample_rate: u32,
}

impl OutputBackend for OfflineBackend {
    fn name(&self) -> &'static str {
        "offline"
    }

    fn open(&self, mut mixer: ToneMixer) -> Result<Box<dyn OutputStream>, AudioInitError> {
        mixer.prepare(self.sample_rate);

        let running = Arc::new(AtomicBool::new(true));
        let worker = OfflineWorker {
            mixer,
            running: Arc::clone(&running),
            block: vec![0.0; self.block_frames * 2],
            block_duration: Duration::from_secs_f64(
                self.block_frames as f64 / self.sample_rate as f64,
            ),
            pace: self.pace,
            capture: self.capture.clone(),
        };

        let thread = std::thread::Builder::new()
            .name("hearing-check-offline".to_string())
            .spawn(move || worker.run())
            .map_err(|e| AudioInitError::OutputThreadFailed {
                reason: e.to_string(),
            })?;

        info!(
            "[OfflineBackend] Rendering at {} Hz ({:?})",
            self.sample_rate, self.pace
        );
        Ok(Box::new(OfflineOutput {
            running,
            thread: Some(thread),
            sample_rate: self.sample_rate,
        }))
    }
}

impl OutputStream for OfflineOutput {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn resume(&mut self) -> Result<(), AudioInitError> {
        if self.running.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(AudioInitError::OutputThreadFailed {
                reason: "offline renderer stopped".to_string(),
            })
        }
    }
}

impl Drop for OfflineOutput {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("[OfflineBackend] Render thread panicked during shutdown");
            }
        }
    }
}

struct OfflineWorker {
    mixer: ToneMixer,
    running: Arc<AtomicBool>,
    block: Vec<f32>,
    block_duration: Duration,
    pace: Pace,
    capture: Option<CaptureBuffer>,
}

impl OfflineWorker {
    fn run(mut self) {
        while self.running.load(Ordering::Acquire) {
            if self.pace == Pace::Unthrottled && self.mixer.is_idle() {
                std::thread::sleep(Duration::from_millis(1));
                continue;
            }

            self.mixer.render(&mut self.block, 2);
            if let Some(capture) = &self.capture {
                capture.extend(&self.block);
            }

            if self.pace == Pace::Realtime {
                std::thread::sleep(self.block_duration);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::tone::{Channel, ToneRequest};
    use crate::audio::voice::{VoiceControl, VoiceSpec};
    use crate::config::PlaybackConfig;
    use tokio::sync::oneshot;

    #[test]
    fn test_unthrottled_render_completes_voice() {
        let (mut producer, consumer) = rtrb::RingBuffer::new(4);
        let mixer = ToneMixer::new(consumer, PlaybackConfig::default(), 4);
        let capture = CaptureBuffer::new();
        let backend = OfflineBackend::new(48000, Pace::Unthrottled).with_capture(capture.clone());

        let output = backend.open(mixer).unwrap();
        assert_eq!(output.sample_rate(), 48000);

        let (done_tx, done_rx) = oneshot::channel();
        producer
            .push(VoiceSpec {
                id: 1,
                request: ToneRequest::new(1000.0, Channel::Right, 0.0).with_duration_ms(100),
                control: Arc::new(VoiceControl::new()),
                done: Some(done_tx),
            })
            .ok()
            .unwrap();

        done_rx.blocking_recv().unwrap();
        drop(output);

        let samples = capture.take();
        assert!(samples.len() >= 4800 * 2);
        assert!(samples.iter().step_by(2).all(|&s| s == 0.0));
        assert!(samples.iter().skip(1).step_by(2).any(|&s| s.abs() > 0.1));
    }

    #[test]
    fn test_drop_interrupts_pending_voice() {
        let (mut producer, consumer) = rtrb::RingBuffer::new(4);
        let mixer = ToneMixer::new(consumer, PlaybackConfig::default(), 4);
        let backend = OfflineBackend::new(48000, Pace::Realtime);
        let output = backend.open(mixer).unwrap();

        let (done_tx, done_rx) = oneshot::channel();
        producer
            .push(VoiceSpec {
                id: 1,
                request: ToneRequest::new(1000.0, Channel::Both, 0.0).with_duration_ms(60_000),
                control: Arc::new(VoiceControl::new()),
                done: Some(done_tx),
            })
            .ok()
            .unwrap();

        drop(output);
        assert!(done_rx.blocking_recv().is_err());
    }
}
