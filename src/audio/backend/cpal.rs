//! CPAL-based output backend for desktop platforms (Linux, macOS, Windows)
//!
//! The cpal stream is not `Send`, so it lives on a dedicated output thread for
//! its whole life. The engine talks to that thread over a command channel:
//! resume requests are answered synchronously, shutdown pauses and drops the
//! stream before the thread exits.

use std::sync::mpsc::{self, Receiver, Sender, SyncSender};
use std::thread::JoinHandle;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use log::{debug, error, info, warn};

use super::{OutputBackend, OutputStream};
use crate::audio::mixer::ToneMixer;
use crate::error::AudioInitError;

/// Output on the default cpal host and device
#[derive(Debug, Default)]
pub struct CpalBackend {
    _unit: (),
}

impl CpalBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

enum OutputCommand {
    Resume(SyncSender<Result<(), AudioInitError>>),
    Shutdown,
}

struct CpalOutput {
    control_tx: Sender<OutputCommand>,
    thread: Option<JoinHandle<()>>,
    sample_rate: u32,
}

impl OutputBackend for CpalBackend {
    fn name(&self) -> &'static str {
        "cpal"
    }

    fn open(&self, mixer: ToneMixer) -> Result<Box<dyn OutputStream>, AudioInitError> {
        let (ready_tx, ready_rx) = mpsc::sync_channel(1);
        let (control_tx, control_rx) = mpsc::channel();

        let thread = std::thread::Builder::new()
            .name("hearing-check-output".to_string())
            .spawn(move || run_output_thread(mixer, ready_tx, control_rx))
            .map_err(|e| AudioInitError::OutputThreadFailed {
                reason: e.to_string(),
            })?;

        match ready_rx.recv() {
            Ok(Ok(sample_rate)) => Ok(Box::new(CpalOutput {
                control_tx,
                thread: Some(thread),
                sample_rate,
            })),
            Ok(Err(err)) => {
                let _ = thread.join();
                Err(err)
            }
            Err(_) => {
                let _ = thread.join();
                Err(AudioInitError::OutputThreadFailed {
                    reason: "output thread exited before reporting readiness".to_string(),
                })
            }
        }
    }
}

impl OutputStream for CpalOutput {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn resume(&mut self) -> Result<(), AudioInitError> {
        let (reply_tx, reply_rx) = mpsc::sync_channel(1);
        let thread_gone = || AudioInitError::OutputThreadFailed {
            reason: "output thread is not running".to_string(),
        };
        self.control_tx
            .send(OutputCommand::Resume(reply_tx))
            .map_err(|_| thread_gone())?;
        reply_rx.recv().map_err(|_| thread_gone())?
    }
}

impl Drop for CpalOutput {
    fn drop(&mut self) {
        let _ = self.control_tx.send(OutputCommand::Shutdown);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("[CpalBackend] Output thread panicked during shutdown");
            }
        }
    }
}

fn run_output_thread(
    mixer: ToneMixer,
    ready_tx: SyncSender<Result<u32, AudioInitError>>,
    control_rx: Receiver<OutputCommand>,
) {
    let (stream, sample_rate) = match build_stream(mixer) {
        Ok(built) => built,
        Err(err) => {
            let _ = ready_tx.send(Err(err));
            return;
        }
    };

    if let Err(e) = stream.play() {
        let _ = ready_tx.send(Err(AudioInitError::StreamStartFailed {
            reason: e.to_string(),
        }));
        return;
    }

    info!("[CpalBackend] Output stream running at {} Hz", sample_rate);
    if ready_tx.send(Ok(sample_rate)).is_err() {
        return;
    }

    while let Ok(command) = control_rx.recv() {
        match command {
            OutputCommand::Resume(reply) => {
                let result = stream
                    .play()
                    .map_err(|e| AudioInitError::StreamStartFailed {
                        reason: e.to_string(),
                    });
                let _ = reply.send(result);
            }
            OutputCommand::Shutdown => break,
        }
    }

    if let Err(e) = stream.pause() {
        debug!("[CpalBackend] Pause during shutdown failed: {}", e);
    }
    drop(stream);
    info!("[CpalBackend] Output stream released");
}

fn build_stream(mut mixer: ToneMixer) -> Result<(cpal::Stream, u32), AudioInitError> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or(AudioInitError::NoOutputDevice)?;

    let config = device
        .default_output_config()
        .map_err(|e| AudioInitError::StreamBuildFailed {
            reason: format!("Failed to get default output config: {:?}", e),
        })?;

    let stream_config: cpal::StreamConfig = config.clone().into();
    let channels = stream_config.channels as usize;
    let sample_rate = stream_config.sample_rate.0;
    mixer.prepare(sample_rate);

    let err_fn = |err: cpal::StreamError| error!("Output stream error: {}", err);

    let stream = match config.sample_format() {
        cpal::SampleFormat::F32 => device.build_output_stream(
            &stream_config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                mixer.render(data, channels);
            },
            err_fn,
            None,
        ),
        cpal::SampleFormat::I16 => device.build_output_stream(
            &stream_config,
            move |data: &mut [i16], _: &cpal::OutputCallbackInfo| {
                mixer.render_with(data, channels, f32_to_i16);
            },
            err_fn,
            None,
        ),
        cpal::SampleFormat::U16 => device.build_output_stream(
            &stream_config,
            move |data: &mut [u16], _: &cpal::OutputCallbackInfo| {
                mixer.render_with(data, channels, f32_to_u16);
            },
            err_fn,
            None,
        ),
        other => {
            return Err(AudioInitError::UnsupportedFormat {
                format: format!("{:?}", other),
            })
        }
    }
    .map_err(|e| AudioInitError::StreamBuildFailed {
        reason: format!("{:?}", e),
    })?;

    Ok((stream, sample_rate))
}

fn f32_to_i16(v: f32) -> i16 {
    let v = v.clamp(-1.0, 1.0);
    (v * i16::MAX as f32) as i16
}

fn f32_to_u16(v: f32) -> u16 {
    let v = v.clamp(-1.0, 1.0);
    let normalized = (v + 1.0) * 0.5;
    (normalized * u16::MAX as f32) as u16
}
