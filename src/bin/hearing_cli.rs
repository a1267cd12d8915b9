use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use hearing_check::audio::{render_tone, CpalBackend, OfflineBackend, Pace};
use hearing_check::config::AppConfig;
use hearing_check::error::SessionError;
use hearing_check::session::{
    Presentation, ResponseSource, SimulatedListener, ThresholdResult, ThresholdSession,
};
use hearing_check::staircase::Response;
use hearing_check::{init_logging, Channel, ToneEngine, ToneRequest};
use serde::Serialize;

#[derive(Parser, Debug)]
#[command(
    name = "hearing_cli",
    about = "Pure-tone threshold measurement and probe tone playback"
)]
struct Cli {
    /// JSON config file (defaults to assets/hearing_config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Play one probe tone on the default output device
    Play {
        #[arg(long, default_value_t = 1000.0)]
        frequency: f32,
        #[arg(long, value_enum, default_value_t = ChannelArg::Both)]
        channel: ChannelArg,
        /// Level in dB relative to the reference gain
        #[arg(long, default_value_t = -20.0, allow_hyphen_values = true)]
        level: f32,
        #[arg(long)]
        duration_ms: Option<u32>,
    },
    /// Render one probe tone to a stereo WAV file
    Render {
        #[arg(long, default_value_t = 1000.0)]
        frequency: f32,
        #[arg(long, value_enum, default_value_t = ChannelArg::Both)]
        channel: ChannelArg,
        #[arg(long, default_value_t = -20.0, allow_hyphen_values = true)]
        level: f32,
        #[arg(long)]
        duration_ms: Option<u32>,
        #[arg(long, default_value_t = 48000)]
        sample_rate: u32,
        /// Write 32-bit float samples instead of 16-bit PCM
        #[arg(long)]
        float: bool,
        #[arg(long)]
        output: PathBuf,
    },
    /// Run a full measurement against a simulated listener, no device needed
    Simulate {
        /// Simulated hearing threshold in dB
        #[arg(long, default_value_t = -35.0, allow_hyphen_values = true)]
        threshold: f32,
        /// Separate threshold for the right ear
        #[arg(long, allow_hyphen_values = true)]
        right_threshold: Option<f32>,
        #[arg(long, value_delimiter = ',', default_value = "500,1000,2000,4000")]
        frequencies: Vec<f32>,
        #[arg(long, value_enum, value_delimiter = ',', default_value = "left,right")]
        channels: Vec<ChannelArg>,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Interactive measurement on the default output device
    Run {
        #[arg(long, value_delimiter = ',', default_value = "1000")]
        frequencies: Vec<f32>,
        #[arg(long, value_enum, value_delimiter = ',', default_value = "left,right")]
        channels: Vec<ChannelArg>,
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum ChannelArg {
    Left,
    Right,
    Both,
}

impl From<ChannelArg> for Channel {
    fn from(arg: ChannelArg) -> Self {
        match arg {
            ChannelArg::Left => Channel::Left,
            ChannelArg::Right => Channel::Right,
            ChannelArg::Both => Channel::Both,
        }
    }
}

fn main() -> ExitCode {
    init_logging();
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => AppConfig::load_from_file(path),
        None => AppConfig::load(),
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_time()
        .build()
        .context("building tokio runtime")?;

    match cli.command {
        Commands::Play {
            frequency,
            channel,
            level,
            duration_ms,
        } => runtime.block_on(run_play(&config, frequency, channel.into(), level, duration_ms)),
        Commands::Render {
            frequency,
            channel,
            level,
            duration_ms,
            sample_rate,
            float,
            output,
        } => {
            let mut request = ToneRequest::new(frequency, channel.into(), level);
            if let Some(duration_ms) = duration_ms {
                request = request.with_duration_ms(duration_ms);
            }
            run_render(&config, request, sample_rate, float, &output)
        }
        Commands::Simulate {
            threshold,
            right_threshold,
            frequencies,
            channels,
            output,
        } => {
            let mut listener = SimulatedListener::new(threshold);
            if let Some(right) = right_threshold {
                listener = listener.with_channel_threshold(Channel::Right, right);
            }
            let channels: Vec<Channel> = channels.into_iter().map(Channel::from).collect();
            runtime.block_on(run_simulate(&config, &frequencies, &channels, listener, output))
        }
        Commands::Run {
            frequencies,
            channels,
            output,
        } => {
            let channels: Vec<Channel> = channels.into_iter().map(Channel::from).collect();
            runtime.block_on(run_interactive(&config, &frequencies, &channels, output))
        }
    }
}

async fn run_play(
    config: &AppConfig,
    frequency: f32,
    channel: Channel,
    level: f32,
    duration_ms: Option<u32>,
) -> Result<ExitCode> {
    let engine = device_engine(config);
    let duration_ms = duration_ms.unwrap_or(config.playback.default_duration_ms);
    let request = ToneRequest::new(frequency, channel, level).with_duration_ms(duration_ms);

    engine.play(request).await.context("playing tone")?;
    engine.dispose();
    Ok(ExitCode::from(0))
}

fn run_render(
    config: &AppConfig,
    request: ToneRequest,
    sample_rate: u32,
    float: bool,
    output: &Path,
) -> Result<ExitCode> {
    if sample_rate == 0 {
        bail!("sample rate must be > 0");
    }
    let samples = render_tone(request, &config.playback, sample_rate);
    write_wav(output, &samples, sample_rate, float)?;
    println!(
        "Wrote {} frames ({} Hz, {:.1} dB, {}) to {}",
        samples.len() / 2,
        request.frequency,
        request.level,
        request.channel.display_name(),
        output.display()
    );
    Ok(ExitCode::from(0))
}

async fn run_simulate(
    config: &AppConfig,
    frequencies: &[f32],
    channels: &[Channel],
    mut listener: SimulatedListener,
    output: Option<PathBuf>,
) -> Result<ExitCode> {
    let engine = ToneEngine::new(
        Arc::new(OfflineBackend::from_config(&config.audio, Pace::Unthrottled)),
        config.playback,
        config.audio,
    );
    let session = ThresholdSession::new(&engine, config.staircase);
    let results = session
        .run(frequencies, channels, &mut listener)
        .await
        .context("simulated session")?;

    emit_report(&results, output)?;
    Ok(ExitCode::from(0))
}

async fn run_interactive(
    config: &AppConfig,
    frequencies: &[f32],
    channels: &[Channel],
    output: Option<PathBuf>,
) -> Result<ExitCode> {
    let engine = device_engine(config);
    engine.ensure_ready().context("opening output device")?;

    let playback = config.playback;
    let timeout = Duration::from_millis(
        u64::from(playback.default_duration_ms) + u64::from(playback.release_ms) + 2_000,
    );
    let session = ThresholdSession::new(&engine, config.staircase).with_play_timeout(timeout);

    println!("Answer y (heard), n (not heard) or q (quit) after each tone.");
    let mut prompt = StdinPrompt::new();
    let outcome = session.run(frequencies, channels, &mut prompt).await;
    engine.dispose();

    match outcome {
        Ok(results) => {
            emit_report(&results, output)?;
            Ok(ExitCode::from(0))
        }
        Err(SessionError::Aborted { reason }) => {
            eprintln!("Session aborted: {reason}");
            Ok(ExitCode::from(2))
        }
        Err(err) => Err(err).context("interactive session"),
    }
}

fn device_engine(config: &AppConfig) -> ToneEngine {
    ToneEngine::new(Arc::new(CpalBackend::new()), config.playback, config.audio)
}

/// Reads y/n/q answers from stdin
struct StdinPrompt {
    lines: io::Lines<io::StdinLock<'static>>,
}

impl StdinPrompt {
    fn new() -> Self {
        Self {
            lines: io::stdin().lock().lines(),
        }
    }
}

impl ResponseSource for StdinPrompt {
    fn respond(&mut self, presentation: &Presentation) -> Result<Response, SessionError> {
        loop {
            print!(
                "[{} Hz, {}, #{}] heard? [y/n/q] ",
                presentation.frequency,
                presentation.channel.display_name(),
                presentation.attempt
            );
            let _ = io::stdout().flush();

            // Blocking read; keep the runtime's other workers free meanwhile
            let line = match tokio::task::block_in_place(|| self.lines.next()) {
                Some(Ok(line)) => line,
                Some(Err(err)) => {
                    return Err(SessionError::Aborted {
                        reason: format!("stdin error: {err}"),
                    })
                }
                None => {
                    return Err(SessionError::Aborted {
                        reason: "stdin closed".to_string(),
                    })
                }
            };

            match line.trim().to_ascii_lowercase().as_str() {
                "y" | "yes" => return Ok(Response::Heard),
                "n" | "no" => return Ok(Response::NotHeard),
                "q" | "quit" => {
                    return Err(SessionError::Aborted {
                        reason: "quit by listener".to_string(),
                    })
                }
                _ => println!("Please answer y, n or q."),
            }
        }
    }
}

fn write_wav(path: &Path, samples: &[f32], sample_rate: u32, float: bool) -> Result<()> {
    let spec = hound::WavSpec {
        channels: 2,
        sample_rate,
        bits_per_sample: if float { 32 } else { 16 },
        sample_format: if float {
            hound::SampleFormat::Float
        } else {
            hound::SampleFormat::Int
        },
    };
    let mut writer = hound::WavWriter::create(path, spec)
        .with_context(|| format!("creating {}", path.display()))?;
    for &sample in samples {
        if float {
            writer.write_sample(sample)?;
        } else {
            let scaled = (sample.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16;
            writer.write_sample(scaled)?;
        }
    }
    writer
        .finalize()
        .with_context(|| format!("finalizing {}", path.display()))?;
    Ok(())
}

fn emit_report(results: &[ThresholdResult], output_path: Option<PathBuf>) -> Result<()> {
    for result in results {
        tracing::info!(
            frequency = result.frequency,
            channel = result.channel.display_name(),
            threshold_db = result.threshold_db,
            attempts = result.attempts,
            reversals = result.reversals,
            "threshold measured"
        );
    }

    let report = SessionReportPayload {
        measurement_count: results.len(),
        results,
    };
    let json = serde_json::to_string_pretty(&report)?;

    if let Some(path) = output_path {
        fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
    } else {
        println!("{json}");
    }
    Ok(())
}

#[derive(Serialize)]
struct SessionReportPayload<'a> {
    measurement_count: usize,
    results: &'a [ThresholdResult],
}
