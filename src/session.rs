//! ThresholdSession - drives one staircase run per frequency/ear
//!
//! The loop is the thin orchestration around the two core components:
//! 1. Read the current level from the staircase state
//! 2. Play it on the target channel and wait for the release to finish
//! 3. Ask the response source whether the tone was heard
//! 4. Feed the answer back into the controller until it terminates
//!
//! Tones are played one at a time; the engine itself does not serialise.

use std::collections::HashMap;
use std::time::Duration;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::audio::{Channel, ToneEngine, ToneRequest};
use crate::error::{log_session_error, SessionError};
use crate::staircase::{self, Response, StaircaseConfig};

/// What the listener was just presented with
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Presentation {
    pub frequency: f32,
    pub channel: Channel,
    pub level: f32,
    /// 1-based attempt number within the run
    pub attempt: u32,
}

/// Source of listener responses
pub trait ResponseSource {
    /// Answer for the tone that just finished playing.
    ///
    /// Returning `SessionError::Aborted` ends the session.
    fn respond(&mut self, presentation: &Presentation) -> Result<Response, SessionError>;
}

/// Deterministic listener that hears every tone at or above its threshold
#[derive(Debug, Clone)]
pub struct SimulatedListener {
    threshold: f32,
    per_channel: HashMap<Channel, f32>,
}

impl SimulatedListener {
    pub fn new(threshold: f32) -> Self {
        Self {
            threshold,
            per_channel: HashMap::new(),
        }
    }

    /// Different threshold for one ear
    pub fn with_channel_threshold(mut self, channel: Channel, threshold: f32) -> Self {
        self.per_channel.insert(channel, threshold);
        self
    }

    fn threshold_for(&self, channel: Channel) -> f32 {
        self.per_channel
            .get(&channel)
            .copied()
            .unwrap_or(self.threshold)
    }
}

impl ResponseSource for SimulatedListener {
    fn respond(&mut self, presentation: &Presentation) -> Result<Response, SessionError> {
        if presentation.level >= self.threshold_for(presentation.channel) {
            Ok(Response::Heard)
        } else {
            Ok(Response::NotHeard)
        }
    }
}

/// One presented level and the answer it got
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Trial {
    pub level: f32,
    pub response: Response,
}

/// Completed run for one frequency/ear
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdResult {
    pub frequency: f32,
    pub channel: Channel,
    pub threshold_db: f32,
    pub attempts: u32,
    pub reversals: u32,
    pub trials: Vec<Trial>,
}

/// Runs staircase measurements against a tone engine
pub struct ThresholdSession<'a> {
    engine: &'a ToneEngine,
    config: StaircaseConfig,
    duration_ms: u32,
    play_timeout: Option<Duration>,
}

impl<'a> ThresholdSession<'a> {
    pub fn new(engine: &'a ToneEngine, config: StaircaseConfig) -> Self {
        Self {
            engine,
            config,
            duration_ms: engine.playback_config().default_duration_ms,
            play_timeout: None,
        }
    }

    pub fn with_duration_ms(mut self, duration_ms: u32) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    /// Give up on a tone that hasn't finished after `timeout`
    ///
    /// On timeout every tone is stopped and the run fails.
    pub fn with_play_timeout(mut self, timeout: Duration) -> Self {
        self.play_timeout = Some(timeout);
        self
    }

    /// Measure one threshold
    pub async fn measure<S: ResponseSource>(
        &self,
        frequency: f32,
        channel: Channel,
        source: &mut S,
    ) -> Result<ThresholdResult, SessionError> {
        self.config.validate()?;

        let mut state = staircase::initialize(&self.config);
        let mut trials = Vec::new();
        info!(
            "[ThresholdSession] Starting {} Hz on {} at {:.1} dB",
            frequency,
            channel.display_name(),
            state.current_level
        );

        loop {
            let level = state.current_level;
            let request = ToneRequest::new(frequency, channel, level).with_duration_ms(self.duration_ms);
            self.present(request).await.map_err(|err| {
                log_session_error(&err, "measure");
                err
            })?;

            let presentation = Presentation {
                frequency,
                channel,
                level,
                attempt: state.attempt_count + 1,
            };
            let response = source.respond(&presentation)?;
            trials.push(Trial { level, response });

            let step = staircase::advance(&state, &self.config, response)?;
            state = step.state;
            debug!(
                "[ThresholdSession] attempt={} response={:?} next_level={:.1} reversals={}",
                state.attempt_count, response, state.current_level, state.reversal_count
            );

            if let Some(threshold) = step.threshold {
                info!(
                    "[ThresholdSession] {} Hz {} threshold {:.1} dB after {} attempts",
                    frequency,
                    channel.display_name(),
                    threshold,
                    state.attempt_count
                );
                return Ok(ThresholdResult {
                    frequency,
                    channel,
                    threshold_db: threshold,
                    attempts: state.attempt_count,
                    reversals: state.reversal_count,
                    trials,
                });
            }
        }
    }

    /// Measure every frequency on every listed channel, in order
    pub async fn run<S: ResponseSource>(
        &self,
        frequencies: &[f32],
        channels: &[Channel],
        source: &mut S,
    ) -> Result<Vec<ThresholdResult>, SessionError> {
        let mut results = Vec::with_capacity(frequencies.len() * channels.len());
        for &channel in channels {
            for &frequency in frequencies {
                results.push(self.measure(frequency, channel, source).await?);
            }
        }
        Ok(results)
    }

    async fn present(&self, request: ToneRequest) -> Result<(), SessionError> {
        match self.play_timeout {
            None => Ok(self.engine.play(request).await?),
            Some(timeout) => match tokio::time::timeout(timeout, self.engine.play(request)).await {
                Ok(result) => Ok(result?),
                Err(_) => {
                    self.engine.stop_all();
                    Err(SessionError::PlaybackTimeout {
                        timeout_ms: timeout.as_millis() as u64,
                    })
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{OfflineBackend, Pace};
    use crate::config::{AudioConfig, PlaybackConfig};
    use std::sync::Arc;

    fn engine() -> ToneEngine {
        ToneEngine::new(
            Arc::new(OfflineBackend::new(48000, Pace::Unthrottled)),
            PlaybackConfig::default(),
            AudioConfig::default(),
        )
    }

    /// Replays a fixed script of responses
    struct Scripted(std::vec::IntoIter<Response>);

    impl ResponseSource for Scripted {
        fn respond(&mut self, _: &Presentation) -> Result<Response, SessionError> {
            self.0.next().ok_or_else(|| SessionError::Aborted {
                reason: "script exhausted".to_string(),
            })
        }
    }

    #[test]
    fn test_simulated_listener() {
        let mut listener = SimulatedListener::new(-30.0).with_channel_threshold(Channel::Right, -10.0);
        let at = |level, channel| Presentation {
            frequency: 1000.0,
            channel,
            level,
            attempt: 1,
        };

        assert_eq!(listener.respond(&at(-30.0, Channel::Left)).unwrap(), Response::Heard);
        assert_eq!(listener.respond(&at(-31.0, Channel::Left)).unwrap(), Response::NotHeard);
        assert_eq!(listener.respond(&at(-20.0, Channel::Right)).unwrap(), Response::NotHeard);
    }

    #[tokio::test]
    async fn test_measure_replays_reference_trajectory() {
        use Response::{Heard, NotHeard};
        let engine = engine();
        let session = ThresholdSession::new(&engine, StaircaseConfig::default()).with_duration_ms(100);
        let mut source = Scripted(vec![Heard, Heard, NotHeard, Heard, NotHeard, Heard].into_iter());

        let result = session
            .measure(1000.0, Channel::Left, &mut source)
            .await
            .unwrap();

        assert_eq!(result.threshold_db, -38.0);
        assert_eq!(result.attempts, 6);
        assert_eq!(result.reversals, 4);
        let levels: Vec<f32> = result.trials.iter().map(|t| t.level).collect();
        assert_eq!(levels, vec![-20.0, -26.0, -32.0, -29.0, -35.0, -32.0]);
    }

    #[tokio::test]
    async fn test_measure_converges_near_simulated_threshold() {
        let engine = engine();
        let session = ThresholdSession::new(&engine, StaircaseConfig::default()).with_duration_ms(80);
        let mut listener = SimulatedListener::new(-40.0);

        let result = session
            .measure(2000.0, Channel::Right, &mut listener)
            .await
            .unwrap();

        assert!(
            (result.threshold_db - -40.0).abs() <= 6.0,
            "threshold {} too far from -40",
            result.threshold_db
        );
        assert_eq!(engine.active_count(), 0);
    }

    #[tokio::test]
    async fn test_run_covers_every_frequency_and_channel() {
        let engine = engine();
        let session = ThresholdSession::new(&engine, StaircaseConfig::default()).with_duration_ms(80);
        let mut listener = SimulatedListener::new(-25.0);

        let results = session
            .run(&[500.0, 1000.0, 4000.0], &[Channel::Left, Channel::Right], &mut listener)
            .await
            .unwrap();

        assert_eq!(results.len(), 6);
        assert_eq!(results[0].channel, Channel::Left);
        assert_eq!(results[3].channel, Channel::Right);
        assert_eq!(results[4].frequency, 1000.0);
    }

    #[tokio::test]
    async fn test_abort_stops_session() {
        let engine = engine();
        let session = ThresholdSession::new(&engine, StaircaseConfig::default()).with_duration_ms(80);
        let mut source = Scripted(vec![Response::Heard].into_iter());

        let err = session
            .measure(1000.0, Channel::Both, &mut source)
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Aborted { .. }));
    }

    #[tokio::test]
    async fn test_invalid_config_rejected_before_playing() {
        let engine = engine();
        let config = StaircaseConfig {
            step_up: 0.0,
            ..StaircaseConfig::default()
        };
        let session = ThresholdSession::new(&engine, config);
        let mut listener = SimulatedListener::new(-20.0);

        let err = session
            .measure(1000.0, Channel::Left, &mut listener)
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Staircase(_)));
        assert!(!engine.is_ready());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_play_timeout_stops_tones() {
        let engine = ToneEngine::new(
            Arc::new(OfflineBackend::new(48000, Pace::Realtime)),
            PlaybackConfig::default(),
            AudioConfig::default(),
        );
        let session = ThresholdSession::new(&engine, StaircaseConfig::default())
            .with_duration_ms(2_000)
            .with_play_timeout(Duration::from_millis(50));
        let mut listener = SimulatedListener::new(-20.0);

        let err = session
            .measure(1000.0, Channel::Left, &mut listener)
            .await
            .unwrap_err();
        assert_eq!(err, SessionError::PlaybackTimeout { timeout_ms: 50 });
        assert_eq!(engine.active_count(), 0);
    }
}
