// StaircaseState - per-run state produced by the controller's transitions

use serde::{Deserialize, Serialize};

/// Listener's answer to one presentation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Response {
    Heard,
    NotHeard,
}

/// Direction of the most recent level step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Down,
    Up,
}

impl Direction {
    /// Step direction implied by a response: heard -> down, not heard -> up
    pub fn after(response: Response) -> Self {
        match response {
            Response::Heard => Direction::Down,
            Response::NotHeard => Direction::Up,
        }
    }
}

/// Logical phase of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StaircasePhase {
    /// Accepting responses
    Running,
    /// Threshold resolved, no further responses accepted
    Terminated,
}

/// State of one frequency/ear run
///
/// Only the controller's transition function produces new values; callers
/// read it and hand it back on the next response.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StaircaseState {
    /// Level to present next (dB), always within the config bounds
    pub current_level: f32,
    pub direction: Direction,
    pub reversal_count: u32,
    pub attempt_count: u32,
    pub last_response: Option<Response>,
    /// Set exactly once, at termination
    pub resolved_threshold: Option<f32>,
}

impl StaircaseState {
    pub fn phase(&self) -> StaircasePhase {
        if self.resolved_threshold.is_some() {
            StaircasePhase::Terminated
        } else {
            StaircasePhase::Running
        }
    }

    pub fn is_terminated(&self) -> bool {
        self.phase() == StaircasePhase::Terminated
    }
}

/// Result of feeding one response to the controller
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StaircaseStep {
    pub state: StaircaseState,
    /// `false` once the run terminated
    pub should_continue: bool,
    pub threshold: Option<f32>,
}
