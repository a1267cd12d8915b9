// Staircase module - adaptive threshold estimation
//
// The controller is a pure transition function over listener responses:
// 1. initialize(config) creates the starting state for one frequency/ear run
// 2. advance(state, config, response) returns the next state, whether to
//    keep presenting, and the resolved threshold once the run terminates
//
// The controller never touches audio; the orchestrator plays the level it
// reads from the state and feeds the answer back in.

pub mod config;
pub mod state;

pub use config::StaircaseConfig;
pub use state::{Direction, Response, StaircasePhase, StaircaseState, StaircaseStep};

use crate::error::StaircaseError;

/// Create the starting state of a run
///
/// `current_level = initial_level`, `direction = Down`, zero counts, no
/// response recorded yet.
pub fn initialize(config: &StaircaseConfig) -> StaircaseState {
    StaircaseState {
        current_level: config.initial_level,
        direction: Direction::Down,
        reversal_count: 0,
        attempt_count: 0,
        last_response: None,
        resolved_threshold: None,
    }
}

/// Feed one response and compute the next state
///
/// Transition order:
/// 1. Count the attempt and record the response
/// 2. If the attempt budget is exhausted, terminate at the level that was
///    just presented (before any level change)
/// 3. Step down by `step_down` on heard, up by `step_up` on not heard,
///    clamped to the config bounds
/// 4. Count a reversal when the direction changed and a prior response exists
/// 5. If the reversal budget is exhausted, terminate at the new level
///
/// The resolved threshold is the level at the terminating step, not an
/// average over reversal levels.
///
/// # Errors
/// `StaircaseError::AlreadyTerminated` if `state` already holds a threshold.
pub fn advance(
    state: &StaircaseState,
    config: &StaircaseConfig,
    response: Response,
) -> Result<StaircaseStep, StaircaseError> {
    if let Some(threshold) = state.resolved_threshold {
        return Err(StaircaseError::AlreadyTerminated { threshold });
    }

    let mut next = *state;
    next.attempt_count += 1;
    next.last_response = Some(response);

    if next.attempt_count >= config.max_attempts {
        return Ok(terminate(next, state.current_level));
    }

    let direction = Direction::after(response);
    next.current_level = match direction {
        Direction::Down => config.clamp_level(state.current_level - config.step_down),
        Direction::Up => config.clamp_level(state.current_level + config.step_up),
    };
    next.direction = direction;

    // A clamped level still reverses if the intended direction changed
    if state.last_response.is_some() && direction != state.direction {
        next.reversal_count += 1;
    }

    if next.reversal_count >= config.max_reversals {
        let level = next.current_level;
        return Ok(terminate(next, level));
    }

    Ok(StaircaseStep {
        state: next,
        should_continue: true,
        threshold: None,
    })
}

fn terminate(mut state: StaircaseState, threshold: f32) -> StaircaseStep {
    state.resolved_threshold = Some(threshold);
    StaircaseStep {
        state,
        should_continue: false,
        threshold: Some(threshold),
    }
}
