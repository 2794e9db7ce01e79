//! Polling timer transition function.
//!
//! The poll scheduler is re-evaluated once per observed [`Status`]
//! rather than on a fixed schedule: each new phase decides whether the
//! timer stays armed.
//!
//! [`Status`]: crate::status::Status

use crate::status::Phase;

/// Whether the polling timer for a job should keep firing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    Armed,
    Disarmed,
}

/// Decide the timer state after observing `phase`.
///
/// Terminal phases disarm; every other phase, including ones the client
/// does not recognise, keeps polling.
pub fn next_timer_state(phase: &Phase) -> TimerState {
    if phase.is_terminal() {
        TimerState::Disarmed
    } else {
        TimerState::Armed
    }
}
