//! Pass scheduling: decides whether a render request starts a pass, is
//! coalesced into the running one, or cancels it and arms a retry.
//!
//! Pure state machine; the caller supplies the clock so it can be driven
//! deterministically.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Observable engine state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineState {
    Idle,
    Busy,
    PendingRetry,
}

/// What the caller should do after feeding an event to the [`Scheduler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Start a pass now with the latest request.
    Dispatch,
    /// Nothing to do; the running pass or the armed retry covers it.
    Ignore,
    /// Raise cancel on the running pass and fire the timer at `retry_at`.
    CancelAndRetry { retry_at: Instant },
}

#[derive(Debug, Clone)]
pub struct Scheduler {
    debounce_window: Duration,
    retry_delay: Duration,
    /// Dispatch time of the in-flight pass.
    busy_since: Option<Instant>,
    retry_at: Option<Instant>,
}

impl Scheduler {
    pub fn new(debounce_window: Duration, retry_delay: Duration) -> Self {
        Self {
            debounce_window,
            retry_delay,
            busy_since: None,
            retry_at: None,
        }
    }

    pub fn state(&self) -> EngineState {
        if self.retry_at.is_some() {
            EngineState::PendingRetry
        } else if self.busy_since.is_some() {
            EngineState::Busy
        } else {
            EngineState::Idle
        }
    }

    pub fn retry_at(&self) -> Option<Instant> {
        self.retry_at
    }

    /// A caller asked for a render.
    pub fn on_request(&mut self, now: Instant) -> Decision {
        match self.busy_since {
            Some(since) => {
                if self.retry_at.is_some() {
                    return Decision::Ignore;
                }
                if now.saturating_duration_since(since) < self.debounce_window {
                    return Decision::Ignore;
                }
                let retry_at = now + self.retry_delay;
                self.retry_at = Some(retry_at);
                Decision::CancelAndRetry { retry_at }
            }
            None => {
                self.retry_at = None;
                self.busy_since = Some(now);
                Decision::Dispatch
            }
        }
    }

    /// The retry timer may have elapsed. Fires at most once per arming.
    pub fn on_timer(&mut self, now: Instant) -> Decision {
        match self.retry_at {
            Some(at) if now >= at => {
                self.retry_at = None;
                self.on_request(now)
            }
            _ => Decision::Ignore,
        }
    }

    /// The in-flight pass finished, whatever its outcome. An armed retry stays armed.
    pub fn on_completed(&mut self) {
        self.busy_since = None;
    }
}
