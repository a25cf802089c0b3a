//! Call session states.

use std::fmt;

/// Why the session is draining.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainReason {
    /// The assistant ended the call; waiting for its farewell to finish
    /// playing before the line is dropped.
    Hangup,
    /// The line is gone; waiting for the assistant's text summary.
    Summary,
}

/// Lifecycle of a call session.
///
/// `Connecting -> Active -> Draining(Hangup) -> Draining(Summary) -> Closed`.
/// `Draining(Summary)` is entered directly from `Active` when the caller
/// hangs up, and any state moves straight to `Closed` on a dialogue failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CallState {
    #[default]
    Connecting,
    Active,
    Draining(DrainReason),
    Closed,
}

impl CallState {
    /// Whether caller audio should still reach the dialogue service.
    pub fn forwards_caller_audio(&self) -> bool {
        matches!(self, CallState::Connecting | CallState::Active)
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, CallState::Closed)
    }
}

impl fmt::Display for CallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallState::Connecting => write!(f, "connecting"),
            CallState::Active => write!(f, "active"),
            CallState::Draining(DrainReason::Hangup) => write!(f, "draining(hangup)"),
            CallState::Draining(DrainReason::Summary) => write!(f, "draining(summary)"),
            CallState::Closed => write!(f, "closed"),
        }
    }
}
