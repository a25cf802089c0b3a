//! Call sessions.
//!
//! A call session bridges one Twilio media stream to one dialogue
//! connection, drives the hang-up and summary workflows, and hands the
//! summary to a [`SummaryNotifier`].

mod controller;
pub mod notifier;
pub mod prompts;
mod state;

pub use controller::{
    CallOutcome, CallSession, CallSessionHandle, SessionInput, SessionOptions, SessionTimeouts,
    TelephonyRoute,
};
pub use notifier::{LogNotifier, NotifyError, SummaryNotifier, TwilioSmsConfig, TwilioSmsNotifier};
pub use state::{CallState, DrainReason};
