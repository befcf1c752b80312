//! Error and shutdown-reason taxonomy (spec.md §7).

use std::fmt;

use crate::options::OptionsError;

/// Why `start` failed before a session was ever created.
#[derive(Debug)]
pub enum StartError {
    /// Options validation failed (spec.md §4.1).
    BadOptions(OptionsError),
    /// The user scheduler's `init` returned `{stop, reason}` before any
    /// subscribe attempt was made.
    InitStop(String),
}

impl fmt::Display for StartError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StartError::BadOptions(e) => write!(f, "bad options: {e}"),
            StartError::InitStop(reason) => write!(f, "init requested stop before subscribing: {reason}"),
        }
    }
}

impl std::error::Error for StartError {}

impl From<OptionsError> for StartError {
    fn from(e: OptionsError) -> Self {
        StartError::BadOptions(e)
    }
}

/// Why a running session terminated (spec.md §7).
///
/// Every shutdown reason is terminal: once a session reaches one, it does
/// not resubscribe again. Non-terminal failures (transport/protocol/
/// liveness errors) never surface here — they drive the resubscribe path
/// and are only visible as `tracing` events and, optionally, a
/// `disconnected` callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownReason {
    /// `master_hosts_queue` emptied without a successful subscribe, at
    /// startup or after exhausting resubscribe attempts.
    SubscribeExhausted { detail: SubscribeExhaustedDetail },
    /// A user callback (including `init`) returned `{stop, ...}`.
    CallbackRequested,
    /// The owning [`crate::SessionHandle`] called `stop()`.
    Requested,
    /// The master sent an `ERROR` event. Always terminal (spec.md §4.5).
    MasterError { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscribeExhaustedDetail {
    /// `num_resubscribe` exceeded `max_num_resubscribe`.
    MaxAttemptsExceeded,
    /// No master in `master_hosts` accepted the initial subscribe POST.
    BadHosts,
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownReason::SubscribeExhausted { detail } => {
                write!(f, "subscribe exhausted: {detail:?}")
            }
            ShutdownReason::CallbackRequested => write!(f, "callback requested shutdown"),
            ShutdownReason::Requested => write!(f, "shutdown requested by handle"),
            ShutdownReason::MasterError { message } => write!(f, "master sent an error: {message}"),
        }
    }
}
