//! Long-lived session client for the Mesos HTTP Scheduler API.
//!
//! [`start`] validates a flat option mapping, runs the user scheduler's
//! [`Scheduler::init`], and — unless that requests an immediate stop —
//! spawns a session task that subscribes, tracks heartbeats, and
//! transparently follows redirects and resubscribes across master
//! failover until the user scheduler or master tells it to stop.

mod codec;
mod error;
mod event;
mod http_adapter;
pub mod reqwest_adapter;
mod options;
pub mod scheduler;
mod session;

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;

pub use error::{ShutdownReason, StartError, SubscribeExhaustedDetail};
pub use http_adapter::{AdapterMessage, Fragment, HttpError, HttpStreamAdapter, PostRequest, StreamHandle};
pub use options::{OptionValue, OptionsError, ResubscribeLimit, SchedulerOptions};
pub use reqwest_adapter::ReqwestStreamAdapter;
pub use scheduler::{Action, InitOutcome, Scheduler};
pub use scheduler_proto::{DataFormat, FrameworkId, FrameworkInfo};

use session::{Control, Session};

/// A running subscribe session. Dropping this without calling [`stop`] or
/// [`join`] leaves the session running in the background until it stops on
/// its own (spec.md §7) — it does not detach the task from the runtime.
///
/// [`stop`]: SessionHandle::stop
/// [`join`]: SessionHandle::join
pub struct SessionHandle<S> {
    control_tx: mpsc::UnboundedSender<Control>,
    join: JoinHandle<(S, ShutdownReason)>,
}

impl<S> SessionHandle<S> {
    /// Request that the session stop. Idempotent; a second call after the
    /// session has already stopped is a no-op.
    pub fn stop(&self) {
        let _ = self.control_tx.send(Control::Stop);
    }

    /// Wait for the session to stop and recover the user's final state and
    /// the reason it stopped.
    ///
    /// # Errors
    /// Returns the [`tokio::task::JoinError`] if the session task panicked.
    pub async fn join(self) -> Result<(S, ShutdownReason), tokio::task::JoinError> {
        self.join.await
    }
}

/// Validate `raw_options`, run the user scheduler's `init`, and — unless it
/// requests an immediate stop — spawn the subscribe session.
///
/// # Errors
/// Returns [`StartError::BadOptions`] if `raw_options` fails validation
/// (spec.md §4.1), or [`StartError::InitStop`] if `init` returns
/// `{stop, reason}` before a subscribe attempt is ever made.
pub async fn start<A, T>(
    adapter: Arc<A>,
    scheduler: T,
    raw_options: HashMap<String, OptionValue>,
    initial_state: T::State,
) -> Result<SessionHandle<T::State>, StartError>
where
    A: HttpStreamAdapter + 'static,
    T: Scheduler + 'static,
{
    let options = SchedulerOptions::validate(&raw_options)?;
    let scheduler = Arc::new(scheduler);

    let (framework_info, force, state) = match scheduler.init(initial_state).await {
        InitOutcome::Subscribe { framework_info, force, state } => (framework_info, force, state),
        InitOutcome::Stop { reason } => return Err(StartError::InitStop(reason)),
    };

    info!(
        master_hosts = ?options.master_hosts,
        heartbeat_timeout_window_ms = options.heartbeat_timeout_window_ms,
        "starting Mesos scheduler session"
    );

    let session = Session::new(adapter, Arc::clone(&scheduler), options, framework_info, force);
    let (control_tx, control_rx) = mpsc::unbounded_channel();
    let join = tokio::spawn(session.run(state, control_rx));

    Ok(SessionHandle { control_tx, join })
}
