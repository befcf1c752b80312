//! A [`Scheduler`] test double that records every callback invocation for
//! assertions instead of driving real framework logic.

use std::sync::Mutex;

use async_trait::async_trait;
use mesos_scheduler_client::{Action, FrameworkId, FrameworkInfo, InitOutcome, Scheduler};
use scheduler_proto::Event;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    Init,
    Registered(FrameworkId),
    Reregistered(FrameworkId),
    Disconnected,
    Error(String),
    Offers,
    Rescind,
    Update,
    Message,
    Failure,
    InverseOffers,
    RescindInverseOffer,
    UnknownEvent(String),
}

/// Records callback invocations in order; `State` is a plain counter so
/// tests can also assert the value threaded through each callback.
pub struct RecordingScheduler {
    log: Mutex<Vec<Invocation>>,
    framework_info: FrameworkInfo,
    force: bool,
    /// If set, `registered`/`reregistered` requests a stop once the state
    /// counter reaches this value — lets a test drive a bounded number of
    /// (re)subscriptions before ending the session.
    pub stop_after_registrations: Option<u32>,
    /// If true, `error` requests a stop instead of continuing — lets a test
    /// exercise the terminal half of the master `ERROR` event contract.
    pub stop_on_error: bool,
}

fn default_framework_info() -> FrameworkInfo {
    FrameworkInfo {
        user: "root".into(),
        name: "recording-scheduler-test".into(),
        id: None,
        role: None,
        hostname: None,
        webui_url: None,
        principal: None,
        failover_timeout: None,
        capabilities: vec![],
    }
}

impl RecordingScheduler {
    pub fn new() -> Self {
        RecordingScheduler {
            log: Mutex::new(Vec::new()),
            framework_info: default_framework_info(),
            force: true,
            stop_after_registrations: None,
            stop_on_error: false,
        }
    }

    /// Build a scheduler whose `init` offers `framework_info` (and `force`)
    /// to the subscribe procedure instead of the built-in placeholder.
    pub fn with_framework_info(framework_info: FrameworkInfo, force: bool) -> Self {
        RecordingScheduler {
            log: Mutex::new(Vec::new()),
            framework_info,
            force,
            stop_after_registrations: None,
            stop_on_error: false,
        }
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        self.log.lock().expect("log mutex poisoned").clone()
    }

    fn record(&self, invocation: Invocation) {
        self.log.lock().expect("log mutex poisoned").push(invocation);
    }
}

impl Default for RecordingScheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Scheduler for RecordingScheduler {
    type State = u32;

    async fn init(&self, state: Self::State) -> InitOutcome<Self::State> {
        self.record(Invocation::Init);
        InitOutcome::Subscribe { framework_info: self.framework_info.clone(), force: self.force, state }
    }

    async fn registered(&self, state: Self::State, framework_id: FrameworkId) -> Action<Self::State> {
        self.record(Invocation::Registered(framework_id));
        let state = state + 1;
        match self.stop_after_registrations {
            Some(n) if state >= n => Action::Stop(state),
            _ => Action::Continue(state),
        }
    }

    async fn reregistered(&self, state: Self::State, framework_id: FrameworkId) -> Action<Self::State> {
        self.record(Invocation::Reregistered(framework_id));
        let state = state + 1;
        match self.stop_after_registrations {
            Some(n) if state >= n => Action::Stop(state),
            _ => Action::Continue(state),
        }
    }

    async fn disconnected(&self, state: Self::State) -> Action<Self::State> {
        self.record(Invocation::Disconnected);
        Action::Continue(state)
    }

    async fn error(&self, state: Self::State, message: String) -> Action<Self::State> {
        self.record(Invocation::Error(message));
        if self.stop_on_error {
            Action::Stop(state)
        } else {
            Action::Continue(state)
        }
    }

    async fn offers(&self, state: Self::State, _event: Event) -> Action<Self::State> {
        self.record(Invocation::Offers);
        Action::Continue(state)
    }

    async fn rescind(&self, state: Self::State, _event: Event) -> Action<Self::State> {
        self.record(Invocation::Rescind);
        Action::Continue(state)
    }

    async fn update(&self, state: Self::State, _event: Event) -> Action<Self::State> {
        self.record(Invocation::Update);
        Action::Continue(state)
    }

    async fn message(&self, state: Self::State, _event: Event) -> Action<Self::State> {
        self.record(Invocation::Message);
        Action::Continue(state)
    }

    async fn failure(&self, state: Self::State, _event: Event) -> Action<Self::State> {
        self.record(Invocation::Failure);
        Action::Continue(state)
    }

    async fn inverse_offers(&self, state: Self::State, _event: Event) -> Action<Self::State> {
        self.record(Invocation::InverseOffers);
        Action::Continue(state)
    }

    async fn rescind_inverse_offer(&self, state: Self::State, _event: Event) -> Action<Self::State> {
        self.record(Invocation::RescindInverseOffer);
        Action::Continue(state)
    }

    async fn unknown_event(&self, state: Self::State, event: Event) -> Action<Self::State> {
        self.record(Invocation::UnknownEvent(event.event_type.clone()));
        Action::Continue(state)
    }
}
