//! The user-supplied scheduler contract (spec.md §4.5, SPEC_FULL.md §4.6).
//!
//! A [`Scheduler`] owns the framework's application state across the whole
//! life of a session: every callback takes the state by value and hands
//! back the (possibly updated) state, mirroring the `{ok, state'} |
//! {stop, state'}` contract the subscribed master events drive.

use async_trait::async_trait;

use scheduler_proto::{Event, FrameworkId, FrameworkInfo};

/// What a callback wants the session to do next.
#[derive(Debug)]
pub enum Action<S> {
    /// Keep the session running with the (possibly updated) state.
    Continue(S),
    /// Tear the session down after this callback returns.
    Stop(S),
}

impl<S> Action<S> {
    pub fn into_state(self) -> S {
        match self {
            Action::Continue(s) | Action::Stop(s) => s,
        }
    }

    pub fn is_stop(&self) -> bool {
        matches!(self, Action::Stop(_))
    }
}

/// What [`Scheduler::init`] wants: either proceed to subscribe with a
/// framework descriptor and a force-reregister flag, or abandon startup
/// before any adapter request is made (spec.md §4.5 "Startup").
#[derive(Debug)]
pub enum InitOutcome<S> {
    /// Proceed to the subscribe procedure.
    Subscribe {
        framework_info: FrameworkInfo,
        /// Carried in the pre-registration `SUBSCRIBE` call's `force` field.
        force: bool,
        state: S,
    },
    /// Abandon startup; no adapter request is ever issued (spec.md §7
    /// "user-requested stop" from `init`).
    Stop { reason: String },
}

/// Callbacks a framework implements to react to the subscribed session's
/// lifecycle and to events the master delivers.
///
/// `init`, `registered`, `reregistered`, `disconnected`, and `error` are the
/// mandatory callbacks spec.md §4.5 names. The rest are supplemental,
/// non-authoritative hooks this design adds so a framework doesn't have to
/// pattern-match [`Event`] itself for the common event types (SPEC_FULL.md
/// §4.6, resolving an Open Question) — they default to a no-op `Continue`,
/// so implementors only override the ones they care about.
#[async_trait]
pub trait Scheduler: Send + Sync + 'static {
    type State: Send;

    /// Called once before the first `SUBSCRIBE` call is sent. Supplies the
    /// framework descriptor and `force` flag the subscribe procedure will
    /// carry (spec.md §4.5 "Startup" step 2), or aborts startup outright.
    async fn init(&self, state: Self::State) -> InitOutcome<Self::State>;

    /// The master accepted the subscription for a framework with no prior
    /// `framework_id` (spec.md: first successful `SUBSCRIBED`).
    async fn registered(&self, state: Self::State, framework_id: FrameworkId) -> Action<Self::State>;

    /// The master accepted a resubscription carrying a previously-known
    /// `framework_id` (spec.md: `SUBSCRIBED` on any resubscribe).
    async fn reregistered(&self, state: Self::State, framework_id: FrameworkId) -> Action<Self::State>;

    /// The stream to the master was lost and a resubscribe attempt is
    /// about to begin (spec.md: entering `awaiting_resubscribe`).
    async fn disconnected(&self, state: Self::State) -> Action<Self::State>;

    /// The master sent an `ERROR` event. Framework errors are always
    /// terminal for the session (spec.md §4.5); the callback still gets a
    /// chance to persist final state before the session stops.
    async fn error(&self, state: Self::State, message: String) -> Action<Self::State>;

    async fn offers(&self, state: Self::State, _event: Event) -> Action<Self::State> {
        Action::Continue(state)
    }

    async fn rescind(&self, state: Self::State, _event: Event) -> Action<Self::State> {
        Action::Continue(state)
    }

    async fn update(&self, state: Self::State, _event: Event) -> Action<Self::State> {
        Action::Continue(state)
    }

    async fn message(&self, state: Self::State, _event: Event) -> Action<Self::State> {
        Action::Continue(state)
    }

    async fn failure(&self, state: Self::State, _event: Event) -> Action<Self::State> {
        Action::Continue(state)
    }

    async fn inverse_offers(&self, state: Self::State, _event: Event) -> Action<Self::State> {
        Action::Continue(state)
    }

    async fn rescind_inverse_offer(&self, state: Self::State, _event: Event) -> Action<Self::State> {
        Action::Continue(state)
    }

    /// An event type this design doesn't classify into a dedicated
    /// callback (spec.md §9 "forwarded verbatim").
    async fn unknown_event(&self, state: Self::State, _event: Event) -> Action<Self::State> {
        Action::Continue(state)
    }
}

/// Dispatch a non-Subscribed, non-Heartbeat, non-Error event to its
/// matching supplemental callback by wire `type` string.
pub(crate) async fn dispatch_other<T: Scheduler>(
    scheduler: &T,
    state: T::State,
    event: Event,
) -> Action<T::State> {
    match event.event_type.as_str() {
        "OFFERS" => scheduler.offers(state, event).await,
        "RESCIND" => scheduler.rescind(state, event).await,
        "UPDATE" => scheduler.update(state, event).await,
        "MESSAGE" => scheduler.message(state, event).await,
        "FAILURE" => scheduler.failure(state, event).await,
        "OFFERS_INVERSE" => scheduler.inverse_offers(state, event).await,
        "RESCIND_INVERSE_OFFER" => scheduler.rescind_inverse_offer(state, event).await,
        _ => scheduler.unknown_event(state, event).await,
    }
}
