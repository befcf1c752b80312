//! The subscribe session state machine (spec.md §3, §4.5).
//!
//! Grounded on the teacher's `receiver::session::run_session_loop`: a
//! single-owner async loop driven by one `tokio::select!`, `biased` so a
//! pending stop request always wins a race against in-flight data.
//! Ownership of the adapter connection never leaves this loop — callers only
//! talk to it through the `Control` channel.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use scheduler_proto::{recordio, Call, FrameworkId, FrameworkInfo};

use crate::codec;
use crate::error::{ShutdownReason, SubscribeExhaustedDetail};
use crate::event::{self, SchedulerEvent};
use crate::http_adapter::{AdapterMessage, Fragment, HttpStreamAdapter, PostRequest, StreamHandle};
use crate::options::SchedulerOptions;
use crate::scheduler::{dispatch_other, Scheduler};

/// A redirect chain longer than this for a single subscribe attempt is
/// treated as a misbehaving master rather than followed forever.
const MAX_REDIRECTS_PER_ATTEMPT: u64 = 5;

/// Bounds on the synchronous body drain for an unexpected subscribe status
/// (spec.md §5): a misbehaving master's error page must not be read forever.
const DRAIN_BODY_MAX_BYTES: usize = 64 * 1024;
const DRAIN_BODY_MAX_CHUNKS: usize = 64;

/// Commands a [`crate::SessionHandle`] sends into the running session.
pub(crate) enum Control {
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SubscribeState {
    Connecting,
    Subscribed,
    AwaitingResubscribe,
}

struct Attempt {
    handle: StreamHandle,
    host: String,
    status_code: Option<u16>,
}

pub(crate) struct Session<A: HttpStreamAdapter, T: Scheduler> {
    adapter: Arc<A>,
    scheduler: Arc<T>,
    options: SchedulerOptions,
    framework_info: FrameworkInfo,
    force: bool,
    framework_id: Option<FrameworkId>,
    hosts: VecDeque<String>,
    num_redirect: u64,
    num_resubscribe: u64,
    heartbeat_interval_ms: u64,
    decoder: recordio::Decoder,
}

impl<A: HttpStreamAdapter, T: Scheduler> Session<A, T> {
    pub(crate) fn new(
        adapter: Arc<A>,
        scheduler: Arc<T>,
        options: SchedulerOptions,
        framework_info: FrameworkInfo,
        force: bool,
    ) -> Self {
        let hosts = options.master_hosts.iter().cloned().collect();
        Session {
            adapter,
            scheduler,
            options,
            framework_info,
            force,
            framework_id: None,
            hosts,
            num_redirect: 0,
            num_resubscribe: 0,
            heartbeat_interval_ms: 0,
            decoder: recordio::Decoder::new(),
        }
    }

    /// Drive the session to completion, returning the user's final state
    /// and why the session stopped (spec.md §7).
    pub(crate) async fn run(
        mut self,
        mut state: T::State,
        mut control_rx: mpsc::UnboundedReceiver<Control>,
    ) -> (T::State, ShutdownReason) {
        let mut subscribe_state = SubscribeState::Connecting;
        let mut attempt = match self.begin_subscribe(false).await {
            Some(a) => Some(a),
            None => {
                return (
                    state,
                    ShutdownReason::SubscribeExhausted { detail: SubscribeExhaustedDetail::BadHosts },
                )
            }
        };
        let mut heartbeat_deadline: Option<Instant> = None;
        let mut resubscribe_at: Option<Instant> = None;

        loop {
            tokio::select! {
                biased;

                ctrl = control_rx.recv() => {
                    let _ = ctrl;
                    if let Some(a) = attempt.take() {
                        self.adapter.close(a.handle).await;
                    }
                    return (state, ShutdownReason::Requested);
                }

                () = sleep_until_opt(heartbeat_deadline), if heartbeat_deadline.is_some() => {
                    warn!("heartbeat watchdog expired, treating master as unreachable");
                    if let Some(a) = attempt.take() {
                        self.adapter.close(a.handle).await;
                    }
                    heartbeat_deadline = None;
                    state = self.scheduler.disconnected(state).await.into_state();
                    subscribe_state = SubscribeState::AwaitingResubscribe;
                    resubscribe_at = Some(Instant::now() + self.resubscribe_interval());
                }

                () = sleep_until_opt(resubscribe_at), if resubscribe_at.is_some() => {
                    resubscribe_at = None;
                    if self.options.max_num_resubscribe.is_exceeded_by(self.num_resubscribe) {
                        return (
                            state,
                            ShutdownReason::SubscribeExhausted { detail: SubscribeExhaustedDetail::MaxAttemptsExceeded },
                        );
                    }
                    self.num_resubscribe += 1;
                    if self.framework_id.is_some() {
                        // spec.md §3/§4.5 step 4: a prior successful
                        // `subscribed` refills master_hosts_queue from
                        // configuration before the next resubscribe attempt,
                        // discarding whatever redirect targets accumulated.
                        self.hosts = self.options.master_hosts.iter().cloned().collect();
                    }
                    match self.begin_subscribe(self.framework_id.is_some()).await {
                        Some(a) => {
                            attempt = Some(a);
                            subscribe_state = SubscribeState::Connecting;
                        }
                        None => {
                            return (
                                state,
                                ShutdownReason::SubscribeExhausted { detail: SubscribeExhaustedDetail::BadHosts },
                            )
                        }
                    }
                }

                msg = self.adapter.recv() => {
                    match msg {
                        AdapterMessage::Down { handle, reason } => {
                            if attempt.as_ref().map(|a| a.handle) != Some(handle) {
                                continue;
                            }
                            warn!(%reason, "adapter reported the subscribe stream down");
                            attempt = None;
                            heartbeat_deadline = None;
                            if subscribe_state == SubscribeState::Subscribed {
                                state = self.scheduler.disconnected(state).await.into_state();
                            }
                            subscribe_state = SubscribeState::AwaitingResubscribe;
                            resubscribe_at = Some(Instant::now() + self.resubscribe_interval());
                        }
                        AdapterMessage::Response { handle, fragment } => {
                            if attempt.as_ref().map(|a| a.handle) != Some(handle) {
                                continue;
                            }
                            let outcome = self
                                .handle_fragment(handle, fragment, &mut attempt, &subscribe_state, state)
                                .await;
                            match outcome {
                                FragmentOutcome::Continue(s) => state = s,
                                FragmentOutcome::Disconnected(s) => {
                                    state = s;
                                    heartbeat_deadline = None;
                                    subscribe_state = SubscribeState::AwaitingResubscribe;
                                    resubscribe_at = Some(Instant::now() + self.resubscribe_interval());
                                }
                                FragmentOutcome::Subscribed(s, interval_ms) => {
                                    state = s;
                                    self.heartbeat_interval_ms = interval_ms;
                                    subscribe_state = SubscribeState::Subscribed;
                                    heartbeat_deadline = Some(Instant::now() + self.heartbeat_deadline_duration());
                                }
                                FragmentOutcome::HeartbeatReceived(s) => {
                                    state = s;
                                    if subscribe_state == SubscribeState::Subscribed {
                                        heartbeat_deadline = Some(Instant::now() + self.heartbeat_deadline_duration());
                                    }
                                }
                                FragmentOutcome::Stop(s, reason) => return (s, reason),
                            }
                        }
                    }
                }
            }
        }
    }

    fn resubscribe_interval(&self) -> Duration {
        Duration::from_millis(self.options.resubscribe_interval_ms)
    }

    fn heartbeat_deadline_duration(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms + self.options.heartbeat_timeout_window_ms)
    }

    async fn handle_fragment(
        &mut self,
        handle: StreamHandle,
        fragment: Fragment,
        attempt: &mut Option<Attempt>,
        subscribe_state: &SubscribeState,
        mut state: T::State,
    ) -> FragmentOutcome<T::State> {
        match fragment {
            Fragment::Status { code, reason } => {
                debug!(code, %reason, "subscribe response status");
                if let Some(a) = attempt.as_mut() {
                    a.status_code = Some(code);
                }
                self.adapter.pull_next(handle).await;
                FragmentOutcome::Continue(state)
            }
            Fragment::Headers(headers) => {
                let code = attempt.as_ref().and_then(|a| a.status_code).unwrap_or(0);
                match code {
                    200 => {
                        self.adapter.pull_next(handle).await;
                        FragmentOutcome::Continue(state)
                    }
                    307 => {
                        self.adapter.close(handle).await;
                        self.num_redirect += 1;
                        let current_host = attempt.as_ref().map(|a| a.host.clone()).unwrap_or_default();
                        *attempt = None;

                        if self.num_redirect > MAX_REDIRECTS_PER_ATTEMPT {
                            // spec.md §3: "Exceeding triggers failover to the
                            // next master" — give up on this redirect chain
                            // rather than following it further, and let the
                            // already-rotated hosts queue pick the next
                            // candidate instead of the redirect's target.
                            warn!(%current_host, "too many redirects, failing over to the next master");
                            self.num_redirect = 0;
                            return FragmentOutcome::Disconnected(state);
                        }

                        let target = find_header(&headers, "location")
                            .map(|location| redirect_target(&current_host, location));
                        match target {
                            Some(host) => {
                                info!(%host, "following subscribe redirect");
                                self.hosts.push_front(host);
                                match self.begin_subscribe(self.framework_id.is_some()).await {
                                    Some(a) => {
                                        *attempt = Some(a);
                                        FragmentOutcome::Continue(state)
                                    }
                                    None => FragmentOutcome::Stop(
                                        state,
                                        ShutdownReason::SubscribeExhausted { detail: SubscribeExhaustedDetail::BadHosts },
                                    ),
                                }
                            }
                            None => {
                                warn!("redirect response carried no usable Location header");
                                FragmentOutcome::Disconnected(state)
                            }
                        }
                    }
                    503 => {
                        warn!("master reports no elected leader");
                        self.adapter.close(handle).await;
                        *attempt = None;
                        FragmentOutcome::Disconnected(state)
                    }
                    other => {
                        // spec.md §5: draining a non-2xx body is the sole
                        // synchronous network read this design performs.
                        let (body, truncated) = self.drain_body(handle).await;
                        warn!(
                            status = other,
                            body = %String::from_utf8_lossy(&body),
                            truncated,
                            "subscribe rejected with an unexpected status"
                        );
                        self.adapter.close(handle).await;
                        *attempt = None;
                        FragmentOutcome::Disconnected(state)
                    }
                }
            }
            Fragment::BodyChunk(bytes) => self.handle_body_chunk(handle, bytes, state).await,
            Fragment::Done => {
                info!("subscribe stream closed by peer");
                *attempt = None;
                if *subscribe_state == SubscribeState::Subscribed {
                    state = self.scheduler.disconnected(state).await.into_state();
                }
                FragmentOutcome::Disconnected(state)
            }
            Fragment::Error(message) => {
                warn!(%message, "transport error on subscribe stream");
                *attempt = None;
                if *subscribe_state == SubscribeState::Subscribed {
                    state = self.scheduler.disconnected(state).await.into_state();
                }
                FragmentOutcome::Disconnected(state)
            }
        }
    }

    async fn handle_body_chunk(
        &mut self,
        handle: StreamHandle,
        bytes: Bytes,
        mut state: T::State,
    ) -> FragmentOutcome<T::State> {
        let events = match codec::decode_events(self.options.data_format, &mut self.decoder, &bytes) {
            Ok(events) => events,
            Err(e) => {
                warn!(error = %e, "malformed RecordIO/event payload, treating stream as dead");
                self.adapter.close(handle).await;
                return FragmentOutcome::Disconnected(state);
            }
        };

        let mut became_subscribed: Option<u64> = None;
        let mut saw_heartbeat = false;

        for event in events {
            match event::classify(event) {
                SchedulerEvent::Subscribed { framework_id, heartbeat_interval_ms } => {
                    let was_known = self.framework_id.is_some();
                    self.framework_id = Some(framework_id.clone());
                    self.num_redirect = 0;
                    self.num_resubscribe = 0;
                    let action = if was_known {
                        self.scheduler.reregistered(state, framework_id).await
                    } else {
                        self.scheduler.registered(state, framework_id).await
                    };
                    let stop = action.is_stop();
                    state = action.into_state();
                    if stop {
                        return FragmentOutcome::Stop(state, ShutdownReason::CallbackRequested);
                    }
                    became_subscribed = Some(heartbeat_interval_ms);
                }
                SchedulerEvent::Heartbeat => {
                    saw_heartbeat = true;
                }
                SchedulerEvent::Error { message } => {
                    let action = self.scheduler.error(state, message.clone()).await;
                    let stop = action.is_stop();
                    state = action.into_state();
                    if stop {
                        self.adapter.close(handle).await;
                        return FragmentOutcome::Stop(state, ShutdownReason::MasterError { message });
                    }
                    // spec.md §4.5: on `ok`, the session leaves the stream
                    // alone — it typically closes of its own accord, which
                    // drives the ordinary `Done`/resubscribe path.
                }
                SchedulerEvent::Other(ev) => {
                    let action = dispatch_other(&*self.scheduler, state, ev).await;
                    let stop = action.is_stop();
                    state = action.into_state();
                    if stop {
                        return FragmentOutcome::Stop(state, ShutdownReason::CallbackRequested);
                    }
                }
            }
        }

        self.adapter.pull_next(handle).await;

        if let Some(interval_ms) = became_subscribed {
            FragmentOutcome::Subscribed(state, interval_ms)
        } else if saw_heartbeat {
            FragmentOutcome::HeartbeatReceived(state)
        } else {
            FragmentOutcome::Continue(state)
        }
    }

    /// Synchronously read the rest of the current response body for a
    /// subscribe attempt that got back neither `200`, `307`, nor `503`
    /// (spec.md §4.5, §5), bounded so a misbehaving master can't stall the
    /// session indefinitely. Returns the collected bytes and whether the
    /// bound was hit before the body was fully drained.
    async fn drain_body(&self, handle: StreamHandle) -> (Bytes, bool) {
        let mut buf = Vec::new();
        for _ in 0..DRAIN_BODY_MAX_CHUNKS {
            if buf.len() >= DRAIN_BODY_MAX_BYTES {
                return (Bytes::from(buf), true);
            }
            self.adapter.pull_next(handle).await;
            match self.adapter.recv().await {
                AdapterMessage::Response { handle: h, fragment: Fragment::BodyChunk(chunk) } if h == handle => {
                    buf.extend_from_slice(&chunk);
                }
                AdapterMessage::Response { handle: h, fragment: Fragment::Done } if h == handle => {
                    return (Bytes::from(buf), false);
                }
                // Anything else (a transport error, the stream going down,
                // or a fragment for a handle this drain didn't expect) ends
                // the drain; the caller closes the handle regardless.
                _ => return (Bytes::from(buf), false),
            }
        }
        (Bytes::from(buf), true)
    }

    async fn begin_subscribe(&mut self, is_resubscribe: bool) -> Option<Attempt> {
        let rounds = self.hosts.len().max(1);
        for _ in 0..rounds {
            let host = self.hosts.pop_front()?;
            self.hosts.push_back(host.clone());

            let call = match (&self.framework_id, is_resubscribe) {
                (Some(fid), true) => Call::resubscribe(fid.clone(), self.framework_info.clone()),
                _ => Call::subscribe(self.framework_info.clone(), self.force),
            };
            let body = match codec::encode(self.options.data_format, &call) {
                Ok(body) => body,
                Err(e) => {
                    warn!(error = %e, "failed to encode subscribe call");
                    continue;
                }
            };
            let content_type = self.options.data_format.content_type().to_owned();
            let request = PostRequest {
                url: subscribe_url(&host),
                headers: vec![
                    ("Content-Type".to_owned(), content_type.clone()),
                    ("Accept".to_owned(), content_type),
                ],
                body: Bytes::from(body),
                options: self.options.subscribe_req_options.clone(),
            };

            match self.adapter.async_post(request).await {
                Ok(handle) => {
                    self.decoder = recordio::Decoder::new();
                    return Some(Attempt { handle, host, status_code: None });
                }
                Err(e) => {
                    warn!(error = %e, %host, "subscribe POST failed, trying next master host");
                }
            }
        }
        None
    }
}

enum FragmentOutcome<S> {
    Continue(S),
    Disconnected(S),
    Subscribed(S, u64),
    HeartbeatReceived(S),
    Stop(S, ShutdownReason),
}

fn subscribe_url(host: &str) -> String {
    format!("http://{host}/api/v1/scheduler")
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// Resolve a `Location` header value against the host that produced it. An
/// absolute URL's authority is extracted; anything else is assumed to
/// already be a bare `host:port`.
fn redirect_target(current_host: &str, location: &str) -> String {
    if let Some(rest) = location
        .strip_prefix("http://")
        .or_else(|| location.strip_prefix("https://"))
    {
        let authority = rest.split(['/', '?', '#']).next().unwrap_or(rest);
        if authority.is_empty() {
            current_host.to_owned()
        } else {
            authority.to_owned()
        }
    } else {
        location.to_owned()
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redirect_target_extracts_authority_from_absolute_url() {
        assert_eq!(
            redirect_target("old:5050", "http://new-leader:5050/api/v1/scheduler"),
            "new-leader:5050"
        );
    }

    #[test]
    fn redirect_target_passes_through_bare_host_port() {
        assert_eq!(redirect_target("old:5050", "new-leader:5050"), "new-leader:5050");
    }

    #[test]
    fn redirect_target_falls_back_to_current_host_on_empty_authority() {
        assert_eq!(redirect_target("old:5050", "http:///api/v1/scheduler"), "old:5050");
    }

    #[test]
    fn find_header_is_case_insensitive() {
        let headers = vec![("Location".to_owned(), "new:5050".to_owned())];
        assert_eq!(find_header(&headers, "location"), Some("new:5050"));
    }

    #[test]
    fn subscribe_url_targets_the_scheduler_api_path() {
        assert_eq!(subscribe_url("localhost:5050"), "http://localhost:5050/api/v1/scheduler");
    }
}
