//! A scriptable [`HttpStreamAdapter`] double for exercising the subscribe
//! session without a real master: tests queue [`ScriptedResponse`]s up
//! front, then drive the stream forward with [`MockStreamServer::inject`]
//! to simulate server-paced events (heartbeats, a silent master, a mid-
//! stream disconnect).

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use mesos_scheduler_client::{AdapterMessage, Fragment, HttpError, HttpStreamAdapter, PostRequest, StreamHandle};
use tokio::sync::{mpsc, Mutex};

/// What happens after a [`ScriptedResponse`]'s body chunks are delivered.
#[derive(Debug, Clone)]
pub enum After {
    /// The body stream ends normally (`Fragment::Done`).
    Done,
    /// The stream stays open with no further data until the test injects
    /// more via [`MockStreamServer::inject`] — models a silent master.
    Hang,
    /// The transport fails (`Fragment::Error`).
    Error(String),
}

/// One scripted HTTP response to a subscribe POST.
#[derive(Debug, Clone)]
pub struct ScriptedResponse {
    pub status: u16,
    pub reason: String,
    pub headers: Vec<(String, String)>,
    pub body_chunks: Vec<Bytes>,
    pub then: After,
}

impl ScriptedResponse {
    /// A `200` carrying one already-RecordIO-framed event, then left open
    /// (heartbeats and further events arrive via `inject`).
    pub fn subscribed(framed_event: Bytes) -> Self {
        ScriptedResponse {
            status: 200,
            reason: "OK".to_owned(),
            headers: vec![],
            body_chunks: vec![framed_event],
            then: After::Hang,
        }
    }

    pub fn redirect(location: &str) -> Self {
        ScriptedResponse {
            status: 307,
            reason: "Temporary Redirect".to_owned(),
            headers: vec![("Location".to_owned(), location.to_owned())],
            body_chunks: vec![],
            then: After::Done,
        }
    }

    pub fn leader_unavailable() -> Self {
        ScriptedResponse {
            status: 503,
            reason: "Service Unavailable".to_owned(),
            headers: vec![],
            body_chunks: vec![],
            then: After::Done,
        }
    }
}

/// Frame a raw JSON event body the way RecordIO expects on the wire:
/// `<ascii-decimal-length>\n<payload>`.
pub fn frame(json: &str) -> Bytes {
    Bytes::from(format!("{}\n{}", json.len(), json))
}

/// Fragments still owed to a stream, in delivery order, followed by what
/// happens once they run out.
struct StreamState {
    pending: VecDeque<Fragment>,
    after: After,
    /// Set once `pull_next` finds nothing queued and `after` is `Hang`: the
    /// next `inject` delivers straight through instead of queuing.
    awaiting_injection: bool,
}

/// The [`HttpStreamAdapter`] implementation handed to the session under
/// test. Build scenarios through [`MockStreamServer`], which owns the same
/// underlying state.
pub struct MockStreamAdapter {
    next_id: AtomicU64,
    scripts: Mutex<VecDeque<ScriptedResponse>>,
    streams: Mutex<HashMap<u64, StreamState>>,
    requests: Mutex<Vec<PostRequest>>,
    handles: Mutex<Vec<StreamHandle>>,
    tx: mpsc::UnboundedSender<AdapterMessage>,
    rx: Mutex<mpsc::UnboundedReceiver<AdapterMessage>>,
}

impl MockStreamAdapter {
    fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        MockStreamAdapter {
            next_id: AtomicU64::new(0),
            scripts: Mutex::new(VecDeque::new()),
            streams: Mutex::new(HashMap::new()),
            requests: Mutex::new(Vec::new()),
            handles: Mutex::new(Vec::new()),
            tx,
            rx: Mutex::new(rx),
        }
    }
}

#[async_trait]
impl HttpStreamAdapter for MockStreamAdapter {
    async fn async_post(&self, request: PostRequest) -> Result<StreamHandle, HttpError> {
        self.requests.lock().await.push(request);

        let script = self
            .scripts
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(ScriptedResponse::leader_unavailable);

        let mut pending = VecDeque::new();
        pending.push_back(Fragment::Headers(script.headers));
        for chunk in script.body_chunks {
            pending.push_back(Fragment::BodyChunk(chunk));
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let handle = StreamHandle::new(id);
        self.streams.lock().await.insert(
            id,
            StreamState { pending, after: script.then, awaiting_injection: false },
        );
        self.handles.lock().await.push(handle);

        // The status line is the unsolicited initial fragment (spec.md
        // §4.2); everything queued above waits for `pull_next`.
        let _ = self.tx.send(AdapterMessage::Response {
            handle,
            fragment: Fragment::Status { code: script.status, reason: script.reason },
        });

        Ok(handle)
    }

    async fn pull_next(&self, handle: StreamHandle) {
        let mut streams = self.streams.lock().await;
        let Some(state) = streams.get_mut(&handle.id()) else {
            return;
        };

        if let Some(fragment) = state.pending.pop_front() {
            drop(streams);
            let _ = self.tx.send(AdapterMessage::Response { handle, fragment });
            return;
        }

        match &state.after {
            After::Done => {
                drop(streams);
                let _ = self.tx.send(AdapterMessage::Response { handle, fragment: Fragment::Done });
            }
            After::Error(message) => {
                let message = message.clone();
                drop(streams);
                let _ = self
                    .tx
                    .send(AdapterMessage::Response { handle, fragment: Fragment::Error(message) });
            }
            After::Hang => {
                state.awaiting_injection = true;
            }
        }
    }

    async fn close(&self, handle: StreamHandle) {
        self.streams.lock().await.remove(&handle.id());
    }

    async fn recv(&self) -> AdapterMessage {
        self.rx
            .lock()
            .await
            .recv()
            .await
            .expect("adapter holds its own sender, channel never closes")
    }
}

/// Test-facing handle for scripting and driving a [`MockStreamAdapter`].
pub struct MockStreamServer {
    adapter: Arc<MockStreamAdapter>,
}

impl MockStreamServer {
    pub fn new() -> Self {
        MockStreamServer { adapter: Arc::new(MockStreamAdapter::new()) }
    }

    pub fn adapter(&self) -> Arc<MockStreamAdapter> {
        Arc::clone(&self.adapter)
    }

    /// Queue the response the next `async_post` call will receive, in
    /// call order (FIFO).
    pub async fn queue(&self, response: ScriptedResponse) {
        self.adapter.scripts.lock().await.push_back(response);
    }

    /// All requests the session has issued so far, in order.
    pub async fn requests(&self) -> Vec<PostRequest> {
        self.adapter.requests.lock().await.clone()
    }

    /// The `n`th stream handle the adapter has ever handed out (0-indexed
    /// by `async_post` call order).
    pub async fn handle_at(&self, n: usize) -> StreamHandle {
        self.adapter.handles.lock().await[n]
    }

    /// Push a fragment onto an open stream: delivered immediately if the
    /// session is already blocked on a `pull_next` for it, otherwise
    /// queued for whenever that next pull happens.
    pub async fn inject(&self, handle: StreamHandle, fragment: Fragment) {
        let mut streams = self.adapter.streams.lock().await;
        let Some(state) = streams.get_mut(&handle.id()) else {
            return;
        };
        if state.awaiting_injection {
            state.awaiting_injection = false;
            drop(streams);
            let _ = self.adapter.tx.send(AdapterMessage::Response { handle, fragment });
        } else {
            state.pending.push_back(fragment);
        }
    }

    /// Simulate the adapter losing a connection out from under the
    /// session (distinct from a scripted `Fragment::Error`).
    pub async fn go_down(&self, handle: StreamHandle, reason: &str) {
        let _ = self
            .adapter
            .tx
            .send(AdapterMessage::Down { handle, reason: reason.to_owned() });
    }
}

impl Default for MockStreamServer {
    fn default() -> Self {
        Self::new()
    }
}
