//! Production [`HttpStreamAdapter`] backed by `reqwest`.
//!
//! `reqwest` has no native "status, then headers, then body chunks" push
//! API — a `send().await` already resolves status and headers together, and
//! the body is a pull-based `Stream`. This adapter reconstructs the
//! fragment lifecycle spec.md §4.2 describes on top of that: the status is
//! queued the instant the response head arrives, and each subsequent
//! `pull_next` hands back the headers once, then advances the body stream.
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use reqwest::redirect::Policy;
use tokio::sync::{mpsc, Mutex};

use crate::http_adapter::{AdapterMessage, Fragment, HttpError, HttpStreamAdapter, PostRequest, StreamHandle};
use crate::options::OptionValue;

/// Header names the session always sets itself (`Content-Type`, `Accept`)
/// or reserves for its own connection handling (`Connection`); a caller's
/// `subscribe_req_options` must not be able to override them (spec.md §6).
const PROTECTED_HEADERS: [&str; 3] = ["content-type", "accept", "connection"];

/// Apply recognized `subscribe_req_options` entries to an outgoing request
/// (spec.md §4.1: "opaque mapping passed through to the HTTP adapter").
/// String-valued options become extra headers; other value shapes and the
/// three protected header names are ignored.
fn apply_subscribe_req_options(
    mut builder: reqwest::RequestBuilder,
    options: &std::collections::HashMap<String, OptionValue>,
) -> reqwest::RequestBuilder {
    for (key, value) in options {
        if PROTECTED_HEADERS.contains(&key.to_ascii_lowercase().as_str()) {
            continue;
        }
        if let OptionValue::Str(value) = value {
            builder = builder.header(key, value);
        }
    }
    builder
}

type BodyStream = Pin<Box<dyn Stream<Item = reqwest::Result<Bytes>> + Send>>;

struct StreamState {
    pending_headers: Option<Vec<(String, String)>>,
    body: Option<BodyStream>,
}

/// Streaming POST adapter. The session configures every request with
/// `following_redirect=false`, so this adapter's underlying client is built
/// with [`Policy::none`] — redirects are surfaced as ordinary `307`
/// statuses for the session to handle itself (spec.md §4.5).
pub struct ReqwestStreamAdapter {
    client: reqwest::Client,
    next_id: AtomicU64,
    streams: Mutex<HashMap<u64, StreamState>>,
    tx: mpsc::UnboundedSender<AdapterMessage>,
    rx: Mutex<mpsc::UnboundedReceiver<AdapterMessage>>,
}

impl ReqwestStreamAdapter {
    pub fn new() -> Result<Self, HttpError> {
        let client = reqwest::Client::builder()
            .redirect(Policy::none())
            .build()
            .map_err(|e| HttpError(e.to_string()))?;
        let (tx, rx) = mpsc::unbounded_channel();
        Ok(ReqwestStreamAdapter {
            client,
            next_id: AtomicU64::new(0),
            streams: Mutex::new(HashMap::new()),
            tx,
            rx: Mutex::new(rx),
        })
    }
}

impl Default for ReqwestStreamAdapter {
    fn default() -> Self {
        Self::new().expect("default TLS backend is always constructible")
    }
}

#[async_trait]
impl HttpStreamAdapter for ReqwestStreamAdapter {
    async fn async_post(&self, request: PostRequest) -> Result<StreamHandle, HttpError> {
        let mut builder = self.client.post(&request.url).body(request.body.to_vec());
        builder = apply_subscribe_req_options(builder, &request.options);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| HttpError(e.to_string()))?;

        let code = response.status().as_u16();
        let reason = response
            .status()
            .canonical_reason()
            .unwrap_or("")
            .to_owned();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_owned(), v.to_owned()))
            })
            .collect();
        let body: BodyStream = Box::pin(response.bytes_stream());

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let handle = StreamHandle::new(id);
        self.streams.lock().await.insert(
            id,
            StreamState {
                pending_headers: Some(headers),
                body: Some(body),
            },
        );

        // The status line is the unsolicited initial fragment (spec.md
        // §4.2); headers and body chunks are delivered one per `pull_next`.
        let _ = self.tx.send(AdapterMessage::Response {
            handle,
            fragment: Fragment::Status { code, reason },
        });

        Ok(handle)
    }

    async fn pull_next(&self, handle: StreamHandle) {
        let mut streams = self.streams.lock().await;
        let Some(state) = streams.get_mut(&handle.id()) else {
            // Closed or unknown handle: pulling is a no-op, matching the
            // idempotent-close contract (nothing left to deliver).
            return;
        };

        if let Some(headers) = state.pending_headers.take() {
            let _ = self.tx.send(AdapterMessage::Response {
                handle,
                fragment: Fragment::Headers(headers),
            });
            return;
        }

        let Some(body) = state.body.as_mut() else {
            return;
        };
        match body.next().await {
            Some(Ok(chunk)) => {
                let _ = self.tx.send(AdapterMessage::Response {
                    handle,
                    fragment: Fragment::BodyChunk(chunk),
                });
            }
            Some(Err(e)) => {
                state.body = None;
                let _ = self.tx.send(AdapterMessage::Response {
                    handle,
                    fragment: Fragment::Error(e.to_string()),
                });
            }
            None => {
                state.body = None;
                let _ = self.tx.send(AdapterMessage::Response {
                    handle,
                    fragment: Fragment::Done,
                });
            }
        }
    }

    async fn close(&self, handle: StreamHandle) {
        // Idempotent: removing an absent key is a no-op.
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

// `Arc<ReqwestStreamAdapter>` is the shape the session actually holds, since
// nothing here requires `&mut self`.
pub type SharedReqwestStreamAdapter = Arc<ReqwestStreamAdapter>;
