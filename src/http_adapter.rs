//! HTTP streaming adapter surface (spec.md §4.2).
//!
//! The session core is generic over [`HttpStreamAdapter`] so it can run
//! against [`crate::reqwest_adapter::ReqwestStreamAdapter`] in production and
//! against a scripted fake in tests (see the `scheduler-test-utils` crate).

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;

use crate::options::OptionValue;

/// Opaque handle to an in-flight or established streaming POST.
///
/// `client_ref` in spec.md §3: present while a request is in flight or
/// fully established, absent otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamHandle(u64);

impl StreamHandle {
    /// Construct a handle for a custom [`HttpStreamAdapter`] implementation
    /// (the production adapter and test doubles each mint their own ids).
    pub fn new(id: u64) -> Self {
        StreamHandle(id)
    }

    pub fn id(self) -> u64 {
        self.0
    }
}

/// A streaming POST request, already carrying the three adapter-level
/// options the session always overrides (spec.md §3, §4.2):
/// `async=once`, `recv_timeout=infinite`, `following_redirect=false`.
#[derive(Debug, Clone)]
pub struct PostRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
    pub options: HashMap<String, OptionValue>,
}

/// One fragment of a streaming HTTP response (spec.md §4.2).
#[derive(Debug, Clone)]
pub enum Fragment {
    Status { code: u16, reason: String },
    Headers(Vec<(String, String)>),
    BodyChunk(Bytes),
    Done,
    Error(String),
}

/// A message the adapter delivers to the owning session: either a fragment
/// for a specific stream, or an unexpected process-down notification for
/// one (spec.md §4.2 "A process-down notification").
#[derive(Debug, Clone)]
pub enum AdapterMessage {
    Response { handle: StreamHandle, fragment: Fragment },
    Down { handle: StreamHandle, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpError(pub String);

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for HttpError {}

/// The streaming adapter contract the session drives (spec.md §4.2).
///
/// `async_post` starts the POST and returns immediately; its `Status`
/// fragment is delivered to [`recv`] unsolicited as soon as the response
/// head arrives. Every fragment after that is back-pressured: nothing
/// else is pushed to `recv` for a handle until the session calls
/// `pull_next` for it. `close` is idempotent: closing an already-closed or
/// unknown handle is a no-op.
#[async_trait]
pub trait HttpStreamAdapter: Send + Sync {
    async fn async_post(&self, request: PostRequest) -> Result<StreamHandle, HttpError>;
    async fn pull_next(&self, handle: StreamHandle);
    async fn close(&self, handle: StreamHandle);
    /// Block until the next message for any handle this adapter owns.
    async fn recv(&self) -> AdapterMessage;
}
