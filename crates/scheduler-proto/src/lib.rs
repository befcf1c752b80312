//! Wire types for the Mesos HTTP Scheduler API, JSON (de)serialization, and
//! the RecordIO chunk framing used to delimit events inside a response body.
//!
//! This crate is pure data and framing: it has no knowledge of HTTP, timers,
//! or retries. Those live in the session core that consumes it.

pub mod recordio;

use serde::{Deserialize, Serialize};

/// Wire serialization format negotiated via `Content-Type`/`Accept`.
///
/// Only [`DataFormat::Json`] is implemented by [`encode_call`] and
/// [`decode_event`] in this design; `Protobuf` is represented so the
/// adapter surface stays format-parameterized, but exercising it returns
/// [`CodecError::UnsupportedFormat`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataFormat {
    Json,
    Protobuf,
}

impl DataFormat {
    pub fn content_type(self) -> &'static str {
        match self {
            DataFormat::Json => "application/json",
            DataFormat::Protobuf => "application/x-protobuf",
        }
    }
}

// ---------------------------------------------------------------------------
// Framework identity
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameworkId {
    pub value: String,
}

/// The framework's self-description, carried in every `SUBSCRIBE` call
/// before a `framework_id` has been assigned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameworkInfo {
    pub user: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<FrameworkId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webui_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub principal: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failover_timeout: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub capabilities: Vec<String>,
}

// ---------------------------------------------------------------------------
// Outbound: Call
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscribeCall {
    pub framework_info: FrameworkInfo,
    /// Only meaningful, and only sent, before a `framework_id` is known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub force: Option<bool>,
}

/// A scheduler `Call` message. This design only ever sends `SUBSCRIBE`; the
/// `type` discriminator is kept as a plain string (rather than a serde tag)
/// to mirror the wire shape Mesos actually uses, where the nested field name
/// echoes the lowercased type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Call {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub framework_id: Option<FrameworkId>,
    #[serde(rename = "type")]
    pub call_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscribe: Option<SubscribeCall>,
}

impl Call {
    /// Pre-registration `SUBSCRIBE`: no `framework_id` known yet.
    pub fn subscribe(framework_info: FrameworkInfo, force: bool) -> Self {
        Call {
            framework_id: None,
            call_type: "SUBSCRIBE".to_owned(),
            subscribe: Some(SubscribeCall {
                framework_info,
                force: Some(force),
            }),
        }
    }

    /// Re-entry `SUBSCRIBE`: echoes the known `framework_id`; no `force`.
    pub fn resubscribe(framework_id: FrameworkId, mut framework_info: FrameworkInfo) -> Self {
        framework_info.id = Some(framework_id.clone());
        Call {
            framework_id: Some(framework_id),
            call_type: "SUBSCRIBE".to_owned(),
            subscribe: Some(SubscribeCall {
                framework_info,
                force: None,
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Inbound: Event
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscribedEvent {
    pub framework_id: FrameworkId,
    /// Wire field is seconds (may be fractional), per the Mesos Scheduler API.
    pub heartbeat_interval_seconds: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEvent {
    pub message: String,
}

/// A single decoded event. `event_type` is the wire `type` discriminator
/// (`SUBSCRIBED`, `HEARTBEAT`, `ERROR`, `OFFERS`, `RESCIND`, `UPDATE`,
/// `MESSAGE`, `FAILURE`, `INVERSE_OFFERS`, `RESCIND_INVERSE_OFFER`, or any
/// other value the master may introduce). Exactly one of the typed fields
/// is populated for the known types; unknown types leave all of them empty
/// and the event is still forwarded verbatim to the user scheduler.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscribe: Option<SubscribedEvent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorEvent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offers: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rescind: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inverse_offers: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rescind_inverse_offer: Option<serde_json::Value>,
}

// ---------------------------------------------------------------------------
// Codec
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("RecordIO framing: {0}")]
    Framing(#[from] recordio::FramingError),
    #[error("unsupported data format: {0:?}")]
    UnsupportedFormat(DataFormat),
}

/// Encode an outbound `Call` into wire bytes for `format`.
pub fn encode_call(format: DataFormat, call: &Call) -> Result<Vec<u8>, CodecError> {
    match format {
        DataFormat::Json => Ok(serde_json::to_vec(call)?),
        DataFormat::Protobuf => Err(CodecError::UnsupportedFormat(format)),
    }
}

/// Decode a single already-framed event's bytes (the RecordIO wrapper has
/// already been stripped by the caller) into an [`Event`].
pub fn decode_event(format: DataFormat, bytes: &[u8]) -> Result<Event, CodecError> {
    match format {
        DataFormat::Json => Ok(serde_json::from_slice(bytes)?),
        DataFormat::Protobuf => Err(CodecError::UnsupportedFormat(format)),
    }
}
