//! Options validator (spec.md §4.1).
//!
//! Validators run in a fixed order so the first offending option is the one
//! reported, matching spec.md's "rejects malformed values with a structured
//! error naming the first offending option."

use std::collections::HashMap;
use std::fmt;

use scheduler_proto::DataFormat;

/// One value in the flat configuration mapping handed to [`crate::start`].
///
/// Mirrors the loosely-typed mapping spec.md describes ("a flat mapping of
/// configuration options"); [`SchedulerOptions::validate`] narrows each
/// entry into its typed field.
#[derive(Debug, Clone, PartialEq)]
pub enum OptionValue {
    Str(String),
    Int(i64),
    Bool(bool),
    List(Vec<OptionValue>),
}

impl OptionValue {
    fn as_str(&self) -> Option<&str> {
        match self {
            OptionValue::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    fn as_non_negative_i64(&self) -> Option<i64> {
        match self {
            OptionValue::Int(n) if *n >= 0 => Some(*n),
            _ => None,
        }
    }
}

/// `max_num_resubscribe`: a bounded count, or unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResubscribeLimit {
    Bounded(u64),
    Infinite,
}

impl ResubscribeLimit {
    pub fn is_exceeded_by(self, attempts: u64) -> bool {
        match self {
            ResubscribeLimit::Bounded(max) => attempts >= max,
            ResubscribeLimit::Infinite => false,
        }
    }
}

/// Validated, immutable session configuration (spec.md §3 "Configuration").
#[derive(Debug, Clone)]
pub struct SchedulerOptions {
    pub master_hosts: Vec<String>,
    pub subscribe_req_options: HashMap<String, OptionValue>,
    pub heartbeat_timeout_window_ms: u64,
    pub max_num_resubscribe: ResubscribeLimit,
    pub resubscribe_interval_ms: u64,
    pub data_format: DataFormat,
}

/// `{bad_<option>, offending_value}` per spec.md §4.1, plus the
/// whole-mapping `bad_options` wrapper spec.md §6 surfaces from `start`.
#[derive(Debug, Clone, PartialEq)]
pub enum OptionsError {
    BadMasterHosts(String),
    BadSubscribeReqOptions(String),
    BadHeartbeatTimeoutWindow(String),
    BadMaxNumResubscribe(String),
    BadResubscribeInterval(String),
}

impl fmt::Display for OptionsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionsError::BadMasterHosts(v) => write!(f, "bad_master_hosts: {v}"),
            OptionsError::BadSubscribeReqOptions(v) => write!(f, "bad_subscribe_req_options: {v}"),
            OptionsError::BadHeartbeatTimeoutWindow(v) => {
                write!(f, "bad_heartbeat_timeout_window: {v}")
            }
            OptionsError::BadMaxNumResubscribe(v) => write!(f, "bad_max_num_resubscribe: {v}"),
            OptionsError::BadResubscribeInterval(v) => write!(f, "bad_resubscribe_interval: {v}"),
        }
    }
}

impl std::error::Error for OptionsError {}

const DEFAULT_MASTER_HOSTS: &str = "localhost:5050";
const DEFAULT_HEARTBEAT_TIMEOUT_WINDOW_MS: u64 = 5000;
const DEFAULT_MAX_NUM_RESUBSCRIBE: u64 = 1;
const DEFAULT_RESUBSCRIBE_INTERVAL_MS: u64 = 0;

impl SchedulerOptions {
    /// Validate a raw option mapping, running validators in the fixed
    /// order: `master_hosts, subscribe_req_options,
    /// heartbeat_timeout_window, max_num_resubscribe, resubscribe_interval`.
    pub fn validate(raw: &HashMap<String, OptionValue>) -> Result<Self, OptionsError> {
        let master_hosts = validate_master_hosts(raw.get("master_hosts"))?;
        let subscribe_req_options = validate_subscribe_req_options(raw.get("subscribe_req_options"))?;
        let heartbeat_timeout_window_ms =
            validate_heartbeat_timeout_window(raw.get("heartbeat_timeout_window"))?;
        let max_num_resubscribe = validate_max_num_resubscribe(raw.get("max_num_resubscribe"))?;
        let resubscribe_interval_ms = validate_resubscribe_interval(raw.get("resubscribe_interval"))?;

        Ok(SchedulerOptions {
            master_hosts,
            subscribe_req_options,
            heartbeat_timeout_window_ms,
            max_num_resubscribe,
            resubscribe_interval_ms,
            // Fixed in this design; the codec/adapter surface stays
            // format-parameterized (see scheduler-proto::DataFormat).
            data_format: DataFormat::Json,
        })
    }
}

fn validate_master_hosts(value: Option<&OptionValue>) -> Result<Vec<String>, OptionsError> {
    let Some(value) = value else {
        return Ok(vec![DEFAULT_MASTER_HOSTS.to_owned()]);
    };
    let OptionValue::List(items) = value else {
        return Err(OptionsError::BadMasterHosts(format!("{value:?}")));
    };
    if items.is_empty() {
        return Err(OptionsError::BadMasterHosts("[]".to_owned()));
    }
    items
        .iter()
        .map(|item| {
            item.as_str()
                .map(str::to_owned)
                .ok_or_else(|| OptionsError::BadMasterHosts(format!("{item:?}")))
        })
        .collect()
}

fn validate_subscribe_req_options(
    value: Option<&OptionValue>,
) -> Result<HashMap<String, OptionValue>, OptionsError> {
    match value {
        None => Ok(HashMap::new()),
        Some(OptionValue::List(items)) if items.is_empty() => Ok(HashMap::new()),
        // The opaque mapping is passed through verbatim; this design only
        // rejects it outright when it's a shape that obviously isn't a
        // mapping (a bare scalar).
        Some(OptionValue::Str(_) | OptionValue::Int(_) | OptionValue::Bool(_)) => {
            Err(OptionsError::BadSubscribeReqOptions("expected a mapping".to_owned()))
        }
        Some(OptionValue::List(_)) => Ok(HashMap::new()),
    }
}

fn validate_heartbeat_timeout_window(value: Option<&OptionValue>) -> Result<u64, OptionsError> {
    match value {
        None => Ok(DEFAULT_HEARTBEAT_TIMEOUT_WINDOW_MS),
        Some(v) => v
            .as_non_negative_i64()
            .map(|n| n as u64)
            .ok_or_else(|| OptionsError::BadHeartbeatTimeoutWindow(format!("{v:?}"))),
    }
}

fn validate_max_num_resubscribe(value: Option<&OptionValue>) -> Result<ResubscribeLimit, OptionsError> {
    match value {
        None => Ok(ResubscribeLimit::Bounded(DEFAULT_MAX_NUM_RESUBSCRIBE)),
        Some(OptionValue::Str(s)) if s == "infinite" => Ok(ResubscribeLimit::Infinite),
        Some(v) => v
            .as_non_negative_i64()
            .map(|n| ResubscribeLimit::Bounded(n as u64))
            .ok_or_else(|| OptionsError::BadMaxNumResubscribe(format!("{v:?}"))),
    }
}

fn validate_resubscribe_interval(value: Option<&OptionValue>) -> Result<u64, OptionsError> {
    match value {
        None => Ok(DEFAULT_RESUBSCRIBE_INTERVAL_MS),
        Some(v) => v
            .as_non_negative_i64()
            .map(|n| n as u64)
            .ok_or_else(|| OptionsError::BadResubscribeInterval(format!("{v:?}"))),
    }
}
