//! Event parser (spec.md §4.4).

use scheduler_proto::{Event, FrameworkId};

/// A classified event, as handed to the session core by [`classify`].
#[derive(Debug, Clone)]
pub enum SchedulerEvent {
    Subscribed {
        framework_id: FrameworkId,
        heartbeat_interval_ms: u64,
    },
    Heartbeat,
    Error {
        message: String,
    },
    /// Offers, rescind, update, message, failure, or any event type this
    /// design doesn't recognize — forwarded verbatim (spec.md §9).
    Other(Event),
}

/// Classify a decoded event. A positive `heartbeat_interval_ms` is
/// guaranteed whenever `Subscribed` is returned (spec.md §4.4: "a positive
/// integer heartbeat interval"); a non-positive wire value is treated as a
/// malformed event and folds into `Other` so the caller can decide how to
/// handle it, rather than panicking on a master-supplied value of zero.
pub fn classify(event: Event) -> SchedulerEvent {
    match event.event_type.as_str() {
        "SUBSCRIBED" => {
            if let Some(subscribed) = &event.subscribe {
                let interval_ms = (subscribed.heartbeat_interval_seconds * 1000.0).round();
                if interval_ms > 0.0 {
                    return SchedulerEvent::Subscribed {
                        framework_id: subscribed.framework_id.clone(),
                        heartbeat_interval_ms: interval_ms as u64,
                    };
                }
            }
            SchedulerEvent::Other(event)
        }
        "HEARTBEAT" => SchedulerEvent::Heartbeat,
        "ERROR" => match &event.error {
            Some(err) => SchedulerEvent::Error {
                message: err.message.clone(),
            },
            None => SchedulerEvent::Other(event),
        },
        _ => SchedulerEvent::Other(event),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scheduler_proto::{DataFormat, decode_event};

    #[test]
    fn classifies_subscribed_and_converts_seconds_to_ms() {
        let raw = r#"{"type":"SUBSCRIBED","subscribe":{"framework_id":{"value":"f-1"},"heartbeat_interval_seconds":15.0}}"#;
        let event = decode_event(DataFormat::Json, raw.as_bytes()).unwrap();
        match classify(event) {
            SchedulerEvent::Subscribed { framework_id, heartbeat_interval_ms } => {
                assert_eq!(framework_id.value, "f-1");
                assert_eq!(heartbeat_interval_ms, 15_000);
            }
            other => panic!("expected Subscribed, got {other:?}"),
        }
    }

    #[test]
    fn classifies_heartbeat() {
        let raw = r#"{"type":"HEARTBEAT"}"#;
        let event = decode_event(DataFormat::Json, raw.as_bytes()).unwrap();
        assert!(matches!(classify(event), SchedulerEvent::Heartbeat));
    }

    #[test]
    fn classifies_error_with_message() {
        let raw = r#"{"type":"ERROR","error":{"message":"framework removed"}}"#;
        let event = decode_event(DataFormat::Json, raw.as_bytes()).unwrap();
        match classify(event) {
            SchedulerEvent::Error { message } => assert_eq!(message, "framework removed"),
            other => panic!("expected Error, got {other:?}"),
        }
    }

    #[test]
    fn unknown_event_types_fall_through_to_other() {
        let raw = r#"{"type":"OFFERS","offers":{"offers":[]}}"#;
        let event = decode_event(DataFormat::Json, raw.as_bytes()).unwrap();
        assert!(matches!(classify(event), SchedulerEvent::Other(_)));
    }
}
