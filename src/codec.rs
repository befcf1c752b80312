//! Codec adapter (spec.md §4.3): encode outbound calls, decode inbound body
//! chunks into whole events via RecordIO de-framing.

use scheduler_proto::{recordio, Call, CodecError, DataFormat, Event};

/// Encode a `SUBSCRIBE` (or re-subscribe) call for the wire.
pub fn encode(format: DataFormat, call: &Call) -> Result<Vec<u8>, CodecError> {
    scheduler_proto::encode_call(format, call)
}

/// Strip RecordIO framing from a body chunk and decode each whole record
/// into an [`Event`]. Partial records are retained in `decoder` across
/// calls (spec.md §6: "the codec adapter is responsible for stripping the
/// framing").
pub fn decode_events(
    format: DataFormat,
    decoder: &mut recordio::Decoder,
    chunk: &[u8],
) -> Result<Vec<Event>, CodecError> {
    decoder
        .push(chunk)?
        .into_iter()
        .map(|record| scheduler_proto::decode_event(format, &record))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use scheduler_proto::FrameworkInfo;

    fn info() -> FrameworkInfo {
        FrameworkInfo {
            user: "root".into(),
            name: "test".into(),
            id: None,
            role: None,
            hostname: None,
            webui_url: None,
            principal: None,
            failover_timeout: None,
            capabilities: vec![],
        }
    }

    #[test]
    fn decode_events_handles_multiple_records_split_across_chunks() {
        let mut decoder = recordio::Decoder::new();
        let first = br#"{"type":"HEARTBEAT"}"#;
        let framed = format!("{}\n{}", first.len(), std::str::from_utf8(first).unwrap());
        let (head, tail) = framed.split_at(10);

        let events_a = decode_events(DataFormat::Json, &mut decoder, head.as_bytes()).unwrap();
        assert!(events_a.is_empty());

        let events_b = decode_events(DataFormat::Json, &mut decoder, tail.as_bytes()).unwrap();
        assert_eq!(events_b.len(), 1);
        assert_eq!(events_b[0].event_type, "HEARTBEAT");
    }

    #[test]
    fn encode_subscribe_round_trips_through_decode_call_shape() {
        let call = Call::subscribe(info(), true);
        let bytes = encode(DataFormat::Json, &call).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["type"], "SUBSCRIBE");
        assert_eq!(value["subscribe"]["force"], true);
    }
}
