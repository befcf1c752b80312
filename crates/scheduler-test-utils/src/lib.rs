//! Scriptable mock adapter and recording scheduler for testing
//! `mesos-scheduler-client` sessions without a real Mesos master.

pub mod mock_adapter;
pub mod recording_scheduler;

pub use mock_adapter::{frame, After, MockStreamAdapter, MockStreamServer, ScriptedResponse};
pub use recording_scheduler::{Invocation, RecordingScheduler};

#[cfg(test)]
mod tests {
    use super::*;
    use mesos_scheduler_client::{HttpStreamAdapter, PostRequest};
    use bytes::Bytes;
    use std::collections::HashMap;

    #[tokio::test]
    async fn mock_server_delivers_scripted_redirect() {
        let server = MockStreamServer::new();
        server.queue(ScriptedResponse::redirect("new-leader:5050")).await;

        let adapter = server.adapter();
        let handle = adapter
            .async_post(PostRequest {
                url: "http://old-leader:5050/api/v1/scheduler".to_owned(),
                headers: vec![],
                body: Bytes::new(),
                options: HashMap::new(),
            })
            .await
            .unwrap();

        adapter.pull_next(handle).await;
        let status = adapter.recv().await;
        assert!(matches!(
            status,
            mesos_scheduler_client::AdapterMessage::Response {
                fragment: mesos_scheduler_client::Fragment::Status { code: 307, .. },
                ..
            }
        ));

        adapter.pull_next(handle).await;
        let headers = adapter.recv().await;
        match headers {
            mesos_scheduler_client::AdapterMessage::Response {
                fragment: mesos_scheduler_client::Fragment::Headers(h),
                ..
            } => {
                assert_eq!(h, vec![("Location".to_owned(), "new-leader:5050".to_owned())]);
            }
            other => panic!("expected Headers, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn mock_server_hang_waits_for_injection() {
        let server = MockStreamServer::new();
        server
            .queue(ScriptedResponse::subscribed(frame(
                r#"{"type":"SUBSCRIBED","subscribe":{"framework_id":{"value":"f-1"},"heartbeat_interval_seconds":1.0}}"#,
            )))
            .await;

        let adapter = server.adapter();
        let handle = adapter
            .async_post(PostRequest {
                url: "http://leader:5050/api/v1/scheduler".to_owned(),
                headers: vec![],
                body: Bytes::new(),
                options: HashMap::new(),
            })
            .await
            .unwrap();

        adapter.pull_next(handle).await; // status
        let _ = adapter.recv().await;
        adapter.pull_next(handle).await; // headers
        let _ = adapter.recv().await;
        adapter.pull_next(handle).await; // the SUBSCRIBED body chunk
        let _ = adapter.recv().await;

        // Stream is now scripted to hang; a pull should produce nothing
        // until the test injects a heartbeat.
        adapter.pull_next(handle).await;
        server
            .inject(handle, mesos_scheduler_client::Fragment::BodyChunk(frame(r#"{"type":"HEARTBEAT"}"#)))
            .await;
        let injected = adapter.recv().await;
        assert!(matches!(
            injected,
            mesos_scheduler_client::AdapterMessage::Response {
                fragment: mesos_scheduler_client::Fragment::BodyChunk(_),
                ..
            }
        ));
    }
}
