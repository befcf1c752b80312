//! A single master accepts the initial subscribe and the session reports
//! `registered` with the assigned framework id.

use std::collections::HashMap;

use mesos_scheduler_client::{start, FrameworkInfo, OptionValue, ShutdownReason};
use scheduler_test_utils::{frame, MockStreamServer, RecordingScheduler, ScriptedResponse};

fn framework_info() -> FrameworkInfo {
    FrameworkInfo {
        user: "root".into(),
        name: "happy-path-test".into(),
        id: None,
        role: None,
        hostname: None,
        webui_url: None,
        principal: None,
        failover_timeout: None,
        capabilities: vec![],
    }
}

fn options(master_host: &str) -> HashMap<String, OptionValue> {
    let mut raw = HashMap::new();
    raw.insert(
        "master_hosts".to_owned(),
        OptionValue::List(vec![OptionValue::Str(master_host.to_owned())]),
    );
    raw
}

async fn wait_for_first_request(server: &MockStreamServer) {
    while server.requests().await.is_empty() {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn subscribes_and_reports_registered() {
    let server = MockStreamServer::new();
    server
        .queue(ScriptedResponse::subscribed(frame(
            r#"{"type":"SUBSCRIBED","subscribe":{"framework_id":{"value":"f-1"},"heartbeat_interval_seconds":15.0}}"#,
        )))
        .await;

    let scheduler = RecordingScheduler::with_framework_info(framework_info(), true);
    let handle = start(server.adapter(), scheduler, options("leader:5050"), 0)
        .await
        .expect("start should succeed with valid options");

    wait_for_first_request(&server).await;
    let requests = server.requests().await;
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].url, "http://leader:5050/api/v1/scheduler");

    // Give the session a chance to walk status -> headers -> body before
    // we ask it to stop.
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }

    handle.stop();
    let (state, reason) = handle.join().await.expect("session task should not panic");
    assert_eq!(state, 1, "registered should have incremented the counter state once");
    assert_eq!(reason, ShutdownReason::Requested);
}

#[tokio::test]
async fn bad_master_hosts_is_rejected_before_any_request() {
    let server = MockStreamServer::new();
    let scheduler = RecordingScheduler::with_framework_info(framework_info(), true);
    let mut raw = HashMap::new();
    raw.insert("master_hosts".to_owned(), OptionValue::List(vec![]));

    let err = start(server.adapter(), scheduler, raw, 0)
        .await
        .unwrap_err();
    assert!(matches!(err, mesos_scheduler_client::StartError::BadOptions(_)));
    assert!(server.requests().await.is_empty());
}
