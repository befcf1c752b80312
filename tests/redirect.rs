//! A `307` response is followed transparently to the `Location` host, and
//! the session ends up subscribed there.

use std::collections::HashMap;

use mesos_scheduler_client::{start, FrameworkInfo, OptionValue};
use scheduler_test_utils::{frame, MockStreamServer, RecordingScheduler, ScriptedResponse};

fn framework_info() -> FrameworkInfo {
    FrameworkInfo {
        user: "root".into(),
        name: "redirect-test".into(),
        id: None,
        role: None,
        hostname: None,
        webui_url: None,
        principal: None,
        failover_timeout: None,
        capabilities: vec![],
    }
}

#[tokio::test]
async fn follows_redirect_to_the_new_leader() {
    let server = MockStreamServer::new();
    server.queue(ScriptedResponse::redirect("new-leader:5050")).await;
    server
        .queue(ScriptedResponse::subscribed(frame(
            r#"{"type":"SUBSCRIBED","subscribe":{"framework_id":{"value":"f-1"},"heartbeat_interval_seconds":15.0}}"#,
        )))
        .await;

    let scheduler = RecordingScheduler::with_framework_info(framework_info(), true);
    let mut raw = HashMap::new();
    raw.insert(
        "master_hosts".to_owned(),
        OptionValue::List(vec![OptionValue::Str("old-leader:5050".to_owned())]),
    );

    let handle = start(server.adapter(), scheduler, raw, 0)
        .await
        .expect("start should succeed");

    while server.requests().await.len() < 2 {
        tokio::task::yield_now().await;
    }
    let requests = server.requests().await;
    assert_eq!(requests[0].url, "http://old-leader:5050/api/v1/scheduler");
    assert_eq!(requests[1].url, "http://new-leader:5050/api/v1/scheduler");

    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
    handle.stop();
    let (state, _reason) = handle.join().await.expect("session task should not panic");
    assert_eq!(state, 1);
}
