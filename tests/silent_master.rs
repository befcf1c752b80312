//! A master that stops sending heartbeats (or anything else) is detected
//! by the liveness watchdog and the session tears itself down once
//! resubscribe attempts are exhausted.

use std::collections::HashMap;
use std::time::Duration;

use mesos_scheduler_client::{start, FrameworkInfo, OptionValue, ShutdownReason, SubscribeExhaustedDetail};
use scheduler_test_utils::{frame, MockStreamServer, RecordingScheduler, ScriptedResponse};

fn framework_info() -> FrameworkInfo {
    FrameworkInfo {
        user: "root".into(),
        name: "silent-master-test".into(),
        id: None,
        role: None,
        hostname: None,
        webui_url: None,
        principal: None,
        failover_timeout: None,
        capabilities: vec![],
    }
}

#[tokio::test(start_paused = true)]
async fn heartbeat_watchdog_tears_down_after_the_master_goes_silent() {
    let server = MockStreamServer::new();
    server
        .queue(ScriptedResponse::subscribed(frame(
            r#"{"type":"SUBSCRIBED","subscribe":{"framework_id":{"value":"f-1"},"heartbeat_interval_seconds":0.01}}"#,
        )))
        .await;

    let scheduler = RecordingScheduler::with_framework_info(framework_info(), true);
    let mut raw = HashMap::new();
    raw.insert(
        "master_hosts".to_owned(),
        OptionValue::List(vec![OptionValue::Str("leader:5050".to_owned())]),
    );
    raw.insert("heartbeat_timeout_window".to_owned(), OptionValue::Int(10));
    raw.insert("max_num_resubscribe".to_owned(), OptionValue::Int(0));

    let handle = start(server.adapter(), scheduler, raw, 0)
        .await
        .expect("start should succeed");

    while server.requests().await.is_empty() {
        tokio::task::yield_now().await;
    }
    // Let the session walk status -> headers -> SUBSCRIBED body chunk and
    // arm the heartbeat watchdog before time moves.
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }

    // heartbeat_interval (10ms) + heartbeat_timeout_window (10ms) = 20ms;
    // no heartbeat or further data ever arrives.
    tokio::time::advance(Duration::from_millis(25)).await;

    let (_state, reason) = handle.join().await.expect("session task should not panic");
    assert_eq!(
        reason,
        ShutdownReason::SubscribeExhausted { detail: SubscribeExhaustedDetail::MaxAttemptsExceeded }
    );
}
