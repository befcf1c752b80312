//! A redirect chain longer than `MAX_REDIRECT` (5) on a single master is
//! abandoned in favor of a fresh subscribe attempt rather than followed
//! forever (spec.md §3, §8 "num_redirect > 5 on a single master: fail over
//! to the next master rather than loop").

use std::collections::HashMap;

use mesos_scheduler_client::{start, FrameworkInfo, OptionValue};
use scheduler_test_utils::{frame, MockStreamServer, RecordingScheduler, ScriptedResponse};

fn framework_info() -> FrameworkInfo {
    FrameworkInfo {
        user: "root".into(),
        name: "redirect-loop-failover-test".into(),
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
async fn abandons_a_redirect_chain_past_the_limit_and_resubscribes() {
    let server = MockStreamServer::new();
    // Six redirects in a row exceed MAX_REDIRECT (5); the seventh scripted
    // response is what the failover attempt should land on.
    for _ in 0..6 {
        server.queue(ScriptedResponse::redirect("elsewhere:5050")).await;
    }
    server
        .queue(ScriptedResponse::subscribed(frame(
            r#"{"type":"SUBSCRIBED","subscribe":{"framework_id":{"value":"f-1"},"heartbeat_interval_seconds":15.0}}"#,
        )))
        .await;

    let scheduler = RecordingScheduler::with_framework_info(framework_info(), true);
    let mut raw = HashMap::new();
    raw.insert(
        "master_hosts".to_owned(),
        OptionValue::List(vec![OptionValue::Str("leader:5050".to_owned())]),
    );
    raw.insert("resubscribe_interval".to_owned(), OptionValue::Int(0));
    raw.insert("max_num_resubscribe".to_owned(), OptionValue::Int(1));

    let handle = start(server.adapter(), scheduler, raw, 0)
        .await
        .expect("start should succeed");

    while server.requests().await.len() < 7 {
        tokio::task::yield_now().await;
    }
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }

    handle.stop();
    let (state, _reason) = handle.join().await.expect("session task should not panic");
    assert_eq!(state, 1, "registered should fire once the redirect loop is abandoned");
    assert_eq!(server.requests().await.len(), 7);
}
