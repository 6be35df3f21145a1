use std::time::Duration;

use mockito::{Matcher, Server};

use cy_core::{RunContext, RunStore, StoreSnapshot, FILES_KEY};
use cy_upload::{
    ContentRegistrar, HttpRegistrationApi, HttpUploadTransport, QuotaPlanner, SessionOutcome,
    UploadConfig,
};

const MIB: u64 = 1024 * 1024;

fn test_config(server: &Server) -> UploadConfig {
    UploadConfig::default()
        .with_payload(4096, 16)
        .with_chunk_size(1024)
        .with_throttle(Duration::ZERO)
        .with_registration_endpoint(format!("{}/register", server.url()))
}

fn build_planner(config: UploadConfig) -> QuotaPlanner {
    let api = HttpRegistrationApi::new(&config)
        .unwrap()
        .with_header("Authorization", "Basic dGVzdA==")
        .unwrap();
    let transport = HttpUploadTransport::new(&config).unwrap();
    QuotaPlanner::new(ContentRegistrar::new(api), transport, config).unwrap()
}

/// Registration redirects, the payload is streamed, ids land in the store
#[tokio::test]
async fn test_redirected_sessions_stream_and_record() {
    let mut server = Server::new_async().await;
    let redirect = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><result resultCode="0"><pcUploadFileRsp><uploadResult><uploadTaskID>task-1</uploadTaskID><redirectionUrl>{}/upload?a=1&amp;b=2</redirectionUrl><newContentIDList length="1"><newContent><contentID>reg-1</contentID></newContent></newContentIDList></uploadResult></pcUploadFileRsp></result>"#,
        server.url()
    );

    let register = server
        .mock("POST", "/register")
        .match_header("authorization", "Basic dGVzdA==")
        .with_status(200)
        .with_body(redirect)
        .expect(2)
        .create_async()
        .await;

    let upload = server
        .mock("POST", "/upload")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("a".to_string(), "1".to_string()),
            Matcher::UrlEncoded("b".to_string(), "2".to_string()),
        ]))
        .match_header("uploadtaskid", "task-1-")
        .match_header("contentsize", "4112")
        .match_header("range", "bytes=0-4111")
        .with_status(200)
        .with_body("<result><contentID>up-1</contentID></result>")
        .expect(2)
        .create_async()
        .await;

    let planner = build_planner(test_config(&server));
    let ctx = RunContext::new("13800000000");

    // 1025 - 625 = 400 units, two sessions
    let report = planner.run(&ctx, 625 * MIB).await.unwrap();

    assert_eq!(report.sessions.len(), 2);
    assert_eq!(report.succeeded(), 2);
    assert!(report
        .sessions
        .iter()
        .all(|s| matches!(s.outcome, SessionOutcome::Transferred { .. })));
    assert_eq!(report.sessions[0].fingerprint, report.sessions[1].fingerprint);

    register.assert_async().await;
    upload.assert_async().await;

    let json = ctx.store.snapshot().to_json().unwrap();
    assert_eq!(json, r#"{"files":["up-1","up-1"]}"#);
}

/// Refusals fail every session without aborting the run
#[tokio::test]
async fn test_refused_registrations_leave_store_untouched() {
    let mut server = Server::new_async().await;

    let register = server
        .mock("POST", "/register")
        .with_status(200)
        .with_body(r#"<result resultCode="200000401"><desc>token invalid</desc></result>"#)
        .expect(3)
        .create_async()
        .await;

    let upload = server
        .mock("POST", "/upload")
        .expect(0)
        .create_async()
        .await;

    let planner = build_planner(test_config(&server));
    let ctx = RunContext::new("13800000000");

    let report = planner.run(&ctx, 425 * MIB).await.unwrap();

    assert_eq!(report.sessions.len(), 3);
    assert_eq!(report.failed(), 3);
    assert!(report.plan.carried().is_none());
    assert_eq!(ctx.store.len_of(FILES_KEY), 0);

    register.assert_async().await;
    upload.assert_async().await;
}

/// A store persisted by an earlier run keeps growing
#[tokio::test]
async fn test_restored_store_is_appended_to() {
    let mut server = Server::new_async().await;
    let _register = server
        .mock("POST", "/register")
        .with_status(200)
        .with_body(r#"<result resultCode="0"><contentID>new-1</contentID></result>"#)
        .create_async()
        .await;

    let snapshot = StoreSnapshot::from_json(r#"{"files":["old-1"]}"#).unwrap();
    let ctx = RunContext::new("13800000000").with_store(RunStore::from_snapshot(snapshot));

    let planner = build_planner(test_config(&server));
    let id = planner.upload_placeholder(&ctx).await.unwrap();

    assert_eq!(id.as_str(), "new-1");
    assert_eq!(ctx.store.list(FILES_KEY), vec!["old-1", "new-1"]);
}
