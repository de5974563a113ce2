use super::{
    check_pending_uploads, check_upload_pair, resync_failed_upload, upload_and_check,
    watch_downloads, watch_upload_requests, DownloadNotice, UploadOutcome, UploadReport,
};
use crate::events::{
    EventBus, IMS_DOWNLOAD_COMPLETED, IMS_DOWNLOAD_QUEUED, UPLOAD_DATA_AND_CHECK_STATUS,
};
use crate::models::{JobStatus, Schedule, StatusCode};
use crate::taxpayer::{MockResponse, MockStatusCheck};
use crate::StatusPoller;
use assert_json_diff::assert_json_eq;
use mockito::Matcher;
use serde_json::json;
use std::time::Duration;
use taxpayer_api::{ClientBuilder, DOC_PATH};
use tokio::time::Instant;

const GSTIN: &str = "24AAUPV7468F1ZW";

fn status(code: Option<&str>) -> JobStatus {
    let record = match code {
        Some(code) => json!({ "status_cd": code }),
        None => json!({}),
    };
    JobStatus::from_record(record.as_object().cloned().unwrap())
}

fn method_path(method: &str) -> String {
    format!("/api/method/{}.{}", DOC_PATH, method)
}

#[test]
fn classifies_save_reset_pairs() {
    use UploadOutcome::*;
    let cases = [
        (Some("P"), Some("P"), Uploaded),
        (Some("P"), Some("ER"), Failed),
        (Some("PE"), Some("P"), Failed),
        (Some("IP"), Some("ER"), Failed),
        (None, Some("P"), Failed),
        (Some("IP"), Some("P"), StillProcessing),
        (Some("P"), Some("IP"), StillProcessing),
        (Some("IP"), Some("IP"), StillProcessing),
    ];
    for (save, reset, expected) in cases {
        assert_eq!(
            UploadOutcome::classify(&status(save), &status(reset)),
            expected,
            "save={save:?} reset={reset:?}"
        );
    }
}

#[tokio::test(start_paused = true)]
async fn pair_is_polled_concurrently() {
    let mut save = MockStatusCheck::new([
        MockResponse::code("IP"),
        MockResponse::code("IP"),
        MockResponse::code("P"),
    ]);
    let mut reset = MockStatusCheck::new([MockResponse::code("IP"), MockResponse::code("P")]);
    let poller = StatusPoller::new(Schedule::from_millis(&[100, 200, 400]).unwrap());
    let start = Instant::now();

    let report = check_upload_pair(&mut save, &mut reset, GSTIN, &poller)
        .await
        .unwrap();

    assert_eq!(report.outcome, UploadOutcome::Uploaded);
    assert_eq!(report.company_gstin, GSTIN);
    assert_eq!(save.calls()[0].0.action, "save");
    assert_eq!(reset.calls()[0].0.action, "reset");
    // save needs 100 + 200 + 400, reset only 100 + 200.
    assert_eq!(start.elapsed(), Duration::from_millis(700));
}

#[test]
fn report_serializes_for_the_runner() {
    let report = UploadReport {
        company_gstin: GSTIN.to_string(),
        outcome: UploadOutcome::StillProcessing,
        save: status(Some("P")),
        reset: status(Some("IP")),
    };
    assert_json_eq!(
        serde_json::to_value(&report).unwrap(),
        json!({
            "company_gstin": GSTIN,
            "outcome": "StillProcessing",
            "save": {"code": "Completed", "raw_payload": {"status_cd": "P"}},
            "reset": {"code": "InProgress", "raw_payload": {"status_cd": "IP"}},
        })
    );
}

#[tokio::test(start_paused = true)]
async fn exhausted_pair_is_still_processing() {
    let mut save = MockStatusCheck::repeating(MockResponse::code("IP"));
    let mut reset = MockStatusCheck::repeating(MockResponse::code("P"));
    let poller = StatusPoller::new(Schedule::from_millis(&[100]).unwrap());

    let report = check_upload_pair(&mut save, &mut reset, GSTIN, &poller)
        .await
        .unwrap();

    assert_eq!(report.outcome, UploadOutcome::StillProcessing);
    assert_eq!(report.save.code, StatusCode::InProgress);
    assert_eq!(save.call_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn error_in_one_session_fails_the_pair() {
    let mut save = MockStatusCheck::repeating(MockResponse::code("P"));
    let mut reset = MockStatusCheck::repeating(MockResponse::error("timed out"));
    let poller = StatusPoller::new(Schedule::from_millis(&[100]).unwrap());

    let err = check_upload_pair(&mut save, &mut reset, GSTIN, &poller)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("timed out"));
}

#[tokio::test]
async fn upload_triggers_both_actions_then_polls() {
    let mut server = mockito::Server::new_async().await;
    let save_mock = server
        .mock("POST", method_path("save_invoices").as_str())
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body("{}")
        .expect(1)
        .create_async()
        .await;
    let reset_mock = server
        .mock("POST", method_path("reset_invoices").as_str())
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body("{}")
        .expect(1)
        .create_async()
        .await;
    let save_status = server
        .mock("POST", method_path("check_action_status").as_str())
        .match_body(Matcher::PartialJson(json!({"action": "save"})))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({"message": {"status_cd": "P"}}).to_string())
        .expect(2)
        .create_async()
        .await;
    let reset_status = server
        .mock("POST", method_path("check_action_status").as_str())
        .match_body(Matcher::PartialJson(json!({"action": "reset"})))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({"message": {"status_cd": "PE", "error_report": {"b2b": []}}}).to_string(),
        )
        .expect(2)
        .create_async()
        .await;

    let client = ClientBuilder::new(server.url())
        .with_max_retries(0)
        .build()
        .unwrap();
    let poller = StatusPoller::new(Schedule::from_millis(&[10]).unwrap());

    let report = upload_and_check(&client, GSTIN, &poller).await.unwrap();
    assert_eq!(report.outcome, UploadOutcome::Failed);
    assert_eq!(report.reset.code, StatusCode::PartiallyErrored);
    assert!(report.reset.raw_payload.contains_key("error_report"));

    let pending = check_pending_uploads(&client, GSTIN, &poller).await.unwrap();
    assert_eq!(pending.outcome, UploadOutcome::Failed);

    save_mock.assert_async().await;
    reset_mock.assert_async().await;
    save_status.assert_async().await;
    reset_status.assert_async().await;
}

#[tokio::test]
async fn upload_event_runs_upload_and_reports() {
    let mut server = mockito::Server::new_async().await;
    let _triggers = server
        .mock("POST", Matcher::Regex(r"\.(save|reset)_invoices$".to_string()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body("{}")
        .expect(2)
        .create_async()
        .await;
    let _status = server
        .mock("POST", method_path("check_action_status").as_str())
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({"message": {"status_cd": "P"}}).to_string())
        .create_async()
        .await;

    let client = ClientBuilder::new(server.url())
        .with_max_retries(0)
        .build()
        .unwrap();
    let poller = StatusPoller::new(Schedule::from_millis(&[10]).unwrap()).with_immediate(true);
    let bus = EventBus::new();

    let (subscription, mut reports) =
        watch_upload_requests(&bus, client, GSTIN.to_string(), poller).unwrap();
    assert_eq!(bus.publish(UPLOAD_DATA_AND_CHECK_STATUS, &json!({})), 1);

    let report = reports.recv().await.unwrap().unwrap();
    assert_eq!(report.outcome, UploadOutcome::Uploaded);

    drop(subscription);
    assert_eq!(bus.publish(UPLOAD_DATA_AND_CHECK_STATUS, &json!({})), 0);
}

#[tokio::test]
async fn failed_upload_requests_resync_once() {
    let mut server = mockito::Server::new_async().await;
    let sync_mock = server
        .mock("POST", method_path("sync_with_gstn_and_reupload").as_str())
        .match_body(Matcher::Json(json!({ "company_gstin": GSTIN })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body("{}")
        .expect(1)
        .create_async()
        .await;
    let client = ClientBuilder::new(server.url())
        .with_max_retries(0)
        .build()
        .unwrap();

    let failed = UploadReport {
        company_gstin: GSTIN.to_string(),
        outcome: UploadOutcome::Failed,
        save: status(Some("P")),
        reset: status(Some("ER")),
    };
    assert!(resync_failed_upload(&client, &failed).await.unwrap());

    for (outcome, reset) in [
        (UploadOutcome::Uploaded, "P"),
        (UploadOutcome::StillProcessing, "IP"),
    ] {
        let report = UploadReport {
            company_gstin: GSTIN.to_string(),
            outcome,
            save: status(Some("P")),
            reset: status(Some(reset)),
        };
        assert!(!resync_failed_upload(&client, &report).await.unwrap());
    }

    sync_mock.assert_async().await;
}

#[tokio::test]
async fn download_events_become_notices() {
    let bus = EventBus::new();
    let (subscriptions, mut notices) = watch_downloads(&bus);

    bus.publish(
        IMS_DOWNLOAD_QUEUED,
        &json!({"message": "Some categories are queued for download"}),
    );
    bus.publish(
        IMS_DOWNLOAD_COMPLETED,
        &json!({"message": "Downloaded Invoices successfully"}),
    );

    assert_eq!(
        notices.recv().await,
        Some(DownloadNotice::Queued(
            "Some categories are queued for download".to_string()
        ))
    );
    assert_eq!(
        notices.recv().await,
        Some(DownloadNotice::Completed(
            "Downloaded Invoices successfully".to_string()
        ))
    );

    drop(subscriptions);
    assert_eq!(bus.subscriber_count(IMS_DOWNLOAD_QUEUED), 0);
    assert_eq!(notices.recv().await, None);
}
