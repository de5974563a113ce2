use super::TaxpayerStatusCheck;
use crate::models::{JobKey, Schedule, StatusCode, UploadAction};
use crate::StatusPoller;
use mockito::Matcher;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use taxpayer_api::{ApiError, ClientBuilder, DOC_PATH};

const GSTIN: &str = "24AAUPV7468F1ZW";

fn status_path() -> String {
    format!("/api/method/{}.check_action_status", DOC_PATH)
}

fn check_for(server: &mockito::ServerGuard) -> TaxpayerStatusCheck {
    let api_client = ClientBuilder::new(server.url())
        .with_max_retries(0)
        .build()
        .expect("client build should succeed");
    TaxpayerStatusCheck::new(api_client)
}

#[tokio::test]
async fn polls_remote_status_until_processed() {
    // The server answers "IP" twice and "P" afterwards.
    let mut server = mockito::Server::new_async().await;
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    let status_mock = server
        .mock("POST", status_path().as_str())
        .match_body(Matcher::PartialJson(json!({"action": "save"})))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body_from_request(move |_| {
            let code = if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                "IP"
            } else {
                "P"
            };
            json!({"message": {"status_cd": code}}).to_string().into()
        })
        .expect(3)
        .create_async()
        .await;

    let mut check = check_for(&server);
    let poller = StatusPoller::new(Schedule::from_millis(&[10, 10, 10]).unwrap());
    let status = poller
        .poll(&JobKey::upload(GSTIN, UploadAction::Save), &mut check)
        .await
        .expect("poll should succeed");

    assert_eq!(status.code, StatusCode::Completed);
    assert_eq!(hits.load(Ordering::SeqCst), 3);
    status_mock.assert_async().await;
}

#[tokio::test]
async fn empty_message_becomes_unknown() {
    let mut server = mockito::Server::new_async().await;
    let status_mock = server
        .mock("POST", status_path().as_str())
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body("{}")
        .expect(1)
        .create_async()
        .await;

    let mut check = check_for(&server);
    let status = StatusPoller::new(Schedule::from_millis(&[10]).unwrap())
        .with_immediate(true)
        .poll(&JobKey::upload(GSTIN, UploadAction::Reset), &mut check)
        .await
        .unwrap();

    assert_eq!(status.code, StatusCode::Unknown);
    status_mock.assert_async().await;
}

#[tokio::test]
async fn server_error_aborts_polling() {
    let mut server = mockito::Server::new_async().await;
    let status_mock = server
        .mock("POST", status_path().as_str())
        .with_status(502)
        .with_body("Bad Gateway")
        .expect(1)
        .create_async()
        .await;

    let mut check = check_for(&server);
    let err = StatusPoller::new(Schedule::from_millis(&[10, 10]).unwrap())
        .with_immediate(true)
        .poll(&JobKey::upload(GSTIN, UploadAction::Save), &mut check)
        .await
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<ApiError>(),
        Some(ApiError::Http { status, .. }) if status.as_u16() == 502
    ));
    status_mock.assert_async().await;
}

#[tokio::test]
async fn unknown_action_is_rejected_before_any_request() {
    let server = mockito::Server::new_async().await;
    let mut check = check_for(&server);

    let err = StatusPoller::new(Schedule::from_millis(&[10]).unwrap())
        .with_immediate(true)
        .poll(&JobKey::new(GSTIN, "download"), &mut check)
        .await
        .unwrap_err();

    assert!(err.to_string().contains("download"));
}
