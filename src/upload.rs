//
// (C) Copyright IBM 2025, 2026
//
// This code is licensed under the Apache License, Version 2.0. You may
// obtain a copy of this license in the LICENSE.txt file in the root directory
// of this source tree or at http://www.apache.org/licenses/LICENSE-2.0.
//
// Any modifications or derivative works of this code must retain this
// copyright notice, and modified files need to carry a notice indicating
// that they have been altered from the originals.

//! Save/reset upload composition.
//!
//! An upload is made of two independent server jobs: "save" for invoices with
//! an action and "reset" for invoices reverted to "No Action". Both are polled
//! concurrently and judged together.

use crate::events::{
    EventBus, Subscription, IMS_DOWNLOAD_COMPLETED, IMS_DOWNLOAD_QUEUED,
    UPLOAD_DATA_AND_CHECK_STATUS,
};
use crate::models::{JobKey, JobStatus, StatusCode, UploadAction};
use crate::taxpayer::TaxpayerStatusCheck;
use crate::{StatusCheck, StatusPoller};
use anyhow::Result;
use futures::future::try_join;
use log::{debug, info, warn};
use serde::Serialize;
use serde_json::Value;
use taxpayer_api::Client;
use tokio::runtime::Handle;
use tokio::sync::mpsc;

/// Combined result of a save/reset pair, as presented to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UploadOutcome {
    /// Both jobs finished without errors.
    Uploaded,
    /// At least one job errored; data must be re-synced and uploaded again.
    Failed,
    /// A job was still running when its schedule ran out; check back later.
    StillProcessing,
}

impl UploadOutcome {
    pub fn classify(save: &JobStatus, reset: &JobStatus) -> Self {
        if save.code.is_error() || reset.code.is_error() {
            UploadOutcome::Failed
        } else if save.code == StatusCode::InProgress || reset.code == StatusCode::InProgress {
            UploadOutcome::StillProcessing
        } else {
            UploadOutcome::Uploaded
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UploadReport {
    pub company_gstin: String,
    pub outcome: UploadOutcome,
    pub save: JobStatus,
    pub reset: JobStatus,
}

/// Polls the save and reset jobs of `company_gstin` concurrently.
pub async fn check_upload_pair<C>(
    save_check: &mut C,
    reset_check: &mut C,
    company_gstin: &str,
    poller: &StatusPoller,
) -> Result<UploadReport>
where
    C: StatusCheck + ?Sized,
{
    let save_key = JobKey::upload(company_gstin, UploadAction::Save);
    let reset_key = JobKey::upload(company_gstin, UploadAction::Reset);

    let (save, reset) = try_join(
        poller.poll(&save_key, save_check),
        poller.poll(&reset_key, reset_check),
    )
    .await?;

    let outcome = UploadOutcome::classify(&save, &reset);
    match outcome {
        UploadOutcome::Uploaded => info!("Invoices of {} uploaded", company_gstin),
        UploadOutcome::Failed => warn!(
            "Upload of {} failed (save: {}, reset: {}), re-sync required",
            company_gstin, save.code, reset.code
        ),
        UploadOutcome::StillProcessing => {
            info!("Upload of {} is still processing", company_gstin)
        }
    }

    Ok(UploadReport {
        company_gstin: company_gstin.to_string(),
        outcome,
        save,
        reset,
    })
}

/// Triggers the save and reset uploads, then polls both.
pub async fn upload_and_check(
    client: &Client,
    company_gstin: &str,
    poller: &StatusPoller,
) -> Result<UploadReport> {
    client.save_invoices(company_gstin).await?;
    client.reset_invoices(company_gstin).await?;
    debug!("Uploads of {} triggered, checking status", company_gstin);

    check_pending_pair(client, company_gstin, poller).await
}

/// Polls uploads triggered earlier, e.g. found pending when data was loaded.
/// The first check is made right away.
pub async fn check_pending_uploads(
    client: &Client,
    company_gstin: &str,
    poller: &StatusPoller,
) -> Result<UploadReport> {
    let poller = poller.clone().with_immediate(true);
    check_pending_pair(client, company_gstin, &poller).await
}

async fn check_pending_pair(
    client: &Client,
    company_gstin: &str,
    poller: &StatusPoller,
) -> Result<UploadReport> {
    let mut save_check = TaxpayerStatusCheck::new(client.clone());
    let mut reset_check = TaxpayerStatusCheck::new(client.clone());
    check_upload_pair(&mut save_check, &mut reset_check, company_gstin, poller).await
}

/// Runs [`upload_and_check`] every time [`UPLOAD_DATA_AND_CHECK_STATUS`] is
/// published on `bus`. Reports arrive on the returned channel.
///
/// # Errors
///
/// Fails when called outside a tokio runtime.
pub fn watch_upload_requests(
    bus: &EventBus,
    client: Client,
    company_gstin: String,
    poller: StatusPoller,
) -> Result<(Subscription, mpsc::UnboundedReceiver<Result<UploadReport>>)> {
    let handle = Handle::try_current()?;
    let (tx, rx) = mpsc::unbounded_channel();

    let subscription = bus.subscribe(UPLOAD_DATA_AND_CHECK_STATUS, move |_| {
        let client = client.clone();
        let company_gstin = company_gstin.clone();
        let poller = poller.clone();
        let tx = tx.clone();
        handle.spawn(async move {
            let report = upload_and_check(&client, &company_gstin, &poller).await;
            if tx.send(report).is_err() {
                debug!("Upload report of {} dropped, receiver closed", company_gstin);
            }
        });
    });

    Ok((subscription, rx))
}

/// Triggers a re-sync with the portal followed by a re-upload when `report`
/// failed. Returns whether the re-sync was requested.
///
/// The server announces the outcome on the bus: [`IMS_DOWNLOAD_QUEUED`] when
/// the re-upload has to wait, [`UPLOAD_DATA_AND_CHECK_STATUS`] once it can
/// proceed.
pub async fn resync_failed_upload(client: &Client, report: &UploadReport) -> Result<bool> {
    if report.outcome != UploadOutcome::Failed {
        debug!(
            "Upload of {} is {:?}, no re-sync needed",
            report.company_gstin, report.outcome
        );
        return Ok(false);
    }
    client
        .sync_with_gstn_and_reupload(&report.company_gstin)
        .await?;
    info!("Re-sync and re-upload of {} requested", report.company_gstin);
    Ok(true)
}

/// Progress of a portal download, as announced on the bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum DownloadNotice {
    /// Some categories are queued at the portal and will be retried later.
    Queued(String),
    /// Invoices were downloaded and reconciled.
    Completed(String),
}

fn notice_message(payload: &Value) -> String {
    match payload.get("message") {
        Some(Value::String(message)) => message.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    }
}

/// Forwards [`IMS_DOWNLOAD_QUEUED`] and [`IMS_DOWNLOAD_COMPLETED`] events
/// to the returned channel for as long as the subscriptions are kept.
pub fn watch_downloads(
    bus: &EventBus,
) -> (Vec<Subscription>, mpsc::UnboundedReceiver<DownloadNotice>) {
    let (tx, rx) = mpsc::unbounded_channel();

    let queued_tx = tx.clone();
    let queued = bus.subscribe(IMS_DOWNLOAD_QUEUED, move |payload| {
        let _ = queued_tx.send(DownloadNotice::Queued(notice_message(payload)));
    });
    let completed = bus.subscribe(IMS_DOWNLOAD_COMPLETED, move |payload| {
        let _ = tx.send(DownloadNotice::Completed(notice_message(payload)));
    });

    (vec![queued, completed], rx)
}

#[cfg(test)]
#[path = "tests/upload.rs"]
mod tests;
