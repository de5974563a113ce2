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

use clap::{Parser, ValueEnum};
use dotenv::dotenv;
use eyre::{eyre, Result};
use futures::StreamExt;
use log::{info, warn};
use serde::Serialize;
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook_tokio::Signals;
use status_poller::common;
use status_poller::config::{ConnectionConfig, PollerConfig, DEFAULT_CONFIG_PATH};
use status_poller::models::{JobKey, JobStatus, Schedule, StatusCode, UploadAction};
use status_poller::taxpayer::{MockResponse, MockStatusCheck, TaxpayerStatusCheck};
use status_poller::upload::{check_upload_pair, resync_failed_upload, UploadOutcome};
use status_poller::StatusPoller;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum ActionArg {
    Save,
    Reset,
    Both,
}

#[derive(Parser, Debug)]
#[command(version = "0.1.0")]
#[command(about = "Polls the status of invoice uploads until they settle")]
struct Args {
    /// company GSTIN, defaults to $COMPANY_GSTIN
    #[arg(short, long)]
    gstin: Option<String>,

    /// server URL, defaults to $TAXPAYER_API_BASE_URL
    #[arg(short, long)]
    base_url: Option<String>,

    /// upload action(s) to poll
    #[arg(short, long, value_enum, default_value_t = ActionArg::Both)]
    action: ActionArg,

    /// trigger the upload(s) before polling
    #[arg(long)]
    upload: bool,

    /// make the first check without waiting
    #[arg(long)]
    immediate: bool,

    /// comma-separated waits in milliseconds, e.g. 100,200
    #[arg(long)]
    schedule: Option<String>,

    /// request a re-sync with the portal and a re-upload when the pair failed
    #[arg(long)]
    resync: bool,

    /// poll a scripted in-memory check instead of the server
    #[arg(long)]
    mock: bool,

    /// resource name used as prefix of the poller settings
    #[arg(long, default_value = "TAXPAYER")]
    resource: String,

    /// poller config file
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
}

#[derive(Debug, Serialize)]
struct SingleReport<'a> {
    company_gstin: &'a str,
    action: UploadAction,
    status: &'a JobStatus,
}

fn anyhow_to_eyre(e: anyhow::Error) -> eyre::Report {
    eyre!("{e:#}")
}

fn exit_code_of_outcome(outcome: UploadOutcome) -> ExitCode {
    match outcome {
        UploadOutcome::Uploaded => ExitCode::SUCCESS,
        UploadOutcome::Failed => ExitCode::from(1),
        UploadOutcome::StillProcessing => ExitCode::from(2),
    }
}

fn exit_code_of_status(status: &JobStatus) -> ExitCode {
    match status.code {
        StatusCode::Completed => ExitCode::SUCCESS,
        StatusCode::InProgress => ExitCode::from(2),
        _ => ExitCode::from(1),
    }
}

fn scripted_check() -> MockStatusCheck {
    MockStatusCheck::new([
        MockResponse::code("IP"),
        MockResponse::code("IP"),
        MockResponse::code("P"),
    ])
}

/// Cancels `token` on SIGINT or SIGTERM.
fn cancel_on_signal(token: CancellationToken) -> Result<signal_hook_tokio::Handle> {
    let mut signals = Signals::new([SIGINT, SIGTERM])?;
    let handle = signals.handle();
    tokio::spawn(async move {
        if let Some(signal) = signals.next().await {
            warn!("Received signal {}, cancelling polls", signal);
            token.cancel();
        }
    });
    Ok(handle)
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    dotenv().ok();
    common::initialize();

    let args = Args::parse();

    let mut config =
        PollerConfig::load_from(&args.resource, &args.config).map_err(anyhow_to_eyre)?;
    if let Some(schedule) = &args.schedule {
        config.schedule = Schedule::parse(schedule).map_err(anyhow_to_eyre)?;
    }
    config.immediate |= args.immediate;

    let token = CancellationToken::new();
    let signal_handle = cancel_on_signal(token.clone())?;
    let poller = StatusPoller::from_config(&config).with_cancellation(token);

    let result = run(&args, &poller).await;
    signal_handle.close();
    result
}

async fn run(args: &Args, poller: &StatusPoller) -> Result<ExitCode> {
    let (client, gstin) = if args.mock {
        let gstin = args.gstin.clone().unwrap_or_else(|| "MOCK".to_string());
        (None, gstin)
    } else {
        let mut connection = ConnectionConfig::from_env().or_else(|e| match &args.base_url {
            Some(base_url) => Ok(ConnectionConfig {
                base_url: base_url.clone(),
                ..ConnectionConfig::default()
            }),
            None => Err(anyhow_to_eyre(e)),
        })?;
        if let Some(base_url) = &args.base_url {
            connection.base_url = base_url.clone();
        }
        let gstin = args
            .gstin
            .clone()
            .or_else(|| connection.company_gstin.clone())
            .ok_or_else(|| eyre!("no company GSTIN given, use --gstin or COMPANY_GSTIN"))?;
        (Some(connection.build_client().map_err(anyhow_to_eyre)?), gstin)
    };

    let actions: Vec<UploadAction> = match args.action {
        ActionArg::Save => vec![UploadAction::Save],
        ActionArg::Reset => vec![UploadAction::Reset],
        ActionArg::Both => vec![UploadAction::Save, UploadAction::Reset],
    };

    if args.upload {
        match &client {
            Some(client) => {
                for action in &actions {
                    client.upload(&gstin, *action).await.map_err(anyhow_to_eyre)?;
                    info!("Triggered '{}' upload for {}", action, gstin);
                }
            }
            None => info!("Mock mode, skipping upload trigger"),
        }
    }

    if let [action] = actions.as_slice() {
        let key = JobKey::upload(&gstin, *action);
        let status = match &client {
            Some(client) => {
                let mut check = TaxpayerStatusCheck::new(client.clone());
                poller.poll(&key, &mut check).await
            }
            None => poller.poll(&key, &mut scripted_check()).await,
        }
        .map_err(anyhow_to_eyre)?;

        let report = SingleReport {
            company_gstin: &gstin,
            action: *action,
            status: &status,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(exit_code_of_status(&status));
    }

    let report = match &client {
        Some(client) => {
            let mut save = TaxpayerStatusCheck::new(client.clone());
            let mut reset = TaxpayerStatusCheck::new(client.clone());
            check_upload_pair(&mut save, &mut reset, &gstin, poller).await
        }
        None => {
            let mut save = scripted_check();
            let mut reset = scripted_check();
            check_upload_pair(&mut save, &mut reset, &gstin, poller).await
        }
    }
    .map_err(anyhow_to_eyre)?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    if args.resync {
        match &client {
            Some(client) => {
                if resync_failed_upload(client, &report)
                    .await
                    .map_err(anyhow_to_eyre)?
                {
                    eprintln!("Re-sync requested for {}, check back later", gstin);
                }
            }
            None => info!("Mock mode, skipping re-sync"),
        }
    }
    Ok(exit_code_of_outcome(report.outcome))
}
