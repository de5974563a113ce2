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

//! Taxpayer Returns API Client

use anyhow::Result;

use crate::models::action::{StatusRecord, UploadAction};
use log::{debug, error};
use reqwest::header;
use reqwest_middleware::ClientBuilder as ReqwestClientBuilder;
use reqwest_retry::{policies::ExponentialBackoff, Jitter, RetryTransientMiddleware};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// Dotted path of the server module exposing the invoice upload methods.
pub const DOC_PATH: &str =
    "india_compliance.gst_india.doctype.gst_invoice_management_system.gst_invoice_management_system";

const DEFAULT_RETRIES: u32 = 5;
const DEFAULT_INITIAL_RETRY_INTERVAL: f64 = 1.0;
const DEFAULT_MAX_RETRY_INTERVAL: f64 = 10.0;
const DEFAULT_EXPONENTIAL_BASE: u32 = 2;

/// Error returned when the server answers with a non-success HTTP status.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Status: {status}, Fail {body}")]
    Http {
        status: reqwest::StatusCode,
        body: String,
    },
}

/// An asynchronous `Client` to make Requests with.
#[derive(Debug, Clone)]
pub struct Client {
    /// The base URL this client sends requests to
    pub(crate) base_url: String,
    /// HTTP client with transient-failure retries, used for idempotent status checks
    pub(crate) client: reqwest_middleware::ClientWithMiddleware,
    /// HTTP client without retries, used for calls that enqueue work on the server
    pub(crate) single_shot: reqwest_middleware::ClientWithMiddleware,
}

/// Envelope of every whitelisted method response. Methods returning nothing
/// produce `{}`, so `message` is optional.
#[derive(Debug, Clone, Deserialize)]
pub struct Response<T> {
    #[serde(default)]
    pub message: Option<T>,
}

#[derive(Debug, Clone, Serialize)]
struct CompanyArgs<'a> {
    company_gstin: &'a str,
}

#[derive(Debug, Clone, Serialize)]
struct ActionStatusArgs<'a> {
    company_gstin: &'a str,
    action: UploadAction,
}

impl Client {
    /// Uploads pending invoice actions of `action` kind. The server queues the
    /// upload and records a reference that `check_action_status` later resolves.
    pub async fn upload(&self, company_gstin: &str, action: UploadAction) -> Result<()> {
        let url = self.method_url(action.trigger_method());
        debug!("Triggering '{}' upload for {}", action, company_gstin);
        let _: Response<Value> = self
            .post(&self.single_shot, &url, CompanyArgs { company_gstin })
            .await?;
        Ok(())
    }

    pub async fn save_invoices(&self, company_gstin: &str) -> Result<()> {
        self.upload(company_gstin, UploadAction::Save).await
    }

    pub async fn reset_invoices(&self, company_gstin: &str) -> Result<()> {
        self.upload(company_gstin, UploadAction::Reset).await
    }

    /// Enqueues a download of the invoices currently on the portal.
    pub async fn download_invoices(&self, company_gstin: &str) -> Result<()> {
        let url = self.method_url("download_invoices");
        let _: Response<Value> = self
            .post(&self.single_shot, &url, CompanyArgs { company_gstin })
            .await?;
        Ok(())
    }

    /// Re-downloads the portal data and, unless some categories are still
    /// queued at the portal, uploads the pending actions again. Completion is
    /// announced through realtime events rather than returned.
    pub async fn sync_with_gstn_and_reupload(&self, company_gstin: &str) -> Result<()> {
        let url = self.method_url("sync_with_gstn_and_reupload");
        debug!("Triggering re-sync and re-upload for {}", company_gstin);
        let _: Response<Value> = self
            .post(&self.single_shot, &url, CompanyArgs { company_gstin })
            .await?;
        Ok(())
    }

    /// Returns the status object of the last upload of `action` kind.
    ///
    /// A missing or non-object `message` yields an empty record; deciding what
    /// an absent `status_cd` means is left to the caller.
    pub async fn check_action_status(
        &self,
        company_gstin: &str,
        action: UploadAction,
    ) -> Result<StatusRecord> {
        let url = self.method_url("check_action_status");
        let resp: Response<Value> = self
            .post(
                &self.client,
                &url,
                ActionStatusArgs {
                    company_gstin,
                    action,
                },
            )
            .await?;

        match resp.message {
            Some(Value::Object(record)) => Ok(record),
            Some(other) => {
                debug!("Unexpected status message shape: {}", other);
                Ok(StatusRecord::new())
            }
            None => Ok(StatusRecord::new()),
        }
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/api/method/{}.{}", self.base_url, DOC_PATH, method)
    }

    pub(crate) async fn post<T: DeserializeOwned, U: Serialize>(
        &self,
        client: &reqwest_middleware::ClientWithMiddleware,
        url: &str,
        body: U,
    ) -> Result<T> {
        let resp = client.post(url).json(&body).send().await?;
        self.handle_request(resp).await
    }

    async fn handle_request<T: DeserializeOwned>(&self, resp: reqwest::Response) -> Result<T> {
        if resp.status().is_success() {
            let json_text = resp.text().await?;
            debug!("{}", json_text);
            let val = serde_json::from_str(&json_text)?;
            Ok(val)
        } else {
            let status = resp.status();
            let body = resp.text().await?;
            error!("{} {}", status, body);
            Err(ApiError::Http { status, body }.into())
        }
    }
}

/// A [`ClientBuilder`] can be used to create a [`Client`] with custom configuration.
#[must_use]
#[derive(Debug, Clone)]
pub struct ClientBuilder {
    /// The base URL this client sends requests to
    base_url: String,
    api_token: Option<(String, String)>,
    timeout: Option<Duration>,
    max_retries: u32,
}

impl ClientBuilder {
    /// Construct a new [`ClientBuilder`]
    ///
    /// # Example
    ///
    /// ```rust
    /// use taxpayer_api::ClientBuilder;
    ///
    /// let _builder = ClientBuilder::new("http://localhost:8000");
    /// ```
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_token: None,
            timeout: None,
            max_retries: DEFAULT_RETRIES,
        }
    }

    /// Authenticate with an API key/secret pair (`Authorization: token key:secret`).
    pub fn with_api_token(&mut self, api_key: &str, api_secret: &str) -> &mut Self {
        self.api_token = Some((api_key.to_string(), api_secret.to_string()));
        self
    }

    /// Per-request timeout. Unset by default.
    pub fn with_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.timeout = Some(timeout);
        self
    }

    /// Maximum transient-failure retries for status checks. `0` disables retries.
    pub fn with_max_retries(&mut self, max_retries: u32) -> &mut Self {
        self.max_retries = max_retries;
        self
    }

    /// Returns a [`Client`] that uses this [`ClientBuilder`] configuration.
    ///
    /// # Example
    ///
    /// ```rust
    /// use taxpayer_api::ClientBuilder;
    ///
    /// let _client = ClientBuilder::new("http://localhost:8000")
    ///     .with_api_token("key", "secret")
    ///     .build();
    /// ```
    pub fn build(&mut self) -> Result<Client> {
        let mut reqwest_client_builder = reqwest::Client::builder();
        reqwest_client_builder = reqwest_client_builder.connection_verbose(true);
        if let Some(v) = self.timeout {
            reqwest_client_builder = reqwest_client_builder.timeout(v);
        }

        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json"),
        );
        if let Some((key, secret)) = &self.api_token {
            let mut value = header::HeaderValue::from_str(&format!("token {}:{}", key, secret))?;
            value.set_sensitive(true);
            headers.insert(header::AUTHORIZATION, value);
        }
        reqwest_client_builder = reqwest_client_builder.default_headers(headers);
        let http_client = reqwest_client_builder.build()?;

        let mut retrying = ReqwestClientBuilder::new(http_client.clone());
        if self.max_retries > 0 {
            let policy = ExponentialBackoff::builder()
                .retry_bounds(
                    Duration::from_secs_f64(DEFAULT_INITIAL_RETRY_INTERVAL),
                    Duration::from_secs_f64(DEFAULT_MAX_RETRY_INTERVAL),
                )
                .jitter(Jitter::Bounded)
                .base(DEFAULT_EXPONENTIAL_BASE)
                .build_with_max_retries(self.max_retries);
            retrying = retrying.with(RetryTransientMiddleware::new_with_policy(policy));
        }

        Ok(Client {
            base_url: self.base_url.clone(),
            client: retrying.build(),
            single_shot: ReqwestClientBuilder::new(http_client).build(),
        })
    }
}
