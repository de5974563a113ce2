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

use crate::config::ConnectionConfig;
use crate::models::{JobKey, StatusRecord, UploadAction};
use crate::StatusCheck;
use anyhow::Result;
use async_trait::async_trait;
use log::debug;
use taxpayer_api::Client;

/// Status check backed by the `check_action_status` server method.
///
/// The job key context is the company GSTIN and the action is `save` or
/// `reset`.
#[derive(Debug, Clone)]
pub struct TaxpayerStatusCheck {
    pub(crate) api_client: Client,
}

impl TaxpayerStatusCheck {
    pub fn new(api_client: Client) -> Self {
        Self { api_client }
    }

    /// Constructs a status check from the environment.
    ///
    /// # Environment variables
    ///
    /// * `TAXPAYER_API_BASE_URL`: base URL of the site hosting the server methods
    /// * `TAXPAYER_API_KEY`, `TAXPAYER_API_SECRET`: optional API token pair
    pub fn from_env() -> Result<Self> {
        let config = ConnectionConfig::from_env()?;
        Ok(Self::new(config.build_client()?))
    }

    pub fn api_client(&self) -> &Client {
        &self.api_client
    }
}

#[async_trait]
impl StatusCheck for TaxpayerStatusCheck {
    async fn check(&mut self, job_key: &JobKey) -> Result<StatusRecord> {
        let action = job_key.action.parse::<UploadAction>()?;
        debug!("Checking '{}' upload status for {}", action, job_key.context);
        self.api_client
            .check_action_status(&job_key.context, action)
            .await
    }
}

#[cfg(test)]
#[path = "tests/remote.rs"]
mod tests;
