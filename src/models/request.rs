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

use crate::error::PollError;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use taxpayer_api::UploadAction;
use uuid::Uuid;

/// Waits between status checks of an upload, in milliseconds.
pub const DEFAULT_RETRY_INTERVALS_MS: [u64; 9] =
    [2000, 3000, 15000, 30000, 60000, 120000, 300000, 600000, 720000];

/// Opaque handle of the server-side operation being polled.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobKey {
    /// Account or document context, e.g. a company GSTIN.
    pub context: String,
    /// Name of the action within that context.
    pub action: String,
}

impl JobKey {
    pub fn new(context: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            context: context.into(),
            action: action.into(),
        }
    }

    pub fn upload(company_gstin: &str, action: UploadAction) -> Self {
        Self::new(company_gstin, action.as_str())
    }
}

impl fmt::Display for JobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.context, self.action)
    }
}

/// Fixed backoff schedule. Never empty, every wait is positive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule(Vec<Duration>);

impl Schedule {
    pub fn new(waits: Vec<Duration>) -> Result<Self> {
        if waits.is_empty() {
            return Err(PollError::InvalidSchedule("schedule is empty".to_string()).into());
        }
        if let Some(pos) = waits.iter().position(|d| d.is_zero()) {
            return Err(
                PollError::InvalidSchedule(format!("wait at index {pos} is not positive")).into(),
            );
        }
        Ok(Self(waits))
    }

    pub fn from_millis(waits: &[u64]) -> Result<Self> {
        Self::new(waits.iter().map(|ms| Duration::from_millis(*ms)).collect())
    }

    /// Parses a comma-separated list of milliseconds, e.g. `"2000, 3000"`.
    pub fn parse(s: &str) -> Result<Self> {
        let mut waits = Vec::new();
        for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let ms = part.parse::<u64>().map_err(|e| {
                PollError::InvalidSchedule(format!("'{part}' is not a number of milliseconds: {e}"))
            })?;
            waits.push(ms);
        }
        Self::from_millis(&waits)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Wait before the check at `attempt`; zero once the schedule is exhausted.
    pub fn wait_for(&self, attempt: usize) -> Duration {
        self.0.get(attempt).copied().unwrap_or(Duration::ZERO)
    }

    pub fn total(&self) -> Duration {
        self.0.iter().sum()
    }

    pub fn as_millis(&self) -> Vec<u64> {
        self.0
            .iter()
            .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
            .collect()
    }
}

impl Default for Schedule {
    fn default() -> Self {
        Self(
            DEFAULT_RETRY_INTERVALS_MS
                .iter()
                .map(|ms| Duration::from_millis(*ms))
                .collect(),
        )
    }
}

/// State of one polling session, owned by the poller loop.
#[derive(Debug, Clone)]
pub struct PollRequest {
    /// Correlates the log lines of one session.
    pub session_id: Uuid,
    pub job_key: JobKey,
    /// Retries already performed, `0..=schedule.len()`.
    pub attempt: usize,
    pub schedule: Schedule,
}

impl PollRequest {
    pub fn new(job_key: JobKey, schedule: Schedule) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            job_key,
            attempt: 0,
            schedule,
        }
    }

    /// Delay before the check of the current attempt.
    pub fn delay(&self, immediate: bool) -> Duration {
        if immediate && self.attempt == 0 {
            Duration::ZERO
        } else {
            self.schedule.wait_for(self.attempt)
        }
    }

    pub fn can_retry(&self) -> bool {
        self.attempt < self.schedule.len()
    }

    pub fn advance(&mut self) {
        debug_assert!(self.can_retry());
        self.attempt = (self.attempt + 1).min(self.schedule.len());
    }
}
