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

//! Backoff polling of asynchronous job status.
//!
//! A session starts at attempt 0 and waits `schedule[attempt]` before each
//! check (zero for the first check when `immediate` is set, and zero for the
//! final check once the schedule is exhausted). It ends at the first terminal
//! status, at the first record without a recognizable status code, or after
//! `schedule.len() + 1` checks that all reported in-progress.

use crate::config::PollerConfig;
use crate::error::PollError;
use crate::models::{JobKey, JobStatus, PollRequest, Schedule, StatusCode, StatusRecord};
use crate::StatusCheck;
use anyhow::Result;
use async_trait::async_trait;
use log::{debug, warn};
use std::future::Future;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

/// Polls a [`StatusCheck`] until the job reaches a terminal status or the
/// backoff schedule is exhausted.
#[derive(Debug, Clone, Default)]
pub struct StatusPoller {
    schedule: Schedule,
    immediate: bool,
    cancel: Option<CancellationToken>,
}

impl StatusPoller {
    pub fn new(schedule: Schedule) -> Self {
        Self {
            schedule,
            immediate: false,
            cancel: None,
        }
    }

    pub fn from_config(config: &PollerConfig) -> Self {
        Self::new(config.schedule.clone()).with_immediate(config.immediate)
    }

    /// Skip the wait before the first check.
    pub fn with_immediate(mut self, immediate: bool) -> Self {
        self.immediate = immediate;
        self
    }

    /// Abort sessions of this poller when `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    pub fn is_immediate(&self) -> bool {
        self.immediate
    }

    /// Runs one polling session for `job_key`.
    ///
    /// Returns the first terminal status, `Unknown` for a record without a
    /// status code, or the last in-progress status once the schedule is
    /// exhausted. The caller must treat the latter as unresolved.
    ///
    /// # Errors
    ///
    /// - any error of `check`, unchanged; no further checks are made.
    /// - [`PollError::Cancelled`] when a cancellation token is attached and fires.
    pub async fn poll<C>(&self, job_key: &JobKey, check: &mut C) -> Result<JobStatus>
    where
        C: StatusCheck + ?Sized,
    {
        let mut request = PollRequest::new(job_key.clone(), self.schedule.clone());
        debug!(
            "[{}] Polling '{}' (retries: {}, immediate: {})",
            request.session_id,
            request.job_key,
            request.schedule.len(),
            self.immediate
        );

        loop {
            self.wait(&request).await?;

            let record = check.check(&request.job_key).await?;
            let status = JobStatus::from_record(record);
            debug!(
                "[{}] Check {} of '{}' returned {}",
                request.session_id,
                request.attempt + 1,
                request.job_key,
                status.code
            );

            match status.code {
                StatusCode::InProgress if request.can_retry() => request.advance(),
                StatusCode::InProgress => {
                    warn!(
                        "[{}] '{}' still in progress after {} checks, giving up",
                        request.session_id,
                        request.job_key,
                        request.attempt + 1
                    );
                    return Ok(status);
                }
                StatusCode::Unknown => {
                    warn!(
                        "[{}] '{}' returned no recognizable status code: {:?}",
                        request.session_id, request.job_key, status.raw_payload
                    );
                    return Ok(status);
                }
                _ => return Ok(status),
            }
        }
    }

    /// Same as [`StatusPoller::poll`], aborting when `cancel` fires.
    pub async fn poll_with_cancellation<C>(
        &self,
        job_key: &JobKey,
        check: &mut C,
        cancel: &CancellationToken,
    ) -> Result<JobStatus>
    where
        C: StatusCheck + ?Sized,
    {
        self.clone()
            .with_cancellation(cancel.clone())
            .poll(job_key, check)
            .await
    }

    async fn wait(&self, request: &PollRequest) -> Result<()> {
        let delay = request.delay(self.immediate);
        let Some(token) = &self.cancel else {
            if !delay.is_zero() {
                sleep(delay).await;
            }
            return Ok(());
        };

        if token.is_cancelled() {
            return Err(cancelled(request));
        }
        if delay.is_zero() {
            return Ok(());
        }
        debug!(
            "[{}] Waiting {:?} before check {}",
            request.session_id,
            delay,
            request.attempt + 1
        );
        tokio::select! {
            biased;
            _ = token.cancelled() => Err(cancelled(request)),
            _ = sleep(delay) => Ok(()),
        }
    }
}

fn cancelled(request: &PollRequest) -> anyhow::Error {
    debug!("[{}] Polling cancelled", request.session_id);
    PollError::Cancelled {
        job_key: request.job_key.to_string(),
        attempts: request.attempt,
    }
    .into()
}

/// Polls `job_key` once with the given schedule. See [`StatusPoller::poll`].
pub async fn poll<C>(
    job_key: &JobKey,
    check: &mut C,
    schedule: &Schedule,
    immediate: bool,
) -> Result<JobStatus>
where
    C: StatusCheck + ?Sized,
{
    StatusPoller::new(schedule.clone())
        .with_immediate(immediate)
        .poll(job_key, check)
        .await
}

/// [`StatusCheck`] backed by a closure returning a future.
pub struct FnStatusCheck<F>(F);

/// Wraps `f` as a [`StatusCheck`].
///
/// # Example
///
/// ```no_run
/// use serde_json::json;
/// use status_poller::models::{JobKey, Schedule};
/// use status_poller::poller::{from_fn, poll};
///
/// # async fn run() -> anyhow::Result<()> {
/// let mut check = from_fn(|_key: JobKey| async {
///     Ok(json!({"status_cd": "P"}).as_object().cloned().unwrap_or_default())
/// });
/// let schedule = Schedule::from_millis(&[100, 200])?;
/// let status = poll(&JobKey::new("gstin", "save"), &mut check, &schedule, true).await?;
/// # Ok(())
/// # }
/// ```
pub fn from_fn<F, Fut>(f: F) -> FnStatusCheck<F>
where
    F: FnMut(JobKey) -> Fut + Send,
    Fut: Future<Output = Result<StatusRecord>> + Send + 'static,
{
    FnStatusCheck(f)
}

#[async_trait]
impl<F, Fut> StatusCheck for FnStatusCheck<F>
where
    F: FnMut(JobKey) -> Fut + Send,
    Fut: Future<Output = Result<StatusRecord>> + Send + 'static,
{
    async fn check(&mut self, job_key: &JobKey) -> Result<StatusRecord> {
        (self.0)(job_key.clone()).await
    }
}

#[cfg(test)]
#[path = "tests/poller.rs"]
mod tests;
