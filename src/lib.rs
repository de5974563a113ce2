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

//! # status_poller
//!
//! Polls the processing status of asynchronous invoice uploads with a fixed
//! backoff schedule, stopping at the first terminal status or once the
//! schedule is exhausted.
//!

pub mod common;
pub mod config;
pub mod error;
pub mod events;
pub mod models;
pub mod poller;
pub mod taxpayer;
pub mod upload;

use crate::models::{JobKey, StatusRecord};
use anyhow::Result;
use async_trait::async_trait;

pub use error::PollError;
pub use poller::{poll, StatusPoller};

/// Source of status records for a polled job.
///
/// Implementations wrap the remote call. Calls must be idempotent; the poller
/// repeats them until the job leaves the in-progress state.
#[async_trait]
pub trait StatusCheck: Send {
    /// Returns the current status record of `job_key`.
    ///
    /// # Errors
    ///
    /// Transport or server failures. The poller propagates them as-is and
    /// aborts the session.
    async fn check(&mut self, job_key: &JobKey) -> Result<StatusRecord>;
}

#[async_trait]
impl<T: StatusCheck + ?Sized> StatusCheck for Box<T> {
    async fn check(&mut self, job_key: &JobKey) -> Result<StatusRecord> {
        (**self).check(job_key).await
    }
}
