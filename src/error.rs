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

use thiserror::Error;

/// Typed failures raised by the poller itself. Errors of a status check are
/// propagated untouched and never wrapped in this type.
#[derive(Debug, Error)]
pub enum PollError {
    #[error("Backoff schedule is invalid: {0}")]
    InvalidSchedule(String),

    #[error("Polling '{job_key}' was cancelled after {attempts} check(s)")]
    Cancelled { job_key: String, attempts: usize },
}
