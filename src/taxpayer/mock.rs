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

use crate::models::{JobKey, StatusRecord, STATUS_CODE_FIELD};
use crate::StatusCheck;
use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use thiserror::Error;
use tokio::time::Instant;

/// Error raised by a scripted [`MockResponse::Error`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("mock status check failed: {0}")]
pub struct MockCheckError(pub String);

/// One scripted answer of [`MockStatusCheck`].
#[derive(Debug, Clone, PartialEq)]
pub enum MockResponse {
    Record(StatusRecord),
    Error(String),
}

impl MockResponse {
    /// Record carrying only a status code, e.g. `"IP"`.
    pub fn code(code: &str) -> Self {
        let mut record = StatusRecord::new();
        record.insert(STATUS_CODE_FIELD.to_string(), Value::String(code.to_string()));
        MockResponse::Record(record)
    }

    /// Record without a status code.
    pub fn malformed() -> Self {
        MockResponse::Record(StatusRecord::new())
    }

    pub fn error(message: &str) -> Self {
        MockResponse::Error(message.to_string())
    }
}

/// In-process status check replaying a script of responses.
///
/// Once the script runs out, the last response is repeated. An empty script
/// answers with malformed records. Every call is recorded with the (possibly
/// paused) tokio clock so tests can assert on the waits between checks.
#[derive(Debug, Clone, Default)]
pub struct MockStatusCheck {
    script: VecDeque<MockResponse>,
    last: Option<MockResponse>,
    calls: Vec<(JobKey, Instant)>,
}

impl MockStatusCheck {
    pub fn new(script: impl IntoIterator<Item = MockResponse>) -> Self {
        Self {
            script: script.into_iter().collect(),
            last: None,
            calls: Vec::new(),
        }
    }

    /// Answers every call with `response`.
    pub fn repeating(response: MockResponse) -> Self {
        Self::new([response])
    }

    pub fn call_count(&self) -> usize {
        self.calls.len()
    }

    pub fn calls(&self) -> &[(JobKey, Instant)] {
        &self.calls
    }

    pub fn call_times(&self) -> Vec<Instant> {
        self.calls.iter().map(|(_, at)| *at).collect()
    }
}

#[async_trait]
impl StatusCheck for MockStatusCheck {
    async fn check(&mut self, job_key: &JobKey) -> Result<StatusRecord> {
        self.calls.push((job_key.clone(), Instant::now()));

        let response = match self.script.pop_front() {
            Some(next) => {
                self.last = Some(next.clone());
                next
            }
            None => self.last.clone().unwrap_or_else(MockResponse::malformed),
        };

        match response {
            MockResponse::Record(record) => Ok(record),
            MockResponse::Error(message) => Err(MockCheckError(message).into()),
        }
    }
}
