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

use serde::{Deserialize, Serialize};
use std::fmt;
use taxpayer_api::StatusRecord;

/// Field of a status record carrying the short status code.
pub const STATUS_CODE_FIELD: &str = "status_cd";

/// Symbolic state of an asynchronous upload job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatusCode {
    /// Processed (`P`).
    Completed,
    /// Errored (`ER`).
    Failed,
    /// Processed with errors (`PE`).
    PartiallyErrored,
    /// In progress (`IP`).
    InProgress,
    /// Missing or unrecognized status code.
    Unknown,
}

impl StatusCode {
    /// Maps a short code from the wire. Anything unrecognized is `Unknown`.
    pub fn from_code(code: &str) -> Self {
        match code.trim() {
            "P" => StatusCode::Completed,
            "ER" => StatusCode::Failed,
            "PE" => StatusCode::PartiallyErrored,
            "IP" => StatusCode::InProgress,
            _ => StatusCode::Unknown,
        }
    }

    pub fn as_code(&self) -> Option<&'static str> {
        match self {
            StatusCode::Completed => Some("P"),
            StatusCode::Failed => Some("ER"),
            StatusCode::PartiallyErrored => Some("PE"),
            StatusCode::InProgress => Some("IP"),
            StatusCode::Unknown => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, StatusCode::InProgress)
    }

    /// Codes that mean the upload needs a re-sync before it can be retried.
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            StatusCode::Failed | StatusCode::PartiallyErrored | StatusCode::Unknown
        )
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_code() {
            Some(code) => write!(f, "{:?} ({})", self, code),
            None => write!(f, "{:?}", self),
        }
    }
}

/// Result of a single status check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatus {
    pub code: StatusCode,
    /// Record returned by the remote check, untouched.
    pub raw_payload: StatusRecord,
}

impl JobStatus {
    /// Interprets a record returned by a status check.
    ///
    /// A record without a non-empty string `status_cd` is malformed and yields
    /// `Unknown`; the payload is kept either way.
    pub fn from_record(record: StatusRecord) -> Self {
        let code = record
            .get(STATUS_CODE_FIELD)
            .and_then(|v| v.as_str())
            .filter(|s| !s.trim().is_empty())
            .map(StatusCode::from_code)
            .unwrap_or(StatusCode::Unknown);
        Self {
            code,
            raw_payload: record,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.code.is_terminal()
    }
}
