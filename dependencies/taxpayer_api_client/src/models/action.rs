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

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Raw status object returned by `check_action_status`, passed through unchanged.
pub type StatusRecord = serde_json::Map<String, serde_json::Value>;

/// Upload sub-action whose processing status can be checked.
// lowercase matches the `action` argument of the server method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadAction {
    /// Upload invoices marked Accepted, Rejected or Pending.
    Save,
    /// Upload invoices whose action was reverted to "No Action".
    Reset,
}

impl UploadAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadAction::Save => "save",
            UploadAction::Reset => "reset",
        }
    }

    /// Name of the server method that triggers this upload.
    pub(crate) fn trigger_method(&self) -> &'static str {
        match self {
            UploadAction::Save => "save_invoices",
            UploadAction::Reset => "reset_invoices",
        }
    }
}

impl fmt::Display for UploadAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UploadAction {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "save" => Ok(UploadAction::Save),
            "reset" => Ok(UploadAction::Reset),
            other => bail!("Upload action '{}' is invalid. Valid actions: save, reset", other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_case_insensitively() {
        assert_eq!("Save".parse::<UploadAction>().unwrap(), UploadAction::Save);
        assert_eq!(" reset ".parse::<UploadAction>().unwrap(), UploadAction::Reset);
        assert!("upload".parse::<UploadAction>().is_err());
    }

    #[test]
    fn serializes_as_server_argument() {
        assert_eq!(
            serde_json::to_string(&UploadAction::Reset).unwrap(),
            "\"reset\""
        );
        assert_eq!(UploadAction::Save.trigger_method(), "save_invoices");
    }
}
