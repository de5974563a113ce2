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

mod request;
mod status;

pub use request::{JobKey, PollRequest, Schedule, DEFAULT_RETRY_INTERVALS_MS};
pub use status::{JobStatus, StatusCode, STATUS_CODE_FIELD};
pub use taxpayer_api::{StatusRecord, UploadAction};
