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

//! # taxpayer_api_client
//!
//! This is a Rust client to trigger invoice uploads and check their processing
//! status through the taxpayer returns API.
//!

mod client;
mod models;

pub use client::{ApiError, Client, ClientBuilder, Response, DOC_PATH};
pub use models::{StatusRecord, UploadAction};
