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

use std::sync::Once;

static INIT: Once = Once::new();

/// Log filter used when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "warn";

/// Installs `env_logger` with millisecond timestamps, so the waits between
/// checks can be read off the log. Only the first call has an effect, and a
/// logger installed elsewhere beforehand is kept.
pub fn initialize() {
    INIT.call_once(|| {
        let env = env_logger::Env::default().default_filter_or(DEFAULT_LOG_FILTER);
        if env_logger::Builder::from_env(env)
            .format_timestamp_millis()
            .try_init()
            .is_err()
        {
            log::debug!("Logger already installed, keeping it");
        }
    });
}
