// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for boundary tracing.
//!
//! Noisy or empty drawings are never errors: malformed primitives, degenerate
//! loops and unmatched hints are counted in the diagnostics instead. Only a
//! configuration the caller got wrong is reported here.

/// Result type alias for boundary tracing operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while tracing wall boundaries.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    /// A configuration value is non-finite or outside its allowed range.
    #[error("invalid configuration: `{field}` = {value} ({reason})")]
    InvalidConfig {
        field: &'static str,
        value: f64,
        reason: &'static str,
    },
}

impl Error {
    pub(crate) fn invalid_config(field: &'static str, value: f64, reason: &'static str) -> Self {
        Self::InvalidConfig {
            field,
            value,
            reason,
        }
    }
}
