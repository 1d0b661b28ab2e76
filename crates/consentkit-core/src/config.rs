// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 MuVeraAI Corporation

//! Service-level configuration.
//!
//! [`Config`] is the single entry point for tuning the services at
//! construction time.  `Config::default()` reproduces the reference
//! behaviour and is always a valid starting point.

use serde::{Deserialize, Serialize};

use crate::types::PolicyStatus;

/// Top-level configuration for [`ConsentServices`](crate::services::ConsentServices).
///
/// # Examples
///
/// ```rust
/// use consentkit_core::config::Config;
///
/// let config = Config {
///     reject_unknown_scopes: true,
///     ..Config::default()
/// };
/// assert!(config.reject_unknown_scopes);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Status given to a new policy version when the caller supplies none.
    /// Defaults to [`PolicyStatus::Draft`].
    pub new_version_status: PolicyStatus,

    /// When `true`, a grant or revocation request naming a scope key the
    /// policy does not offer fails validation.  When `false` (the default)
    /// an unknown granted key is recorded under its own key as name, and
    /// unknown revocation keys are ignored.
    pub reject_unknown_scopes: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            new_version_status: PolicyStatus::Draft,
            reject_unknown_scopes: false,
        }
    }
}
