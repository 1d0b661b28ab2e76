// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 MuVeraAI Corporation

//! Error taxonomy shared by the services and every data adapter.
//!
//! Each failure mode is its own variant carrying structured fields, so
//! callers branch on [`Error::kind`] or match variants rather than inspect
//! message text.

use std::fmt;

use thiserror::Error;

/// Which entity an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Consent,
    Policy,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Consent => f.write_str("consent"),
            EntityKind::Policy  => f.write_str("policy"),
        }
    }
}

/// Coarse classification of an [`Error`].
///
/// Transport layers map these onto their own status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Input was missing or malformed. Raised before any I/O.
    Validation,
    /// A referenced entity does not exist.
    NotFound,
    /// The operation is illegal for the entity's current state.
    StateConflict,
    /// The stored version differed from the expected one at write time.
    Concurrency,
    /// Failure inside the data adapter.
    Storage,
}

/// Errors produced by the consent and policy services and their adapters.
#[derive(Debug, Error)]
pub enum Error {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<String>),

    #[error("{entity} \"{id}\" not found")]
    NotFound { entity: EntityKind, id: String },

    #[error("consent \"{consent_id}\" is revoked and cannot be re-granted")]
    ConsentRevoked { consent_id: String },

    #[error("invariant violated: latest consent \"{consent_id}\" is marked superseded")]
    SupersededLatest { consent_id: String },

    #[error("policy \"{policy_id}\" is archived and cannot be superseded")]
    PolicyArchived { policy_id: String },

    #[error("{entity} \"{id}\" is at version {version} and cannot be superseded")]
    VersionExhausted {
        entity: EntityKind,
        id: String,
        version: u32,
    },

    #[error(
        "optimistic concurrency conflict on {entity} \"{id}\": expected version {expected}, found version {found}"
    )]
    Concurrency {
        entity: EntityKind,
        id: String,
        expected: u32,
        found: u32,
    },

    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Classify this error into the five-way taxonomy.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use consentkit_core::error::{EntityKind, Error, ErrorKind};
    ///
    /// let err = Error::Concurrency {
    ///     entity: EntityKind::Consent,
    ///     id: "c-1".into(),
    ///     expected: 2,
    ///     found: 3,
    /// };
    /// assert_eq!(err.kind(), ErrorKind::Concurrency);
    /// assert!(err.to_string().contains("expected version 2, found version 3"));
    /// ```
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation(_) | Error::MissingFields(_) => ErrorKind::Validation,
            Error::NotFound { .. } => ErrorKind::NotFound,
            Error::ConsentRevoked { .. }
            | Error::SupersededLatest { .. }
            | Error::PolicyArchived { .. }
            | Error::VersionExhausted { .. } => ErrorKind::StateConflict,
            Error::Concurrency { .. } => ErrorKind::Concurrency,
            Error::Storage(_) | Error::Serialization(_) => ErrorKind::Storage,
        }
    }

    /// Shorthand for a consent [`Error::NotFound`].
    pub fn consent_not_found(id: impl Into<String>) -> Self {
        Error::NotFound { entity: EntityKind::Consent, id: id.into() }
    }

    /// Shorthand for a policy [`Error::NotFound`].
    pub fn policy_not_found(id: impl Into<String>) -> Self {
        Error::NotFound { entity: EntityKind::Policy, id: id.into() }
    }
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;
