// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 MuVeraAI Corporation

//! Data adapter contract.
//!
//! The services never touch storage directly; every read and write goes
//! through [`ConsentDataAdapter`] and [`PolicyDataAdapter`].  This crate ships
//! [`MemoryAdapter`](crate::memory::MemoryAdapter); the file-backed adapter
//! lives in `consentkit-std`.  Document stores, SQL databases and remote
//! APIs are all valid backends as long as they honour the rules below.
//!
//! # Contract
//!
//! * `create_*` assigns the id and the `created_at` / `updated_at`
//!   timestamps and stores the version it is given.
//! * `update_*_status` compares `expected_version` against the stored
//!   version and fails with [`Error::Concurrency`] on mismatch, or
//!   [`Error::NotFound`] for an unknown id.  It never changes the version.
//! * Creating a successor version (`version > 1`) that already exists in its
//!   lineage fails with [`Error::Concurrency`].
//! * `find_all_*_versions_*` return records in ascending version order.
//!
//! [`Error::Concurrency`]: crate::error::Error::Concurrency
//! [`Error::NotFound`]: crate::error::Error::NotFound
//!
//! # Implementing an adapter
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use consentkit_core::adapter::PolicyDataAdapter;
//! use consentkit_core::error::Result;
//! use consentkit_core::types::{NewPolicy, Policy, PolicyStatus};
//!
//! struct MyPolicies;
//!
//! #[async_trait]
//! impl PolicyDataAdapter for MyPolicies {
//!     async fn create_policy(&self, _data: NewPolicy) -> Result<Policy> { todo!() }
//!     async fn update_policy_status(
//!         &self,
//!         _id: &str,
//!         _status: PolicyStatus,
//!         _expected_version: u32,
//!     ) -> Result<Policy> { todo!() }
//!     async fn find_policy_by_id(&self, _id: &str) -> Result<Option<Policy>> { Ok(None) }
//!     async fn find_latest_active_policy_by_group_id(
//!         &self,
//!         _group_id: &str,
//!     ) -> Result<Option<Policy>> { Ok(None) }
//!     async fn find_all_policy_versions_by_group_id(
//!         &self,
//!         _group_id: &str,
//!     ) -> Result<Vec<Policy>> { Ok(Vec::new()) }
//!     async fn list_policies(&self) -> Result<Vec<Policy>> { Ok(Vec::new()) }
//! }
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::{EntityKind, Error, Result};
use crate::types::{ConsentRecord, ConsentStatus, NewConsentRecord, NewPolicy, Policy, PolicyStatus};

// ---------------------------------------------------------------------------
// Consent
// ---------------------------------------------------------------------------

/// Persistence interface for consent records.
#[async_trait]
pub trait ConsentDataAdapter: Send + Sync {
    /// Persist a new record version and return it as stored.
    async fn create_consent(&self, data: NewConsentRecord) -> Result<ConsentRecord>;

    /// Flip the status of a stored record, guarded by `expected_version`.
    async fn update_consent_status(
        &self,
        id: &str,
        status: ConsentStatus,
        expected_version: u32,
    ) -> Result<ConsentRecord>;

    async fn find_consent_by_id(&self, id: &str) -> Result<Option<ConsentRecord>>;

    /// Every record of `subject_id`, across all policies and versions.
    async fn find_consents_by_subject(&self, subject_id: &str) -> Result<Vec<ConsentRecord>>;

    /// The highest-versioned record of the `(subject_id, policy_id)` lineage.
    async fn find_latest_consent_by_subject_and_policy(
        &self,
        subject_id: &str,
        policy_id: &str,
    ) -> Result<Option<ConsentRecord>>;

    /// Every version of the lineage, ascending.
    async fn find_all_consent_versions_by_subject_and_policy(
        &self,
        subject_id: &str,
        policy_id: &str,
    ) -> Result<Vec<ConsentRecord>>;

    async fn get_all_consents(&self) -> Result<Vec<ConsentRecord>>;

    /// Records whose consenter is a proxy with `user_id == proxy_id`.
    async fn get_consents_by_proxy_id(&self, proxy_id: &str) -> Result<Vec<ConsentRecord>>;
}

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

/// Persistence interface for versioned policies.
#[async_trait]
pub trait PolicyDataAdapter: Send + Sync {
    async fn create_policy(&self, data: NewPolicy) -> Result<Policy>;

    /// Flip the status of a stored policy, guarded by `expected_version`.
    async fn update_policy_status(
        &self,
        id: &str,
        status: PolicyStatus,
        expected_version: u32,
    ) -> Result<Policy>;

    async fn find_policy_by_id(&self, id: &str) -> Result<Option<Policy>>;

    /// Highest-versioned policy of the group whose status is `active`.
    async fn find_latest_active_policy_by_group_id(&self, group_id: &str) -> Result<Option<Policy>>;

    /// Every version of the group, ascending.
    async fn find_all_policy_versions_by_group_id(&self, group_id: &str) -> Result<Vec<Policy>>;

    async fn list_policies(&self) -> Result<Vec<Policy>>;
}

/// A backend that stores both consents and policies.
///
/// Blanket-implemented for every type that implements both halves.
pub trait DataAdapter: ConsentDataAdapter + PolicyDataAdapter {}

impl<T: ConsentDataAdapter + PolicyDataAdapter + ?Sized> DataAdapter for T {}

// ---------------------------------------------------------------------------
// Arc forwarding
// ---------------------------------------------------------------------------

#[async_trait]
impl<T: ConsentDataAdapter + ?Sized> ConsentDataAdapter for Arc<T> {
    async fn create_consent(&self, data: NewConsentRecord) -> Result<ConsentRecord> {
        (**self).create_consent(data).await
    }

    async fn update_consent_status(
        &self,
        id: &str,
        status: ConsentStatus,
        expected_version: u32,
    ) -> Result<ConsentRecord> {
        (**self).update_consent_status(id, status, expected_version).await
    }

    async fn find_consent_by_id(&self, id: &str) -> Result<Option<ConsentRecord>> {
        (**self).find_consent_by_id(id).await
    }

    async fn find_consents_by_subject(&self, subject_id: &str) -> Result<Vec<ConsentRecord>> {
        (**self).find_consents_by_subject(subject_id).await
    }

    async fn find_latest_consent_by_subject_and_policy(
        &self,
        subject_id: &str,
        policy_id: &str,
    ) -> Result<Option<ConsentRecord>> {
        (**self).find_latest_consent_by_subject_and_policy(subject_id, policy_id).await
    }

    async fn find_all_consent_versions_by_subject_and_policy(
        &self,
        subject_id: &str,
        policy_id: &str,
    ) -> Result<Vec<ConsentRecord>> {
        (**self)
            .find_all_consent_versions_by_subject_and_policy(subject_id, policy_id)
            .await
    }

    async fn get_all_consents(&self) -> Result<Vec<ConsentRecord>> {
        (**self).get_all_consents().await
    }

    async fn get_consents_by_proxy_id(&self, proxy_id: &str) -> Result<Vec<ConsentRecord>> {
        (**self).get_consents_by_proxy_id(proxy_id).await
    }
}

#[async_trait]
impl<T: PolicyDataAdapter + ?Sized> PolicyDataAdapter for Arc<T> {
    async fn create_policy(&self, data: NewPolicy) -> Result<Policy> {
        (**self).create_policy(data).await
    }

    async fn update_policy_status(
        &self,
        id: &str,
        status: PolicyStatus,
        expected_version: u32,
    ) -> Result<Policy> {
        (**self).update_policy_status(id, status, expected_version).await
    }

    async fn find_policy_by_id(&self, id: &str) -> Result<Option<Policy>> {
        (**self).find_policy_by_id(id).await
    }

    async fn find_latest_active_policy_by_group_id(&self, group_id: &str) -> Result<Option<Policy>> {
        (**self).find_latest_active_policy_by_group_id(group_id).await
    }

    async fn find_all_policy_versions_by_group_id(&self, group_id: &str) -> Result<Vec<Policy>> {
        (**self).find_all_policy_versions_by_group_id(group_id).await
    }

    async fn list_policies(&self) -> Result<Vec<Policy>> {
        (**self).list_policies().await
    }
}

// ---------------------------------------------------------------------------
// Helpers for adapter implementations
// ---------------------------------------------------------------------------

/// Reject a successor consent version that already exists in its lineage.
///
/// `lineage` yields the stored records of `data`'s `(subject_id, policy_id)`
/// pair.  Version-1 writes always pass.
pub fn check_consent_lineage<'a>(
    lineage: impl IntoIterator<Item = &'a ConsentRecord>,
    data: &NewConsentRecord,
) -> Result<()> {
    if data.version <= 1 {
        return Ok(());
    }
    let mut found = 0;
    let mut taken = false;
    for record in lineage {
        found = found.max(record.version);
        taken |= record.version == data.version;
    }
    if taken {
        return Err(Error::Concurrency {
            entity: EntityKind::Consent,
            id: format!("{}/{}", data.subject_id, data.policy_id),
            expected: data.version - 1,
            found,
        });
    }
    Ok(())
}

/// Reject a successor policy version that already exists in its group.
pub fn check_policy_lineage<'a>(
    group: impl IntoIterator<Item = &'a Policy>,
    data: &NewPolicy,
) -> Result<()> {
    if data.version <= 1 {
        return Ok(());
    }
    let mut found = 0;
    let mut taken = false;
    for policy in group {
        found = found.max(policy.version);
        taken |= policy.version == data.version;
    }
    if taken {
        return Err(Error::Concurrency {
            entity: EntityKind::Policy,
            id: data.policy_group_id.clone(),
            expected: data.version - 1,
            found,
        });
    }
    Ok(())
}

/// Apply a version-guarded status flip to a stored consent record.
pub fn apply_consent_status(
    record: &mut ConsentRecord,
    status: ConsentStatus,
    expected_version: u32,
    now: DateTime<Utc>,
) -> Result<()> {
    if record.version != expected_version {
        return Err(Error::Concurrency {
            entity: EntityKind::Consent,
            id: record.id.clone(),
            expected: expected_version,
            found: record.version,
        });
    }
    record.status = status;
    record.updated_at = now;
    Ok(())
}

/// Apply a version-guarded status flip to a stored policy.
pub fn apply_policy_status(
    policy: &mut Policy,
    status: PolicyStatus,
    expected_version: u32,
    now: DateTime<Utc>,
) -> Result<()> {
    if policy.version != expected_version {
        return Err(Error::Concurrency {
            entity: EntityKind::Policy,
            id: policy.id.clone(),
            expected: expected_version,
            found: policy.version,
        });
    }
    policy.status = status;
    policy.updated_at = now;
    Ok(())
}
