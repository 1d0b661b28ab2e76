// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 MuVeraAI Corporation

//! Shared fixtures and a fault-injecting adapter for the integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use consentkit_core::adapter::{ConsentDataAdapter, PolicyDataAdapter};
use consentkit_core::error::{Error, Result};
use consentkit_core::memory::MemoryAdapter;
use consentkit_core::types::{
    ConsentMetadata, ConsentRecord, ConsentStatus, Consenter, CreateConsentInput,
    CreatePolicyInput, NewConsentRecord, NewPolicy, Policy, PolicyScope, PolicyStatus,
};

pub fn scope(key: &str, required: bool) -> PolicyScope {
    PolicyScope {
        key: key.into(),
        name: key.to_uppercase(),
        description: format!("{key} processing"),
        required: Some(required),
    }
}

pub fn policy_input(group: &str, scopes: Vec<PolicyScope>) -> CreatePolicyInput {
    CreatePolicyInput {
        policy_group_id: Some(group.into()),
        title: format!("{group} policy"),
        status: Some(PolicyStatus::Active),
        effective_date: Some(Utc::now()),
        content_sections: Some(Vec::new()),
        available_scopes: Some(scopes),
        ..CreatePolicyInput::default()
    }
}

pub fn new_policy(group: &str, scopes: Vec<PolicyScope>) -> NewPolicy {
    NewPolicy {
        policy_group_id: group.into(),
        version: 1,
        title: format!("{group} policy"),
        status: PolicyStatus::Active,
        effective_date: Utc::now(),
        jurisdiction: None,
        requires_proxy_for_minors: None,
        content_sections: Vec::new(),
        available_scopes: scopes,
    }
}

pub fn grant(subject: &str, policy_id: &str, granted: &[&str], revoked: &[&str]) -> CreateConsentInput {
    CreateConsentInput {
        subject_id: subject.into(),
        policy_id: policy_id.into(),
        consenter: Consenter::SelfConsent { user_id: subject.into() },
        granted_scopes: granted.iter().map(|s| (*s).to_owned()).collect(),
        revoked_scopes: revoked.iter().map(|s| (*s).to_owned()).collect(),
        date_of_birth: None,
        metadata: ConsentMetadata {
            consent_method: "checkbox".into(),
            ip_address: None,
            user_agent: Some("integration-test".into()),
        },
    }
}

pub fn sorted_keys<V>(map: &std::collections::BTreeMap<String, V>) -> Vec<&str> {
    map.keys().map(String::as_str).collect()
}

// ---------------------------------------------------------------------------
// FaultyAdapter
// ---------------------------------------------------------------------------

/// A [`MemoryAdapter`] wrapper that can simulate a competing writer or a
/// failing backend at specific points.
#[derive(Default)]
pub struct FaultyAdapter {
    pub inner: MemoryAdapter,
    bump_on_reread: AtomicBool,
    stale_latest: Mutex<Option<ConsentRecord>>,
    fail_policy_status: AtomicBool,
}

impl FaultyAdapter {
    pub fn new(inner: MemoryAdapter) -> Self {
        Self { inner, ..Self::default() }
    }

    /// The next by-id consent read bumps the stored record's version first,
    /// as if another writer got there between the two reads.
    pub fn bump_next_reread(&self) {
        self.bump_on_reread.store(true, Ordering::SeqCst);
    }

    /// Serve `record` from every latest-consent lookup.
    pub fn serve_stale_latest(&self, record: ConsentRecord) {
        if let Ok(mut stale) = self.stale_latest.lock() {
            *stale = Some(record);
        }
    }

    /// Make every policy status update fail with a storage error.
    pub fn fail_policy_status_updates(&self) {
        self.fail_policy_status.store(true, Ordering::SeqCst);
    }

    fn stale(&self) -> Option<ConsentRecord> {
        self.stale_latest.lock().ok().and_then(|stale| stale.clone())
    }
}

#[async_trait]
impl ConsentDataAdapter for FaultyAdapter {
    async fn create_consent(&self, data: NewConsentRecord) -> Result<ConsentRecord> {
        self.inner.create_consent(data).await
    }

    async fn update_consent_status(
        &self,
        id: &str,
        status: ConsentStatus,
        expected_version: u32,
    ) -> Result<ConsentRecord> {
        self.inner.update_consent_status(id, status, expected_version).await
    }

    async fn find_consent_by_id(&self, id: &str) -> Result<Option<ConsentRecord>> {
        let found = self.inner.find_consent_by_id(id).await?;
        match found {
            Some(mut record) if self.bump_on_reread.swap(false, Ordering::SeqCst) => {
                record.version += 1;
                self.inner.put_consent(record.clone()).await;
                Ok(Some(record))
            }
            other => Ok(other),
        }
    }

    async fn find_consents_by_subject(&self, subject_id: &str) -> Result<Vec<ConsentRecord>> {
        self.inner.find_consents_by_subject(subject_id).await
    }

    async fn find_latest_consent_by_subject_and_policy(
        &self,
        subject_id: &str,
        policy_id: &str,
    ) -> Result<Option<ConsentRecord>> {
        if let Some(stale) = self.stale() {
            return Ok(Some(stale));
        }
        self.inner
            .find_latest_consent_by_subject_and_policy(subject_id, policy_id)
            .await
    }

    async fn find_all_consent_versions_by_subject_and_policy(
        &self,
        subject_id: &str,
        policy_id: &str,
    ) -> Result<Vec<ConsentRecord>> {
        self.inner
            .find_all_consent_versions_by_subject_and_policy(subject_id, policy_id)
            .await
    }

    async fn get_all_consents(&self) -> Result<Vec<ConsentRecord>> {
        self.inner.get_all_consents().await
    }

    async fn get_consents_by_proxy_id(&self, proxy_id: &str) -> Result<Vec<ConsentRecord>> {
        self.inner.get_consents_by_proxy_id(proxy_id).await
    }
}

#[async_trait]
impl PolicyDataAdapter for FaultyAdapter {
    async fn create_policy(&self, data: NewPolicy) -> Result<Policy> {
        self.inner.create_policy(data).await
    }

    async fn update_policy_status(
        &self,
        id: &str,
        status: PolicyStatus,
        expected_version: u32,
    ) -> Result<Policy> {
        if self.fail_policy_status.load(Ordering::SeqCst) {
            return Err(Error::Storage("policy table is read-only".into()));
        }
        self.inner.update_policy_status(id, status, expected_version).await
    }

    async fn find_policy_by_id(&self, id: &str) -> Result<Option<Policy>> {
        self.inner.find_policy_by_id(id).await
    }

    async fn find_latest_active_policy_by_group_id(&self, group_id: &str) -> Result<Option<Policy>> {
        self.inner.find_latest_active_policy_by_group_id(group_id).await
    }

    async fn find_all_policy_versions_by_group_id(&self, group_id: &str) -> Result<Vec<Policy>> {
        self.inner.find_all_policy_versions_by_group_id(group_id).await
    }

    async fn list_policies(&self) -> Result<Vec<Policy>> {
        self.inner.list_policies().await
    }
}
