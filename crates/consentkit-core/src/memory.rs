// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 MuVeraAI Corporation

//! In-memory data adapter.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use hashbrown::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::adapter::{
    apply_consent_status, apply_policy_status, check_consent_lineage, check_policy_lineage,
    ConsentDataAdapter, PolicyDataAdapter,
};
use crate::error::{Error, Result};
use crate::types::{
    ConsentRecord, ConsentStatus, Consenter, NewConsentRecord, NewPolicy, Policy, PolicyStatus,
};

/// Tables held by [`MemoryAdapter`], keyed by record id.
#[derive(Debug, Default)]
struct MemoryTables {
    consents: HashMap<String, ConsentRecord>,
    policies: HashMap<String, Policy>,
}

/// A volatile [`ConsentDataAdapter`] + [`PolicyDataAdapter`] backed by
/// [`hashbrown::HashMap`] tables behind a Tokio `RwLock`.
///
/// Cloning is cheap and shares the tables, so several service compositions
/// can run against one store the way several processes share one database.
///
/// # Examples
///
/// ```rust
/// use consentkit_core::adapter::PolicyDataAdapter;
/// use consentkit_core::memory::MemoryAdapter;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let store = MemoryAdapter::new();
/// assert!(store.list_policies().await.unwrap().is_empty());
/// # }
/// ```
#[derive(Debug, Default, Clone)]
pub struct MemoryAdapter {
    tables: Arc<RwLock<MemoryTables>>,
}

impl MemoryAdapter {
    /// Create a new, empty [`MemoryAdapter`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite a consent record as-is, bypassing every check.
    ///
    /// Intended for fixtures and bulk imports.
    pub async fn put_consent(&self, record: ConsentRecord) {
        let mut tables = self.tables.write().await;
        tables.consents.insert(record.id.clone(), record);
    }

    /// Insert or overwrite a policy as-is, bypassing every check.
    pub async fn put_policy(&self, policy: Policy) {
        let mut tables = self.tables.write().await;
        tables.policies.insert(policy.id.clone(), policy);
    }

    /// Number of stored consent records across all lineages.
    pub async fn consent_count(&self) -> usize {
        self.tables.read().await.consents.len()
    }
}

fn sort_lineage(records: &mut [ConsentRecord]) {
    records.sort_by(|a, b| {
        (a.subject_id.as_str(), a.policy_id.as_str(), a.version)
            .cmp(&(b.subject_id.as_str(), b.policy_id.as_str(), b.version))
    });
}

fn sort_policies(policies: &mut [Policy]) {
    policies.sort_by(|a, b| {
        (a.policy_group_id.as_str(), a.version).cmp(&(b.policy_group_id.as_str(), b.version))
    });
}

#[async_trait]
impl ConsentDataAdapter for MemoryAdapter {
    async fn create_consent(&self, data: NewConsentRecord) -> Result<ConsentRecord> {
        let mut tables = self.tables.write().await;
        check_consent_lineage(
            tables
                .consents
                .values()
                .filter(|r| r.subject_id == data.subject_id && r.policy_id == data.policy_id),
            &data,
        )?;
        let record = ConsentRecord::from_new(Uuid::new_v4().to_string(), data, Utc::now());
        tables.consents.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    async fn update_consent_status(
        &self,
        id: &str,
        status: ConsentStatus,
        expected_version: u32,
    ) -> Result<ConsentRecord> {
        let mut tables = self.tables.write().await;
        let record = tables
            .consents
            .get_mut(id)
            .ok_or_else(|| Error::consent_not_found(id))?;
        apply_consent_status(record, status, expected_version, Utc::now())?;
        Ok(record.clone())
    }

    async fn find_consent_by_id(&self, id: &str) -> Result<Option<ConsentRecord>> {
        Ok(self.tables.read().await.consents.get(id).cloned())
    }

    async fn find_consents_by_subject(&self, subject_id: &str) -> Result<Vec<ConsentRecord>> {
        let tables = self.tables.read().await;
        let mut records: Vec<ConsentRecord> = tables
            .consents
            .values()
            .filter(|r| r.subject_id == subject_id)
            .cloned()
            .collect();
        sort_lineage(&mut records);
        Ok(records)
    }

    async fn find_latest_consent_by_subject_and_policy(
        &self,
        subject_id: &str,
        policy_id: &str,
    ) -> Result<Option<ConsentRecord>> {
        let tables = self.tables.read().await;
        Ok(tables
            .consents
            .values()
            .filter(|r| r.subject_id == subject_id && r.policy_id == policy_id)
            .max_by_key(|r| r.version)
            .cloned())
    }

    async fn find_all_consent_versions_by_subject_and_policy(
        &self,
        subject_id: &str,
        policy_id: &str,
    ) -> Result<Vec<ConsentRecord>> {
        let tables = self.tables.read().await;
        let mut records: Vec<ConsentRecord> = tables
            .consents
            .values()
            .filter(|r| r.subject_id == subject_id && r.policy_id == policy_id)
            .cloned()
            .collect();
        sort_lineage(&mut records);
        Ok(records)
    }

    async fn get_all_consents(&self) -> Result<Vec<ConsentRecord>> {
        let tables = self.tables.read().await;
        let mut records: Vec<ConsentRecord> = tables.consents.values().cloned().collect();
        sort_lineage(&mut records);
        Ok(records)
    }

    async fn get_consents_by_proxy_id(&self, proxy_id: &str) -> Result<Vec<ConsentRecord>> {
        let tables = self.tables.read().await;
        let mut records: Vec<ConsentRecord> = tables
            .consents
            .values()
            .filter(|r| matches!(&r.consenter, Consenter::Proxy { user_id, .. } if user_id == proxy_id))
            .cloned()
            .collect();
        sort_lineage(&mut records);
        Ok(records)
    }
}

#[async_trait]
impl PolicyDataAdapter for MemoryAdapter {
    async fn create_policy(&self, data: NewPolicy) -> Result<Policy> {
        let mut tables = self.tables.write().await;
        check_policy_lineage(
            tables
                .policies
                .values()
                .filter(|p| p.policy_group_id == data.policy_group_id),
            &data,
        )?;
        let policy = Policy::from_new(Uuid::new_v4().to_string(), data, Utc::now());
        tables.policies.insert(policy.id.clone(), policy.clone());
        Ok(policy)
    }

    async fn update_policy_status(
        &self,
        id: &str,
        status: PolicyStatus,
        expected_version: u32,
    ) -> Result<Policy> {
        let mut tables = self.tables.write().await;
        let policy = tables
            .policies
            .get_mut(id)
            .ok_or_else(|| Error::policy_not_found(id))?;
        apply_policy_status(policy, status, expected_version, Utc::now())?;
        Ok(policy.clone())
    }

    async fn find_policy_by_id(&self, id: &str) -> Result<Option<Policy>> {
        Ok(self.tables.read().await.policies.get(id).cloned())
    }

    async fn find_latest_active_policy_by_group_id(&self, group_id: &str) -> Result<Option<Policy>> {
        let tables = self.tables.read().await;
        Ok(tables
            .policies
            .values()
            .filter(|p| p.policy_group_id == group_id && p.status == PolicyStatus::Active)
            .max_by_key(|p| p.version)
            .cloned())
    }

    async fn find_all_policy_versions_by_group_id(&self, group_id: &str) -> Result<Vec<Policy>> {
        let tables = self.tables.read().await;
        let mut policies: Vec<Policy> = tables
            .policies
            .values()
            .filter(|p| p.policy_group_id == group_id)
            .cloned()
            .collect();
        sort_policies(&mut policies);
        Ok(policies)
    }

    async fn list_policies(&self) -> Result<Vec<Policy>> {
        let tables = self.tables.read().await;
        let mut policies: Vec<Policy> = tables.policies.values().cloned().collect();
        sort_policies(&mut policies);
        Ok(policies)
    }
}
