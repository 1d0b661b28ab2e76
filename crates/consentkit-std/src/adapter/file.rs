// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 MuVeraAI Corporation

//! File-based JSON data adapter.
//!
//! [`FileAdapter`] persists every consent record and policy to a single JSON
//! file on disk.  Every mutation flushes the file atomically (write-rename)
//! through `tokio::fs` so that a crash mid-write does not corrupt existing
//! data.
//!
//! ## Layout
//!
//! The JSON file has the shape:
//!
//! ```json
//! {
//!   "consents": { "<consent_id>": ConsentRecord, ... },
//!   "policies": { "<policy_id>":  Policy,        ... }
//! }
//! ```
//!
//! ## Caveats
//!
//! * [`FileAdapter`] holds the full state in memory and rewrites the file on
//!   every mutation.  It is not intended for high-frequency write workloads.
//! * A failed flush rolls the in-memory change back and surfaces as
//!   [`Error::Storage`].
//! * Concurrent access from multiple processes is not supported.  Use a
//!   database-backed adapter for multi-process deployments.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use consentkit_core::adapter::{
    apply_consent_status, apply_policy_status, check_consent_lineage, check_policy_lineage,
    ConsentDataAdapter, PolicyDataAdapter,
};
use consentkit_core::error::{Error, Result};
use consentkit_core::types::{
    ConsentRecord, ConsentStatus, Consenter, NewConsentRecord, NewPolicy, Policy, PolicyStatus,
};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, error};
use uuid::Uuid;

/// Snapshot of all stored state, serialised to / deserialised from disk.
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreSnapshot {
    #[serde(default)]
    consents: HashMap<String, ConsentRecord>,
    #[serde(default)]
    policies: HashMap<String, Policy>,
}

/// A file-backed [`ConsentDataAdapter`] + [`PolicyDataAdapter`] that persists
/// state as JSON.
///
/// # Examples
///
/// ```rust,no_run
/// use consentkit_core::adapter::ConsentDataAdapter;
/// use consentkit_std::FileAdapter;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let adapter = FileAdapter::open("/tmp/consents.json").expect("could not open store");
/// let records = adapter.get_all_consents().await.unwrap();
/// println!("{} consent records on disk", records.len());
/// # }
/// ```
#[derive(Debug)]
pub struct FileAdapter {
    path: PathBuf,
    data: Mutex<StoreSnapshot>,
}

impl FileAdapter {
    /// Open an existing JSON store file, or start empty if the path does not
    /// exist.  Nothing is written until the first mutation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the file exists but cannot be read, or
    /// [`Error::Serialization`] if its JSON is malformed.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let data = if path.exists() {
            let raw = std::fs::read_to_string(&path).map_err(|err| {
                Error::Storage(format!("cannot read {}: {err}", path.display()))
            })?;
            serde_json::from_str(&raw)?
        } else {
            StoreSnapshot::default()
        };
        debug!(
            path = %path.display(),
            consents = data.consents.len(),
            policies = data.policies.len(),
            "file adapter opened"
        );

        Ok(Self {
            path,
            data: Mutex::new(data),
        })
    }

    /// The JSON file this adapter writes to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the current state to disk.
    ///
    /// Mutations flush on their own; this is for callers that want to force
    /// a rewrite, e.g. after restoring a deleted file.
    pub async fn flush(&self) -> Result<()> {
        let data = self.data.lock().await;
        write_snapshot(&self.path, &data).await
    }
}

/// Serialise `data` to `<path>.tmp`, then rename it over `path`.
async fn write_snapshot(path: &Path, data: &StoreSnapshot) -> Result<()> {
    let json = serde_json::to_string_pretty(data)?;
    let tmp_path = path.with_extension("tmp");
    let written = match fs::write(&tmp_path, json).await {
        Ok(()) => fs::rename(&tmp_path, path).await,
        Err(err) => Err(err),
    };
    written.map_err(|err| {
        error!(path = %path.display(), error = %err, "failed to flush consent store");
        Error::Storage(format!("cannot write {}: {err}", path.display()))
    })
}

fn sorted_lineage(mut records: Vec<ConsentRecord>) -> Vec<ConsentRecord> {
    records.sort_by(|a, b| {
        (a.subject_id.as_str(), a.policy_id.as_str(), a.version)
            .cmp(&(b.subject_id.as_str(), b.policy_id.as_str(), b.version))
    });
    records
}

fn sorted_policies(mut policies: Vec<Policy>) -> Vec<Policy> {
    policies.sort_by(|a, b| {
        (a.policy_group_id.as_str(), a.version).cmp(&(b.policy_group_id.as_str(), b.version))
    });
    policies
}

#[async_trait]
impl ConsentDataAdapter for FileAdapter {
    async fn create_consent(&self, data: NewConsentRecord) -> Result<ConsentRecord> {
        let mut store = self.data.lock().await;
        check_consent_lineage(
            store
                .consents
                .values()
                .filter(|r| r.subject_id == data.subject_id && r.policy_id == data.policy_id),
            &data,
        )?;
        let record = ConsentRecord::from_new(Uuid::new_v4().to_string(), data, Utc::now());
        store.consents.insert(record.id.clone(), record.clone());
        if let Err(err) = write_snapshot(&self.path, &store).await {
            store.consents.remove(&record.id);
            return Err(err);
        }
        Ok(record)
    }

    async fn update_consent_status(
        &self,
        id: &str,
        status: ConsentStatus,
        expected_version: u32,
    ) -> Result<ConsentRecord> {
        let mut store = self.data.lock().await;
        let record = store
            .consents
            .get_mut(id)
            .ok_or_else(|| Error::consent_not_found(id))?;
        let previous = record.clone();
        apply_consent_status(record, status, expected_version, Utc::now())?;
        let updated = record.clone();
        if let Err(err) = write_snapshot(&self.path, &store).await {
            store.consents.insert(previous.id.clone(), previous);
            return Err(err);
        }
        Ok(updated)
    }

    async fn find_consent_by_id(&self, id: &str) -> Result<Option<ConsentRecord>> {
        Ok(self.data.lock().await.consents.get(id).cloned())
    }

    async fn find_consents_by_subject(&self, subject_id: &str) -> Result<Vec<ConsentRecord>> {
        let store = self.data.lock().await;
        Ok(sorted_lineage(
            store
                .consents
                .values()
                .filter(|r| r.subject_id == subject_id)
                .cloned()
                .collect(),
        ))
    }

    async fn find_latest_consent_by_subject_and_policy(
        &self,
        subject_id: &str,
        policy_id: &str,
    ) -> Result<Option<ConsentRecord>> {
        let store = self.data.lock().await;
        Ok(store
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
        let store = self.data.lock().await;
        Ok(sorted_lineage(
            store
                .consents
                .values()
                .filter(|r| r.subject_id == subject_id && r.policy_id == policy_id)
                .cloned()
                .collect(),
        ))
    }

    async fn get_all_consents(&self) -> Result<Vec<ConsentRecord>> {
        let store = self.data.lock().await;
        Ok(sorted_lineage(store.consents.values().cloned().collect()))
    }

    async fn get_consents_by_proxy_id(&self, proxy_id: &str) -> Result<Vec<ConsentRecord>> {
        let store = self.data.lock().await;
        Ok(sorted_lineage(
            store
                .consents
                .values()
                .filter(|r| {
                    matches!(&r.consenter, Consenter::Proxy { user_id, .. } if user_id == proxy_id)
                })
                .cloned()
                .collect(),
        ))
    }
}

#[async_trait]
impl PolicyDataAdapter for FileAdapter {
    async fn create_policy(&self, data: NewPolicy) -> Result<Policy> {
        let mut store = self.data.lock().await;
        check_policy_lineage(
            store
                .policies
                .values()
                .filter(|p| p.policy_group_id == data.policy_group_id),
            &data,
        )?;
        let policy = Policy::from_new(Uuid::new_v4().to_string(), data, Utc::now());
        store.policies.insert(policy.id.clone(), policy.clone());
        if let Err(err) = write_snapshot(&self.path, &store).await {
            store.policies.remove(&policy.id);
            return Err(err);
        }
        Ok(policy)
    }

    async fn update_policy_status(
        &self,
        id: &str,
        status: PolicyStatus,
        expected_version: u32,
    ) -> Result<Policy> {
        let mut store = self.data.lock().await;
        let policy = store
            .policies
            .get_mut(id)
            .ok_or_else(|| Error::policy_not_found(id))?;
        let previous = policy.clone();
        apply_policy_status(policy, status, expected_version, Utc::now())?;
        let updated = policy.clone();
        if let Err(err) = write_snapshot(&self.path, &store).await {
            store.policies.insert(previous.id.clone(), previous);
            return Err(err);
        }
        Ok(updated)
    }

    async fn find_policy_by_id(&self, id: &str) -> Result<Option<Policy>> {
        Ok(self.data.lock().await.policies.get(id).cloned())
    }

    async fn find_latest_active_policy_by_group_id(&self, group_id: &str) -> Result<Option<Policy>> {
        let store = self.data.lock().await;
        Ok(store
            .policies
            .values()
            .filter(|p| p.policy_group_id == group_id && p.status == PolicyStatus::Active)
            .max_by_key(|p| p.version)
            .cloned())
    }

    async fn find_all_policy_versions_by_group_id(&self, group_id: &str) -> Result<Vec<Policy>> {
        let store = self.data.lock().await;
        Ok(sorted_policies(
            store
                .policies
                .values()
                .filter(|p| p.policy_group_id == group_id)
                .cloned()
                .collect(),
        ))
    }

    async fn list_policies(&self) -> Result<Vec<Policy>> {
        let store = self.data.lock().await;
        Ok(sorted_policies(store.policies.values().cloned().collect()))
    }
}
