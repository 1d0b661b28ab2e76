// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 MuVeraAI Corporation

//! Policy lifecycle management.
//!
//! [`PolicyService`] creates policies, adds versions to a policy group,
//! archives superseded versions and answers read queries.  Versions within a
//! group are contiguous integers starting at 1; adding a version archives the
//! one it replaces.
//!
//! Archival of the replaced version is not transactional with the creation
//! of its successor.  If the archival write fails the new version is still
//! returned and the old one stays non-archived until reconciled.

use std::sync::Arc;

use hashbrown::HashSet;
use tracing::{debug, error, info, instrument};

use crate::adapter::PolicyDataAdapter;
use crate::config::Config;
use crate::error::{EntityKind, Error, Result};
use crate::types::{CreatePolicyInput, NewPolicy, Policy, PolicyScope, PolicyStatus, PolicyVersionInput};

/// Manages policy creation, versioning and status transitions.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
///
/// use chrono::Utc;
/// use consentkit_core::{
///     config::Config,
///     memory::MemoryAdapter,
///     policy::PolicyService,
///     types::{CreatePolicyInput, PolicyScope, PolicyStatus},
/// };
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let service = PolicyService::new(Arc::new(MemoryAdapter::new()), Config::default());
///
/// let input = CreatePolicyInput {
///     policy_group_id: Some("privacy".into()),
///     title: "Privacy notice".into(),
///     status: Some(PolicyStatus::Active),
///     effective_date: Some(Utc::now()),
///     content_sections: Some(Vec::new()),
///     available_scopes: Some(vec![PolicyScope {
///         key: "email".into(),
///         name: "Email".into(),
///         description: "Contact by email".into(),
///         required: Some(true),
///     }]),
///     ..CreatePolicyInput::default()
/// };
///
/// let first = service.create_policy(input.clone()).await.unwrap();
/// let second = service.create_policy(input).await.unwrap();
/// assert_eq!(first.version, 1);
/// assert_eq!(second.version, 2);
/// # }
/// ```
pub struct PolicyService<A: ?Sized> {
    adapter: Arc<A>,
    config: Config,
}

impl<A: ?Sized> Clone for PolicyService<A> {
    fn clone(&self) -> Self {
        Self {
            adapter: Arc::clone(&self.adapter),
            config: self.config.clone(),
        }
    }
}

impl<A: PolicyDataAdapter + ?Sized> PolicyService<A> {
    /// Create a new [`PolicyService`] over `adapter`.
    pub fn new(adapter: Arc<A>, config: Config) -> Self {
        Self { adapter, config }
    }

    /// Create a policy, or add a version when the group already exists.
    ///
    /// Fails with [`Error::MissingFields`] when any of `policy_group_id`,
    /// `content_sections`, `available_scopes`, `effective_date` or `status`
    /// is absent.  When the group already holds a policy the call is
    /// redirected to [`create_new_policy_version`](Self::create_new_policy_version)
    /// against the highest version and `input.version` is ignored.
    /// Otherwise version 1 (or `input.version` when given) is created.
    /// `input.version` of 0 is a validation error.
    #[instrument(skip(self, input), fields(policy_group_id = ?input.policy_group_id))]
    pub async fn create_policy(&self, input: CreatePolicyInput) -> Result<Policy> {
        let (group_id, status, effective_date, content_sections, available_scopes) =
            match (
                input.policy_group_id.as_deref().filter(|id| !id.trim().is_empty()),
                input.status,
                input.effective_date,
                input.content_sections.as_ref(),
                input.available_scopes.as_ref(),
            ) {
                (Some(group_id), Some(status), Some(date), Some(sections), Some(scopes)) => (
                    group_id.to_owned(),
                    status,
                    date,
                    sections.clone(),
                    scopes.clone(),
                ),
                _ => return Err(Error::MissingFields(missing_policy_fields(&input))),
            };
        check_unique_scope_keys(&available_scopes)?;
        if input.version == Some(0) {
            return Err(Error::Validation("policy version must be at least 1".into()));
        }

        let existing = self
            .adapter
            .find_all_policy_versions_by_group_id(&group_id)
            .await?;
        if let Some(latest) = existing.iter().max_by_key(|policy| policy.version) {
            debug!(
                policy_group_id = %group_id,
                latest_version = latest.version,
                "policy group exists; creating a new version instead"
            );
            return self.create_new_policy_version(&latest.id, input.into()).await;
        }

        let policy = self
            .adapter
            .create_policy(NewPolicy {
                policy_group_id: group_id,
                version: input.version.unwrap_or(1),
                title: input.title,
                status,
                effective_date,
                jurisdiction: input.jurisdiction,
                requires_proxy_for_minors: input.requires_proxy_for_minors,
                content_sections,
                available_scopes,
            })
            .await?;
        info!(policy_id = %policy.id, version = policy.version, "policy created");
        Ok(policy)
    }

    /// Supersede `policy_id_to_supersede` with a new version.
    ///
    /// The new version is `old.version + 1`, inherits the group id and every
    /// field `changes` leaves unset, and defaults its status to
    /// [`Config::new_version_status`].  Superseding an archived policy fails
    /// with [`Error::PolicyArchived`], and superseding version `u32::MAX`
    /// with [`Error::VersionExhausted`].
    ///
    /// After the new version is stored the old one is archived with a
    /// version guard.  A failure there is logged and swallowed.
    #[instrument(skip(self, changes))]
    pub async fn create_new_policy_version(
        &self,
        policy_id_to_supersede: &str,
        changes: PolicyVersionInput,
    ) -> Result<Policy> {
        let old = self
            .adapter
            .find_policy_by_id(policy_id_to_supersede)
            .await?
            .ok_or_else(|| Error::policy_not_found(policy_id_to_supersede))?;

        if old.status == PolicyStatus::Archived {
            return Err(Error::PolicyArchived { policy_id: old.id });
        }

        let available_scopes = changes
            .available_scopes
            .unwrap_or_else(|| old.available_scopes.clone());
        check_unique_scope_keys(&available_scopes)?;

        let new_version = old.version.checked_add(1).ok_or_else(|| Error::VersionExhausted {
            entity: EntityKind::Policy,
            id: old.id.clone(),
            version: old.version,
        })?;
        let created = self
            .adapter
            .create_policy(NewPolicy {
                policy_group_id: old.policy_group_id.clone(),
                version: new_version,
                title: changes.title.unwrap_or_else(|| old.title.clone()),
                status: changes.status.unwrap_or(self.config.new_version_status),
                effective_date: changes.effective_date.unwrap_or(old.effective_date),
                jurisdiction: changes.jurisdiction.or_else(|| old.jurisdiction.clone()),
                requires_proxy_for_minors: changes
                    .requires_proxy_for_minors
                    .or(old.requires_proxy_for_minors),
                content_sections: changes
                    .content_sections
                    .unwrap_or_else(|| old.content_sections.clone()),
                available_scopes,
            })
            .await?;
        info!(
            policy_id = %created.id,
            superseded = %old.id,
            version = created.version,
            "policy version created"
        );

        if let Err(err) = self
            .adapter
            .update_policy_status(&old.id, PolicyStatus::Archived, old.version)
            .await
        {
            error!(
                policy_id = %old.id,
                new_policy_id = %created.id,
                error = %err,
                "failed to archive superseded policy; new version kept"
            );
        }

        Ok(created)
    }

    /// Set a policy's status, guarded by `expected_version`.
    ///
    /// The version itself is never changed.
    #[instrument(skip(self))]
    pub async fn update_policy_status(
        &self,
        policy_id: &str,
        status: PolicyStatus,
        expected_version: u32,
    ) -> Result<Policy> {
        if policy_id.trim().is_empty() {
            return Err(Error::Validation("policy id must not be empty".into()));
        }
        let policy = self
            .adapter
            .update_policy_status(policy_id, status, expected_version)
            .await?;
        info!(policy_id, %status, "policy status updated");
        Ok(policy)
    }

    /// Like [`update_policy_status`](Self::update_policy_status) but takes the
    /// status as text, rejecting anything outside `active | draft | archived`.
    pub async fn update_policy_status_str(
        &self,
        policy_id: &str,
        status: &str,
        expected_version: u32,
    ) -> Result<Policy> {
        if policy_id.trim().is_empty() {
            return Err(Error::Validation("policy id must not be empty".into()));
        }
        let status: PolicyStatus = status.parse()?;
        self.update_policy_status(policy_id, status, expected_version).await
    }

    pub async fn get_policy_by_id(&self, policy_id: &str) -> Result<Option<Policy>> {
        self.adapter.find_policy_by_id(policy_id).await
    }

    pub async fn get_latest_active_policy_by_group_id(&self, group_id: &str) -> Result<Option<Policy>> {
        self.adapter.find_latest_active_policy_by_group_id(group_id).await
    }

    /// Every version of the group in ascending version order.
    pub async fn get_all_policy_versions_by_group_id(&self, group_id: &str) -> Result<Vec<Policy>> {
        self.adapter.find_all_policy_versions_by_group_id(group_id).await
    }

    pub async fn list_policies(&self) -> Result<Vec<Policy>> {
        self.adapter.list_policies().await
    }
}

fn missing_policy_fields(input: &CreatePolicyInput) -> Vec<String> {
    let mut missing = Vec::new();
    if input
        .policy_group_id
        .as_deref()
        .map_or(true, |id| id.trim().is_empty())
    {
        missing.push("policy_group_id".to_owned());
    }
    if input.content_sections.is_none() {
        missing.push("content_sections".to_owned());
    }
    if input.available_scopes.is_none() {
        missing.push("available_scopes".to_owned());
    }
    if input.effective_date.is_none() {
        missing.push("effective_date".to_owned());
    }
    if input.status.is_none() {
        missing.push("status".to_owned());
    }
    missing
}

fn check_unique_scope_keys(scopes: &[PolicyScope]) -> Result<()> {
    let mut seen = HashSet::with_capacity(scopes.len());
    for scope in scopes {
        if !seen.insert(scope.key.as_str()) {
            return Err(Error::Validation(format!(
                "duplicate scope key \"{}\" in available scopes",
                scope.key
            )));
        }
    }
    Ok(())
}
