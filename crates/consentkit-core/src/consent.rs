// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 MuVeraAI Corporation

//! Consent lifecycle management.
//!
//! [`ConsentService`] grants consent by writing a new record version for the
//! `(subject_id, policy_id)` lineage and marking the previous one
//! superseded.  Records are never edited in place apart from that status
//! flip.
//!
//! ## Scope resolution
//!
//! The policy's `available_scopes` is the scope universe.  A key requested
//! for both grant and revocation is revoked.  If any `required` scope ends up
//! not granted, the whole record is revoked: no scope stays granted and every
//! policy scope is listed as revoked.  Otherwise each requested key is
//! granted and every other policy scope is revoked.  All timestamps written
//! by one call are the same instant.
//!
//! ## Concurrency
//!
//! Superseding reads the lineage's latest record, then re-reads it by id
//! right before the version-guarded status write.  A version change between
//! the two reads fails the call with [`Error::Concurrency`] and nothing is
//! written.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, info, instrument, warn};

use crate::adapter::{ConsentDataAdapter, DataAdapter, PolicyDataAdapter};
use crate::config::Config;
use crate::error::{EntityKind, Error, Result};
use crate::types::{
    ConsentRecord, ConsentStatus, CreateConsentInput, GrantedScope, NewConsentRecord, Policy,
    RevokedScope, ScopeStatus,
};

/// Outcome of applying the scope rules to one grant request.
#[derive(Debug, Clone, PartialEq)]
pub struct ScopeResolution {
    pub status: ConsentStatus,
    pub granted_scopes: BTreeMap<String, GrantedScope>,
    pub revoked_scopes: BTreeMap<String, RevokedScope>,
    /// Set only when `status` is [`ConsentStatus::Revoked`].
    pub revoked_at: Option<DateTime<Utc>>,
}

/// Apply the scope rules of `policy` to a grant request.
///
/// `granted` and `revoked` are the requested keys.  When `reject_unknown` is
/// set, a key the policy does not offer is a validation error; otherwise an
/// unknown granted key is kept under its own key as name and unknown
/// revocations are ignored.
///
/// # Examples
///
/// ```rust
/// use chrono::Utc;
/// use consentkit_core::consent::resolve_scopes;
/// use consentkit_core::types::{ConsentStatus, Policy, PolicyScope, PolicyStatus};
///
/// let scope = |key: &str, required| PolicyScope {
///     key: key.into(),
///     name: key.into(),
///     description: String::new(),
///     required: Some(required),
/// };
/// let now = Utc::now();
/// let policy = Policy {
///     id: "p-1".into(),
///     policy_group_id: "g".into(),
///     version: 1,
///     title: "Terms".into(),
///     status: PolicyStatus::Active,
///     effective_date: now,
///     jurisdiction: None,
///     requires_proxy_for_minors: None,
///     content_sections: Vec::new(),
///     available_scopes: vec![scope("email", true), scope("profile", false)],
///     created_at: now,
///     updated_at: now,
/// };
///
/// let resolution = resolve_scopes(&policy, &["profile".into()], &[], now, false).unwrap();
/// assert_eq!(resolution.status, ConsentStatus::Revoked);
/// assert!(resolution.granted_scopes.is_empty());
/// assert_eq!(resolution.revoked_scopes.len(), 2);
/// ```
pub fn resolve_scopes(
    policy: &Policy,
    granted: &[String],
    revoked: &[String],
    now: DateTime<Utc>,
    reject_unknown: bool,
) -> Result<ScopeResolution> {
    if reject_unknown {
        if let Some(unknown) = granted
            .iter()
            .chain(revoked)
            .find(|key| policy.scope(key).is_none())
        {
            return Err(Error::Validation(format!(
                "scope \"{unknown}\" is not offered by policy \"{}\"",
                policy.id
            )));
        }
    }

    let explicitly_revoked: BTreeSet<&str> = revoked.iter().map(String::as_str).collect();
    let requested: BTreeSet<&str> = granted
        .iter()
        .map(String::as_str)
        .filter(|key| !explicitly_revoked.contains(key))
        .collect();

    let lost_required: Vec<&str> = policy
        .required_scope_keys()
        .filter(|key| !requested.contains(key))
        .collect();

    if !lost_required.is_empty() {
        warn!(
            policy_id = %policy.id,
            missing = ?lost_required,
            "required scope not granted; revoking every scope"
        );
        let revoked_scopes = policy
            .available_scopes
            .iter()
            .map(|scope| {
                (
                    scope.key.clone(),
                    RevokedScope {
                        key: scope.key.clone(),
                        name: scope.name.clone(),
                        description: scope.description.clone(),
                        required: scope.required,
                        revoked_at: now,
                    },
                )
            })
            .collect();
        return Ok(ScopeResolution {
            status: ConsentStatus::Revoked,
            granted_scopes: BTreeMap::new(),
            revoked_scopes,
            revoked_at: Some(now),
        });
    }

    let granted_scopes = requested
        .iter()
        .map(|&key| {
            let scope = match policy.scope(key) {
                Some(scope) => GrantedScope {
                    key: scope.key.clone(),
                    name: scope.name.clone(),
                    description: scope.description.clone(),
                    required: scope.required,
                    granted_at: now,
                },
                None => GrantedScope {
                    key: key.to_owned(),
                    name: key.to_owned(),
                    description: String::new(),
                    required: None,
                    granted_at: now,
                },
            };
            (key.to_owned(), scope)
        })
        .collect();

    let revoked_scopes = policy
        .available_scopes
        .iter()
        .filter(|scope| !requested.contains(scope.key.as_str()))
        .map(|scope| {
            (
                scope.key.clone(),
                RevokedScope {
                    key: scope.key.clone(),
                    name: scope.name.clone(),
                    description: scope.description.clone(),
                    required: scope.required,
                    revoked_at: now,
                },
            )
        })
        .collect();

    Ok(ScopeResolution {
        status: ConsentStatus::Granted,
        granted_scopes,
        revoked_scopes,
        revoked_at: None,
    })
}

/// Manages consent grants, supersession and consent queries.
///
/// Construct one per data adapter at application start (see
/// [`ConsentServices`](crate::services::ConsentServices)) and share it.
pub struct ConsentService<A: ?Sized> {
    adapter: Arc<A>,
    config: Config,
}

impl<A: ?Sized> Clone for ConsentService<A> {
    fn clone(&self) -> Self {
        Self {
            adapter: Arc::clone(&self.adapter),
            config: self.config.clone(),
        }
    }
}

impl<A: DataAdapter + ?Sized> ConsentService<A> {
    /// Create a new [`ConsentService`] over `adapter`.
    pub fn new(adapter: Arc<A>, config: Config) -> Self {
        Self { adapter, config }
    }

    /// Grant consent, creating version 1 or superseding the latest version.
    ///
    /// Fails with [`Error::ConsentRevoked`] when the lineage's latest record
    /// is revoked, [`Error::SupersededLatest`] when it is (impossibly)
    /// superseded, [`Error::VersionExhausted`] when it is at `u32::MAX`, and
    /// [`Error::Concurrency`] when the record changed between the initial
    /// lookup and the re-read by id.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use std::sync::Arc;
    ///
    /// use chrono::Utc;
    /// use consentkit_core::{
    ///     adapter::PolicyDataAdapter,
    ///     config::Config,
    ///     consent::ConsentService,
    ///     memory::MemoryAdapter,
    ///     types::{ConsentStatus, Consenter, CreateConsentInput, ConsentMetadata,
    ///             NewPolicy, PolicyScope, PolicyStatus},
    /// };
    ///
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() {
    /// let store = Arc::new(MemoryAdapter::new());
    /// let policy = store
    ///     .create_policy(NewPolicy {
    ///         policy_group_id: "marketing".into(),
    ///         version: 1,
    ///         title: "Marketing".into(),
    ///         status: PolicyStatus::Active,
    ///         effective_date: Utc::now(),
    ///         jurisdiction: None,
    ///         requires_proxy_for_minors: None,
    ///         content_sections: Vec::new(),
    ///         available_scopes: vec![PolicyScope {
    ///             key: "newsletter".into(),
    ///             name: "Newsletter".into(),
    ///             description: String::new(),
    ///             required: None,
    ///         }],
    ///     })
    ///     .await
    ///     .unwrap();
    ///
    /// let service = ConsentService::new(store, Config::default());
    /// let record = service
    ///     .grant_consent(CreateConsentInput {
    ///         subject_id: "subject-1".into(),
    ///         policy_id: policy.id.clone(),
    ///         consenter: Consenter::SelfConsent { user_id: "subject-1".into() },
    ///         granted_scopes: vec!["newsletter".into()],
    ///         revoked_scopes: Vec::new(),
    ///         date_of_birth: None,
    ///         metadata: ConsentMetadata::default(),
    ///     })
    ///     .await
    ///     .unwrap();
    /// assert_eq!(record.version, 1);
    /// assert_eq!(record.status, ConsentStatus::Granted);
    /// # }
    /// ```
    #[instrument(
        skip(self, input),
        fields(subject_id = %input.subject_id, policy_id = %input.policy_id)
    )]
    pub async fn grant_consent(&self, input: CreateConsentInput) -> Result<ConsentRecord> {
        validate_input(&input)?;
        let policy = self.load_policy(&input.policy_id).await?;

        let now = Utc::now();
        let resolution = resolve_scopes(
            &policy,
            &input.granted_scopes,
            &input.revoked_scopes,
            now,
            self.config.reject_unknown_scopes,
        )?;

        let existing = self
            .adapter
            .find_latest_consent_by_subject_and_policy(&input.subject_id, &input.policy_id)
            .await?;

        let (version, consented_at, inherited_dob) = match existing {
            None => {
                debug!("no existing consent; creating version 1");
                (1, now, None)
            }
            Some(latest) => match latest.status {
                ConsentStatus::Revoked => {
                    return Err(Error::ConsentRevoked { consent_id: latest.id });
                }
                ConsentStatus::Superseded => {
                    return Err(Error::SupersededLatest { consent_id: latest.id });
                }
                ConsentStatus::Granted => {
                    let next = latest.version.checked_add(1).ok_or_else(|| {
                        Error::VersionExhausted {
                            entity: EntityKind::Consent,
                            id: latest.id.clone(),
                            version: latest.version,
                        }
                    })?;
                    debug!(consent_id = %latest.id, version = latest.version, "superseding consent");
                    self.supersede(&latest).await?;
                    (next, latest.consented_at, latest.date_of_birth)
                }
            },
        };

        self.persist(input, version, consented_at, inherited_dob, resolution).await
    }

    /// Grant consent as a fresh version 1 without looking up prior history.
    ///
    /// Applies the same scope rules as [`grant_consent`](Self::grant_consent).
    #[instrument(
        skip(self, input),
        fields(subject_id = %input.subject_id, policy_id = %input.policy_id)
    )]
    pub async fn create_initial_grant(&self, input: CreateConsentInput) -> Result<ConsentRecord> {
        validate_input(&input)?;
        let policy = self.load_policy(&input.policy_id).await?;

        let now = Utc::now();
        let resolution = resolve_scopes(
            &policy,
            &input.granted_scopes,
            &input.revoked_scopes,
            now,
            self.config.reject_unknown_scopes,
        )?;

        self.persist(input, 1, now, None, resolution).await
    }

    pub async fn get_consent_details(&self, consent_id: &str) -> Result<Option<ConsentRecord>> {
        self.adapter.find_consent_by_id(consent_id).await
    }

    /// Report, per requested scope key, whether the subject currently grants it.
    ///
    /// Without `policy_id` every record of the subject is consulted and a key
    /// is `true` when any record grants it.  With `policy_id` only the latest
    /// record of that lineage counts, and only while it is
    /// [`ConsentStatus::Granted`].
    #[instrument(skip(self, scopes))]
    pub async fn get_subject_consent_status(
        &self,
        subject_id: &str,
        scopes: &[&str],
        policy_id: Option<&str>,
    ) -> Result<ScopeStatus> {
        let mut status: ScopeStatus = scopes.iter().map(|key| ((*key).to_owned(), false)).collect();

        match policy_id {
            Some(policy_id) => {
                let latest = self
                    .adapter
                    .find_latest_consent_by_subject_and_policy(subject_id, policy_id)
                    .await?;
                if let Some(record) = latest.filter(|r| r.status == ConsentStatus::Granted) {
                    for (key, granted) in status.iter_mut() {
                        *granted = record.grants(key);
                    }
                }
            }
            None => {
                let records = self.adapter.find_consents_by_subject(subject_id).await?;
                for (key, granted) in status.iter_mut() {
                    *granted = records.iter().any(|record| record.grants(key));
                }
            }
        }

        Ok(status)
    }

    pub async fn get_latest_consent_for_subject_and_policy(
        &self,
        subject_id: &str,
        policy_id: &str,
    ) -> Result<Option<ConsentRecord>> {
        self.adapter
            .find_latest_consent_by_subject_and_policy(subject_id, policy_id)
            .await
    }

    /// Every version of the lineage in ascending version order.
    pub async fn get_all_consent_versions_for_subject_and_policy(
        &self,
        subject_id: &str,
        policy_id: &str,
    ) -> Result<Vec<ConsentRecord>> {
        self.adapter
            .find_all_consent_versions_by_subject_and_policy(subject_id, policy_id)
            .await
    }

    /// The highest version of each of the subject's lineages, ordered by
    /// policy id.
    pub async fn get_latest_consent_versions_for_subject(
        &self,
        subject_id: &str,
    ) -> Result<Vec<ConsentRecord>> {
        let records = self.adapter.find_consents_by_subject(subject_id).await?;
        let mut latest: BTreeMap<String, ConsentRecord> = BTreeMap::new();
        for record in records {
            let newer = latest
                .get(&record.policy_id)
                .map_or(true, |current| record.version > current.version);
            if newer {
                latest.insert(record.policy_id.clone(), record);
            }
        }
        Ok(latest.into_values().collect())
    }

    pub async fn get_all_consents(&self) -> Result<Vec<ConsentRecord>> {
        self.adapter.get_all_consents().await
    }

    /// Records consented by `proxy_id` on behalf of other subjects.
    pub async fn get_consents_by_proxy_id(&self, proxy_id: &str) -> Result<Vec<ConsentRecord>> {
        self.adapter.get_consents_by_proxy_id(proxy_id).await
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    async fn load_policy(&self, policy_id: &str) -> Result<Policy> {
        self.adapter
            .find_policy_by_id(policy_id)
            .await?
            .ok_or_else(|| Error::policy_not_found(policy_id))
    }

    /// Re-read `latest` by id, verify its version, then mark it superseded.
    async fn supersede(&self, latest: &ConsentRecord) -> Result<()> {
        let current = self
            .adapter
            .find_consent_by_id(&latest.id)
            .await?
            .ok_or_else(|| Error::consent_not_found(latest.id.as_str()))?;

        if current.version != latest.version {
            return Err(Error::Concurrency {
                entity: EntityKind::Consent,
                id: latest.id.clone(),
                expected: latest.version,
                found: current.version,
            });
        }

        self.adapter
            .update_consent_status(&current.id, ConsentStatus::Superseded, current.version)
            .await?;
        Ok(())
    }

    async fn persist(
        &self,
        input: CreateConsentInput,
        version: u32,
        consented_at: DateTime<Utc>,
        inherited_dob: Option<NaiveDate>,
        resolution: ScopeResolution,
    ) -> Result<ConsentRecord> {
        let record = self
            .adapter
            .create_consent(NewConsentRecord {
                subject_id: input.subject_id,
                policy_id: input.policy_id,
                version,
                status: resolution.status,
                consented_at,
                date_of_birth: input.date_of_birth.or(inherited_dob),
                consenter: input.consenter,
                granted_scopes: resolution.granted_scopes,
                revoked_scopes: resolution.revoked_scopes,
                revoked_at: resolution.revoked_at,
                metadata: input.metadata,
            })
            .await?;
        info!(
            consent_id = %record.id,
            version = record.version,
            status = %record.status,
            "consent recorded"
        );
        Ok(record)
    }
}

fn validate_input(input: &CreateConsentInput) -> Result<()> {
    let mut missing = Vec::new();
    if input.subject_id.trim().is_empty() {
        missing.push("subject_id".to_owned());
    }
    if input.policy_id.trim().is_empty() {
        missing.push("policy_id".to_owned());
    }
    if input.consenter.user_id().trim().is_empty() {
        missing.push("consenter.user_id".to_owned());
    }
    if missing.is_empty() {
        Ok(())
    } else {
        Err(Error::MissingFields(missing))
    }
}
