// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 MuVeraAI Corporation

//! Shared data types for consent records and versioned policies.
//!
//! All types implement [`Clone`], [`Debug`], [`serde::Serialize`], and
//! [`serde::Deserialize`] so any adapter can persist them without an extra
//! mapping layer.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Error;

// ---------------------------------------------------------------------------
// Consent
// ---------------------------------------------------------------------------

/// Lifecycle state of a single consent record version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsentStatus {
    /// The record is the live grant for its lineage.
    Granted,
    /// The whole record was revoked. A revoked lineage cannot be re-granted.
    Revoked,
    /// A newer version replaced this record.
    Superseded,
}

impl ConsentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ConsentStatus::Granted    => "granted",
            ConsentStatus::Revoked    => "revoked",
            ConsentStatus::Superseded => "superseded",
        }
    }
}

impl fmt::Display for ConsentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Relationship details recorded when a proxy consents on someone's behalf.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyDetails {
    /// How the proxy relates to the subject (e.g. "parent", "guardian").
    pub relationship: String,
    /// Age bracket of the subject at consent time (e.g. "under13").
    pub subject_age_group: String,
}

/// The party that performed the consent act.
///
/// # Examples
///
/// ```rust
/// use consentkit_core::types::Consenter;
///
/// let me = Consenter::SelfConsent { user_id: "u-1".into() };
/// let json = serde_json::to_string(&me).unwrap();
/// assert!(json.contains("\"type\":\"self\""));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Consenter {
    /// The subject consented for themselves.
    #[serde(rename = "self")]
    SelfConsent { user_id: String },
    /// Someone else consented on the subject's behalf.
    Proxy {
        user_id: String,
        proxy_details: ProxyDetails,
    },
}

impl Consenter {
    /// Identifier of the user who performed the consent act.
    pub fn user_id(&self) -> &str {
        match self {
            Consenter::SelfConsent { user_id } => user_id,
            Consenter::Proxy { user_id, .. }   => user_id,
        }
    }

    pub fn is_proxy(&self) -> bool {
        matches!(self, Consenter::Proxy { .. })
    }
}

/// A scope currently granted by a consent record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantedScope {
    pub key: String,
    pub name: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
    /// Timestamp of the operation that produced this record version.
    pub granted_at: DateTime<Utc>,
}

/// A scope explicitly or implicitly revoked by a consent record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevokedScope {
    pub key: String,
    pub name: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
    pub revoked_at: DateTime<Utc>,
}

/// How and from where consent was captured.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsentMetadata {
    /// Capture channel, e.g. "digital_form" or "verbal".
    pub consent_method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

/// One immutable-per-version snapshot of a subject's consent to a policy.
///
/// Records are never edited in place except for the status flip that marks
/// a prior version [`ConsentStatus::Superseded`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsentRecord {
    pub id: String,
    pub subject_id: String,
    pub policy_id: String,
    /// Position in the `(subject_id, policy_id)` lineage, starting at 1.
    pub version: u32,
    pub status: ConsentStatus,
    /// When the original consent act happened. Preserved across supersession.
    pub consented_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<NaiveDate>,
    pub consenter: Consenter,
    #[serde(default)]
    pub granted_scopes: BTreeMap<String, GrantedScope>,
    #[serde(default)]
    pub revoked_scopes: BTreeMap<String, RevokedScope>,
    /// Set only when the whole record is [`ConsentStatus::Revoked`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revoked_at: Option<DateTime<Utc>>,
    pub metadata: ConsentMetadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ConsentRecord {
    /// Whether this record grants `key`: present in `granted_scopes` and not
    /// also listed in `revoked_scopes`.
    ///
    /// The record status is not consulted; callers that need the
    /// lineage-level answer check the status themselves.
    pub fn grants(&self, key: &str) -> bool {
        self.granted_scopes.contains_key(key) && !self.revoked_scopes.contains_key(key)
    }

    /// Build a stored record from an adapter create payload.
    pub fn from_new(id: String, data: NewConsentRecord, now: DateTime<Utc>) -> Self {
        Self {
            id,
            subject_id: data.subject_id,
            policy_id: data.policy_id,
            version: data.version,
            status: data.status,
            consented_at: data.consented_at,
            date_of_birth: data.date_of_birth,
            consenter: data.consenter,
            granted_scopes: data.granted_scopes,
            revoked_scopes: data.revoked_scopes,
            revoked_at: data.revoked_at,
            metadata: data.metadata,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Payload handed to [`ConsentDataAdapter::create_consent`].
///
/// Everything except the id and bookkeeping timestamps, which the adapter
/// assigns.
///
/// [`ConsentDataAdapter::create_consent`]: crate::adapter::ConsentDataAdapter::create_consent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewConsentRecord {
    pub subject_id: String,
    pub policy_id: String,
    pub version: u32,
    pub status: ConsentStatus,
    pub consented_at: DateTime<Utc>,
    pub date_of_birth: Option<NaiveDate>,
    pub consenter: Consenter,
    pub granted_scopes: BTreeMap<String, GrantedScope>,
    pub revoked_scopes: BTreeMap<String, RevokedScope>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub metadata: ConsentMetadata,
}

/// Request accepted by [`ConsentService::grant_consent`].
///
/// [`ConsentService::grant_consent`]: crate::consent::ConsentService::grant_consent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateConsentInput {
    pub subject_id: String,
    pub policy_id: String,
    pub consenter: Consenter,
    /// Scope keys the caller wants granted.
    #[serde(default)]
    pub granted_scopes: Vec<String>,
    /// Scope keys the caller explicitly wants revoked. Wins over a grant
    /// request for the same key.
    #[serde(default)]
    pub revoked_scopes: Vec<String>,
    #[serde(default)]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default)]
    pub metadata: ConsentMetadata,
}

/// Per-scope answer of [`ConsentService::get_subject_consent_status`].
///
/// [`ConsentService::get_subject_consent_status`]: crate::consent::ConsentService::get_subject_consent_status
pub type ScopeStatus = BTreeMap<String, bool>;

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

/// Lifecycle state of a policy version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyStatus {
    #[default]
    Draft,
    Active,
    Archived,
}

impl PolicyStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PolicyStatus::Draft    => "draft",
            PolicyStatus::Active   => "active",
            PolicyStatus::Archived => "archived",
        }
    }
}

impl fmt::Display for PolicyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PolicyStatus {
    type Err = Error;

    /// Parse a status string, rejecting anything outside
    /// `active | draft | archived`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use consentkit_core::types::PolicyStatus;
    ///
    /// assert_eq!("active".parse::<PolicyStatus>().unwrap(), PolicyStatus::Active);
    /// assert!("retired".parse::<PolicyStatus>().is_err());
    /// ```
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "draft"    => Ok(PolicyStatus::Draft),
            "active"   => Ok(PolicyStatus::Active),
            "archived" => Ok(PolicyStatus::Archived),
            ""         => Err(Error::Validation("policy status must not be empty".into())),
            other => Err(Error::Validation(format!(
                "invalid policy status \"{other}\"; expected one of: active, draft, archived"
            ))),
        }
    }
}

/// A scope a policy offers for consent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyScope {
    /// Unique within the policy.
    pub key: String,
    pub name: String,
    pub description: String,
    /// Losing a required scope revokes the whole consent record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
}

impl PolicyScope {
    pub fn is_required(&self) -> bool {
        self.required.unwrap_or(false)
    }
}

/// One section of human-readable policy text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentSection {
    pub title: String,
    pub description: String,
    pub content: String,
}

/// A versioned policy document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    pub id: String,
    pub policy_group_id: String,
    /// Contiguous ascending integers within a group, starting at 1.
    pub version: u32,
    pub title: String,
    pub status: PolicyStatus,
    pub effective_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jurisdiction: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requires_proxy_for_minors: Option<bool>,
    pub content_sections: Vec<ContentSection>,
    pub available_scopes: Vec<PolicyScope>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Policy {
    /// Look up an available scope by key.
    pub fn scope(&self, key: &str) -> Option<&PolicyScope> {
        self.available_scopes.iter().find(|scope| scope.key == key)
    }

    /// Keys of every scope flagged `required: true`.
    pub fn required_scope_keys(&self) -> impl Iterator<Item = &str> {
        self.available_scopes
            .iter()
            .filter(|scope| scope.is_required())
            .map(|scope| scope.key.as_str())
    }

    /// Build a stored policy from an adapter create payload.
    pub fn from_new(id: String, data: NewPolicy, now: DateTime<Utc>) -> Self {
        Self {
            id,
            policy_group_id: data.policy_group_id,
            version: data.version,
            title: data.title,
            status: data.status,
            effective_date: data.effective_date,
            jurisdiction: data.jurisdiction,
            requires_proxy_for_minors: data.requires_proxy_for_minors,
            content_sections: data.content_sections,
            available_scopes: data.available_scopes,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Payload handed to [`PolicyDataAdapter::create_policy`].
///
/// [`PolicyDataAdapter::create_policy`]: crate::adapter::PolicyDataAdapter::create_policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPolicy {
    pub policy_group_id: String,
    pub version: u32,
    pub title: String,
    pub status: PolicyStatus,
    pub effective_date: DateTime<Utc>,
    pub jurisdiction: Option<String>,
    pub requires_proxy_for_minors: Option<bool>,
    pub content_sections: Vec<ContentSection>,
    pub available_scopes: Vec<PolicyScope>,
}

/// Request accepted by [`PolicyService::create_policy`].
///
/// The presence-checked fields are optional so that a missing value can be
/// reported by name instead of failing deserialisation.
///
/// [`PolicyService::create_policy`]: crate::policy::PolicyService::create_policy
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreatePolicyInput {
    #[serde(default)]
    pub policy_group_id: Option<String>,
    /// Honoured only when the group is new.
    #[serde(default)]
    pub version: Option<u32>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub status: Option<PolicyStatus>,
    #[serde(default)]
    pub effective_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub jurisdiction: Option<String>,
    #[serde(default)]
    pub requires_proxy_for_minors: Option<bool>,
    #[serde(default)]
    pub content_sections: Option<Vec<ContentSection>>,
    #[serde(default)]
    pub available_scopes: Option<Vec<PolicyScope>>,
}

/// Changes applied by [`PolicyService::create_new_policy_version`].
///
/// Unset fields inherit from the policy being superseded, except `status`,
/// which falls back to the configured new-version status.
///
/// [`PolicyService::create_new_policy_version`]: crate::policy::PolicyService::create_new_policy_version
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PolicyVersionInput {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub status: Option<PolicyStatus>,
    #[serde(default)]
    pub effective_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub jurisdiction: Option<String>,
    #[serde(default)]
    pub requires_proxy_for_minors: Option<bool>,
    #[serde(default)]
    pub content_sections: Option<Vec<ContentSection>>,
    #[serde(default)]
    pub available_scopes: Option<Vec<PolicyScope>>,
}

impl From<CreatePolicyInput> for PolicyVersionInput {
    fn from(input: CreatePolicyInput) -> Self {
        Self {
            title: Some(input.title).filter(|title| !title.is_empty()),
            status: input.status,
            effective_date: input.effective_date,
            jurisdiction: input.jurisdiction,
            requires_proxy_for_minors: input.requires_proxy_for_minors,
            content_sections: input.content_sections,
            available_scopes: input.available_scopes,
        }
    }
}
