// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 MuVeraAI Corporation

//! # consentkit-core
//!
//! Consent and policy versioning services for consent-management
//! applications.
//!
//! Consent records and policies are both versioned: a change never edits a
//! record in place but writes a new version and retires the old one.
//! Optimistic version checks keep concurrent writers from clobbering each
//! other.  Storage is pluggable through the [`adapter`] traits.
//!
//! ## Architecture
//!
//! ```text
//! ConsentServices<A: DataAdapter>
//!   ├── PolicyService<A>   : create / version / archive / query policies
//!   └── ConsentService<A>  : grant / supersede / query consent records
//!         └── resolve_scopes : required-scope and revocation rules
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use chrono::Utc;
//! use consentkit_core::{
//!     config::Config,
//!     memory::MemoryAdapter,
//!     services::ConsentServices,
//!     types::{ConsentMetadata, ConsentStatus, Consenter, CreateConsentInput,
//!             CreatePolicyInput, PolicyScope, PolicyStatus},
//! };
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> consentkit_core::Result<()> {
//! let services = ConsentServices::new(MemoryAdapter::new(), Config::default());
//!
//! let policy = services
//!     .policy
//!     .create_policy(CreatePolicyInput {
//!         policy_group_id: Some("terms".into()),
//!         title: "Terms of service".into(),
//!         status: Some(PolicyStatus::Active),
//!         effective_date: Some(Utc::now()),
//!         content_sections: Some(Vec::new()),
//!         available_scopes: Some(vec![PolicyScope {
//!             key: "core".into(),
//!             name: "Core service".into(),
//!             description: "Needed to provide the service".into(),
//!             required: Some(true),
//!         }]),
//!         ..CreatePolicyInput::default()
//!     })
//!     .await?;
//!
//! let record = services
//!     .consent
//!     .grant_consent(CreateConsentInput {
//!         subject_id: "subject-1".into(),
//!         policy_id: policy.id.clone(),
//!         consenter: Consenter::SelfConsent { user_id: "subject-1".into() },
//!         granted_scopes: vec!["core".into()],
//!         revoked_scopes: Vec::new(),
//!         date_of_birth: None,
//!         metadata: ConsentMetadata::default(),
//!     })
//!     .await?;
//! assert_eq!(record.status, ConsentStatus::Granted);
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod config;
pub mod config_loader;
pub mod consent;
pub mod error;
pub mod memory;
pub mod policy;
pub mod services;
pub mod types;

// Re-export the most commonly used items at the crate root so consumers can
// write `use consentkit_core::ConsentServices;` instead of the fully
// qualified path.
pub use adapter::{ConsentDataAdapter, DataAdapter, PolicyDataAdapter};
pub use config::Config;
pub use consent::ConsentService;
pub use error::{EntityKind, Error, ErrorKind, Result};
pub use memory::MemoryAdapter;
pub use policy::PolicyService;
pub use services::ConsentServices;
pub use types::{
    ConsentRecord, ConsentStatus, Consenter, CreateConsentInput, CreatePolicyInput, Policy,
    PolicyScope, PolicyStatus, PolicyVersionInput, ScopeStatus,
};
