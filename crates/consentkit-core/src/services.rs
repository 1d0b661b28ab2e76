// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 MuVeraAI Corporation

//! Service composition: one consent service and one policy service per
//! data adapter.
//!
//! [`ConsentServices`] is built once at application start for each backing
//! store and handed to whatever needs it (HTTP handlers, RPC, CLI).  Both
//! services share the same `Arc`'d adapter, so there is exactly one logical
//! service pair per store and no process-global registry.
//!
//! ## Design
//!
//! For a concrete adapter, construct with [`ConsentServices::new`].  To mix
//! backends at runtime behind one type, pass an `Arc<dyn DataAdapter>` to
//! [`ConsentServices::from_shared`].
//!
//! Cloning a [`ConsentServices`] is cheap and keeps pointing at the same
//! adapter.

use std::sync::Arc;

use crate::adapter::DataAdapter;
use crate::config::Config;
use crate::consent::ConsentService;
use crate::policy::PolicyService;

/// The consent and policy services bound to one data adapter.
///
/// # Examples
///
/// ```rust
/// use consentkit_core::{config::Config, memory::MemoryAdapter, services::ConsentServices};
///
/// let services = ConsentServices::new(MemoryAdapter::new(), Config::default());
/// let again = services.clone();
/// assert!(std::sync::Arc::ptr_eq(services.adapter(), again.adapter()));
/// ```
pub struct ConsentServices<A: ?Sized> {
    /// Consent grants, supersession and queries.
    pub consent: ConsentService<A>,
    /// Policy creation, versioning and queries.
    pub policy: PolicyService<A>,
    adapter: Arc<A>,
}

impl<A: ?Sized> Clone for ConsentServices<A> {
    fn clone(&self) -> Self {
        Self {
            consent: self.consent.clone(),
            policy: self.policy.clone(),
            adapter: Arc::clone(&self.adapter),
        }
    }
}

impl<A: DataAdapter> ConsentServices<A> {
    /// Take ownership of `adapter` and build both services over it.
    pub fn new(adapter: A, config: Config) -> Self {
        Self::from_shared(Arc::new(adapter), config)
    }
}

impl<A: DataAdapter + ?Sized> ConsentServices<A> {
    /// Build both services over an already shared adapter.
    ///
    /// Two compositions built from clones of the same `Arc` behave like two
    /// processes sharing one database: each keeps its own services, and the
    /// adapter's version checks arbitrate between them.
    pub fn from_shared(adapter: Arc<A>, config: Config) -> Self {
        Self {
            consent: ConsentService::new(Arc::clone(&adapter), config.clone()),
            policy: PolicyService::new(Arc::clone(&adapter), config),
            adapter,
        }
    }

    /// The adapter both services write through.
    pub fn adapter(&self) -> &Arc<A> {
        &self.adapter
    }
}
