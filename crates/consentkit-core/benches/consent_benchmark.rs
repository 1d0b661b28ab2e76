// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 MuVeraAI Corporation

//! Criterion benchmark suite for the consentkit services.
//!
//! Benchmarks cover:
//!
//! - Scope resolution for a grant request
//! - `grant_consent` (fresh lineage and supersede)
//! - Subject consent-status queries
//!
//! Run with: `cargo bench --bench consent_benchmark`

use chrono::Utc;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use tokio::runtime::Runtime;

use consentkit_core::{
    adapter::PolicyDataAdapter,
    config::Config,
    consent::resolve_scopes,
    memory::MemoryAdapter,
    services::ConsentServices,
    types::{
        ConsentMetadata, Consenter, CreateConsentInput, NewPolicy, Policy, PolicyScope,
        PolicyStatus,
    },
};

fn make_scopes(count: usize) -> Vec<PolicyScope> {
    (0..count)
        .map(|index| PolicyScope {
            key: format!("scope-{index:03}"),
            name: format!("Scope {index}"),
            description: String::new(),
            required: Some(index == 0),
        })
        .collect()
}

fn make_policy_payload(scope_count: usize) -> NewPolicy {
    NewPolicy {
        policy_group_id: "bench".into(),
        version: 1,
        title: "Benchmark policy".into(),
        status: PolicyStatus::Active,
        effective_date: Utc::now(),
        jurisdiction: None,
        requires_proxy_for_minors: None,
        content_sections: Vec::new(),
        available_scopes: make_scopes(scope_count),
    }
}

fn make_grant(subject_id: &str, policy_id: &str, scopes: &[String]) -> CreateConsentInput {
    CreateConsentInput {
        subject_id: subject_id.into(),
        policy_id: policy_id.into(),
        consenter: Consenter::SelfConsent { user_id: subject_id.into() },
        granted_scopes: scopes.to_vec(),
        revoked_scopes: Vec::new(),
        date_of_birth: None,
        metadata: ConsentMetadata::default(),
    }
}

async fn seeded_services(scope_count: usize) -> (ConsentServices<MemoryAdapter>, Policy) {
    let services = ConsentServices::new(MemoryAdapter::new(), Config::default());
    let policy = services
        .adapter()
        .create_policy(make_policy_payload(scope_count))
        .await
        .expect("seed policy");
    (services, policy)
}

// ---------------------------------------------------------------------------
// Scope resolution
// ---------------------------------------------------------------------------

/// Pure scope-rule evaluation, no adapter involved.
fn scope_resolution_benchmark(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("resolve_scopes");

    for scope_count in [4usize, 32, 256] {
        let runtime = Runtime::new().expect("tokio runtime");
        let (_, policy) = runtime.block_on(seeded_services(scope_count));
        let granted: Vec<String> = policy
            .available_scopes
            .iter()
            .step_by(2)
            .map(|scope| scope.key.clone())
            .collect();

        group.bench_with_input(
            BenchmarkId::new("grant_half", scope_count),
            &scope_count,
            |bencher, _| {
                bencher.iter(|| {
                    let resolution =
                        resolve_scopes(&policy, black_box(&granted), &[], Utc::now(), false);
                    black_box(resolution)
                });
            },
        );

        let revoke_required = vec![policy.available_scopes[0].key.clone()];
        group.bench_with_input(
            BenchmarkId::new("full_revoke", scope_count),
            &scope_count,
            |bencher, _| {
                bencher.iter(|| {
                    let resolution = resolve_scopes(
                        &policy,
                        black_box(&granted),
                        black_box(&revoke_required),
                        Utc::now(),
                        false,
                    );
                    black_box(resolution)
                });
            },
        );
    }

    group.finish();
}

// ---------------------------------------------------------------------------
// grant_consent
// ---------------------------------------------------------------------------

/// End-to-end grants against the in-memory adapter.
fn grant_benchmark(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("grant_consent");
    let runtime = Runtime::new().expect("tokio runtime");
    let (services, policy) = runtime.block_on(seeded_services(8));
    let granted: Vec<String> = policy.available_scopes.iter().map(|s| s.key.clone()).collect();

    let mut counter = 0u64;
    group.bench_function("fresh_lineage", |bencher| {
        bencher.to_async(&runtime).iter(|| {
            counter += 1;
            let input = make_grant(&format!("fresh-{counter}"), &policy.id, &granted);
            let services = services.clone();
            async move { black_box(services.consent.grant_consent(input).await) }
        });
    });

    group.bench_function("supersede_latest", |bencher| {
        bencher.to_async(&runtime).iter(|| {
            let input = make_grant("repeat-subject", &policy.id, &granted);
            let services = services.clone();
            async move { black_box(services.consent.grant_consent(input).await) }
        });
    });

    group.finish();
}

// ---------------------------------------------------------------------------
// Status queries
// ---------------------------------------------------------------------------

/// `get_subject_consent_status` with and without a policy filter.
fn status_query_benchmark(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("subject_status");
    let runtime = Runtime::new().expect("tokio runtime");
    let (services, policy) = runtime.block_on(seeded_services(8));
    let granted: Vec<String> = policy.available_scopes.iter().map(|s| s.key.clone()).collect();

    runtime.block_on(async {
        for index in 0..500 {
            let subject = format!("subject-{:04}", index % 100);
            services
                .consent
                .grant_consent(make_grant(&subject, &policy.id, &granted))
                .await
                .expect("seed consent");
        }
    });

    let keys = ["scope-000", "scope-003", "scope-007", "scope-999"];

    group.bench_function("by_policy", |bencher| {
        bencher.to_async(&runtime).iter(|| {
            let services = services.clone();
            let policy_id = policy.id.clone();
            async move {
                black_box(
                    services
                        .consent
                        .get_subject_consent_status("subject-0042", &keys, Some(&policy_id))
                        .await,
                )
            }
        });
    });

    group.bench_function("all_records", |bencher| {
        bencher.to_async(&runtime).iter(|| {
            let services = services.clone();
            async move {
                black_box(
                    services
                        .consent
                        .get_subject_consent_status("subject-0042", &keys, None)
                        .await,
                )
            }
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    scope_resolution_benchmark,
    grant_benchmark,
    status_query_benchmark,
);
criterion_main!(benches);
