// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 MuVeraAI Corporation

use std::sync::Arc;

use chrono::Utc;
use consentkit_core::adapter::{ConsentDataAdapter, PolicyDataAdapter};
use consentkit_core::config::Config;
use consentkit_core::error::{Error, ErrorKind};
use consentkit_core::services::ConsentServices;
use consentkit_core::types::{
    ConsentMetadata, ConsentStatus, Consenter, CreateConsentInput, NewPolicy, PolicyScope,
    PolicyStatus, PolicyVersionInput,
};
use consentkit_std::FileAdapter;
use tempfile::tempdir;

fn policy_payload(group: &str, version: u32) -> NewPolicy {
    NewPolicy {
        policy_group_id: group.into(),
        version,
        title: format!("{group} v{version}"),
        status: PolicyStatus::Active,
        effective_date: Utc::now(),
        jurisdiction: Some("EU".into()),
        requires_proxy_for_minors: Some(true),
        content_sections: Vec::new(),
        available_scopes: vec![
            PolicyScope {
                key: "core".into(),
                name: "Core".into(),
                description: "Required processing".into(),
                required: Some(true),
            },
            PolicyScope {
                key: "analytics".into(),
                name: "Analytics".into(),
                description: "Usage analytics".into(),
                required: Some(false),
            },
        ],
    }
}

fn grant(subject: &str, policy_id: &str, scopes: &[&str]) -> CreateConsentInput {
    CreateConsentInput {
        subject_id: subject.into(),
        policy_id: policy_id.into(),
        consenter: Consenter::SelfConsent { user_id: subject.into() },
        granted_scopes: scopes.iter().map(|s| (*s).to_owned()).collect(),
        revoked_scopes: Vec::new(),
        date_of_birth: None,
        metadata: ConsentMetadata {
            consent_method: "web_form".into(),
            ip_address: Some("203.0.113.7".into()),
            user_agent: None,
        },
    }
}

#[tokio::test]
async fn test_open_missing_file_starts_empty_without_writing() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("store.json");

    let adapter = FileAdapter::open(&path).unwrap();
    assert!(adapter.list_policies().await.unwrap().is_empty());
    assert!(adapter.get_all_consents().await.unwrap().is_empty());
    assert!(!path.exists());
}

#[tokio::test]
async fn test_state_survives_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("store.json");

    let (policy_id, consent_id) = {
        let services = ConsentServices::new(FileAdapter::open(&path).unwrap(), Config::default());
        let policy = services
            .adapter()
            .create_policy(policy_payload("terms", 1))
            .await
            .unwrap();
        let first = services
            .consent
            .grant_consent(grant("subject-1", &policy.id, &["core", "analytics"]))
            .await
            .unwrap();
        let second = services
            .consent
            .grant_consent(grant("subject-1", &policy.id, &["core"]))
            .await
            .unwrap();
        assert_eq!(second.version, first.version + 1);
        (policy.id, second.id)
    };
    assert!(path.exists());
    assert!(!path.with_extension("tmp").exists());

    let reopened = FileAdapter::open(&path).unwrap();
    let policy = reopened.find_policy_by_id(&policy_id).await.unwrap().unwrap();
    assert_eq!(policy.jurisdiction.as_deref(), Some("EU"));

    let versions = lineage(&reopened, "subject-1", &policy_id).await;
    assert_eq!(
        versions,
        vec![(1, ConsentStatus::Superseded), (2, ConsentStatus::Granted)]
    );

    let latest = reopened.find_consent_by_id(&consent_id).await.unwrap().unwrap();
    assert!(latest.grants("core"));
    assert!(!latest.grants("analytics"));
    assert_eq!(latest.metadata.ip_address.as_deref(), Some("203.0.113.7"));
}

#[tokio::test]
async fn test_policy_versioning_archives_on_disk() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("store.json");
    let services = ConsentServices::new(FileAdapter::open(&path).unwrap(), Config::default());

    let v1 = services
        .adapter()
        .create_policy(policy_payload("privacy", 1))
        .await
        .unwrap();
    let v2 = services
        .policy
        .create_new_policy_version(
            &v1.id,
            PolicyVersionInput {
                status: Some(PolicyStatus::Active),
                ..PolicyVersionInput::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(v2.version, 2);

    let reopened = FileAdapter::open(&path).unwrap();
    let group = reopened.find_all_policy_versions_by_group_id("privacy").await.unwrap();
    let statuses: Vec<(u32, PolicyStatus)> = group.iter().map(|p| (p.version, p.status)).collect();
    assert_eq!(statuses, vec![(1, PolicyStatus::Archived), (2, PolicyStatus::Active)]);

    let active = reopened
        .find_latest_active_policy_by_group_id("privacy")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(active.id, v2.id);
}

#[tokio::test]
async fn test_duplicate_successor_version_is_rejected() {
    let dir = tempdir().unwrap();
    let adapter = FileAdapter::open(dir.path().join("store.json")).unwrap();

    adapter.create_policy(policy_payload("terms", 1)).await.unwrap();
    adapter.create_policy(policy_payload("terms", 2)).await.unwrap();
    let err = adapter.create_policy(policy_payload("terms", 2)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Concurrency);
    assert_eq!(adapter.list_policies().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_status_update_checks_version() {
    let dir = tempdir().unwrap();
    let adapter = FileAdapter::open(dir.path().join("store.json")).unwrap();
    let policy = adapter.create_policy(policy_payload("terms", 1)).await.unwrap();

    let err = adapter
        .update_policy_status(&policy.id, PolicyStatus::Archived, 7)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("expected version 7, found version 1"));

    let err = adapter
        .update_policy_status("missing", PolicyStatus::Archived, 1)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_flush_failure_is_reported_and_rolled_back() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("missing-dir").join("store.json");
    let adapter = FileAdapter::open(&path).unwrap();

    let err = adapter.create_policy(policy_payload("terms", 1)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Storage);
    assert!(adapter.list_policies().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_malformed_file_is_a_serialization_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("store.json");
    std::fs::write(&path, "{ not json").unwrap();

    let err = FileAdapter::open(&path).unwrap_err();
    assert!(matches!(err, Error::Serialization(_)));
    assert_eq!(err.kind(), ErrorKind::Storage);
}

#[tokio::test]
async fn test_explicit_flush_recreates_deleted_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("store.json");
    let adapter = FileAdapter::open(&path).unwrap();
    adapter.create_policy(policy_payload("terms", 1)).await.unwrap();

    std::fs::remove_file(&path).unwrap();
    adapter.flush().await.unwrap();

    let reopened = FileAdapter::open(adapter.path()).unwrap();
    assert_eq!(reopened.list_policies().await.unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_writers_all_reach_disk() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("store.json");
    let adapter = Arc::new(FileAdapter::open(&path).unwrap());

    let writers: Vec<_> = (0..8)
        .map(|i| {
            let adapter = Arc::clone(&adapter);
            tokio::spawn(async move {
                adapter
                    .create_policy(policy_payload(&format!("group-{i}"), 1))
                    .await
            })
        })
        .collect();
    for writer in writers {
        writer.await.unwrap().unwrap();
    }

    assert!(!path.with_extension("tmp").exists());
    let reopened = FileAdapter::open(&path).unwrap();
    let groups: Vec<String> = reopened
        .list_policies()
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.policy_group_id)
        .collect();
    let expected: Vec<String> = (0..8).map(|i| format!("group-{i}")).collect();
    assert_eq!(groups, expected);
}

/// `(version, status)` pairs of one lineage, ascending.
async fn lineage(
    adapter: &FileAdapter,
    subject_id: &str,
    policy_id: &str,
) -> Vec<(u32, ConsentStatus)> {
    adapter
        .find_all_consent_versions_by_subject_and_policy(subject_id, policy_id)
        .await
        .unwrap()
        .iter()
        .map(|r| (r.version, r.status))
        .collect()
}
